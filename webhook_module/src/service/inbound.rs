use serde_json::Value;
use tokio::task;
use tracing::{error, info, warn};

use crate::extractor::extract_message;

use super::state::AppState;

/// What happened to one event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Malformed,
    NoNames,
    SheetUnavailable,
    Written { range: String, rows: usize },
    WriteFailed,
}

/// Extract the message, find names and append them to the sheet.
///
/// Failures are logged here and reported through the outcome; none of them
/// change the HTTP response.
pub async fn process_slack_event(state: &AppState, payload: &Value) -> RecordOutcome {
    let message = match extract_message(payload) {
        Ok(message) => message,
        Err(err) => {
            warn!("An error occurred in parsing the slack message: {}", err);
            return RecordOutcome::Malformed;
        }
    };

    let names = state.heuristic.find_names(&message);
    if names.is_empty() {
        info!("no names found in slack message");
        return RecordOutcome::NoNames;
    }

    let Some(appender) = state.appender.clone() else {
        error!(
            "google sheets is not configured; dropping {} names",
            names.len()
        );
        return RecordOutcome::SheetUnavailable;
    };

    let result = task::spawn_blocking(move || appender.append(&names, &message)).await;
    match result {
        Ok(Ok(outcome)) => RecordOutcome::Written {
            range: outcome.range.unwrap_or_default(),
            rows: outcome.rows_written,
        },
        Ok(Err(err)) => {
            error!("Failed to write to google sheets: {}", err);
            RecordOutcome::WriteFailed
        }
        Err(err) => {
            error!("google sheets write task failed: {}", err);
            RecordOutcome::WriteFailed
        }
    }
}
