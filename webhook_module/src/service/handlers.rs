use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::extractor::{challenge, is_url_verification};
use crate::verify::verify_slack;

use super::inbound::process_slack_event;
use super::state::AppState;

pub const HOMEPAGE_BODY: &str = "Gone too long";

pub(super) async fn index() -> impl IntoResponse {
    info!("Somebody visited our homepage");
    (StatusCode::OK, HOMEPAGE_BODY)
}

/// Slack Events API callback. Always answers 200 with the challenge (or an
/// empty body) unless signature verification is configured and fails.
pub(super) async fn slack_verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            warn!("slack request body is not valid json: {}", err);
            return (StatusCode::OK, String::new());
        }
    };

    let echo = challenge(&payload).unwrap_or_default().to_string();
    if is_url_verification(&payload) {
        info!("answering slack url verification");
        return (StatusCode::OK, echo);
    }

    if let Some(secret) = state.config.slack_signing_secret.as_deref() {
        if let Err(reason) = verify_slack(secret, &headers, &body) {
            warn!("rejecting slack request: {}", reason);
            return (StatusCode::UNAUTHORIZED, reason.to_string());
        }
    }

    debug!("Received a slack message {}", payload);
    let outcome = process_slack_event(&state, &payload).await;
    info!("slack event processed: {:?}", outcome);

    (StatusCode::OK, echo)
}
