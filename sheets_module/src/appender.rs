//! Appends `(name, message, timestamp)` rows after the last occupied row.
//!
//! The row count is read and the rows are written in two separate calls.
//! Two requests racing between those calls will compute the same range and
//! the later write overwrites the earlier one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::client::{SheetsClient, SheetsError};

pub const DEFAULT_COUNT_RANGE: &str = "A1:A600000";
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::US::Pacific;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f%:z";

/// The two remote operations the appender needs.
pub trait SheetStore: Send + Sync {
    /// Number of occupied rows in `range`.
    fn occupied_rows(&self, spreadsheet_id: &str, range: &str) -> Result<usize, SheetsError>;

    fn write_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsError>;
}

impl SheetStore for SheetsClient {
    fn occupied_rows(&self, spreadsheet_id: &str, range: &str) -> Result<usize, SheetsError> {
        Ok(self.get_values(spreadsheet_id, range)?.values.len())
    }

    fn write_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsError> {
        let response = self.update_values(spreadsheet_id, range, rows)?;
        match response.updated_rows {
            Some(updated) if updated != rows.len() => warn!(
                "sheets api updated {} rows in {} but {} were sent",
                updated,
                response.updated_range.as_deref().unwrap_or(range),
                rows.len()
            ),
            _ => debug!(
                "sheets api updated {}",
                response.updated_range.as_deref().unwrap_or(range)
            ),
        }
        Ok(())
    }
}

/// Where rows go.
#[derive(Debug, Clone)]
pub struct SheetTarget {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    /// Column range, without the sheet prefix, used to count occupied rows.
    pub count_range: String,
    pub timezone: Tz,
}

impl SheetTarget {
    pub fn new(spreadsheet_id: impl Into<String>, sheet_name: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            count_range: DEFAULT_COUNT_RANGE.to_string(),
            timezone: DEFAULT_TIMEZONE,
        }
    }

    pub fn count_range_a1(&self) -> String {
        format!("{}!{}", self.sheet_name, self.count_range)
    }
}

/// 1-based inclusive row span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendRange {
    pub start_row: usize,
    pub end_row: usize,
}

impl AppendRange {
    /// Rows directly below `occupied` existing rows. `new_rows` must be non-zero.
    pub fn after(occupied: usize, new_rows: usize) -> Self {
        Self {
            start_row: occupied + 1,
            end_row: occupied + new_rows,
        }
    }

    pub fn a1(&self, sheet_name: &str) -> String {
        format!("{}!A{}:C{}", sheet_name, self.start_row, self.end_row)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// A1 range written, `None` when there was nothing to write.
    pub range: Option<String>,
    pub rows_written: usize,
}

pub fn format_timestamp(now: DateTime<Utc>, timezone: Tz) -> String {
    now.with_timezone(&timezone).format(TIMESTAMP_FORMAT).to_string()
}

pub fn build_rows(names: &[String], message: &str, timestamp: &str) -> Vec<Vec<String>> {
    names
        .iter()
        .map(|name| vec![name.clone(), message.to_string(), timestamp.to_string()])
        .collect()
}

#[derive(Clone)]
pub struct SheetAppender {
    store: Arc<dyn SheetStore>,
    target: SheetTarget,
}

impl std::fmt::Debug for SheetAppender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetAppender")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl SheetAppender {
    pub fn new(store: Arc<dyn SheetStore>, target: SheetTarget) -> Self {
        Self { store, target }
    }

    pub fn target(&self) -> &SheetTarget {
        &self.target
    }

    pub fn append(&self, names: &[String], message: &str) -> Result<AppendOutcome, SheetsError> {
        self.append_at(names, message, Utc::now())
    }

    pub fn append_at(
        &self,
        names: &[String],
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<AppendOutcome, SheetsError> {
        if names.is_empty() {
            return Ok(AppendOutcome {
                range: None,
                rows_written: 0,
            });
        }

        let occupied = self
            .store
            .occupied_rows(&self.target.spreadsheet_id, &self.target.count_range_a1())?;
        let range = AppendRange::after(occupied, names.len()).a1(&self.target.sheet_name);
        info!("Writing {} names to range {}", names.len(), range);

        let timestamp = format_timestamp(now, self.target.timezone);
        let rows = build_rows(names, message, &timestamp);
        self.store
            .write_rows(&self.target.spreadsheet_id, &range, &rows)?;

        info!("Successfully wrote {} names to google sheets", names.len());
        Ok(AppendOutcome {
            range: Some(range),
            rows_written: rows.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Read(String),
        Write(String, Vec<Vec<String>>),
    }

    struct RecordingStore {
        occupied: usize,
        fail_write: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingStore {
        fn new(occupied: usize) -> Self {
            Self {
                occupied,
                fail_write: false,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl SheetStore for RecordingStore {
        fn occupied_rows(&self, _spreadsheet_id: &str, range: &str) -> Result<usize, SheetsError> {
            self.calls.lock().unwrap().push(Call::Read(range.to_string()));
            Ok(self.occupied)
        }

        fn write_rows(
            &self,
            _spreadsheet_id: &str,
            range: &str,
            rows: &[Vec<String>],
        ) -> Result<(), SheetsError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Write(range.to_string(), rows.to_vec()));
            if self.fail_write {
                return Err(SheetsError::Api {
                    status: 403,
                    body: "forbidden".to_string(),
                });
            }
            Ok(())
        }
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn append_range_follows_occupied_rows() {
        let range = AppendRange::after(5, 2);
        assert_eq!(range, AppendRange { start_row: 6, end_row: 7 });
        assert_eq!(range.a1("raw"), "raw!A6:C7");
        assert_eq!(AppendRange::after(0, 1).a1("raw"), "raw!A1:C1");
    }

    #[test]
    fn timestamp_uses_pacific_offset() {
        let winter = Utc.with_ymd_and_hms(2024, 1, 15, 20, 30, 0).unwrap();
        assert_eq!(
            format_timestamp(winter, DEFAULT_TIMEZONE),
            "2024-01-15 12:30:00.000000-08:00"
        );
        let summer = Utc.with_ymd_and_hms(2024, 7, 4, 18, 0, 5).unwrap();
        assert_eq!(
            format_timestamp(summer, DEFAULT_TIMEZONE),
            "2024-07-04 11:00:05.000000-07:00"
        );
    }

    #[test]
    fn reads_before_writing_one_row_per_name() {
        let store = Arc::new(RecordingStore::new(5));
        let appender = SheetAppender::new(store.clone(), SheetTarget::new("sheet-id", "raw"));
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 20, 30, 0).unwrap();

        let outcome = appender
            .append_at(&names(&["Jane D", "Bob"]), "Jane Doe said hi to Bob", now)
            .unwrap();

        assert_eq!(outcome.range.as_deref(), Some("raw!A6:C7"));
        assert_eq!(outcome.rows_written, 2);

        let calls = store.calls.lock().unwrap();
        let ts = "2024-01-15 12:30:00.000000-08:00".to_string();
        assert_eq!(
            *calls,
            vec![
                Call::Read("raw!A1:A600000".to_string()),
                Call::Write(
                    "raw!A6:C7".to_string(),
                    vec![
                        vec!["Jane D".to_string(), "Jane Doe said hi to Bob".to_string(), ts.clone()],
                        vec!["Bob".to_string(), "Jane Doe said hi to Bob".to_string(), ts],
                    ]
                ),
            ]
        );
    }

    #[test]
    fn empty_names_make_no_calls() {
        let store = Arc::new(RecordingStore::new(3));
        let appender = SheetAppender::new(store.clone(), SheetTarget::new("sheet-id", "raw"));
        let outcome = appender.append(&[], "nothing here").unwrap();
        assert_eq!(outcome.rows_written, 0);
        assert!(outcome.range.is_none());
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn write_failure_is_returned() {
        let store = Arc::new(RecordingStore {
            fail_write: true,
            ..RecordingStore::new(0)
        });
        let appender = SheetAppender::new(store, SheetTarget::new("sheet-id", "raw"));
        let err = appender.append(&names(&["Ana"]), "Ana").unwrap_err();
        assert!(matches!(err, SheetsError::Api { status: 403, .. }));
    }
}
