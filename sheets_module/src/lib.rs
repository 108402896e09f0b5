pub mod appender;
pub mod client;
pub mod google_auth;

pub use appender::{AppendOutcome, AppendRange, SheetAppender, SheetStore, SheetTarget};
pub use client::{SheetsClient, SheetsError, UpdateValuesResponse, ValueRange};
pub use google_auth::{GoogleAuth, GoogleAuthConfig, GoogleAuthError, SHEETS_SCOPES};
