//! Blocking client for the Google Sheets v4 values API.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::google_auth::{GoogleAuth, GoogleAuthError};

pub const DEFAULT_SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com/v4";

#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    #[error("auth error: {0}")]
    Auth(#[from] GoogleAuthError),
    #[error("http error: {0}")]
    Http(String),
    #[error("sheets api returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to decode sheets response: {0}")]
    Parse(String),
}

/// Written cells are parsed as if typed into the UI, so timestamps become dates.
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub major_dimension: Option<String>,
    /// Absent when the range holds no data.
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    #[serde(default)]
    pub updated_range: Option<String>,
    #[serde(default)]
    pub updated_rows: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateValuesRequest<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a [Vec<String>],
}

#[derive(Debug, Clone)]
pub struct SheetsClient {
    auth: GoogleAuth,
    api_base: String,
    http: reqwest::blocking::Client,
}

impl SheetsClient {
    pub fn new(auth: GoogleAuth) -> Self {
        Self::with_api_base(auth, DEFAULT_SHEETS_API_BASE_URL)
    }

    pub fn with_api_base(auth: GoogleAuth, api_base: impl Into<String>) -> Self {
        Self {
            auth,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            http: reqwest::blocking::Client::new(),
        }
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.api_base,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    /// `spreadsheets.values.get`
    pub fn get_values(&self, spreadsheet_id: &str, range: &str) -> Result<ValueRange, SheetsError> {
        let access_token = self.auth.get_access_token()?;
        let url = self.values_url(spreadsheet_id, range);
        debug!("GET sheet values {}", range);

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .map_err(|e| SheetsError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!("Failed to read range {}: {} - {}", range, status, body);
            return Err(SheetsError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .map_err(|e| SheetsError::Parse(e.to_string()))
    }

    /// `spreadsheets.values.update`
    pub fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<UpdateValuesResponse, SheetsError> {
        let access_token = self.auth.get_access_token()?;
        let url = self.values_url(spreadsheet_id, range);
        debug!("PUT {} rows to {}", rows.len(), range);

        let payload = UpdateValuesRequest {
            range,
            major_dimension: "ROWS",
            values: rows,
        };

        let response = self
            .http
            .put(&url)
            .query(&[("valueInputOption", VALUE_INPUT_OPTION)])
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&payload)
            .send()
            .map_err(|e| SheetsError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!("Failed to write range {}: {} - {}", range, status, body);
            return Err(SheetsError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .map_err(|e| SheetsError::Parse(e.to_string()))
    }
}
