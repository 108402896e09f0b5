//! Google OAuth 2.0 authentication for the Sheets API.
//!
//! Tokens are minted from a service-account key using the JWT bearer grant
//! and cached until shortly before they expire. A pre-issued access token can
//! be supplied instead for sandboxes without a key file.

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Scopes required to read and write spreadsheet values.
pub const SHEETS_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/drive.file",
    "https://www.googleapis.com/auth/spreadsheets",
];

/// Google OAuth credentials and token cache.
#[derive(Debug, Clone)]
pub struct GoogleAuth {
    inner: Arc<RwLock<GoogleAuthInner>>,
}

#[derive(Debug)]
struct GoogleAuthInner {
    service_account: Option<ServiceAccountKey>,
    scopes: Vec<String>,
    access_token: Option<String>,
    token_expires_at: Option<Instant>,
}

/// Configuration for Google OAuth.
#[derive(Debug, Clone, Default)]
pub struct GoogleAuthConfig {
    /// Service account key file contents
    pub service_account_json: Option<String>,
    /// Pre-generated access token
    pub access_token: Option<String>,
    pub scopes: Vec<String>,
}

impl GoogleAuthConfig {
    /// Read a service-account key file.
    pub fn from_credentials_file(path: &Path, scopes: &[&str]) -> Result<Self, GoogleAuthError> {
        let json = std::fs::read_to_string(path).map_err(|err| {
            GoogleAuthError::CredentialsFile(format!("{}: {}", path.display(), err))
        })?;
        Ok(Self {
            service_account_json: Some(json),
            access_token: None,
            scopes: scopes.iter().map(|scope| scope.to_string()).collect(),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.access_token.is_some() || self.service_account_json.is_some()
    }
}

/// The fields of a service-account key file needed to mint tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum GoogleAuthError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    #[error("failed to read credentials file {0}")]
    CredentialsFile(String),
    #[error("invalid service account key: {0}")]
    InvalidServiceAccount(String),
    #[error("token refresh failed: {0}")]
    TokenRefreshFailed(String),
    #[error("http error: {0}")]
    HttpError(String),
    #[error("json error: {0}")]
    JsonError(String),
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: i64,
    #[allow(dead_code)]
    token_type: Option<String>,
}

impl GoogleAuth {
    pub fn new(config: GoogleAuthConfig) -> Result<Self, GoogleAuthError> {
        if !config.is_valid() {
            return Err(GoogleAuthError::MissingCredentials(
                "either a service account key or GOOGLE_ACCESS_TOKEN must be provided".to_string(),
            ));
        }

        let service_account = match config.service_account_json.as_deref() {
            Some(json) => Some(
                serde_json::from_str::<ServiceAccountKey>(json)
                    .map_err(|e| GoogleAuthError::InvalidServiceAccount(e.to_string()))?,
            ),
            None => None,
        };

        // Pre-generated tokens are assumed valid for 1 hour
        let (access_token, token_expires_at) = match config.access_token {
            Some(token) => (Some(token), Some(Instant::now() + Duration::from_secs(3600))),
            None => (None, None),
        };

        Ok(Self {
            inner: Arc::new(RwLock::new(GoogleAuthInner {
                service_account,
                scopes: config.scopes,
                access_token,
                token_expires_at,
            })),
        })
    }

    pub fn from_credentials_file(path: &Path, scopes: &[&str]) -> Result<Self, GoogleAuthError> {
        Self::new(GoogleAuthConfig::from_credentials_file(path, scopes)?)
    }

    /// Service account email, if the credentials carry one.
    pub fn client_email(&self) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(|p| p.into_inner());
        inner.service_account.as_ref().map(|key| key.client_email.clone())
    }

    /// Get a valid access token, refreshing if necessary.
    pub fn get_access_token(&self) -> Result<String, GoogleAuthError> {
        {
            let inner = self.inner.read().unwrap_or_else(|p| p.into_inner());
            if let (Some(token), Some(expires_at)) = (&inner.access_token, &inner.token_expires_at)
            {
                if *expires_at > Instant::now() + EXPIRY_BUFFER {
                    return Ok(token.clone());
                }
            }
        }

        self.refresh_access_token()
    }

    /// Force a token refresh from the service account key.
    pub fn refresh_access_token(&self) -> Result<String, GoogleAuthError> {
        let (key, scopes) = {
            let inner = self.inner.read().unwrap_or_else(|p| p.into_inner());
            match &inner.service_account {
                Some(key) => (key.clone(), inner.scopes.clone()),
                None => {
                    return Err(GoogleAuthError::MissingCredentials(
                        "access token expired and no service account key is configured"
                            .to_string(),
                    ))
                }
            }
        };

        self.refresh_via_service_account(&key, &scopes)
    }

    fn refresh_via_service_account(
        &self,
        key: &ServiceAccountKey,
        scopes: &[String],
    ) -> Result<String, GoogleAuthError> {
        debug!("Requesting Google access token for {}", key.client_email);

        let assertion = sign_assertion(key, scopes, unix_now())?;

        let client = reqwest::blocking::Client::new();
        let response = client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .map_err(|e| GoogleAuthError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!("Service account token exchange failed: {} - {}", status, body);
            return Err(GoogleAuthError::TokenRefreshFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let token_response: OAuthTokenResponse = response
            .json()
            .map_err(|e| GoogleAuthError::JsonError(e.to_string()))?;

        let expires_in = Duration::from_secs(token_response.expires_in.max(0) as u64);
        let access_token = token_response.access_token.clone();

        {
            let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
            inner.access_token = Some(token_response.access_token);
            inner.token_expires_at = Some(Instant::now() + expires_in);
        }

        debug!("Google access token refreshed");
        Ok(access_token)
    }
}

/// Build the RS256-signed JWT exchanged for an access token.
fn sign_assertion(
    key: &ServiceAccountKey,
    scopes: &[String],
    issued_at: u64,
) -> Result<String, GoogleAuthError> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let claims = JwtClaims {
        iss: &key.client_email,
        scope: scopes.join(" "),
        aud: &key.token_uri,
        iat: issued_at,
        exp: issued_at + ASSERTION_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| GoogleAuthError::InvalidServiceAccount(e.to_string()))?;
    jsonwebtoken::encode(&header, &claims, &encoding_key)
        .map_err(|e| GoogleAuthError::InvalidServiceAccount(e.to_string()))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}
