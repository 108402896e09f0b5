use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task;
use tracing::{debug, error, info};

use sheets_module::{
    GoogleAuth, GoogleAuthConfig, GoogleAuthError, SheetAppender, SheetsClient, SHEETS_SCOPES,
};

use crate::config::ServiceConfig;

use super::handlers::{index, slack_verify};
use super::state::AppState;
use super::BoxError;

pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.config.inbound_body_max_bytes;
    Router::new()
        .route("/", get(index))
        .route("/slack/verify", post(slack_verify))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// Sheets appender backed by the service account key, or by
/// `GOOGLE_ACCESS_TOKEN` when no key file is present.
pub fn build_appender(config: &ServiceConfig) -> Result<SheetAppender, GoogleAuthError> {
    let mut auth_config =
        match GoogleAuthConfig::from_credentials_file(&config.credentials_path, SHEETS_SCOPES) {
            Ok(auth_config) => auth_config,
            Err(err) if config.google_access_token.is_some() => {
                debug!("using GOOGLE_ACCESS_TOKEN without a key file: {}", err);
                GoogleAuthConfig {
                    scopes: SHEETS_SCOPES.iter().map(|scope| scope.to_string()).collect(),
                    ..Default::default()
                }
            }
            Err(err) => return Err(err),
        };
    auth_config.access_token = config.google_access_token.clone();

    let auth = GoogleAuth::new(auth_config)?;
    if let Some(email) = auth.client_email() {
        info!("google sheets writer account {}", email);
    }
    let client = SheetsClient::with_api_base(auth, config.sheets_api_base_url.clone());
    Ok(SheetAppender::new(Arc::new(client), config.sheet_target()))
}

/// Heuristic errors are fatal; missing Google credentials only disable writes.
pub fn build_state(config: ServiceConfig) -> Result<AppState, BoxError> {
    let heuristic = config.build_heuristic()?;
    info!(
        "name dictionary loaded with {} words",
        heuristic.dictionary().len()
    );
    let appender = match build_appender(&config) {
        Ok(appender) => {
            let target = appender.target();
            info!(
                "recording names to spreadsheet={} sheet={} timezone={}",
                target.spreadsheet_id, target.sheet_name, target.timezone
            );
            Some(Arc::new(appender))
        }
        Err(err) => {
            error!("google sheets unavailable, names will not be recorded: {}", err);
            None
        }
    };

    Ok(AppState {
        config: Arc::new(config),
        heuristic: Arc::new(heuristic),
        appender,
    })
}

pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

pub async fn run_server(
    config: ServiceConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    let host: IpAddr = config
        .host
        .parse()
        .map_err(|_| format!("invalid host: {}", config.host))?;
    let addr = SocketAddr::new(host, config.port);

    info!("google credentials={}", config.credentials_path.display());
    // the blocking HTTP client must not be built on an async worker
    let state = task::spawn_blocking(move || build_state(config))
        .await
        .map_err(|err| -> BoxError { err.into() })??;

    let listener = TcpListener::bind(addr).await?;
    info!("slack webhook listening on {}", listener.local_addr()?);
    serve(listener, state, shutdown).await
}
