mod handlers;
mod inbound;
mod server;
mod state;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use handlers::HOMEPAGE_BODY;
pub use inbound::{process_slack_event, RecordOutcome};
pub use server::{build_appender, build_router, build_state, run_server, serve};
pub use state::AppState;
