use std::sync::Arc;

use sheets_module::SheetAppender;

use crate::config::ServiceConfig;
use crate::heuristic::NameHeuristic;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub heuristic: Arc<NameHeuristic>,
    /// `None` when the Google credentials could not be loaded at startup.
    pub appender: Option<Arc<SheetAppender>>,
}
