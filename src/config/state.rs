// Application state module
// Shared, read-only state handed to every connection

use std::sync::Arc;

use super::types::Config;
use crate::detect::DetectHandler;
use crate::store::RecordStore;

/// Application state
pub struct AppState {
    pub config: Config,
    pub detector: DetectHandler,
    /// Same store the detector writes to, used by the record lookup route
    pub store: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(config: &Config, detector: DetectHandler, store: Arc<dyn RecordStore>) -> Self {
        Self {
            config: config.clone(),
            detector,
            store,
        }
    }

    pub const fn access_log_enabled(&self) -> bool {
        self.config.logging.access_log
    }
}
