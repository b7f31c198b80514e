// Configuration module entry point
// Loads the service configuration and holds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    ClassifierConfig, Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig,
    StoreBackend, StoreConfig,
};

/// Environment variable naming the config file (without extension)
pub const CONFIG_PATH_ENV: &str = "IMAGE_DETECT_CONFIG";

/// Deployment variables that override individual keys
const DEPLOYMENT_OVERRIDES: [(&str, &str); 3] = [
    ("DDB_TABLE", "store.table"),
    ("PROJECT_VERSION_ARN", "classifier.model_ref"),
    ("REGION", "classifier.region"),
];

impl Config {
    /// Load configuration from `IMAGE_DETECT_CONFIG`, falling back to "config"
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config".to_string());
        Self::load_from(&path)
    }

    /// Load configuration from specified file path (without extension)
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let overrides = DEPLOYMENT_OVERRIDES
            .iter()
            .map(|(var, key)| (*key, std::env::var(var).ok()))
            .collect::<Vec<_>>();
        Self::build(config_path, &overrides)
    }

    fn build(
        config_path: &str,
        overrides: &[(&str, Option<String>)],
    ) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("DETECT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.shutdown_grace", 10)?
            .set_default("http.detect_path", "/detect")?
            .set_default("http.server_name", "image-detect/0.1")?
            .set_default("http.max_body_size", 16_777_216)? // 16MB
            .set_default("store.backend", "file")?
            .set_default("store.path", "data")?
            .set_default("store.table", "detections")?
            .set_default("classifier.endpoint", "https://rekognition.us-east-1.amazonaws.com")?
            .set_default("classifier.model_ref", "")?
            .set_default("classifier.region", "us-east-1")?
            .set_default("classifier.max_results", 10)?;

        for (key, value) in overrides {
            builder = builder.set_override_option(*key, value.clone())?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
