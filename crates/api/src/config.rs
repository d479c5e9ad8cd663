use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Root directory for the `input` asset bucket.
    pub input_root: PathBuf,
    /// Root directory for the `output` asset bucket.
    pub output_root: PathBuf,
    /// Root directory for the `temp` asset bucket.
    pub temp_root: PathBuf,
    /// Path to the style catalog document.
    pub styles_config: PathBuf,
    /// Default cap on history listings when the request does not name
    /// one. `None` means unbounded.
    pub history_limit: Option<usize>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `INPUT_DIR`            | `data/input`               |
    /// | `OUTPUT_DIR`           | `data/output`              |
    /// | `TEMP_DIR`             | `data/temp`                |
    /// | `STYLES_CONFIG`        | `config/styles_config.json`|
    /// | `HISTORY_LIMIT`        | unset (unbounded)          |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let input_root = PathBuf::from(std::env::var("INPUT_DIR").unwrap_or_else(|_| "data/input".into()));
        let output_root =
            PathBuf::from(std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "data/output".into()));
        let temp_root = PathBuf::from(std::env::var("TEMP_DIR").unwrap_or_else(|_| "data/temp".into()));

        let styles_config = PathBuf::from(
            std::env::var("STYLES_CONFIG").unwrap_or_else(|_| "config/styles_config.json".into()),
        );

        let history_limit: Option<usize> = std::env::var("HISTORY_LIMIT")
            .ok()
            .map(|v| v.parse().expect("HISTORY_LIMIT must be a valid usize"));

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            input_root,
            output_root,
            temp_root,
            styles_config,
            history_limit,
        }
    }
}
