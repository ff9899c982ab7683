//! Error handling for the app_metrics crate.

/// A specialized `Result` type for metrics operations.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// The main error type for metrics collection and publishing.
///
/// Platform read failures (`Io`, `Parse`, `Unavailable`) are produced by
/// metric sources and swallowed per group by the samplers. The remaining
/// variants surface from setup code such as registry construction or
/// starting the web server.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Platform data could not be parsed
    #[error("Failed to parse {0}")]
    Parse(String),

    /// Metric group is not available on this platform or process
    #[error("Metric group unavailable: {0}")]
    Unavailable(String),

    /// Prometheus registry operation failed
    #[error("Registry error: {0}")]
    Registry(#[from] prometheus::Error),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MetricsError {
    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new unavailable-group error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
