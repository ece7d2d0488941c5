//! Error types for levelgrid

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// levelgrid error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Grid profile cannot describe a sampling grid
    #[error("Configuration error: {0}")]
    Config(String),

    /// No matching probe response within the response timeout
    #[error("Probing at location {x:.3}, {y:.3} timed out")]
    Timeout {
        /// Requested X coordinate
        x: f64,
        /// Requested Y coordinate
        y: f64,
    },

    /// Device reported a different position than the one requested
    #[error(
        "Probing failed: Coordinates mismatch, expected {:.3}, {:.3}, got {:.3}, {:.3}",
        expected.0, expected.1, got.0, got.1
    )]
    CoordinateMismatch {
        /// Requested (x, y)
        expected: (f64, f64),
        /// Reported (x, y)
        got: (f64, f64),
    },

    /// Operator is not allowed to issue the command
    #[error("Insufficient permissions: {0}")]
    Permission(String),

    /// A probe session is already running
    #[error("Probing already in progress")]
    AlreadyProbing,

    /// Operator command name not recognized
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Selected profile missing from the profile set
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A worker thread panicked
    #[error("Thread panicked")]
    ThreadPanic,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
