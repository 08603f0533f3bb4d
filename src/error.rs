use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Navigation timeout after {0}ms")]
    NavigationTimeout(u64),

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("PDF render failed: {0}")]
    PdfFailed(String),

    #[error("JavaScript evaluation failed: {0}")]
    EvaluationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Device profile not found: {0}")]
    DeviceNotFound(String),

    #[error("Invalid resolution: {0} (expected WxH, e.g. 1920x1080)")]
    InvalidResolution(String),

    #[error("Invalid traffic filter pattern: {0}")]
    InvalidFilterPattern(String),

    #[error("Response body decode failed: {0}")]
    DecodeFailed(String),

    /// Generic caller-facing failure for a capture request. Internal detail
    /// goes to the log, never to the caller.
    #[error("failed to produce network snapshot")]
    SnapshotFailed,

    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeError(#[from] toml::de::Error),

    #[error("General error: {0}")]
    General(String),
}

impl SnapshotError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::LaunchFailed(_) => 3,
            Self::NavigationTimeout(_) => 4,
            Self::ElementNotFound { .. } => 5,
            Self::IoError(_) | Self::ScreenshotFailed(_) | Self::PdfFailed(_) => 6,
            Self::ConfigError(_) | Self::TomlDeError(_) => 7,
            Self::InvalidResolution(_) | Self::InvalidFilterPattern(_) | Self::DeviceNotFound(_) => {
                2
            }
            _ => 1,
        }
    }
}
