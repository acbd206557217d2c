/// Errors that can occur in bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Peripheral error.
    #[error("hardware error: {0}")]
    Hal(#[from] panelbridge_hal::HalError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] panelbridge_frame::FrameError),

    /// A configuration value is unusable.
    #[error("invalid config: {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// A peripheral bank does not match the configured channel count.
    #[error("{bank} has {actual} lines, config expects {expected}")]
    LineCount {
        bank: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The channel does not exist on this device.
    #[error("channel {channel} out of range ({count} channels)")]
    ChannelOutOfRange { channel: usize, count: usize },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while loading configuration.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
