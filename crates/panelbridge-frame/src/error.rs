use std::fmt;

/// Numeric fields of a command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Channel,
    Folder,
    File,
    Volume,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Channel => "channel",
            Field::Folder => "folder",
            Field::File => "file",
            Field::Volume => "volume",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during frame decoding/encoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A field value failed range validation.
    #[error("{field} {value} out of range (max {max})")]
    OutOfRange { field: Field, value: i32, max: i32 },

    /// A non-digit byte was found in a numeric field (strict mode only).
    #[error("non-digit byte {byte:#04x} at frame offset {offset}")]
    InvalidDigit { offset: usize, byte: u8 },

    /// A frame did not have the fixed length or start sentinel.
    #[error("malformed command frame: {0}")]
    MalformedFrame(String),

    /// A status line did not match `S` + channel states + `E`.
    #[error("malformed status line: {0}")]
    MalformedStatus(String),

    /// An I/O error occurred while reading frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame was received.
    #[error("stream closed (incomplete frame)")]
    StreamClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
