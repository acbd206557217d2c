use std::fmt;
use std::io;

use panelbridge_core::BridgeError;
use panelbridge_frame::FrameError;
use panelbridge_hal::HalError;

// sysexits-style exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DEVICE_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::StreamClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn hal_error(context: &str, err: HalError) -> CliError {
    match err {
        HalError::Io(source) => io_error(context, source),
        HalError::VolumeOutOfRange { .. } | HalError::UnaddressableTrack { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(DEVICE_ERROR, format!("{context}: {other}")),
    }
}

pub fn bridge_error(context: &str, err: BridgeError) -> CliError {
    match err {
        BridgeError::Hal(err) => hal_error(context, err),
        BridgeError::Frame(err) => frame_error(context, err),
        BridgeError::Io(source) => io_error(context, source),
        BridgeError::InvalidConfig { .. } | BridgeError::Json(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        BridgeError::LineCount { .. } | BridgeError::ChannelOutOfRange { .. } => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
    }
}
