//! Fixed-width ASCII framing for the panel bridge host link.
//!
//! Inbound, the host sends back-to-back 9-byte command frames:
//! - A start sentinel `b`
//! - 1 channel digit, 2 folder digits, 3 file digits, 2 volume digits
//!
//! Outbound, the device answers every poll cycle with a status line
//! `S` + one character per channel + `E`, CRLF terminated.
//!
//! There is no checksum and no resynchronization beyond the start sentinel.

pub mod codec;
pub mod decoder;
pub mod error;
pub mod overrides;
pub mod reader;
pub mod status;

pub use codec::{
    decode_frame, encode_command, validate, Command, FrameConfig, RawFields, RawFrame,
    DEFAULT_CHANNEL_COUNT, FRAME_LEN, MAX_CHANNELS, MAX_FILE, MAX_FOLDER, MAX_VOLUME,
    START_SENTINEL,
};
pub use decoder::CommandDecoder;
pub use error::{Field, FrameError, Result};
pub use overrides::{
    match_override, Override, DIAGNOSTIC_FRAME, DIAGNOSTIC_PLAYBACK, RESTART_FRAME,
};
pub use reader::CommandReader;
pub use status::{
    channel_mask, encode_status_line, parse_status_line, StatusLine, LINE_TERMINATOR, STATUS_END,
    STATUS_START,
};
