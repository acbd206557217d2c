//! Maintenance override frames.
//!
//! Overrides are matched against the raw received bytes after the regular
//! validation path has run, and fire regardless of its verdict. Neither frame
//! passes the range validator on a five-channel device.

use crate::codec::{Command, RawFrame, FRAME_LEN};

/// Forces a diagnostic playback.
pub const DIAGNOSTIC_FRAME: &[u8; FRAME_LEN] = b"b12345678";

/// Restarts the device.
pub const RESTART_FRAME: &[u8; FRAME_LEN] = b"b99999999";

/// What the diagnostic override plays: channel 0, folder 1, file 1, volume 15.
pub const DIAGNOSTIC_PLAYBACK: Command = Command {
    channel: 0,
    folder: 1,
    file: 1,
    volume: 15,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Override {
    DiagnosticPlayback,
    Restart,
}

impl Override {
    /// The literal frame that triggers this override.
    pub fn frame(self) -> &'static [u8; FRAME_LEN] {
        match self {
            Override::DiagnosticPlayback => DIAGNOSTIC_FRAME,
            Override::Restart => RESTART_FRAME,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Override::DiagnosticPlayback => "diagnostic-playback",
            Override::Restart => "restart",
        }
    }
}

/// Compare a frame verbatim against the override table.
pub fn match_override(frame: &RawFrame) -> Option<Override> {
    [Override::DiagnosticPlayback, Override::Restart]
        .into_iter()
        .find(|candidate| frame.as_bytes() == candidate.frame())
}
