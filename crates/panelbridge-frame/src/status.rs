use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::codec::MAX_CHANNELS;
use crate::error::{FrameError, Result};

pub const STATUS_START: u8 = b'S';
pub const STATUS_END: u8 = b'E';
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

const PRESSED: u8 = b'0';
const RELEASED: u8 = b'1';

/// Per-channel press state reported to the host once per poll cycle.
///
/// Bit i of `pressed` set means channel i was freshly pressed in that poll and
/// is sent as `'0'`; every other channel is sent as `'1'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLine {
    pressed: u8,
    channel_count: usize,
}

impl StatusLine {
    /// All channels released.
    pub fn released(channel_count: usize) -> Self {
        Self::from_pressed(0, channel_count)
    }

    /// Build from a pressed-bit mask. Bits at or above `channel_count` are
    /// dropped.
    pub fn from_pressed(pressed: u8, channel_count: usize) -> Self {
        let channel_count = channel_count.min(MAX_CHANNELS);
        Self {
            pressed: pressed & channel_mask(channel_count),
            channel_count,
        }
    }

    pub fn pressed_mask(&self) -> u8 {
        self.pressed
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn is_pressed(&self, channel: usize) -> bool {
        channel < self.channel_count && self.pressed >> channel & 1 == 1
    }

    /// Line size without the terminator.
    pub fn wire_len(&self) -> usize {
        self.channel_count + 2
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        put_body(self, &mut buf);
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

/// Mask with the low `channel_count` bits set.
pub fn channel_mask(channel_count: usize) -> u8 {
    match channel_count {
        0 => 0,
        n if n >= 8 => u8::MAX,
        n => (1u8 << n) - 1,
    }
}

fn put_body(line: &StatusLine, dst: &mut BytesMut) {
    dst.put_u8(STATUS_START);
    for channel in 0..line.channel_count {
        dst.put_u8(if line.is_pressed(channel) {
            PRESSED
        } else {
            RELEASED
        });
    }
    dst.put_u8(STATUS_END);
}

/// Encode a status line with its CRLF terminator.
///
/// Wire format (five channels):
/// ```text
/// ┌─────┬────┬────┬────┬────┬────┬─────┬───────┐
/// │ 'S' │ c0 │ c1 │ c2 │ c3 │ c4 │ 'E' │ CR LF │
/// └─────┴────┴────┴────┴────┴────┴─────┴───────┘
/// ```
pub fn encode_status_line(line: &StatusLine, dst: &mut BytesMut) {
    dst.reserve(line.wire_len() + LINE_TERMINATOR.len());
    put_body(line, dst);
    dst.put_slice(LINE_TERMINATOR);
}

/// Parse one status line, with or without its terminator.
pub fn parse_status_line(line: &[u8]) -> Result<StatusLine> {
    let body = line
        .strip_suffix(LINE_TERMINATOR)
        .or_else(|| line.strip_suffix(b"\n"))
        .unwrap_or(line);

    let (first, rest) = body
        .split_first()
        .ok_or_else(|| FrameError::MalformedStatus("empty line".to_string()))?;
    let (last, states) = rest
        .split_last()
        .ok_or_else(|| FrameError::MalformedStatus("missing end sentinel".to_string()))?;

    if *first != STATUS_START || *last != STATUS_END {
        return Err(FrameError::MalformedStatus(format!(
            "expected S..E, got {:?}",
            String::from_utf8_lossy(body)
        )));
    }
    if states.is_empty() || states.len() > MAX_CHANNELS {
        return Err(FrameError::MalformedStatus(format!(
            "{} channel states (expected 1..={MAX_CHANNELS})",
            states.len()
        )));
    }

    let mut pressed = 0u8;
    for (channel, state) in states.iter().enumerate() {
        match *state {
            PRESSED => pressed |= 1 << channel,
            RELEASED => {}
            other => {
                return Err(FrameError::MalformedStatus(format!(
                    "invalid state byte {other:#04x} for channel {channel}"
                )))
            }
        }
    }

    Ok(StatusLine::from_pressed(pressed, states.len()))
}
