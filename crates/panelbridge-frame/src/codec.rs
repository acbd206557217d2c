use std::fmt;
use std::ops::Range;

use bytes::{BufMut, BytesMut};

use crate::error::{Field, FrameError, Result};

/// Command frame: sentinel (1) + channel (1) + folder (2) + file (3) + volume (2).
pub const FRAME_LEN: usize = 9;

/// Reserved byte that starts every command frame.
pub const START_SENTINEL: u8 = b'b';

/// Upper bound on channels a button mask can carry.
pub const MAX_CHANNELS: usize = 8;

/// Channels fitted on the reference panel.
pub const DEFAULT_CHANNEL_COUNT: usize = 5;

pub const MAX_FOLDER: u8 = 99;
pub const MAX_FILE: u16 = 999;
pub const MAX_VOLUME: u8 = 30;

const CHANNEL_DIGITS: Range<usize> = 1..2;
const FOLDER_DIGITS: Range<usize> = 2..4;
const FILE_DIGITS: Range<usize> = 4..7;
const VOLUME_DIGITS: Range<usize> = 7..9;

/// One complete, not yet interpreted, command frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawFrame([u8; FRAME_LEN]);

impl RawFrame {
    /// Wrap exactly [`FRAME_LEN`] bytes starting with the sentinel.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; FRAME_LEN] = bytes.try_into().map_err(|_| {
            FrameError::MalformedFrame(format!(
                "expected {FRAME_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        if raw[0] != START_SENTINEL {
            return Err(FrameError::MalformedFrame(format!(
                "missing start sentinel (got {:#04x})",
                raw[0]
            )));
        }
        Ok(Self(raw))
    }

    pub(crate) fn from_array(raw: [u8; FRAME_LEN]) -> Self {
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Interpret the numeric fields with the legacy unchecked conversion.
    ///
    /// Every byte is taken as `byte - '0'`, so bytes outside `'0'..='9'` yield
    /// out-of-pattern values (possibly negative) instead of an error.
    pub fn fields(&self) -> RawFields {
        RawFields {
            channel: field_value(&self.0[CHANNEL_DIGITS]),
            folder: field_value(&self.0[FOLDER_DIGITS]),
            file: field_value(&self.0[FILE_DIGITS]),
            volume: field_value(&self.0[VOLUME_DIGITS]),
        }
    }

    /// Interpret the numeric fields, rejecting any non-digit byte.
    pub fn strict_fields(&self) -> Result<RawFields> {
        if let Some((offset, byte)) = self
            .0
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, byte)| !byte.is_ascii_digit())
        {
            return Err(FrameError::InvalidDigit {
                offset,
                byte: *byte,
            });
        }
        Ok(self.fields())
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawFrame({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

fn field_value(digits: &[u8]) -> i32 {
    digits
        .iter()
        .fold(0i32, |acc, byte| acc * 10 + (i32::from(*byte) - i32::from(b'0')))
}

/// Field values as read from the wire, before range validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFields {
    pub channel: i32,
    pub folder: i32,
    pub file: i32,
    pub volume: i32,
}

impl RawFields {
    /// Store channel, folder and volume in 8 bits, wrapping modulo 256, as
    /// deployed panels do. The file number keeps its full width.
    pub fn narrowed(self) -> Self {
        Self {
            channel: wrap_u8(self.channel),
            folder: wrap_u8(self.folder),
            file: self.file,
            volume: wrap_u8(self.volume),
        }
    }
}

fn wrap_u8(value: i32) -> i32 {
    i32::from(value as u8)
}

/// A validated, actionable command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    /// Zero-based output channel.
    pub channel: u8,
    pub folder: u8,
    pub file: u16,
    pub volume: u8,
}

impl Command {
    pub fn new(channel: u8, folder: u8, file: u16, volume: u8) -> Self {
        Self {
            channel,
            folder,
            file,
            volume,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sp:{} dir:{} file:{} vol:{}",
            self.channel, self.folder, self.file, self.volume
        )
    }
}

impl From<Command> for RawFields {
    fn from(command: Command) -> Self {
        Self {
            channel: i32::from(command.channel),
            folder: i32::from(command.folder),
            file: i32::from(command.file),
            volume: i32::from(command.volume),
        }
    }
}

fn check(field: Field, value: i32, max: i32) -> Result<i32> {
    if (0..=max).contains(&value) {
        Ok(value)
    } else {
        Err(FrameError::OutOfRange { field, value, max })
    }
}

/// Range-check all four fields. Any failure invalidates the whole command.
pub fn validate(fields: RawFields, channel_count: usize) -> Result<Command> {
    let max_channel = i32::try_from(channel_count.min(MAX_CHANNELS)).unwrap_or(0) - 1;
    let channel = check(Field::Channel, fields.channel, max_channel)?;
    let folder = check(Field::Folder, fields.folder, i32::from(MAX_FOLDER))?;
    let file = check(Field::File, fields.file, i32::from(MAX_FILE))?;
    let volume = check(Field::Volume, fields.volume, i32::from(MAX_VOLUME))?;

    // Every value is within 0..=999 after the checks above.
    Ok(Command {
        channel: channel as u8,
        folder: folder as u8,
        file: file as u16,
        volume: volume as u8,
    })
}

/// Configuration for frame interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Number of output channels the device drives.
    pub channel_count: usize,
    /// Reject non-digit bytes instead of converting them arithmetically.
    pub strict_digits: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            channel_count: DEFAULT_CHANNEL_COUNT,
            strict_digits: false,
        }
    }
}

/// Interpret and validate a complete frame.
///
/// In legacy mode the 8-bit fields are narrowed before the range checks, so
/// a volume of 256 is accepted as 0. Strict digits never exceed 255.
pub fn decode_frame(frame: &RawFrame, config: &FrameConfig) -> Result<Command> {
    let fields = if config.strict_digits {
        frame.strict_fields()?
    } else {
        frame.fields().narrowed()
    };
    validate(fields, config.channel_count)
}

/// Encode a command into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Sentinel │ Channel │ Folder  │ File    │ Volume  │
/// │ 'b'      │ 1 digit │ 2 digit │ 3 digit │ 2 digit │
/// └──────────┴─────────┴─────────┴─────────┴─────────┘
/// ```
/// Folders above 99 have no two-digit representation and are rejected here
/// rather than truncated.
pub fn encode_command(command: &Command, dst: &mut BytesMut) -> Result<()> {
    validate(RawFields::from(*command), MAX_CHANNELS)?;
    dst.reserve(FRAME_LEN);
    dst.put_u8(START_SENTINEL);
    put_digits(dst, u32::from(command.channel), CHANNEL_DIGITS.len());
    put_digits(dst, u32::from(command.folder), FOLDER_DIGITS.len());
    put_digits(dst, u32::from(command.file), FILE_DIGITS.len());
    put_digits(dst, u32::from(command.volume), VOLUME_DIGITS.len());
    Ok(())
}

fn put_digits(dst: &mut BytesMut, value: u32, width: usize) {
    for place in (0..width).rev() {
        let digit = (value / 10u32.pow(place as u32)) % 10;
        dst.put_u8(b'0' + digit as u8);
    }
}
