//! DFPlayer Mini serial protocol.
//!
//! Every command and reply is a fixed 10-byte packet:
//! ```text
//! ┌───────┬─────────┬────────┬─────────┬──────────┬────────────┬─────────────┬───────┐
//! │ Start │ Version │ Length │ Command │ Feedback │ Param (BE) │ Checksum(BE)│ End   │
//! │ 0x7E  │ 0xFF    │ 0x06   │ (1B)    │ 0x00     │ (2B)       │ (2B)        │ 0xEF  │
//! └───────┴─────────┴────────┴─────────┴──────────┴────────────┴─────────────┴───────┘
//! ```
//! The checksum is the two's complement of the sum of version through param.

use std::io::{ErrorKind, Read, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{HalError, Result};
use crate::traits::SoundModule;

/// Wire size of one packet.
pub const PACKET_SIZE: usize = 10;

const START: u8 = 0x7E;
const VERSION: u8 = 0xFF;
const LENGTH: u8 = 0x06;
const END: u8 = 0xEF;
const NO_FEEDBACK: u8 = 0x00;

pub const CMD_SET_VOLUME: u8 = 0x06;
pub const CMD_RESET: u8 = 0x0C;
pub const CMD_PLAY_FOLDER: u8 = 0x0F;
pub const CMD_PLAY_LARGE_FOLDER: u8 = 0x14;
pub const CMD_STOP: u8 = 0x16;
pub const REPLY_INITIALIZED: u8 = 0x3F;
pub const REPLY_ERROR: u8 = 0x40;

/// Highest volume the module accepts.
pub const MAX_VOLUME: u8 = 30;

const MAX_SMALL_FOLDER_FILE: u16 = 255;
const MAX_LARGE_FOLDER: u8 = 15;
const MAX_LARGE_FOLDER_FILE: u16 = 3000;

// Packets skipped while waiting for the initialization reply.
const MAX_STARTUP_PACKETS: usize = 8;
// Bytes skipped while hunting for a start byte.
const MAX_NOISE_BYTES: usize = 64;

/// A decoded command or reply packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub command: u8,
    pub param: u16,
}

fn checksum(command: u8, feedback: u8, param: u16) -> u16 {
    let [hi, lo] = param.to_be_bytes();
    let sum = [VERSION, LENGTH, command, feedback, hi, lo]
        .iter()
        .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)));
    0u16.wrapping_sub(sum)
}

/// Encode a command packet into `dst`.
pub fn encode_packet(command: u8, param: u16, dst: &mut BytesMut) {
    dst.reserve(PACKET_SIZE);
    dst.put_u8(START);
    dst.put_u8(VERSION);
    dst.put_u8(LENGTH);
    dst.put_u8(command);
    dst.put_u8(NO_FEEDBACK);
    dst.put_u16(param);
    dst.put_u16(checksum(command, NO_FEEDBACK, param));
    dst.put_u8(END);
}

/// Decode one packet, verifying framing and checksum.
pub fn decode_packet(raw: &[u8; PACKET_SIZE]) -> Result<Packet> {
    if raw[0] != START || raw[PACKET_SIZE - 1] != END {
        return Err(HalError::MalformedPacket(format!(
            "bad framing bytes {:#04x}..{:#04x}",
            raw[0],
            raw[PACKET_SIZE - 1]
        )));
    }
    if raw[1] != VERSION || raw[2] != LENGTH {
        return Err(HalError::MalformedPacket(format!(
            "unsupported version {:#04x} length {:#04x}",
            raw[1], raw[2]
        )));
    }
    let command = raw[3];
    let param = u16::from_be_bytes([raw[5], raw[6]]);
    let received = u16::from_be_bytes([raw[7], raw[8]]);
    let expected = checksum(command, raw[4], param);
    if received != expected {
        return Err(HalError::MalformedPacket(format!(
            "checksum {received:#06x}, expected {expected:#06x}"
        )));
    }
    Ok(Packet { command, param })
}

/// Sound module driver over any byte stream opened at [`crate::SOUND_BAUD`].
///
/// The stream must enforce a read timeout; a timed-out read is reported as
/// [`HalError::NotResponding`].
pub struct DfPlayer<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Read + Write> DfPlayer<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(PACKET_SIZE),
        }
    }

    /// Send one command packet.
    pub fn send(&mut self, command: u8, param: u16) -> Result<()> {
        self.buf.clear();
        encode_packet(command, param, &mut self.buf);
        tracing::trace!(command, param, "dfplayer command");
        self.inner.write_all(&self.buf)?;
        self.inner.flush()?;
        Ok(())
    }

    /// Read the next packet, skipping a bounded run of noise before the
    /// start byte.
    pub fn read_packet(&mut self) -> Result<Packet> {
        let mut raw = [0u8; PACKET_SIZE];
        let mut skipped = 0;
        loop {
            self.read_exact(&mut raw[..1])?;
            if raw[0] == START {
                break;
            }
            skipped += 1;
            if skipped > MAX_NOISE_BYTES {
                return Err(HalError::NotResponding(format!(
                    "no packet start after {MAX_NOISE_BYTES} bytes"
                )));
            }
        }
        self.read_exact(&mut raw[1..])?;
        decode_packet(&raw)
    }

    fn read_exact(&mut self, dst: &mut [u8]) -> Result<()> {
        match self.inner.read_exact(dst) {
            Ok(()) => Ok(()),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::UnexpectedEof | ErrorKind::TimedOut | ErrorKind::WouldBlock
                ) =>
            {
                Err(HalError::NotResponding(err.to_string()))
            }
            Err(err) => Err(HalError::Io(err)),
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write> SoundModule for DfPlayer<T> {
    fn begin(&mut self) -> Result<()> {
        self.send(CMD_RESET, 0)?;
        for _ in 0..MAX_STARTUP_PACKETS {
            let packet = self.read_packet()?;
            match packet.command {
                REPLY_INITIALIZED => {
                    tracing::debug!(storage = packet.param, "dfplayer online");
                    return Ok(());
                }
                REPLY_ERROR => return Err(HalError::ModuleError(packet.param)),
                other => tracing::trace!(command = other, "skipping startup packet"),
            }
        }
        Err(HalError::NotResponding(
            "no initialization reply".to_string(),
        ))
    }

    fn stop(&mut self) -> Result<()> {
        self.send(CMD_STOP, 0)
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        if volume > MAX_VOLUME {
            return Err(HalError::VolumeOutOfRange {
                volume,
                max: MAX_VOLUME,
            });
        }
        self.send(CMD_SET_VOLUME, u16::from(volume))
    }

    fn play_folder(&mut self, folder: u8, file: u16) -> Result<()> {
        if file <= MAX_SMALL_FOLDER_FILE {
            return self.send(CMD_PLAY_FOLDER, (u16::from(folder) << 8) | file);
        }
        if folder <= MAX_LARGE_FOLDER && file <= MAX_LARGE_FOLDER_FILE {
            return self.send(CMD_PLAY_LARGE_FOLDER, (u16::from(folder) << 12) | file);
        }
        Err(HalError::UnaddressableTrack { folder, file })
    }
}
