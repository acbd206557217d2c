use crate::codec::{RawFrame, FRAME_LEN, START_SENTINEL};

/// Byte-at-a-time command frame accumulator.
///
/// Idle until the start sentinel arrives; from then on every byte, sentinel
/// or not, is taken into the frame until [`FRAME_LEN`] bytes are collected.
/// There is no mid-frame resynchronization.
#[derive(Debug, Clone)]
pub struct CommandDecoder {
    buf: [u8; FRAME_LEN],
    len: usize,
}

impl CommandDecoder {
    pub const fn new() -> Self {
        Self {
            buf: [0; FRAME_LEN],
            len: 0,
        }
    }

    /// Feed one byte. Returns the frame it completes, if any.
    pub fn push(&mut self, byte: u8) -> Option<RawFrame> {
        if self.len == 0 {
            if byte != START_SENTINEL {
                tracing::trace!(byte, "discarding byte outside frame");
                return None;
            }
            tracing::trace!("frame start");
        }

        self.buf[self.len] = byte;
        self.len += 1;

        if self.len < FRAME_LEN {
            return None;
        }

        self.len = 0;
        Some(RawFrame::from_array(self.buf))
    }

    /// Feed a slice, returning every frame it completes in order.
    pub fn push_slice(&mut self, bytes: &[u8]) -> Vec<RawFrame> {
        bytes.iter().filter_map(|byte| self.push(*byte)).collect()
    }

    /// `true` when no frame is in progress.
    pub fn is_idle(&self) -> bool {
        self.len == 0
    }

    /// Bytes collected for the frame in progress, sentinel included.
    pub fn pending(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Drop any partial frame and return to idle.
    pub fn reset(&mut self) {
        self.len = 0;
    }
}

impl Default for CommandDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_bytes_until_sentinel() {
        let mut decoder = CommandDecoder::new();
        assert!(decoder.push_slice(b"xyz\r\n123").is_empty());
        assert!(decoder.is_idle());
    }

    #[test]
    fn completes_frame_on_ninth_byte() {
        let mut decoder = CommandDecoder::new();
        for byte in b"b1234567" {
            assert!(decoder.push(*byte).is_none());
        }
        assert_eq!(decoder.pending(), b"b1234567");
        let frame = decoder.push(b'8').unwrap();
        assert_eq!(frame.as_bytes(), b"b12345678");
        assert!(decoder.is_idle());
    }

    #[test]
    fn back_to_back_frames() {
        let mut decoder = CommandDecoder::new();
        let frames = decoder.push_slice(b"b01234506b40999930");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_bytes(), b"b01234506");
        assert_eq!(frames[1].as_bytes(), b"b40999930");
    }

    #[test]
    fn sentinel_inside_frame_is_data() {
        let mut decoder = CommandDecoder::new();
        let frames = decoder.push_slice(b"bb0123456b");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), b"bb0123456");
        assert_eq!(decoder.pending(), b"b");
    }

    #[test]
    fn partial_frame_survives_between_pushes() {
        let mut decoder = CommandDecoder::new();
        assert!(decoder.push_slice(b"b012").is_empty());
        let frames = decoder.push_slice(b"34506");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), b"b01234506");
    }

    #[test]
    fn reset_discards_partial_frame() {
        let mut decoder = CommandDecoder::new();
        decoder.push_slice(b"b0123");
        decoder.reset();
        assert!(decoder.is_idle());
        assert!(decoder.push_slice(b"4506").is_empty());
    }
}
