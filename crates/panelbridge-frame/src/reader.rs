use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use crate::codec::RawFrame;
use crate::decoder::CommandDecoder;
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 256;

/// Reads complete command frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct CommandReader<T> {
    inner: T,
    decoder: CommandDecoder,
    ready: VecDeque<RawFrame>,
}

impl<T: Read> CommandReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            decoder: CommandDecoder::new(),
            ready: VecDeque::new(),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::StreamClosed)` when EOF is reached, whether or
    /// not a partial frame was pending.
    pub fn read_frame(&mut self) -> Result<RawFrame> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if !self.decoder.is_idle() {
                    tracing::debug!(
                        pending = self.decoder.pending().len(),
                        "stream closed mid-frame"
                    );
                }
                return Err(FrameError::StreamClosed);
            }

            self.ready.extend(self.decoder.push_slice(&chunk[..read]));
        }
    }

    /// Bytes of the frame in progress.
    pub fn pending(&self) -> &[u8] {
        self.decoder.pending()
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

impl<T: Read> Iterator for CommandReader<T> {
    type Item = Result<RawFrame>;

    /// Yields frames until the stream closes; I/O errors are yielded once.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(FrameError::StreamClosed) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
