use std::time::Duration;

use crate::error::Result;

/// Logic level of a discrete line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// `true` for [`Level::High`].
    pub fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    /// `true` for [`Level::Low`].
    pub fn is_low(self) -> bool {
        matches!(self, Level::Low)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// A bank of discrete digital inputs (the panel buttons).
///
/// Buttons are active-low: a pressed button reads [`Level::Low`].
pub trait InputLines {
    /// Number of lines in the bank.
    fn line_count(&self) -> usize;

    /// Sample one line. Indices at or above `line_count` read high (released).
    fn read_line(&mut self, index: usize) -> Level;
}

/// A bank of discrete digital outputs (the relay channel selects).
pub trait OutputLines {
    /// Number of lines in the bank.
    fn line_count(&self) -> usize;

    /// Drive one line.
    fn write_line(&mut self, index: usize, level: Level) -> Result<()>;
}

/// The sound module busy-sense line.
pub trait BusySense {
    /// Current level of the line.
    fn level(&mut self) -> Level;

    /// The line is active-low: low means a track is playing.
    fn is_busy(&mut self) -> bool {
        self.level().is_low()
    }
}

/// Command channel of the sound module.
///
/// Every command is a separate transmission; callers are responsible for the
/// settle delay the module needs between consecutive commands.
pub trait SoundModule {
    /// Initialize the module and confirm that it responds.
    fn begin(&mut self) -> Result<()>;

    /// Stop the current playback.
    fn stop(&mut self) -> Result<()>;

    /// Set the output volume (0..=30).
    fn set_volume(&mut self, volume: u8) -> Result<()>;

    /// Play `file` from numbered `folder`.
    fn play_folder(&mut self, folder: u8, file: u16) -> Result<()>;
}

impl<S: SoundModule + ?Sized> SoundModule for Box<S> {
    fn begin(&mut self) -> Result<()> {
        (**self).begin()
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        (**self).set_volume(volume)
    }

    fn play_folder(&mut self, folder: u8, file: u16) -> Result<()> {
        (**self).play_folder(folder, file)
    }
}

/// Blocking millisecond delay.
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

/// [`Delay`] backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// The host serial link.
pub trait SerialPort {
    /// Take one received byte if any is available. Never blocks.
    fn read_byte(&mut self) -> Option<u8>;

    /// Transmit bytes, blocking until they are queued.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Platform reset control.
pub trait SystemReset {
    /// Request a full device restart. There is no graceful shutdown sequence.
    fn restart(&mut self);
}
