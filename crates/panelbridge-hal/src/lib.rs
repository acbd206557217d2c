//! Hardware abstraction for the panel bridge.
//!
//! Provides the small set of traits the bridge core needs from a board:
//! - Discrete input and output lines (buttons, relay channel selects)
//! - The sound module command channel and its busy-sense line
//! - The host serial link, a blocking delay and a system reset
//!
//! This is the lowest layer of panelbridge. [`dfplayer`] implements the sound
//! module over any byte stream and [`sim`] provides an in-memory board.

pub mod dfplayer;
pub mod error;
pub mod sim;
pub mod traits;

pub use dfplayer::DfPlayer;
pub use error::{HalError, Result};
pub use traits::{
    BusySense, Delay, InputLines, Level, OutputLines, SerialPort, SoundModule, StdDelay,
    SystemReset,
};

/// Symbol rate of the host (game engine) serial link.
pub const HOST_BAUD: u32 = 115_200;

/// Fixed symbol rate of the sound module command channel.
pub const SOUND_BAUD: u32 = 9_600;
