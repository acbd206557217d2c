//! Tick-driven polling and command dispatch for the panel bridge.
//!
//! A 1 ms tick callback arms single-shot poll and heartbeat flags; the
//! cooperative main loop ([`Bridge::step`]) consumes inbound command bytes,
//! samples the buttons when a poll is due, transmits the status line and
//! refreshes the status board.

pub mod board;
pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod sampler;
pub mod timer;

pub use board::{NullDisplay, SoundModuleState, StatusBoard, StatusDisplay};
pub use bridge::{Bridge, BridgeStats, FrameReport, Peripherals, Platform, StepReport};
pub use config::BridgeConfig;
pub use dispatcher::{Dispatcher, PlayOutcome};
pub use error::{BridgeError, Result};
pub use sampler::{ButtonFrame, ButtonSampler};
pub use timer::{ThreadTicker, TickHandler, TickSchedule, TickState};
