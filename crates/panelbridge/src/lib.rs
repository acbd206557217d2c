//! Serial bridge between a host game engine and a button and sound panel.
//!
//! The host sends fixed-length command frames selecting a relay channel and a
//! track to play; the panel answers every poll cycle with a status line that
//! flags freshly pressed buttons.
//!
//! # Crate Structure
//!
//! - [`hal`]: hardware traits, the DFPlayer driver and the simulated panel
//! - [`frame`]: command frame decoding and status line encoding
//! - [`bridge`]: tick state, button sampling, dispatch and the main loop

/// Re-export hardware abstraction types.
pub mod hal {
    pub use panelbridge_hal::*;
}

/// Re-export wire format types.
pub mod frame {
    pub use panelbridge_frame::*;
}

/// Re-export bridge types.
pub mod bridge {
    pub use panelbridge_core::*;
}
