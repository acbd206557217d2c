/// Errors that can occur while driving board peripherals.
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    /// A discrete line index outside the configured bank was addressed.
    #[error("line {index} out of range (bank has {count} lines)")]
    LineOutOfRange { index: usize, count: usize },

    /// The sound module did not produce a usable reply.
    #[error("sound module not responding: {0}")]
    NotResponding(String),

    /// The sound module replied with an error packet.
    #[error("sound module reported error code {0:#04x}")]
    ModuleError(u16),

    /// A reply packet failed framing or checksum checks.
    #[error("malformed sound module packet: {0}")]
    MalformedPacket(String),

    /// The requested volume is above what the module accepts.
    #[error("volume {volume} out of range (max {max})")]
    VolumeOutOfRange { volume: u8, max: u8 },

    /// The folder/file pair cannot be addressed by any play command.
    #[error("cannot address folder {folder} file {file}")]
    UnaddressableTrack { folder: u8, file: u16 },

    /// An I/O error occurred on a peripheral stream.
    #[error("peripheral I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HalError>;
