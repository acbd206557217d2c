use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the bridge against a simulated panel.
    Run(RunArgs),
    /// Decode command frames and show what the bridge would do with them.
    Decode(DecodeArgs),
    /// Build a command frame from field values.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Read host command bytes from a file instead of stdin.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
    /// Press a button: CHANNEL@MILLISECOND (repeatable).
    #[arg(long = "press", value_name = "CH@MS")]
    pub presses: Vec<String>,
    /// How long each scheduled press is held, in milliseconds.
    #[arg(long, value_name = "MS", default_value = "50")]
    pub hold: u64,
    /// Simulate exactly N ticks without sleeping, then exit.
    #[arg(long, value_name = "N", conflicts_with = "duration")]
    pub ticks: Option<u64>,
    /// Stop a real-time session after this long (e.g. 5s, 500ms).
    #[arg(long)]
    pub duration: Option<String>,
    /// Drive a DFPlayer on this serial device node instead of the simulated module.
    #[arg(long, value_name = "PATH", env = "PANELBRIDGE_SOUND_DEVICE")]
    pub sound_device: Option<PathBuf>,
    /// Bridge configuration (JSON).
    #[arg(long, value_name = "FILE", env = "PANELBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,
    /// Skip the end-of-session summary.
    #[arg(long)]
    pub no_summary: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frames to decode, e.g. b20100515.
    #[arg(required_unless_present = "stdin")]
    pub frames: Vec<String>,
    /// Scan stdin for back-to-back frames instead.
    #[arg(long, conflicts_with = "frames")]
    pub stdin: bool,
    /// Number of channels the frames are validated against.
    #[arg(long, default_value_t = panelbridge_frame::DEFAULT_CHANNEL_COUNT)]
    pub channels: usize,
    /// Reject non-digit bytes instead of converting them.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Relay channel.
    #[arg(long, short = 'c')]
    pub channel: u8,
    /// Sound folder.
    #[arg(long, short = 'd')]
    pub folder: u8,
    /// Track number within the folder.
    #[arg(long, short = 'f')]
    pub file: u16,
    /// Playback volume.
    #[arg(long, short = 'v')]
    pub volume: u8,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
