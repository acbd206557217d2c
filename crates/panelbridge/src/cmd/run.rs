use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use panelbridge_core::{
    Bridge, BridgeConfig, Peripherals, Platform, StatusBoard, StatusDisplay, ThreadTicker,
    TickHandler,
};
use panelbridge_frame::parse_status_line;
use panelbridge_hal::sim::{SimBusy, SimButtons, SimDelay, SimPanel, SimRelays, SimReset, SimSerial};
use panelbridge_hal::{Delay, DfPlayer, SoundModule, StdDelay, HOST_BAUD, SOUND_BAUD};

use crate::cmd::RunArgs;
use crate::exit::{
    bridge_error, io_error, CliError, CliResult, DEVICE_ERROR, INTERNAL, PERMISSION_DENIED, SUCCESS,
    USAGE,
};
use crate::output::{print_frame_event, print_status, print_summary, FrameOutput, OutputFormat};

/// Peripherals of a CLI session: simulated lines and serial link, with either
/// the simulated or a real sound module.
struct CliPlatform;

impl Platform for CliPlatform {
    type Buttons = SimButtons;
    type Relays = SimRelays;
    type Busy = SimBusy;
    type Sound = Box<dyn SoundModule>;
    type Delay = SessionDelay;
    type Serial = SimSerial;
    type Display = TraceDisplay;
    type Reset = SimReset;
}

/// Simulated sessions account for delays; real-time sessions sleep.
enum SessionDelay {
    Simulated(SimDelay),
    Wall(StdDelay),
}

impl Delay for SessionDelay {
    fn delay_ms(&mut self, ms: u32) {
        match self {
            SessionDelay::Simulated(delay) => delay.delay_ms(ms),
            SessionDelay::Wall(delay) => delay.delay_ms(ms),
        }
    }
}

/// Logs each status board field as it changes.
#[derive(Default)]
struct TraceDisplay {
    last: StatusBoard,
}

impl StatusDisplay for TraceDisplay {
    fn render(&mut self, board: &StatusBoard) {
        if *board == self.last {
            return;
        }
        for ((label, value), (_, previous)) in board.rows().into_iter().zip(self.last.rows()) {
            if value != previous {
                tracing::debug!(field = label, value = %value, "status board");
            }
        }
        self.last = board.clone();
    }
}

/// A button held down for part of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Press {
    channel: usize,
    at_ms: u64,
}

#[derive(Debug, Default)]
struct PressSchedule {
    presses: Vec<Press>,
    hold_ms: u64,
}

impl PressSchedule {
    fn new(presses: Vec<Press>, hold_ms: u64) -> Self {
        Self { presses, hold_ms }
    }

    fn is_held(&self, channel: usize, now_ms: u64) -> bool {
        self.presses.iter().any(|press| {
            press.channel == channel
                && now_ms >= press.at_ms
                && now_ms < press.at_ms.saturating_add(self.hold_ms)
        })
    }

    /// Set every button line to its scheduled state at `now_ms`.
    fn apply(&self, panel: &SimPanel, channel_count: usize, now_ms: u64) {
        for channel in 0..channel_count {
            if self.is_held(channel, now_ms) {
                panel.press(channel);
            } else {
                panel.release(channel);
            }
        }
    }
}

fn parse_press(input: &str, channel_count: usize) -> CliResult<Press> {
    let (channel, at) = input
        .split_once('@')
        .ok_or_else(|| CliError::new(USAGE, format!("press must be CH@MS: {input}")))?;
    let channel: usize = channel
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid press channel: {input}")))?;
    let at_ms: u64 = at
        .trim()
        .trim_end_matches("ms")
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid press time: {input}")))?;
    if channel >= channel_count {
        return Err(CliError::new(
            USAGE,
            format!("press channel {channel} out of range ({channel_count} channels)"),
        ));
    }
    Ok(Press { channel, at_ms })
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };
    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Inbound bytes delivered per tick at the host link rate (10 bits per byte).
fn host_bytes_per_tick(tick_period_us: u64) -> usize {
    let bytes = u64::from(HOST_BAUD) / 10 * tick_period_us / 1_000_000;
    usize::try_from(bytes).unwrap_or(usize::MAX).max(1)
}

fn load_config(path: Option<&Path>) -> CliResult<BridgeConfig> {
    match path {
        Some(path) => BridgeConfig::load(path)
            .map_err(|err| bridge_error(&format!("config {}", path.display()), err)),
        None => Ok(BridgeConfig::default()),
    }
}

/// Longest wait for one byte of a sound module reply.
const SOUND_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

fn open_sound(path: Option<&Path>, panel: &SimPanel) -> CliResult<Box<dyn SoundModule>> {
    let Some(path) = path else {
        return Ok(Box::new(panel.sound()));
    };
    let port = serialport::new(path.to_string_lossy(), SOUND_BAUD)
        .timeout(SOUND_REPLY_TIMEOUT)
        .open()
        .map_err(|err| sound_device_error(path, err))?;
    // The busy line is not wired on a host; playback is never seen as busy.
    panel.set_busy_follows_playback(false);
    tracing::info!(
        path = %path.display(),
        baud = SOUND_BAUD,
        timeout = ?SOUND_REPLY_TIMEOUT,
        "driving sound module over serial device"
    );
    Ok(Box::new(DfPlayer::new(port)))
}

fn sound_device_error(path: &Path, err: serialport::Error) -> CliError {
    let code = match err.kind() {
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => PERMISSION_DENIED,
        _ => DEVICE_ERROR,
    };
    CliError::new(code, format!("open sound device {}: {err}", path.display()))
}

fn open_input(path: Option<&Path>) -> CliResult<Box<dyn Read + Send>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("open {}", path.display()), err))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdin())),
    }
}

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(args.config.as_deref())?;
    let channel_count = config.device_count;
    let presses = args
        .presses
        .iter()
        .map(|press| parse_press(press, channel_count))
        .collect::<CliResult<Vec<_>>>()?;

    let panel = SimPanel::new(channel_count);
    let serial = SimSerial::new();
    let delay = match args.ticks {
        Some(_) => SessionDelay::Simulated(panel.delay()),
        None => SessionDelay::Wall(StdDelay),
    };
    let peripherals = Peripherals::<CliPlatform> {
        buttons: panel.buttons(),
        relays: panel.relays(),
        busy: panel.busy(),
        sound: open_sound(args.sound_device.as_deref(), &panel)?,
        delay,
        serial: serial.clone(),
        display: TraceDisplay::default(),
        reset: panel.reset(),
    };
    let mut bridge = Bridge::new(config, peripherals)
        .map_err(|err| bridge_error("bridge setup failed", err))?;
    bridge.start();

    let mut session = Session {
        bridge,
        panel,
        serial,
        presses: PressSchedule::new(presses, args.hold),
        channel_count,
        format,
    };

    let elapsed = match args.ticks {
        Some(ticks) => {
            let mut input = Vec::new();
            open_input(args.input.as_deref())?
                .read_to_end(&mut input)
                .map_err(|err| io_error("read input failed", err))?;
            session.run_simulated(ticks, &input)?
        }
        None => {
            let limit = args.duration.as_deref().map(parse_duration).transpose()?;
            session.run_realtime(args.input, limit)?
        }
    };

    if !args.no_summary {
        print_summary(
            elapsed,
            &session.bridge.stats(),
            session.bridge.board(),
            format,
        );
    }
    Ok(SUCCESS)
}

struct Session {
    bridge: Bridge<CliPlatform>,
    panel: SimPanel,
    serial: SimSerial,
    presses: PressSchedule,
    channel_count: usize,
    format: OutputFormat,
}

impl Session {
    /// Drive `ticks` ticks back to back, delivering `input` at the host link
    /// rate. Returns the number of ticks run.
    fn run_simulated(&mut self, ticks: u64, input: &[u8]) -> CliResult<u64> {
        let ticker = self.bridge.tick_state();
        let chunk = host_bytes_per_tick(self.bridge.config().tick_period_us);
        let mut pending = input.chunks(chunk);
        let period_us = self.bridge.config().tick_period_us;

        for tick in 1..=ticks {
            if let Some(bytes) = pending.next() {
                self.serial.inject(bytes);
            }
            let now_ms = tick.saturating_mul(period_us) / 1000;
            self.presses.apply(&self.panel, self.channel_count, now_ms);
            ticker.on_tick();
            self.step(tick)?;
        }
        Ok(ticks)
    }

    /// Run against wall time until Ctrl-C or `limit`. Returns elapsed
    /// milliseconds.
    fn run_realtime(&mut self, input: Option<PathBuf>, limit: Option<Duration>) -> CliResult<u64> {
        let running = Arc::new(AtomicBool::new(true));
        install_ctrlc_handler(Arc::clone(&running))?;
        spawn_reader(open_input(input.as_deref())?, self.serial.clone())?;

        let period = self.bridge.config().tick_period();
        let ticker = ThreadTicker::spawn(self.bridge.tick_state(), period)
            .map_err(|err| io_error("tick thread failed", err))?;

        let start = Instant::now();
        let mut now_ms = 0;
        while running.load(Ordering::SeqCst) {
            let elapsed = start.elapsed();
            if limit.is_some_and(|limit| elapsed >= limit) {
                break;
            }
            now_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
            self.presses.apply(&self.panel, self.channel_count, now_ms);
            self.step(now_ms)?;
            std::thread::sleep(period);
        }

        ticker.stop();
        Ok(now_ms)
    }

    fn step(&mut self, tick: u64) -> CliResult<()> {
        let report = self
            .bridge
            .step()
            .map_err(|err| bridge_error("bridge step failed", err))?;

        if let Some(frame) = &report.frame {
            let out = FrameOutput::new(&frame.frame, &frame.verdict, frame.triggered)
                .with_tick(tick)
                .with_playback(frame.playback);
            print_frame_event(&out, self.format);
        }
        for command in self.panel.take_sound_log() {
            tracing::trace!(tick, ?command, "sound module command");
        }
        if report.restarted {
            tracing::warn!(tick, "bridge restarted");
        }

        // Report what actually went out on the wire.
        for line in self.serial.take_lines() {
            match parse_status_line(line.as_bytes()) {
                Ok(status) => print_status(tick, &status, self.format),
                Err(err) => tracing::error!(error = %err, "unexpected serial output"),
            }
        }
        Ok(())
    }
}

fn spawn_reader(mut input: Box<dyn Read + Send>, serial: SimSerial) -> CliResult<()> {
    std::thread::Builder::new()
        .name("panelbridge-input".to_string())
        .spawn(move || {
            let mut buf = [0u8; 64];
            loop {
                match input.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => serial.inject(&buf[..n]),
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => {
                        tracing::error!(error = %err, "input read failed");
                        break;
                    }
                }
            }
            tracing::debug!("input closed");
        })
        .map(drop)
        .map_err(|err| io_error("input thread failed", err))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_press_accepts_channel_and_time() {
        assert_eq!(
            parse_press("2@150", 5).unwrap(),
            Press {
                channel: 2,
                at_ms: 150
            }
        );
        assert_eq!(parse_press("0@20ms", 5).unwrap().at_ms, 20);
    }

    #[test]
    fn parse_press_rejects_bad_input() {
        assert!(parse_press("2", 5).is_err());
        assert!(parse_press("x@10", 5).is_err());
        assert!(parse_press("1@soon", 5).is_err());
        assert_eq!(parse_press("5@10", 5).unwrap_err().code, USAGE);
    }

    #[test]
    fn press_is_held_for_hold_window() {
        let schedule = PressSchedule::new(
            vec![Press {
                channel: 1,
                at_ms: 100,
            }],
            50,
        );
        assert!(!schedule.is_held(1, 99));
        assert!(schedule.is_held(1, 100));
        assert!(schedule.is_held(1, 149));
        assert!(!schedule.is_held(1, 150));
        assert!(!schedule.is_held(0, 120));
    }

    #[test]
    fn schedule_drives_panel_lines() {
        let panel = SimPanel::new(5);
        let schedule = PressSchedule::new(
            vec![Press {
                channel: 3,
                at_ms: 0,
            }],
            10,
        );
        let mut buttons = panel.buttons();
        schedule.apply(&panel, 5, 5);
        assert!(panel_button_low(&mut buttons, 3));
        schedule.apply(&panel, 5, 10);
        assert!(!panel_button_low(&mut buttons, 3));
    }

    fn panel_button_low(buttons: &mut SimButtons, channel: usize) -> bool {
        use panelbridge_hal::InputLines;
        buttons.read_line(channel).is_low()
    }

    #[test]
    fn host_link_delivers_eleven_bytes_per_millisecond() {
        assert_eq!(host_bytes_per_tick(1000), 11);
        assert_eq!(host_bytes_per_tick(10), 1);
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }

    #[test]
    fn missing_sound_device_fails_without_touching_busy_line() {
        use panelbridge_hal::{BusySense, SoundModule as _};

        let panel = SimPanel::new(5);
        let err = match open_sound(Some(Path::new("/nonexistent/panelbridge-dfplayer")), &panel) {
            Ok(_) => panic!("opened a device that does not exist"),
            Err(err) => err,
        };
        assert_eq!(err.code, DEVICE_ERROR);
        assert!(err.message.contains("/nonexistent/panelbridge-dfplayer"));

        // Still simulated: playback drives the busy line.
        panel.sound().play_folder(1, 1).unwrap();
        assert!(panel.busy().is_busy());
    }

    #[test]
    fn simulated_sound_module_without_device() {
        let panel = SimPanel::new(5);
        let mut sound = open_sound(None, &panel).unwrap();
        sound.set_volume(12).unwrap();
        assert_eq!(
            panel.take_sound_log(),
            vec![panelbridge_hal::sim::SoundCommand::Volume(12)]
        );
    }

    #[test]
    fn trace_display_tracks_last_board() {
        let mut display = TraceDisplay::default();
        let board = StatusBoard {
            heartbeat: 7,
            ..StatusBoard::default()
        };
        display.render(&board);
        assert_eq!(display.last, board);
    }
}
