use std::sync::Arc;

use bytes::BytesMut;
use panelbridge_frame::{
    decode_frame, encode_status_line, match_override, Command, CommandDecoder, FrameConfig,
    FrameError, Override, RawFrame, StatusLine, DIAGNOSTIC_PLAYBACK,
};
use panelbridge_hal::{
    BusySense, Delay, InputLines, OutputLines, SerialPort, SoundModule, SystemReset,
};
use serde::Serialize;

use crate::board::{SoundModuleState, StatusBoard, StatusDisplay, BUTTON_PRESSED, UNABLE_TO_DECODE};
use crate::config::BridgeConfig;
use crate::dispatcher::{Dispatcher, PlayOutcome};
use crate::error::{BridgeError, Result};
use crate::sampler::{ButtonFrame, ButtonSampler};
use crate::timer::TickState;

/// The set of peripheral types a board provides.
pub trait Platform {
    type Buttons: InputLines;
    type Relays: OutputLines;
    type Busy: BusySense;
    type Sound: SoundModule;
    type Delay: Delay;
    type Serial: SerialPort;
    type Display: StatusDisplay;
    type Reset: SystemReset;
}

/// Concrete peripherals handed to [`Bridge::new`].
pub struct Peripherals<P: Platform> {
    pub buttons: P::Buttons,
    pub relays: P::Relays,
    pub busy: P::Busy,
    pub sound: P::Sound,
    pub delay: P::Delay,
    pub serial: P::Serial,
    pub display: P::Display,
    pub reset: P::Reset,
}

/// Running totals since construction. Restarts do not clear them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    pub frames: u64,
    pub dispatched: u64,
    pub rejected: u64,
    pub overrides: u64,
    pub polls: u64,
    pub press_edges: u64,
    pub status_lines: u64,
    pub restarts: u64,
    pub peripheral_errors: u64,
}

/// What happened to one received frame.
#[derive(Debug)]
pub struct FrameReport {
    pub frame: RawFrame,
    /// Validation result; `Err` means "unable to decode".
    pub verdict: std::result::Result<Command, FrameError>,
    /// Playback started by this frame, through dispatch or an override.
    pub playback: Option<PlayOutcome>,
    /// Override matched on the raw bytes, independent of the verdict.
    pub triggered: Option<Override>,
}

/// What one [`Bridge::step`] did.
#[derive(Debug, Default)]
pub struct StepReport {
    /// The frame completed on this pass, if any.
    pub frame: Option<FrameReport>,
    pub sampled: Option<ButtonFrame>,
    pub status_sent: Option<StatusLine>,
    pub restarted: bool,
}

/// The cooperative main loop.
///
/// The tick context only touches the shared [`TickState`]; everything else is
/// owned here and mutated from [`Bridge::step`] alone.
pub struct Bridge<P: Platform> {
    config: BridgeConfig,
    frame_config: FrameConfig,
    ticks: Arc<TickState>,
    decoder: CommandDecoder,
    sampler: ButtonSampler<P::Buttons>,
    dispatcher: Dispatcher<P::Relays, P::Busy, P::Sound, P::Delay>,
    serial: P::Serial,
    display: P::Display,
    reset: P::Reset,
    board: StatusBoard,
    status_line: StatusLine,
    status: BytesMut,
    send_pending: bool,
    stats: BridgeStats,
}

impl<P: Platform> Bridge<P> {
    pub fn new(config: BridgeConfig, peripherals: Peripherals<P>) -> Result<Self> {
        config.validate()?;
        let expected = config.device_count;
        check_line_count("buttons", expected, peripherals.buttons.line_count())?;
        check_line_count("relays", expected, peripherals.relays.line_count())?;

        let status_line = StatusLine::released(expected);
        let mut status = BytesMut::new();
        encode_status_line(&status_line, &mut status);

        Ok(Self {
            frame_config: config.frame_config(),
            ticks: Arc::new(TickState::new(config.tick_schedule())),
            decoder: CommandDecoder::new(),
            sampler: ButtonSampler::new(peripherals.buttons, expected),
            dispatcher: Dispatcher::new(
                peripherals.relays,
                peripherals.busy,
                peripherals.sound,
                peripherals.delay,
                config.settle_delay_ms,
            ),
            serial: peripherals.serial,
            display: peripherals.display,
            reset: peripherals.reset,
            board: StatusBoard::default(),
            status_line,
            status,
            send_pending: false,
            stats: BridgeStats::default(),
            config,
        })
    }

    /// Power-on sequence: all channels off, sound module initialized.
    pub fn start(&mut self) {
        if let Err(err) = self.dispatcher.release_all() {
            self.peripheral_error("channel reset failed", &err);
        }
        self.board.sound_module = if self.dispatcher.begin() {
            SoundModuleState::Ok
        } else {
            SoundModuleState::NotResponding
        };
        self.display.render(&self.board);
    }

    /// The state to hand to the platform timer.
    pub fn tick_state(&self) -> Arc<TickState> {
        Arc::clone(&self.ticks)
    }

    /// One pass of the main loop.
    ///
    /// Consumes inbound bytes until one frame completes or the input runs
    /// dry, then services the poll and heartbeat flags, then refreshes the
    /// display. Further frames wait for later passes so a command burst
    /// cannot starve the status line. Only a failure to transmit the status
    /// line is returned as an error.
    pub fn step(&mut self) -> Result<StepReport> {
        let mut report = StepReport::default();

        if let Some(frame) = self.next_frame() {
            let frame_report = self.handle_frame(frame);
            let restart = frame_report.triggered == Some(Override::Restart);
            report.frame = Some(frame_report);
            if restart {
                self.restart();
                report.restarted = true;
                self.display.render(&self.board);
                return Ok(report);
            }
        }

        if self.ticks.take_poll_due() {
            report.sampled = Some(self.poll_buttons());
            self.send_pending = true;
        }

        if self.send_pending {
            self.send_pending = false;
            report.status_sent = Some(self.transmit_status()?);
        }

        if self.ticks.take_heartbeat_due() {
            self.board.heartbeat = self.ticks.heartbeats();
        }

        self.display.render(&self.board);
        Ok(report)
    }

    fn next_frame(&mut self) -> Option<RawFrame> {
        while let Some(byte) = self.serial.read_byte() {
            if let Some(frame) = self.decoder.push(byte) {
                return Some(frame);
            }
        }
        None
    }

    fn handle_frame(&mut self, frame: RawFrame) -> FrameReport {
        self.stats.frames += 1;
        self.board.received = frame.to_string();

        let fields = frame.fields();
        self.board.decode_result = format!(
            " => sp:{} dir:{} file:{} vol:{}",
            fields.channel, fields.folder, fields.file, fields.volume
        );

        let verdict = decode_frame(&frame, &self.frame_config);
        let mut playback = None;
        match &verdict {
            Ok(command) => {
                tracing::debug!(%frame, %command, "command decoded");
                self.stats.dispatched += 1;
                playback = self.dispatch(command);
                self.board.debug.clear();
            }
            Err(err) => {
                tracing::warn!(%frame, error = %err, "unable to decode");
                self.stats.rejected += 1;
                self.board.debug = UNABLE_TO_DECODE.to_string();
            }
        }

        // Overrides compare raw bytes and run whatever the verdict was.
        let triggered = match_override(&frame);
        if let Some(matched) = triggered {
            tracing::warn!(%frame, action = matched.name(), "override frame");
            self.stats.overrides += 1;
            self.board.debug = frame.to_string();
            if matched == Override::DiagnosticPlayback {
                playback = self.dispatch(&DIAGNOSTIC_PLAYBACK);
            }
        }

        FrameReport {
            frame,
            verdict,
            playback,
            triggered,
        }
    }

    fn dispatch(&mut self, command: &Command) -> Option<PlayOutcome> {
        match self.dispatcher.dispatch(command) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                self.peripheral_error("dispatch failed", &err);
                None
            }
        }
    }

    fn poll_buttons(&mut self) -> ButtonFrame {
        let frame = self.sampler.sample();
        self.stats.polls += 1;

        self.status_line = frame.status_line();
        self.status.clear();
        encode_status_line(&self.status_line, &mut self.status);

        self.board.buttons = format!("Button: {}", frame.mask_text());
        self.board.pressed_button = frame.lowest_held().map(|channel| channel + 1);

        let edges = frame.pressed_edges();
        if edges != 0 {
            tracing::info!(edges, line = %self.status_line, "button pressed");
            self.stats.press_edges += u64::from(edges.count_ones());
            self.board.message = BUTTON_PRESSED.to_string();
        } else {
            self.board.message.clear();
        }
        frame
    }

    fn transmit_status(&mut self) -> Result<StatusLine> {
        self.serial.write_all(&self.status)?;
        self.stats.status_lines += 1;
        self.board.sent = self.status_line.to_string();
        Ok(self.status_line)
    }

    fn restart(&mut self) {
        tracing::warn!("device restart");
        self.reset.restart();
        self.stats.restarts += 1;

        self.ticks.reset();
        self.decoder.reset();
        self.sampler.reset();
        self.send_pending = false;
        self.status_line = StatusLine::released(self.config.device_count);
        self.status.clear();
        encode_status_line(&self.status_line, &mut self.status);
        self.board = StatusBoard::default();

        self.start();
    }

    fn peripheral_error(&mut self, context: &str, err: &BridgeError) {
        tracing::error!(error = %err, "{context}");
        self.stats.peripheral_errors += 1;
        self.board.message = format!("{context}: {err}");
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Status line that the next transmission will carry.
    pub fn status_line(&self) -> StatusLine {
        self.status_line
    }

    /// Encoded form of [`Self::status_line`], terminator included.
    pub fn encoded_status(&self) -> &[u8] {
        &self.status
    }

    pub fn active_channel(&self) -> Option<usize> {
        self.dispatcher.active_channel()
    }

    /// Bytes of a command frame still being collected.
    pub fn pending_frame(&self) -> &[u8] {
        self.decoder.pending()
    }

    pub fn serial(&self) -> &P::Serial {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut P::Serial {
        &mut self.serial
    }

    pub fn display(&self) -> &P::Display {
        &self.display
    }
}

fn check_line_count(bank: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(BridgeError::LineCount {
            bank,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use panelbridge_frame::Field;
    use panelbridge_hal::sim::{
        SimBusy, SimButtons, SimDelay, SimPanel, SimRelays, SimReset, SimSerial, SimSound,
        SoundCommand,
    };

    use super::*;
    use crate::timer::TickHandler;

    #[derive(Debug, Default)]
    struct RecordingDisplay {
        renders: usize,
        last: StatusBoard,
    }

    impl StatusDisplay for RecordingDisplay {
        fn render(&mut self, board: &StatusBoard) {
            self.renders += 1;
            self.last = board.clone();
        }
    }

    struct SimPlatform;

    impl Platform for SimPlatform {
        type Buttons = SimButtons;
        type Relays = SimRelays;
        type Busy = SimBusy;
        type Sound = SimSound;
        type Delay = SimDelay;
        type Serial = SimSerial;
        type Display = RecordingDisplay;
        type Reset = SimReset;
    }

    fn peripherals(panel: &SimPanel, serial: &SimSerial) -> Peripherals<SimPlatform> {
        Peripherals {
            buttons: panel.buttons(),
            relays: panel.relays(),
            busy: panel.busy(),
            sound: panel.sound(),
            delay: panel.delay(),
            serial: serial.clone(),
            display: RecordingDisplay::default(),
            reset: panel.reset(),
        }
    }

    struct Harness {
        panel: SimPanel,
        serial: SimSerial,
        bridge: Bridge<SimPlatform>,
    }

    impl Harness {
        fn new() -> Self {
            let panel = SimPanel::new(5);
            let serial = SimSerial::new();
            let mut bridge =
                Bridge::new(BridgeConfig::default(), peripherals(&panel, &serial)).unwrap();
            bridge.start();
            panel.take_sound_log();
            Self {
                panel,
                serial,
                bridge,
            }
        }

        fn send(&mut self, bytes: &[u8]) -> StepReport {
            self.serial.inject(bytes);
            self.bridge.step().unwrap()
        }

        fn tick(&mut self, n: u32) {
            let ticks = self.bridge.tick_state();
            for _ in 0..n {
                ticks.on_tick();
            }
        }
    }

    #[test]
    fn valid_frame_selects_channel_and_plays() {
        let mut h = Harness::new();
        let report = h.send(b"b20100515");

        let frame = report.frame.as_ref().unwrap();
        assert_eq!(frame.verdict.as_ref().unwrap(), &Command::new(2, 1, 5, 15));
        assert_eq!(
            frame.playback,
            Some(PlayOutcome::Started { preempted: false })
        );
        assert_eq!(frame.triggered, None);

        assert_eq!(h.panel.active_relays(), vec![2]);
        assert_eq!(
            h.panel.sound_log(),
            vec![
                SoundCommand::Volume(15),
                SoundCommand::PlayFolder { folder: 1, file: 5 }
            ]
        );
        let board = h.bridge.board();
        assert_eq!(board.received, "b20100515");
        assert_eq!(board.decode_result, " => sp:2 dir:1 file:5 vol:15");
        assert!(board.debug.is_empty());
    }

    #[test]
    fn volume_31_is_rejected_without_playback() {
        let mut h = Harness::new();
        let report = h.send(b"b00100131");

        let frame = report.frame.as_ref().unwrap();
        assert!(matches!(
            frame.verdict,
            Err(FrameError::OutOfRange {
                field: Field::Volume,
                value: 31,
                ..
            })
        ));
        assert_eq!(frame.playback, None);
        assert!(h.panel.sound_log().is_empty());
        assert!(h.panel.active_relays().is_empty());
        assert_eq!(h.bridge.board().debug, UNABLE_TO_DECODE);
        assert_eq!(h.bridge.stats().rejected, 1);
    }

    #[test]
    fn wrapped_volume_plays_silently() {
        let mut h = Harness::new();
        let report = h.send(b"b001001I6");

        let frame = report.frame.as_ref().unwrap();
        assert_eq!(frame.verdict.as_ref().unwrap(), &Command::new(0, 1, 1, 0));
        assert_eq!(
            h.panel.sound_log(),
            vec![
                SoundCommand::Volume(0),
                SoundCommand::PlayFolder { folder: 1, file: 1 }
            ]
        );
        assert_eq!(h.bridge.board().decode_result, " => sp:0 dir:1 file:1 vol:256");
    }

    #[test]
    fn diagnostic_override_runs_despite_rejection() {
        let mut h = Harness::new();
        let report = h.send(b"b12345678");

        let frame = report.frame.as_ref().unwrap();
        assert!(frame.verdict.is_err());
        assert_eq!(frame.triggered, Some(Override::DiagnosticPlayback));
        assert!(frame.playback.is_some());

        assert_eq!(h.panel.active_relays(), vec![0]);
        assert_eq!(
            h.panel.sound_log(),
            vec![
                SoundCommand::Volume(15),
                SoundCommand::PlayFolder { folder: 1, file: 1 }
            ]
        );
        assert_eq!(h.bridge.board().debug, "b12345678");
        assert_eq!(h.bridge.board().decode_result, " => sp:1 dir:23 file:456 vol:78");
        let stats = h.bridge.stats();
        assert_eq!((stats.rejected, stats.overrides), (1, 1));
    }

    #[test]
    fn restart_override_reinitializes() {
        let mut h = Harness::new();
        h.send(b"b30100110");
        h.tick(10);
        h.panel.press(1);
        h.bridge.step().unwrap();
        assert_eq!(h.panel.active_relays(), vec![3]);

        let report = h.send(b"b99999999b40100110");
        assert!(report.restarted);
        assert_eq!(
            report.frame.as_ref().unwrap().triggered,
            Some(Override::Restart)
        );

        assert_eq!(h.panel.restarts(), 1);
        assert!(h.panel.active_relays().is_empty());
        assert_eq!(h.bridge.board().sound_module, SoundModuleState::Ok);
        assert!(h.bridge.board().received.is_empty());
        assert_eq!(h.bridge.status_line().to_string(), "S11111E");
        assert_eq!(h.bridge.tick_state().counter(), 0);
        assert_eq!(h.bridge.stats().restarts, 1);

        // Bytes after the restart frame are handled on the next pass.
        assert_eq!(h.serial.pending_input(), 9);
        h.bridge.step().unwrap();
        assert_eq!(h.panel.active_relays(), vec![4]);
    }

    #[test]
    fn status_line_sent_once_per_poll() {
        let mut h = Harness::new();
        assert!(h.bridge.step().unwrap().status_sent.is_none());

        h.tick(10);
        let report = h.bridge.step().unwrap();
        assert_eq!(report.status_sent.unwrap().to_string(), "S11111E");
        assert!(h.bridge.step().unwrap().status_sent.is_none());

        h.panel.press(2);
        h.tick(10);
        h.bridge.step().unwrap();
        h.tick(10);
        h.bridge.step().unwrap();

        assert_eq!(
            h.serial.take_lines(),
            vec!["S11111E", "S11011E", "S11111E"]
        );
        assert_eq!(h.bridge.stats().status_lines, 3);
        assert_eq!(h.bridge.stats().press_edges, 1);
    }

    #[test]
    fn press_updates_board() {
        let mut h = Harness::new();
        h.panel.press(3);
        h.tick(10);
        h.bridge.step().unwrap();

        let board = &h.bridge.display().last;
        assert_eq!(board.buttons, "Button: 10111");
        assert_eq!(board.pressed_button, Some(4));
        assert_eq!(board.message, BUTTON_PRESSED);
        assert_eq!(board.sent, "S11101E");

        h.tick(10);
        h.bridge.step().unwrap();
        assert!(h.bridge.board().message.is_empty());
        assert_eq!(h.bridge.board().pressed_button, Some(4));
    }

    #[test]
    fn encoded_status_is_stable_between_polls() {
        let mut h = Harness::new();
        h.panel.press(0);
        h.tick(10);
        h.bridge.step().unwrap();
        let first = h.bridge.encoded_status().to_vec();
        h.bridge.step().unwrap();
        assert_eq!(h.bridge.encoded_status(), first.as_slice());
        assert_eq!(first, b"S01111E\r\n");
    }

    #[test]
    fn partial_frame_completes_on_later_step() {
        let mut h = Harness::new();
        assert!(h.send(b"xxb1020").frame.is_none());
        assert_eq!(h.bridge.pending_frame(), b"b1020");
        let report = h.send(b"0304");
        assert!(report.frame.is_some());
        assert_eq!(h.panel.active_relays(), vec![1]);
    }

    #[test]
    fn heartbeat_reaches_board() {
        let mut h = Harness::new();
        h.tick(1000);
        h.bridge.step().unwrap();
        assert_eq!(h.bridge.board().heartbeat, 1);
    }

    #[test]
    fn busy_module_is_preempted_by_next_command() {
        let mut h = Harness::new();
        h.send(b"b00100110b10100220");
        assert_eq!(h.serial.pending_input(), 9);
        h.bridge.step().unwrap();
        assert_eq!(
            h.panel.sound_log(),
            vec![
                SoundCommand::Volume(10),
                SoundCommand::PlayFolder { folder: 1, file: 1 },
                SoundCommand::Stop,
                SoundCommand::Volume(20),
                SoundCommand::PlayFolder { folder: 1, file: 2 },
            ]
        );
        assert_eq!(h.panel.active_relays(), vec![1]);
    }

    #[test]
    fn offline_sound_module_degrades() {
        let panel = SimPanel::new(5);
        panel.set_sound_online(false);
        let serial = SimSerial::new();
        let mut bridge =
            Bridge::new(BridgeConfig::default(), peripherals(&panel, &serial)).unwrap();
        bridge.start();
        assert_eq!(bridge.board().sound_module, SoundModuleState::NotResponding);

        serial.inject(b"b20100515");
        let report = bridge.step().unwrap();
        assert_eq!(
            report.frame.unwrap().playback,
            Some(PlayOutcome::Skipped)
        );
        assert_eq!(panel.active_relays(), vec![2]);
        assert_eq!(panel.sound_log(), vec![SoundCommand::Begin]);
    }

    #[test]
    fn mismatched_line_count_rejected() {
        let panel = SimPanel::new(4);
        let serial = SimSerial::new();
        let result = Bridge::new(BridgeConfig::default(), peripherals(&panel, &serial));
        assert!(matches!(
            result,
            Err(BridgeError::LineCount {
                bank: "buttons",
                expected: 5,
                actual: 4
            })
        ));
    }

    #[test]
    fn strict_digits_rejects_malformed_frame() {
        let panel = SimPanel::new(5);
        let serial = SimSerial::new();
        let config = BridgeConfig {
            strict_digits: true,
            ..BridgeConfig::default()
        };
        let mut bridge = Bridge::new(config, peripherals(&panel, &serial)).unwrap();
        bridge.start();

        // "1/" would convert to folder 9 in legacy mode.
        serial.inject(b"b01/00110");
        let report = bridge.step().unwrap();
        assert!(matches!(
            report.frame.unwrap().verdict,
            Err(FrameError::InvalidDigit { offset: 3, .. })
        ));
        assert!(panel.active_relays().is_empty());
    }

    /// Delay that advances the bridge's tick state one tick per millisecond,
    /// the way a hardware timer keeps running while the main loop blocks.
    #[derive(Clone, Default)]
    struct TickingDelay {
        ticks: Arc<std::sync::Mutex<Option<Arc<TickState>>>>,
        total_ms: Arc<std::sync::atomic::AtomicU64>,
    }

    impl Delay for TickingDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.total_ms
                .fetch_add(u64::from(ms), std::sync::atomic::Ordering::Relaxed);
            if let Some(ticks) = self.ticks.lock().unwrap().as_ref() {
                for _ in 0..ms {
                    ticks.on_tick();
                }
            }
        }
    }

    struct TickingPlatform;

    impl Platform for TickingPlatform {
        type Buttons = SimButtons;
        type Relays = SimRelays;
        type Busy = SimBusy;
        type Sound = SimSound;
        type Delay = TickingDelay;
        type Serial = SimSerial;
        type Display = RecordingDisplay;
        type Reset = SimReset;
    }

    #[test]
    fn command_burst_does_not_starve_status_line() {
        let panel = SimPanel::new(5);
        let serial = SimSerial::new();
        let delay = TickingDelay::default();
        let mut bridge = Bridge::<TickingPlatform>::new(
            BridgeConfig::default(),
            Peripherals {
                buttons: panel.buttons(),
                relays: panel.relays(),
                busy: panel.busy(),
                sound: panel.sound(),
                delay: delay.clone(),
                serial: serial.clone(),
                display: RecordingDisplay::default(),
                reset: panel.reset(),
            },
        )
        .unwrap();
        *delay.ticks.lock().unwrap() = Some(bridge.tick_state());
        bridge.start();

        serial.inject(&b"b00100110".repeat(50));
        let mut passes = 0;
        while serial.pending_input() > 0 {
            let report = bridge.step().unwrap();
            assert!(report.frame.is_some());
            // Every dispatch blocks for at least one poll interval.
            assert!(report.status_sent.is_some());
            passes += 1;
        }

        assert_eq!(passes, 50);
        let stats = bridge.stats();
        assert_eq!(stats.frames, 50);
        assert_eq!(stats.status_lines, 50);
        assert_eq!(serial.take_lines().len(), 50);
        assert_eq!(
            delay.total_ms.load(std::sync::atomic::Ordering::Relaxed),
            20 + 49 * 40
        );
    }
}
