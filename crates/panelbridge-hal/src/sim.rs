//! In-memory board used by the CLI simulator and by tests.
//!
//! [`SimPanel`] owns the shared state; the handle types it hands out implement
//! the hardware traits and can be moved into the bridge while the panel itself
//! stays with the caller for driving buttons and inspecting outputs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{HalError, Result};
use crate::traits::{
    BusySense, Delay, InputLines, Level, OutputLines, SerialPort, SoundModule, SystemReset,
};

/// One command observed by the simulated sound module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCommand {
    Begin,
    Stop,
    Volume(u8),
    PlayFolder { folder: u8, file: u16 },
}

/// Commands retained by the simulated sound module; older entries are
/// dropped first.
pub const SOUND_LOG_CAPACITY: usize = 256;

#[derive(Debug)]
struct PanelState {
    buttons: Vec<Level>,
    relays: Vec<Level>,
    busy: Level,
    busy_follows_playback: bool,
    sound_online: bool,
    sound_log: VecDeque<SoundCommand>,
    delay_ms: u64,
    restarts: u32,
}

impl PanelState {
    fn record(&mut self, command: SoundCommand) {
        if self.sound_log.len() == SOUND_LOG_CAPACITY {
            self.sound_log.pop_front();
        }
        self.sound_log.push_back(command);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared simulated panel.
#[derive(Debug, Clone)]
pub struct SimPanel {
    state: Arc<Mutex<PanelState>>,
}

impl SimPanel {
    /// Panel with `lines` buttons and relays, all buttons released and all
    /// relays low. The busy line follows playback by default.
    pub fn new(lines: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(PanelState {
                buttons: vec![Level::High; lines],
                relays: vec![Level::Low; lines],
                busy: Level::High,
                busy_follows_playback: true,
                sound_online: true,
                sound_log: VecDeque::new(),
                delay_ms: 0,
                restarts: 0,
            })),
        }
    }

    pub fn press(&self, index: usize) {
        self.set_button(index, Level::Low);
    }

    pub fn release(&self, index: usize) {
        self.set_button(index, Level::High);
    }

    pub fn set_button(&self, index: usize, level: Level) {
        if let Some(slot) = lock(&self.state).buttons.get_mut(index) {
            *slot = level;
        }
    }

    pub fn relay_levels(&self) -> Vec<Level> {
        lock(&self.state).relays.clone()
    }

    /// Indices of relays currently driven high.
    pub fn active_relays(&self) -> Vec<usize> {
        lock(&self.state)
            .relays
            .iter()
            .enumerate()
            .filter(|(_, level)| level.is_high())
            .map(|(index, _)| index)
            .collect()
    }

    /// Force the busy line. `true` drives it low (playing).
    pub fn set_busy(&self, busy: bool) {
        lock(&self.state).busy = Level::from(!busy);
    }

    /// When enabled, play drives the busy line low and stop releases it.
    pub fn set_busy_follows_playback(&self, follows: bool) {
        lock(&self.state).busy_follows_playback = follows;
    }

    /// Make the sound module fail (or succeed) its next `begin`.
    pub fn set_sound_online(&self, online: bool) {
        lock(&self.state).sound_online = online;
    }

    /// The most recent sound module commands, oldest first.
    pub fn sound_log(&self) -> Vec<SoundCommand> {
        lock(&self.state).sound_log.iter().copied().collect()
    }

    pub fn take_sound_log(&self) -> Vec<SoundCommand> {
        lock(&self.state).sound_log.drain(..).collect()
    }

    /// Total milliseconds requested through [`SimDelay`].
    pub fn total_delay_ms(&self) -> u64 {
        lock(&self.state).delay_ms
    }

    pub fn restarts(&self) -> u32 {
        lock(&self.state).restarts
    }

    pub fn buttons(&self) -> SimButtons {
        SimButtons {
            state: Arc::clone(&self.state),
        }
    }

    pub fn relays(&self) -> SimRelays {
        SimRelays {
            state: Arc::clone(&self.state),
        }
    }

    pub fn busy(&self) -> SimBusy {
        SimBusy {
            state: Arc::clone(&self.state),
        }
    }

    pub fn sound(&self) -> SimSound {
        SimSound {
            state: Arc::clone(&self.state),
        }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay {
            state: Arc::clone(&self.state),
        }
    }

    pub fn reset(&self) -> SimReset {
        SimReset {
            state: Arc::clone(&self.state),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimButtons {
    state: Arc<Mutex<PanelState>>,
}

impl InputLines for SimButtons {
    fn line_count(&self) -> usize {
        lock(&self.state).buttons.len()
    }

    fn read_line(&mut self, index: usize) -> Level {
        lock(&self.state)
            .buttons
            .get(index)
            .copied()
            .unwrap_or(Level::High)
    }
}

#[derive(Debug, Clone)]
pub struct SimRelays {
    state: Arc<Mutex<PanelState>>,
}

impl OutputLines for SimRelays {
    fn line_count(&self) -> usize {
        lock(&self.state).relays.len()
    }

    fn write_line(&mut self, index: usize, level: Level) -> Result<()> {
        let mut state = lock(&self.state);
        let count = state.relays.len();
        let slot = state
            .relays
            .get_mut(index)
            .ok_or(HalError::LineOutOfRange { index, count })?;
        *slot = level;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SimBusy {
    state: Arc<Mutex<PanelState>>,
}

impl BusySense for SimBusy {
    fn level(&mut self) -> Level {
        lock(&self.state).busy
    }
}

#[derive(Debug, Clone)]
pub struct SimSound {
    state: Arc<Mutex<PanelState>>,
}

impl SoundModule for SimSound {
    fn begin(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.record(SoundCommand::Begin);
        if state.sound_online {
            Ok(())
        } else {
            Err(HalError::NotResponding("simulated module offline".to_string()))
        }
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.record(SoundCommand::Stop);
        if state.busy_follows_playback {
            state.busy = Level::High;
        }
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        lock(&self.state).record(SoundCommand::Volume(volume));
        Ok(())
    }

    fn play_folder(&mut self, folder: u8, file: u16) -> Result<()> {
        let mut state = lock(&self.state);
        state.record(SoundCommand::PlayFolder { folder, file });
        if state.busy_follows_playback {
            state.busy = Level::Low;
        }
        Ok(())
    }
}

/// Records requested delays without sleeping.
#[derive(Debug, Clone)]
pub struct SimDelay {
    state: Arc<Mutex<PanelState>>,
}

impl Delay for SimDelay {
    fn delay_ms(&mut self, ms: u32) {
        let mut state = lock(&self.state);
        state.delay_ms = state.delay_ms.saturating_add(u64::from(ms));
    }
}

#[derive(Debug, Clone)]
pub struct SimReset {
    state: Arc<Mutex<PanelState>>,
}

impl SystemReset for SimReset {
    fn restart(&mut self) {
        let mut state = lock(&self.state);
        state.restarts = state.restarts.saturating_add(1);
        state.relays.iter_mut().for_each(|level| *level = Level::Low);
    }
}

#[derive(Debug, Default)]
struct SerialState {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

/// In-memory serial link. Clones share the same buffers.
#[derive(Debug, Clone, Default)]
pub struct SimSerial {
    state: Arc<Mutex<SerialState>>,
}

impl SimSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if the host had sent them.
    pub fn inject(&self, bytes: &[u8]) {
        lock(&self.state).rx.extend(bytes.iter().copied());
    }

    /// Bytes still waiting to be read by the device side.
    pub fn pending_input(&self) -> usize {
        lock(&self.state).rx.len()
    }

    /// Drain everything the device side has transmitted.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.state).tx)
    }

    /// Drain transmitted data and split it into CRLF-terminated lines.
    pub fn take_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.take_output())
            .split_terminator("\r\n")
            .map(str::to_string)
            .collect()
    }
}

impl SerialPort for SimSerial {
    fn read_byte(&mut self) -> Option<u8> {
        lock(&self.state).rx.pop_front()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        lock(&self.state).tx.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buttons_reflect_presses() {
        let panel = SimPanel::new(5);
        let mut buttons = panel.buttons();
        panel.press(2);
        assert_eq!(buttons.read_line(2), Level::Low);
        assert_eq!(buttons.read_line(1), Level::High);
        panel.release(2);
        assert_eq!(buttons.read_line(2), Level::High);
        assert_eq!(buttons.read_line(9), Level::High);
    }

    #[test]
    fn relay_write_out_of_range_fails() {
        let panel = SimPanel::new(5);
        let mut relays = panel.relays();
        relays.write_line(4, Level::High).unwrap();
        assert_eq!(panel.active_relays(), vec![4]);
        assert!(matches!(
            relays.write_line(5, Level::High),
            Err(HalError::LineOutOfRange { index: 5, count: 5 })
        ));
    }

    #[test]
    fn busy_follows_playback() {
        let panel = SimPanel::new(5);
        let mut sound = panel.sound();
        let mut busy = panel.busy();
        assert!(!busy.is_busy());
        sound.play_folder(1, 1).unwrap();
        assert!(busy.is_busy());
        sound.stop().unwrap();
        assert!(!busy.is_busy());
    }

    #[test]
    fn offline_module_fails_begin() {
        let panel = SimPanel::new(5);
        panel.set_sound_online(false);
        assert!(panel.sound().begin().is_err());
        assert_eq!(panel.sound_log(), vec![SoundCommand::Begin]);
    }

    #[test]
    fn sound_log_keeps_most_recent_commands() {
        let panel = SimPanel::new(5);
        let mut sound = panel.sound();
        for step in 0..SOUND_LOG_CAPACITY + 10 {
            sound.set_volume((step % 31) as u8).unwrap();
        }
        let log = panel.sound_log();
        assert_eq!(log.len(), SOUND_LOG_CAPACITY);
        assert_eq!(log[0], SoundCommand::Volume((10 % 31) as u8));
        assert_eq!(
            log.last(),
            Some(&SoundCommand::Volume(((SOUND_LOG_CAPACITY + 9) % 31) as u8))
        );

        assert_eq!(panel.take_sound_log().len(), SOUND_LOG_CAPACITY);
        assert!(panel.sound_log().is_empty());
    }

    #[test]
    fn serial_roundtrip() {
        let serial = SimSerial::new();
        let mut device = serial.clone();
        serial.inject(b"ab");
        assert_eq!(device.read_byte(), Some(b'a'));
        assert_eq!(serial.pending_input(), 1);
        device.write_all(b"S11111E\r\nS11011E\r\n").unwrap();
        assert_eq!(serial.take_lines(), vec!["S11111E", "S11011E"]);
        assert!(serial.take_output().is_empty());
    }
}
