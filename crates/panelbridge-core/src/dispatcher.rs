use panelbridge_frame::Command;
use panelbridge_hal::{BusySense, Delay, Level, OutputLines, SoundModule};

use crate::error::{BridgeError, Result};

/// What a playback request turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Volume and play commands were sent.
    Started {
        /// A running track was stopped first.
        preempted: bool,
    },
    /// The sound module failed initialization; nothing was sent.
    Skipped,
}

/// Drives channel selection and playback.
///
/// Owns the relay bank, the sound module and its busy line, and the delay
/// used to space sound module commands.
#[derive(Debug)]
pub struct Dispatcher<O, B, S, D> {
    relays: O,
    busy: B,
    sound: S,
    delay: D,
    settle_delay_ms: u32,
    sound_ready: bool,
    active: Option<usize>,
}

impl<O, B, S, D> Dispatcher<O, B, S, D>
where
    O: OutputLines,
    B: BusySense,
    S: SoundModule,
    D: Delay,
{
    pub fn new(relays: O, busy: B, sound: S, delay: D, settle_delay_ms: u32) -> Self {
        Self {
            relays,
            busy,
            sound,
            delay,
            settle_delay_ms,
            sound_ready: false,
            active: None,
        }
    }

    /// Initialize the sound module. On failure playback degrades to a no-op.
    pub fn begin(&mut self) -> bool {
        match self.sound.begin() {
            Ok(()) => {
                tracing::info!("sound module online");
                self.sound_ready = true;
            }
            Err(err) => {
                tracing::warn!(error = %err, "sound module not responding, playback disabled");
                self.sound_ready = false;
            }
        }
        self.sound_ready
    }

    pub fn sound_ready(&self) -> bool {
        self.sound_ready
    }

    /// Currently selected channel.
    pub fn active_channel(&self) -> Option<usize> {
        self.active
    }

    pub fn channel_count(&self) -> usize {
        self.relays.line_count()
    }

    /// Select `channel` exclusively: every other line is driven low before the
    /// selected line is driven high.
    pub fn activate(&mut self, channel: usize) -> Result<()> {
        let count = self.relays.line_count();
        if channel >= count {
            return Err(BridgeError::ChannelOutOfRange { channel, count });
        }

        for index in (0..count).filter(|index| *index != channel) {
            self.relays.write_line(index, Level::Low)?;
        }
        self.relays.write_line(channel, Level::High)?;

        if self.active != Some(channel) {
            tracing::debug!(channel, "channel selected");
        }
        self.active = Some(channel);
        Ok(())
    }

    /// Drive every channel low.
    pub fn release_all(&mut self) -> Result<()> {
        for index in 0..self.relays.line_count() {
            self.relays.write_line(index, Level::Low)?;
        }
        self.active = None;
        Ok(())
    }

    /// Play `file` from `folder` at `volume`, preempting a running track.
    pub fn play(&mut self, folder: u8, file: u16, volume: u8) -> Result<PlayOutcome> {
        if !self.sound_ready {
            tracing::warn!(folder, file, volume, "sound module offline, playback skipped");
            return Ok(PlayOutcome::Skipped);
        }

        let preempted = self.busy.is_busy();
        if preempted {
            tracing::debug!("sound module busy, stopping current track");
            self.sound.stop()?;
            self.delay.delay_ms(self.settle_delay_ms);
        }

        self.sound.set_volume(volume)?;
        self.delay.delay_ms(self.settle_delay_ms);
        self.sound.play_folder(folder, file)?;

        tracing::info!(folder, file, volume, preempted, "playback requested");
        Ok(PlayOutcome::Started { preempted })
    }

    /// Select the command's channel, then start its playback.
    pub fn dispatch(&mut self, command: &Command) -> Result<PlayOutcome> {
        self.activate(usize::from(command.channel))?;
        self.play(command.folder, command.file, command.volume)
    }
}

#[cfg(test)]
mod tests {
    use panelbridge_hal::sim::{SimBusy, SimDelay, SimPanel, SimRelays, SimSound, SoundCommand};

    use super::*;

    type SimDispatcher = Dispatcher<SimRelays, SimBusy, SimSound, SimDelay>;

    fn dispatcher(panel: &SimPanel) -> SimDispatcher {
        let mut dispatcher =
            Dispatcher::new(panel.relays(), panel.busy(), panel.sound(), panel.delay(), 20);
        assert!(dispatcher.begin());
        panel.take_sound_log();
        dispatcher
    }

    #[test]
    fn activate_is_exclusive_for_every_channel() {
        let panel = SimPanel::new(5);
        let mut dispatcher = dispatcher(&panel);
        for channel in [0, 3, 3, 4, 1, 1, 0] {
            dispatcher.activate(channel).unwrap();
            assert_eq!(panel.active_relays(), vec![channel]);
            assert_eq!(dispatcher.active_channel(), Some(channel));
        }
    }

    #[test]
    fn activate_out_of_range_leaves_outputs_untouched() {
        let panel = SimPanel::new(5);
        let mut dispatcher = dispatcher(&panel);
        dispatcher.activate(2).unwrap();
        assert!(matches!(
            dispatcher.activate(5),
            Err(BridgeError::ChannelOutOfRange {
                channel: 5,
                count: 5
            })
        ));
        assert_eq!(panel.active_relays(), vec![2]);
    }

    #[test]
    fn idle_module_gets_volume_then_play() {
        let panel = SimPanel::new(5);
        let mut dispatcher = dispatcher(&panel);
        let outcome = dispatcher.play(12, 345, 6).unwrap();
        assert_eq!(outcome, PlayOutcome::Started { preempted: false });
        assert_eq!(
            panel.sound_log(),
            vec![
                SoundCommand::Volume(6),
                SoundCommand::PlayFolder {
                    folder: 12,
                    file: 345
                }
            ]
        );
        assert_eq!(panel.total_delay_ms(), 20);
    }

    #[test]
    fn busy_module_is_stopped_first() {
        let panel = SimPanel::new(5);
        let mut dispatcher = dispatcher(&panel);
        panel.set_busy(true);
        let outcome = dispatcher.play(1, 2, 30).unwrap();
        assert_eq!(outcome, PlayOutcome::Started { preempted: true });
        assert_eq!(
            panel.sound_log(),
            vec![
                SoundCommand::Stop,
                SoundCommand::Volume(30),
                SoundCommand::PlayFolder { folder: 1, file: 2 }
            ]
        );
        assert_eq!(panel.total_delay_ms(), 40);
    }

    #[test]
    fn offline_module_skips_playback() {
        let panel = SimPanel::new(5);
        panel.set_sound_online(false);
        let mut dispatcher =
            Dispatcher::new(panel.relays(), panel.busy(), panel.sound(), panel.delay(), 20);
        assert!(!dispatcher.begin());
        panel.take_sound_log();

        let outcome = dispatcher.dispatch(&Command::new(2, 1, 1, 10)).unwrap();
        assert_eq!(outcome, PlayOutcome::Skipped);
        assert!(panel.sound_log().is_empty());
        // Channel selection still happens.
        assert_eq!(panel.active_relays(), vec![2]);
    }

    #[test]
    fn release_all_drives_every_line_low() {
        let panel = SimPanel::new(5);
        let mut dispatcher = dispatcher(&panel);
        dispatcher.activate(3).unwrap();
        dispatcher.release_all().unwrap();
        assert!(panel.active_relays().is_empty());
        assert_eq!(dispatcher.active_channel(), None);
    }
}
