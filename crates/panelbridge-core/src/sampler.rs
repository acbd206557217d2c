use panelbridge_frame::{channel_mask, StatusLine};
use panelbridge_hal::InputLines;

/// The two most recent button samples.
///
/// Bit i is 1 while button i is released (line high) and 0 while it is
/// pressed (line low). Only the low `channel_count` bits are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonFrame {
    current: u8,
    previous: u8,
    channel_count: usize,
}

impl ButtonFrame {
    /// Power-on history: everything released.
    pub fn released(channel_count: usize) -> Self {
        let mask = channel_mask(channel_count);
        Self {
            current: mask,
            previous: mask,
            channel_count,
        }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn previous(&self) -> u8 {
        self.previous
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Shift a new sample in, keeping the old one as history.
    pub fn shift_in(&mut self, sample: u8) {
        self.previous = self.current;
        self.current = sample & channel_mask(self.channel_count);
    }

    /// Channels that went from released to pressed in the latest sample.
    pub fn pressed_edges(&self) -> u8 {
        self.previous & !self.current & channel_mask(self.channel_count)
    }

    /// Channels currently held down.
    pub fn held(&self) -> u8 {
        !self.current & channel_mask(self.channel_count)
    }

    /// Lowest-numbered channel currently held down.
    pub fn lowest_held(&self) -> Option<usize> {
        let held = self.held();
        (held != 0).then(|| held.trailing_zeros() as usize)
    }

    /// Status line for this sample: freshly pressed channels read `'0'`.
    pub fn status_line(&self) -> StatusLine {
        StatusLine::from_pressed(self.pressed_edges(), self.channel_count)
    }

    /// Current sample as text, highest channel first.
    pub fn mask_text(&self) -> String {
        (0..self.channel_count)
            .rev()
            .map(|channel| {
                if self.current >> channel & 1 == 1 {
                    '1'
                } else {
                    '0'
                }
            })
            .collect()
    }
}

/// Reads the button bank into a [`ButtonFrame`].
///
/// The poll interval is the only debounce: a press shorter than one poll may
/// be missed, and a press spanning several polls produces one edge.
#[derive(Debug)]
pub struct ButtonSampler<I> {
    inputs: I,
    frame: ButtonFrame,
}

impl<I: InputLines> ButtonSampler<I> {
    pub fn new(inputs: I, channel_count: usize) -> Self {
        Self {
            inputs,
            frame: ButtonFrame::released(channel_count),
        }
    }

    /// Read every line into a mask without touching the history.
    pub fn read_mask(&mut self) -> u8 {
        (0..self.frame.channel_count).fold(0u8, |mask, channel| {
            if self.inputs.read_line(channel).is_high() {
                mask | 1 << channel
            } else {
                mask
            }
        })
    }

    /// Take a new sample and return the updated history.
    pub fn sample(&mut self) -> ButtonFrame {
        let mask = self.read_mask();
        self.frame.shift_in(mask);
        tracing::trace!(
            current = self.frame.current,
            previous = self.frame.previous,
            "buttons sampled"
        );
        self.frame
    }

    pub fn frame(&self) -> ButtonFrame {
        self.frame
    }

    /// Forget history, as after power-on.
    pub fn reset(&mut self) {
        self.frame = ButtonFrame::released(self.frame.channel_count);
    }

    pub fn inputs(&self) -> &I {
        &self.inputs
    }
}
