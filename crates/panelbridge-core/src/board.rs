use serde::Serialize;

/// Debug text shown when a frame fails validation.
pub const UNABLE_TO_DECODE: &str = "unable to decode";

/// Message shown on a poll with at least one press edge.
pub const BUTTON_PRESSED: &str = "button was pressed.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundModuleState {
    #[default]
    Unknown,
    Ok,
    NotResponding,
}

impl SoundModuleState {
    pub fn label(self) -> &'static str {
        match self {
            SoundModuleState::Unknown => "--",
            SoundModuleState::Ok => "OK",
            SoundModuleState::NotResponding => "NG",
        }
    }
}

/// Everything the status display shows. The display never feeds back into
/// the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusBoard {
    pub sound_module: SoundModuleState,
    /// `Button: ` followed by the latest sample, highest channel first.
    pub buttons: String,
    /// 1-origin number of the lowest button held at the latest sample.
    pub pressed_button: Option<usize>,
    /// Last status line sent to the host.
    pub sent: String,
    /// Last raw command frame received.
    pub received: String,
    /// Fields of the last frame as decoded, before validation.
    pub decode_result: String,
    pub message: String,
    pub heartbeat: u32,
    pub debug: String,
}

impl StatusBoard {
    /// Labelled rows in display order.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Sound Module", self.sound_module.label().to_string()),
            ("Buttons", self.buttons.clone()),
            (
                "Pressed",
                self.pressed_button
                    .map(|button| button.to_string())
                    .unwrap_or_default(),
            ),
            ("SND", self.sent.clone()),
            ("RCV", self.received.clone()),
            ("Decode", self.decode_result.clone()),
            ("Message", self.message.clone()),
            ("Heartbeat", self.heartbeat.to_string()),
            ("Debug", self.debug.clone()),
        ]
    }
}

/// Sink for the status board.
pub trait StatusDisplay {
    fn render(&mut self, board: &StatusBoard);
}

/// Display that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDisplay;

impl StatusDisplay for NullDisplay {
    fn render(&mut self, _board: &StatusBoard) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_follow_board() {
        let board = StatusBoard {
            sound_module: SoundModuleState::NotResponding,
            pressed_button: Some(3),
            heartbeat: 42,
            ..StatusBoard::default()
        };
        let rows = board.rows();
        assert_eq!(rows[0], ("Sound Module", "NG".to_string()));
        assert_eq!(rows[2], ("Pressed", "3".to_string()));
        assert_eq!(rows[7], ("Heartbeat", "42".to_string()));
    }
}
