use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use panelbridge_core::{BridgeStats, PlayOutcome, StatusBoard};
use panelbridge_frame::{
    encode_status_line, Command, FrameError, Override, RawFields, RawFrame, StatusLine,
};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct StatusOutput {
    event: &'static str,
    tick: u64,
    line: String,
    pressed: Vec<usize>,
}

/// Print one transmitted status line.
pub fn print_status(tick: u64, line: &StatusLine, format: OutputFormat) {
    let pressed: Vec<usize> = (0..line.channel_count())
        .filter(|channel| line.is_pressed(*channel))
        .collect();
    match format {
        OutputFormat::Json => print_json(&StatusOutput {
            event: "status",
            tick,
            line: line.to_string(),
            pressed,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            if pressed.is_empty() {
                println!("tick={tick} status={line}");
            } else {
                println!("tick={tick} status={line} pressed={pressed:?}");
            }
        }
        OutputFormat::Raw => {
            let mut buf = bytes::BytesMut::new();
            encode_status_line(line, &mut buf);
            print_raw(&buf);
        }
    }
}

/// One decoded frame, shared by `decode` and `run`.
#[derive(Debug, Serialize)]
pub struct FrameOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick: Option<u64>,
    pub frame: String,
    pub channel: i32,
    pub folder: i32,
    pub file: i32,
    pub volume: i32,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "override", skip_serializing_if = "Option::is_none")]
    pub triggered: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback: Option<&'static str>,
}

impl FrameOutput {
    pub fn new(
        frame: &RawFrame,
        verdict: &Result<Command, FrameError>,
        triggered: Option<Override>,
    ) -> Self {
        let RawFields {
            channel,
            folder,
            file,
            volume,
        } = frame.fields();
        Self {
            tick: None,
            frame: frame.to_string(),
            channel,
            folder,
            file,
            volume,
            accepted: verdict.is_ok(),
            error: verdict.as_ref().err().map(ToString::to_string),
            triggered: triggered.map(Override::name),
            playback: None,
        }
    }

    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = Some(tick);
        self
    }

    pub fn with_playback(mut self, playback: Option<PlayOutcome>) -> Self {
        self.playback = playback.map(|outcome| match outcome {
            PlayOutcome::Started { preempted: false } => "started",
            PlayOutcome::Started { preempted: true } => "preempted",
            PlayOutcome::Skipped => "skipped",
        });
        self
    }

    fn verdict_text(&self) -> String {
        match &self.error {
            None => "ok".to_string(),
            Some(err) => format!("rejected ({err})"),
        }
    }
}

/// Print a frame as it arrives during `run`.
pub fn print_frame_event(out: &FrameOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&FrameEvent {
            event: "frame",
            frame: out,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            print!(
                "tick={} frame={} sp:{} dir:{} file:{} vol:{} verdict={}",
                out.tick.unwrap_or_default(),
                out.frame,
                out.channel,
                out.folder,
                out.file,
                out.volume,
                out.verdict_text()
            );
            if let Some(name) = out.triggered {
                print!(" override={name}");
            }
            if let Some(playback) = out.playback {
                print!(" playback={playback}");
            }
            println!();
        }
        // Raw output carries status lines only.
        OutputFormat::Raw => {}
    }
}

#[derive(Serialize)]
struct FrameEvent<'a> {
    event: &'static str,
    #[serde(flatten)]
    frame: &'a FrameOutput,
}

/// Print the result of the `decode` subcommand.
pub fn print_decoded(rows: &[FrameOutput], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for row in rows {
                print_json(row);
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "FRAME", "CHANNEL", "FOLDER", "FILE", "VOLUME", "VERDICT", "OVERRIDE",
                ]);
            for row in rows {
                table.add_row(vec![
                    row.frame.clone(),
                    row.channel.to_string(),
                    row.folder.to_string(),
                    row.file.to_string(),
                    row.volume.to_string(),
                    row.verdict_text(),
                    row.triggered.unwrap_or("-").to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                print!(
                    "{} => sp:{} dir:{} file:{} vol:{} {}",
                    row.frame,
                    row.channel,
                    row.folder,
                    row.file,
                    row.volume,
                    row.verdict_text()
                );
                match row.triggered {
                    Some(name) => println!(" override={name}"),
                    None => println!(),
                }
            }
        }
        OutputFormat::Raw => {
            for row in rows.iter().filter(|row| row.accepted) {
                print_raw(row.frame.as_bytes());
                print_raw(b"\n");
            }
        }
    }
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    event: &'static str,
    ticks: u64,
    stats: &'a BridgeStats,
    board: &'a StatusBoard,
}

/// Print the end-of-session summary.
pub fn print_summary(ticks: u64, stats: &BridgeStats, board: &StatusBoard, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&SummaryOutput {
            event: "summary",
            ticks,
            stats,
            board,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in summary_rows(ticks, stats, board) {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (field, value) in summary_rows(ticks, stats, board) {
                println!("{field}: {value}");
            }
        }
        OutputFormat::Raw => {}
    }
}

fn summary_rows(
    ticks: u64,
    stats: &BridgeStats,
    board: &StatusBoard,
) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("Ticks", ticks.to_string()),
        ("Frames", stats.frames.to_string()),
        ("Dispatched", stats.dispatched.to_string()),
        ("Rejected", stats.rejected.to_string()),
        ("Overrides", stats.overrides.to_string()),
        ("Status lines", stats.status_lines.to_string()),
        ("Press edges", stats.press_edges.to_string()),
        ("Restarts", stats.restarts.to_string()),
        ("Peripheral errors", stats.peripheral_errors.to_string()),
    ];
    rows.extend(board.rows());
    rows
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_output_reports_rejection_and_override() {
        let frame = RawFrame::from_bytes(b"b12345678").unwrap();
        let verdict = panelbridge_frame::decode_frame(&frame, &Default::default());
        let out = FrameOutput::new(&frame, &verdict, Some(Override::DiagnosticPlayback))
            .with_playback(Some(PlayOutcome::Started { preempted: false }));

        assert!(!out.accepted);
        assert_eq!((out.channel, out.folder, out.file, out.volume), (1, 23, 456, 78));
        assert!(out.verdict_text().starts_with("rejected"));

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["override"], "diagnostic-playback");
        assert_eq!(json["playback"], "started");
        assert!(json.get("tick").is_none());
    }

    #[test]
    fn summary_rows_include_board() {
        let stats = BridgeStats {
            frames: 3,
            ..BridgeStats::default()
        };
        let rows = summary_rows(100, &stats, &StatusBoard::default());
        assert_eq!(rows[0], ("Ticks", "100".to_string()));
        assert_eq!(rows[1], ("Frames", "3".to_string()));
        assert!(rows.iter().any(|(field, _)| *field == "Heartbeat"));
    }
}
