use std::io::Read;

use panelbridge_frame::{
    decode_frame, match_override, CommandReader, FrameConfig, RawFrame, MAX_CHANNELS,
};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_decoded, FrameOutput, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    if args.channels == 0 || args.channels > MAX_CHANNELS {
        return Err(CliError::new(
            USAGE,
            format!("--channels must be between 1 and {MAX_CHANNELS}"),
        ));
    }
    let config = FrameConfig {
        channel_count: args.channels,
        strict_digits: args.strict,
    };

    let rows = if args.stdin {
        scan(std::io::stdin().lock(), &config)?
    } else {
        decode_all(&args.frames, &config)?
    };
    print_decoded(&rows, format);

    if rows.iter().all(|row| row.accepted) {
        Ok(SUCCESS)
    } else {
        Ok(DATA_INVALID)
    }
}

fn decode_all(frames: &[String], config: &FrameConfig) -> CliResult<Vec<FrameOutput>> {
    frames
        .iter()
        .map(|text| {
            let frame = RawFrame::from_bytes(text.as_bytes())
                .map_err(|err| frame_error(&format!("frame {text:?}"), err))?;
            Ok(describe(&frame, config))
        })
        .collect()
}

fn describe(frame: &RawFrame, config: &FrameConfig) -> FrameOutput {
    let verdict = decode_frame(frame, config);
    FrameOutput::new(frame, &verdict, match_override(frame))
}

/// Decode every frame in a byte stream. Bytes outside a frame are skipped and
/// a trailing partial frame is dropped.
fn scan<R: Read>(input: R, config: &FrameConfig) -> CliResult<Vec<FrameOutput>> {
    CommandReader::new(input)
        .map(|frame| {
            frame
                .map(|frame| describe(&frame, config))
                .map_err(|err| frame_error("read failed", err))
        })
        .collect()
}
