use bytes::BytesMut;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use panelbridge_frame::{encode_command, Command};
use serde::Serialize;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_json, print_raw, OutputFormat};

#[derive(Serialize)]
struct EncodeOutput {
    frame: String,
    channel: u8,
    folder: u8,
    file: u16,
    volume: u8,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let command = Command::new(args.channel, args.folder, args.file, args.volume);
    let frame = encode(&command)?;

    match format {
        OutputFormat::Json => print_json(&EncodeOutput {
            frame: String::from_utf8_lossy(&frame).into_owned(),
            channel: command.channel,
            folder: command.folder,
            file: command.file,
            volume: command.volume,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAME", "COMMAND"])
                .add_row(vec![
                    String::from_utf8_lossy(&frame).into_owned(),
                    command.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", String::from_utf8_lossy(&frame)),
        OutputFormat::Raw => print_raw(&frame),
    }

    Ok(SUCCESS)
}

fn encode(command: &Command) -> CliResult<BytesMut> {
    let mut frame = BytesMut::new();
    encode_command(command, &mut frame).map_err(|err| frame_error("encode failed", err))?;
    Ok(frame)
}
