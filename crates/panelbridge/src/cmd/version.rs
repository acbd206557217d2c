use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("panelbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: panelbridge");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("PANELBRIDGE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("host_baud: {}", panelbridge_hal::HOST_BAUD);
    println!("sound_baud: {}", panelbridge_hal::SOUND_BAUD);
    println!(
        "frame: {} bytes, max {} channels",
        panelbridge_frame::FRAME_LEN,
        panelbridge_frame::MAX_CHANNELS
    );

    Ok(SUCCESS)
}
