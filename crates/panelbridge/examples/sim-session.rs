//! Drive the bridge on a simulated panel without the CLI.
//!
//! Run with:
//!   cargo run --example sim-session

use panelbridge::bridge::{Bridge, BridgeConfig, NullDisplay, Peripherals, Platform, TickHandler};
use panelbridge::hal::sim::{
    SimBusy, SimButtons, SimDelay, SimPanel, SimRelays, SimReset, SimSerial, SimSound,
};

struct Sim;

impl Platform for Sim {
    type Buttons = SimButtons;
    type Relays = SimRelays;
    type Busy = SimBusy;
    type Sound = SimSound;
    type Delay = SimDelay;
    type Serial = SimSerial;
    type Display = NullDisplay;
    type Reset = SimReset;
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let panel = SimPanel::new(5);
    let host = SimSerial::new();

    let mut bridge = Bridge::<Sim>::new(
        BridgeConfig::default(),
        Peripherals {
            buttons: panel.buttons(),
            relays: panel.relays(),
            busy: panel.busy(),
            sound: panel.sound(),
            delay: panel.delay(),
            serial: host.clone(),
            display: NullDisplay,
            reset: panel.reset(),
        },
    )?;
    bridge.start();
    let ticks = bridge.tick_state();

    // Host asks for channel 2, folder 1, file 5 at volume 15.
    host.inject(b"b20100515");

    for ms in 1..=40u32 {
        if ms == 15 {
            panel.press(3);
        }
        ticks.on_tick();
        bridge.step()?;
    }

    eprintln!("active relays: {:?}", panel.active_relays());
    eprintln!("sound commands: {:?}", panel.sound_log());
    for line in host.take_lines() {
        println!("{line}");
    }
    Ok(())
}
