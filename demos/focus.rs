//! Move a focuser to a target position and watch the move progress.
//!
//! Usage: `focus [path] [target]`, defaulting to `/dev/ttyUSB0` and 5000.

use astrostep::{
    focuser::Focuser,
    monitor::{Event, Monitor},
    port::Port,
};
use simple_logger::SimpleLogger;
use std::ops::ControlFlow;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Enable logging
    SimpleLogger::new().init().unwrap();

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let target: u32 = args.next().as_deref().unwrap_or("5000").parse()?;

    // Open the port and establish contact with the focuser.
    let mut focuser = Focuser::new(Port::open_serial(&path)?);
    focuser.handshake()?;
    println!("connected, firmware version {}", focuser.state().firmware_version);
    println!(
        "position {}, temperature {:.1}",
        focuser.state().current_position,
        focuser.state().temperature
    );

    // Start the move and watch it progress until it completes.
    focuser.move_absolute(target)?;
    let mut monitor = Monitor::new(focuser, |event, _state| match event {
        Event::PositionChanged(position) => {
            println!("position {position}");
            ControlFlow::Continue(())
        }
        Event::MoveComplete(position) => {
            println!("done at {position}");
            ControlFlow::Break(())
        }
        _ => ControlFlow::Continue(()),
    });
    monitor.run();
    Ok(())
}
