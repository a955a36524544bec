//! A simple but easy to use library for controlling AstroStep motorized
//! telescope focusers.
//!
//! AstroStep controllers speak a fixed ASCII command set over a serial port,
//! which may also be tunneled over TCP. This crate implements that protocol,
//! the request/reply session discipline it requires, and the state machine
//! that tracks focuser motion across polls.
//!
//! All communication starts by opening a [`port::Port`] and wrapping it in a
//! [`focuser::Focuser`]:
//!
//! ```no_run
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! use astrostep::{focuser::Focuser, port::Port};
//!
//! let mut focuser = Focuser::new(Port::open_serial("/dev/ttyUSB0")?);
//! focuser.handshake()?;
//! focuser.move_absolute(5000)?;
//! // Poll until the device reports that the move is over.
//! while !focuser.poll_tick().move_completed {
//!     std::thread::sleep(std::time::Duration::from_millis(500));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The [`monitor::Monitor`] type wraps that polling loop and publishes state
//! changes to a callback.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(missing_debug_implementations)]

pub mod backend;
pub mod error;
pub mod focuser;
pub mod monitor;
pub mod port;
pub mod protocol;
