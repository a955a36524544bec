//! Types for building AstroStep request frames and parsing reply payloads.
//!
//! The device has no structured framing beyond a two-letter opcode and a `#`
//! terminator, so this module is a thin translation table between typed
//! [`Command`]s and the ASCII frames the firmware understands. Getting this
//! table right is what prevents silent state corruption everywhere else.

pub mod command;
pub mod reply;

pub use command::{Command, Frame, Query, ReplyShape};
