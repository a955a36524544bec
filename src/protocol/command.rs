//! AstroStep commands and their request frames.
//!
//! Every request is framed as `:` + a two-letter opcode + an optional decimal
//! argument + `#`. Position arguments are zero padded to nine digits; all
//! other arguments are plain decimal. Set-style commands elicit no reply at
//! all, while every [`Query`] elicits exactly one reply frame.

use std::fmt;

/// Define the opcode constants and a name lookup for the AstroStep command set.
macro_rules! define_opcodes {
	(
		$(
			$opcode:ident: $($name_word:ident)+
		),+
		$(,)?
	) => {
		paste::paste! {
			pub mod opcode {
				//! The two-letter opcodes in the AstroStep command set.

				$(
					#[doc = "The " $($name_word " ")+ "(`" $opcode "`) opcode."]
					pub const $opcode: &str = stringify!($opcode);
				)+

				/// Get the name of an opcode.
				///
				/// If the opcode is not recognized, `None` is returned.
				/// The contents of the returned string may change.
				pub fn name(opcode: &str) -> Option<&'static str> {
					match opcode {
						$(
							$opcode => Some(stringify!($($name_word)+)),
						)+
						_ => None,
					}
				}
			}
		}
	};
}

define_opcodes! {
	SN: Set Target Position,
	FG: Start Motion,
	FQ: Abort Motion,
	SP: Sync Position,
	SD: Set Speed,
	SM: Set Step Mode,
	SC: Set Temperature Coefficient,
	SO: Set Temperature Calibration,
	SE: Set Coil Power,
	SR: Set Reverse,
	HO: Go Home,
	GP: Get Position,
	GD: Get Speed,
	GT: Get Temperature,
	GC: Get Temperature Coefficient,
	GO: Get Temperature Calibration,
	GE: Get Coil Power,
	GR: Get Reverse,
	GI: Get Moving State,
	GV: Get Version,
}

/// The number of bytes in a `GV` (version) reply.
///
/// Unlike every other reply, the version reply carries no `#` terminator and
/// must be read by byte count. This is a documented firmware quirk.
pub const VERSION_REPLY_LEN: usize = 4;

/// A single request frame, ready to write to a port.
///
/// Created with [`Command::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(String);

impl Frame {
	/// View the frame as raw bytes.
	pub fn as_bytes(&self) -> &[u8] {
		self.0.as_bytes()
	}

	/// View the frame as text.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl AsRef<[u8]> for Frame {
	fn as_ref(&self) -> &[u8] {
		self.as_bytes()
	}
}

impl fmt::Display for Frame {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// The complete set of requests the device understands.
///
/// Each command maps bijectively to one frame shape; see [`Command::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
	/// Set the position motion will head toward (`SN`). Does not move.
	SetTargetPosition(u32),
	/// Start motion toward the last set target position (`FG`).
	StartMotion,
	/// Abort any motion in progress (`FQ`).
	Abort,
	/// Relabel the current physical position without moving (`SP`).
	SyncPosition(u32),
	/// Set the motor speed (`SD`).
	SetSpeed(u32),
	/// Set the motor step mode (`SM`).
	SetStepMode(u32),
	/// Set the temperature coefficient (`SC`).
	SetTemperatureCoefficient(i32),
	/// Set the temperature calibration offset (`SO`).
	SetTemperatureCalibration(i32),
	/// Enable or disable temperature compensation.
	///
	/// The firmware accepts this as a bare `:+#`/`:-#` frame rather than a
	/// two-letter opcode.
	SetTemperatureCompensation(bool),
	/// Energize (`1`) or release (`0`) the motor coils between moves (`SE`).
	SetCoilPower(bool),
	/// Reverse the motor direction (`SR`).
	SetReverse(bool),
	/// Move to the home position (`HO`).
	GoHome,
	/// Read a value back from the device.
	Query(Query),
}

impl Command {
	/// Encode the command into its request frame.
	///
	/// Encoding is total: every command has exactly one frame shape.
	pub fn encode(&self) -> Frame {
		let text = match *self {
			Command::SetTargetPosition(position) => format!(":{}{position:09}#", opcode::SN),
			Command::StartMotion => format!(":{}#", opcode::FG),
			Command::Abort => format!(":{}#", opcode::FQ),
			Command::SyncPosition(position) => format!(":{}{position:09}#", opcode::SP),
			Command::SetSpeed(speed) => format!(":{}{speed}#", opcode::SD),
			Command::SetStepMode(mode) => format!(":{}{mode}#", opcode::SM),
			Command::SetTemperatureCoefficient(value) => format!(":{}{value}#", opcode::SC),
			Command::SetTemperatureCalibration(value) => format!(":{}{value}#", opcode::SO),
			Command::SetTemperatureCompensation(enable) => {
				format!(":{}#", if enable { '+' } else { '-' })
			}
			Command::SetCoilPower(on) => format!(":{}{}#", opcode::SE, u8::from(on)),
			Command::SetReverse(reversed) => format!(":{}{}#", opcode::SR, u8::from(reversed)),
			Command::GoHome => format!(":{}#", opcode::HO),
			Command::Query(query) => format!(":{}#", query.opcode()),
		};
		Frame(text)
	}
}

/// The values that can be read back from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Query {
	/// The current position (`GP`).
	Position,
	/// The motor speed (`GD`).
	Speed,
	/// The probe temperature (`GT`).
	Temperature,
	/// The temperature calibration offset (`GO`).
	TemperatureCalibration,
	/// The temperature coefficient (`GC`).
	TemperatureCoefficient,
	/// Whether the motor coils are energized between moves (`GE`).
	CoilPower,
	/// Whether the motor direction is reversed (`GR`).
	Reverse,
	/// Whether the focuser is currently moving (`GI`).
	IsMoving,
	/// The firmware version (`GV`).
	Version,
}

impl Query {
	/// The opcode this query is framed with.
	pub fn opcode(self) -> &'static str {
		match self {
			Query::Position => opcode::GP,
			Query::Speed => opcode::GD,
			Query::Temperature => opcode::GT,
			Query::TemperatureCalibration => opcode::GO,
			Query::TemperatureCoefficient => opcode::GC,
			Query::CoilPower => opcode::GE,
			Query::Reverse => opcode::GR,
			Query::IsMoving => opcode::GI,
			Query::Version => opcode::GV,
		}
	}

	/// How the reply to this query is delimited on the wire.
	pub fn reply_shape(self) -> ReplyShape {
		match self {
			Query::Version => ReplyShape::FixedLength(VERSION_REPLY_LEN),
			_ => ReplyShape::Terminated,
		}
	}
}

/// How a reply is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
	/// The reply ends with the `#` terminator.
	Terminated,
	/// The reply is exactly this many bytes and carries no terminator.
	FixedLength(usize),
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn position_arguments_are_zero_padded_to_nine_digits() {
		assert_eq!(
			Command::SetTargetPosition(5000).encode().as_str(),
			":SN000005000#"
		);
		assert_eq!(Command::SyncPosition(0).encode().as_str(), ":SP000000000#");
		assert_eq!(
			Command::SetTargetPosition(999_999_999).encode().as_str(),
			":SN999999999#"
		);
	}

	#[test]
	fn other_arguments_are_plain_decimal() {
		assert_eq!(Command::SetSpeed(200_000).encode().as_str(), ":SD200000#");
		assert_eq!(Command::SetStepMode(4).encode().as_str(), ":SM4#");
		assert_eq!(
			Command::SetTemperatureCoefficient(-5).encode().as_str(),
			":SC-5#"
		);
		assert_eq!(
			Command::SetTemperatureCalibration(3).encode().as_str(),
			":SO3#"
		);
	}

	#[test]
	fn flag_arguments_encode_as_zero_or_one() {
		assert_eq!(Command::SetCoilPower(true).encode().as_str(), ":SE1#");
		assert_eq!(Command::SetCoilPower(false).encode().as_str(), ":SE0#");
		assert_eq!(Command::SetReverse(true).encode().as_str(), ":SR1#");
		assert_eq!(Command::SetReverse(false).encode().as_str(), ":SR0#");
	}

	#[test]
	fn temperature_compensation_is_a_bare_sign_frame() {
		assert_eq!(
			Command::SetTemperatureCompensation(true).encode().as_str(),
			":+#"
		);
		assert_eq!(
			Command::SetTemperatureCompensation(false).encode().as_str(),
			":-#"
		);
	}

	#[test]
	fn argumentless_commands() {
		assert_eq!(Command::StartMotion.encode().as_str(), ":FG#");
		assert_eq!(Command::Abort.encode().as_str(), ":FQ#");
		assert_eq!(Command::GoHome.encode().as_str(), ":HO#");
	}

	#[test]
	fn query_frames() {
		assert_eq!(Command::Query(Query::Position).encode().as_str(), ":GP#");
		assert_eq!(Command::Query(Query::IsMoving).encode().as_str(), ":GI#");
		assert_eq!(Command::Query(Query::Version).encode().as_str(), ":GV#");
	}

	#[test]
	fn version_reply_is_fixed_length() {
		assert_eq!(
			Query::Version.reply_shape(),
			ReplyShape::FixedLength(VERSION_REPLY_LEN)
		);
		assert_eq!(Query::Position.reply_shape(), ReplyShape::Terminated);
	}

	#[test]
	fn opcode_names() {
		assert_eq!(opcode::name("SN"), Some("Set Target Position"));
		assert_eq!(opcode::name("GI"), Some("Get Moving State"));
		assert_eq!(opcode::name("XX"), None);
	}
}
