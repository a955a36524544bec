//! Parsers for AstroStep reply payloads.
//!
//! Replies are bare ASCII terminated by `#`, with no opcode echo and no
//! checksum, so each parser here only has to recognize one numeric or flag
//! pattern. Anything that does not match fails with a
//! [`MalformedReplyError`] so callers can leave their state untouched.

use crate::error::MalformedReplyError;

/// Interpret the reply as ASCII text.
fn ascii(bytes: &[u8]) -> Result<&str, MalformedReplyError> {
	std::str::from_utf8(bytes).map_err(|_| MalformedReplyError::new(bytes))
}

/// Parse an unsigned integer reply (`<int>#`), such as a position or speed.
///
/// Leading zeros are accepted: the firmware is known to emit both `1#` and
/// `01#` style payloads.
pub fn integer(bytes: &[u8]) -> Result<u32, MalformedReplyError> {
	let text = ascii(bytes)?;
	let end = text
		.find(|c: char| !c.is_ascii_digit())
		.unwrap_or(text.len());
	text[..end]
		.parse::<u32>()
		.map_err(|_| MalformedReplyError::new(bytes))
}

/// Parse a signed fixed-point reply (`<int>.<int>#`), such as a temperature.
///
/// The firmware omits the fractional part for whole values, so the bare
/// `<int>#` form is accepted as well.
pub fn fixed_point(bytes: &[u8]) -> Result<f32, MalformedReplyError> {
	let text = ascii(bytes)?;
	let raw = text.as_bytes();
	let mut end = usize::from(matches!(raw.first(), Some(b'+' | b'-')));
	let int_start = end;
	while end < raw.len() && raw[end].is_ascii_digit() {
		end += 1;
	}
	if end == int_start {
		return Err(MalformedReplyError::new(bytes));
	}
	if end < raw.len() && raw[end] == b'.' {
		let frac_start = end + 1;
		let mut frac_end = frac_start;
		while frac_end < raw.len() && raw[frac_end].is_ascii_digit() {
			frac_end += 1;
		}
		if frac_end > frac_start {
			end = frac_end;
		}
	}
	text[..end]
		.parse::<f32>()
		.map_err(|_| MalformedReplyError::new(bytes))
}

/// Parse a boolean flag reply.
///
/// Firmware versions disagree on the exact payload: `0#`, `1#`, and `01#`
/// have all been observed for the same state. Any reply containing `1#` is
/// true and any reply containing `0#` is false, checked in that order, which
/// matches the behavior of every firmware seen so far.
pub fn flag(bytes: &[u8]) -> Result<bool, MalformedReplyError> {
	let text = ascii(bytes)?;
	if text.contains("1#") {
		Ok(true)
	} else if text.contains("0#") {
		Ok(false)
	} else {
		Err(MalformedReplyError::new(bytes))
	}
}

/// Interpret a version reply.
///
/// The version reply is an opaque firmware string with no terminator, so any
/// byte sequence is accepted. Surrounding whitespace is dropped.
pub fn version(bytes: &[u8]) -> String {
	String::from_utf8_lossy(bytes).trim().to_string()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn integer_replies() {
		assert_eq!(integer(b"5000#").unwrap(), 5000);
		assert_eq!(integer(b"0#").unwrap(), 0);
		assert_eq!(integer(b"999999999#").unwrap(), 999_999_999);
		// Leading zeros are an accepted firmware inconsistency.
		assert_eq!(integer(b"01#").unwrap(), 1);
	}

	#[test]
	fn integer_round_trips_through_the_wire_format() {
		// The reply for position P is the decimal rendering of P plus the
		// terminator; parsing must recover P across the whole position range.
		for position in [0u32, 1, 5000, 123_456_789, 999_999_999] {
			let reply = format!("{position}#");
			assert_eq!(integer(reply.as_bytes()).unwrap(), position);
		}
	}

	#[test]
	fn malformed_integer_replies() {
		assert!(integer(b"abc#").is_err());
		assert!(integer(b"#").is_err());
		assert!(integer(b"").is_err());
		// Too large for a position.
		assert!(integer(b"9999999999#").is_err());
	}

	#[test]
	fn fixed_point_replies() {
		assert_eq!(fixed_point(b"23.5#").unwrap(), 23.5);
		assert_eq!(fixed_point(b"-2.25#").unwrap(), -2.25);
		assert_eq!(fixed_point(b"0.0#").unwrap(), 0.0);
		// The whole-number form is also emitted by the firmware.
		assert_eq!(fixed_point(b"15#").unwrap(), 15.0);
		assert_eq!(fixed_point(b"-40#").unwrap(), -40.0);
	}

	#[test]
	fn malformed_fixed_point_replies() {
		assert!(fixed_point(b"abc#").is_err());
		assert!(fixed_point(b"-#").is_err());
		assert!(fixed_point(b"").is_err());
	}

	#[test]
	fn flag_replies_accept_both_firmware_forms() {
		assert!(flag(b"1#").unwrap());
		assert!(flag(b"01#").unwrap());
		assert!(!flag(b"0#").unwrap());
		assert!(!flag(b"00#").unwrap());
	}

	#[test]
	fn malformed_flag_replies() {
		assert!(flag(b"2#").is_err());
		assert!(flag(b"1").is_err());
		assert!(flag(b"").is_err());
	}

	#[test]
	fn version_replies_are_opaque() {
		assert_eq!(version(b"2.92"), "2.92");
		assert_eq!(version(b"292 "), "292");
	}
}
