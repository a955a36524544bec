//! Error types.
//!
//! Each error is represented by a unique type that implements [`std::error::Error`].
//! However, most APIs return more than one kind of error and so will return one
//! of the higher level [enums](#enums), such as [`PortError`], [`MotionError`],
//! or [`Error`]. Where appropriate, the error types are convertible to the
//! higher level enums, allowing them to be used with `?`:
//!
//! ```
//! use astrostep::error::{Error, PortError};
//!
//! fn foo() -> Result<(), PortError> {
//!     // ...
//! # unimplemented!();
//! }
//!
//! fn bar() -> Result<(), Error> {
//!     foo()?;
//!     // ...
//! # Ok(())
//! }
//! ```

/// Implement Error and Display traits for the specified type.
///
/// Define the format string and any arguments it should reference after
/// `self =>` (to abide by macro hygiene rules).
macro_rules! impl_error_display {
	(
		$name:path,
		$self:ident =>
		$display:literal
		$(,
			$($arg:expr),+
		)?
	) => {
		impl std::error::Error for $name {}

		impl std::fmt::Display for $name {
			fn fmt(&$self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				writeln!(
					f,
					$display
					$(,
						$($arg),+
					)?
				)
			}
		}
	};
}

macro_rules! impl_is_timeout {
	($name:ident) => {
		impl $name {
			/// A convenience function for determining if the error is due to the
			/// port timing out.
			pub fn is_timeout(&self) -> bool {
				matches!(self, $name::Io(e) if e.kind() == std::io::ErrorKind::TimedOut)
			}
		}
	};
}

macro_rules! impl_from_serialport_error {
	($name:ident) => {
		impl From<serialport::Error> for $name {
			fn from(other: serialport::Error) -> Self {
				use std::io;

				match other.kind() {
					serialport::ErrorKind::NoDevice => $name::SerialDeviceInUseOrDisconnected(
						SerialDeviceInUseOrDisconnectedError(other.description.into_boxed_str()),
					),
					serialport::ErrorKind::InvalidInput => $name::Io(io::Error::new(
						io::ErrorKind::InvalidInput,
						other.description,
					)),
					serialport::ErrorKind::Unknown => {
						$name::Io(io::Error::new(io::ErrorKind::Other, other.description))
					}
					serialport::ErrorKind::Io(kind) => {
						$name::Io(io::Error::new(kind, other.description))
					}
				}
			}
		}
	};
}

/// Define error enums that contain concrete error types (not other error enums).
///
/// From and TryFrom traits will be implemented for the enum and it's underlying
/// errors. The enum's Display implementation will defer to the underlying errors'
/// Display implementations.
///
/// Simple implementations of From and TryFrom with other error enums can be
/// added by appending a succinct impl block, which assumes that:
///   * it is being implemented for this error enum,
///   * each variant has a single tuple value, and can be converted to the value
///     in this enum with its own From implementation.
macro_rules! error_enum {
	(
		$(#[$attr:meta])*
		pub enum $name:ident {
			$(
				$variant:ident($inner:path)
			),+
			$(,)?
		}
		// Additional information for From/TryFrom impl blocks.
		$(
			impl From<$from_t:ident>
			{
				$($from_variant:ident => $to_variant:ident),+
				$(,)?
			}
		)*
	) => {
		// Define the error enum itself
		$(
			#[$attr]
		)*
		#[allow(missing_docs)]
		pub enum $name {
			$(
				$variant($inner)
			),+
		}

		impl std::error::Error for $name {}

		// Defer the display to the inner error type
		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				match self {
					$(
						$name::$variant(e) => e.fmt(f)
					),+
				}
			}
		}

		// Allow the enum to be convertible from an infallible error
		impl From<std::convert::Infallible> for $name {
			fn from(_: std::convert::Infallible) -> Self {
				unreachable!();
			}
		}

		// Conversions with underlying errors
		$(
			impl From<$inner> for $name {
				fn from(other: $inner) -> Self {
					$name::$variant(other)
				}
			}

			impl TryFrom<$name> for $inner {
				type Error = $name;
				fn try_from(other: $name) -> Result<Self, Self::Error> {
					match other {
						$name::$variant(value) => Ok(value),
						// Unreachable for single-variant enums.
						#[allow(unreachable_patterns)]
						value => Err(value)
					}
				}
			}
		)+

		// Conversions from other enum errors
		$(
			impl From<$from_t> for $name {
				fn from(other: $from_t) -> Self {
					match other {
						$($from_t::$from_variant(e) => $name::$to_variant(From::from(e))),+
					}
				}
			}

			impl TryFrom<$name> for $from_t {
				type Error = $name;
				fn try_from(other: $name) -> Result<Self, Self::Error> {
					match other {
						$(
							$name::$to_variant(e) => Ok($from_t::$from_variant(From::from(e))),
						)+
						_ => Err(other)
					}
				}
			}
		)*
	};
}

/// The specified device is either disconnected or already in use by another process.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SerialDeviceInUseOrDisconnectedError(Box<str>);

impl_error_display! {
	SerialDeviceInUseOrDisconnectedError,
	self =>
	"the specified device is either disconnected or already in use by another process: {}", self.0
}

/// A reply did not match the numeric or flag pattern the query expects.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MalformedReplyError(Box<str>);

impl_error_display! {
	MalformedReplyError,
	self =>
	"the reply does not match the expected pattern: {:?}", self.0
}

impl MalformedReplyError {
	/// Create a new error from the offending reply bytes.
	pub(crate) fn new(reply: &[u8]) -> Self {
		MalformedReplyError(String::from_utf8_lossy(reply).into_owned().into_boxed_str())
	}

	/// Get the offending reply, lossily converted to text.
	pub fn reply(&self) -> &str {
		&self.0
	}
}

/// The device never answered the version query within the handshake retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceUnresponsiveError(u8);

impl_error_display! {
	DeviceUnresponsiveError,
	self =>
	"the device did not respond to any of {} version queries", self.0
}

impl DeviceUnresponsiveError {
	/// Create a new error recording the number of attempts made.
	pub(crate) const fn new(attempts: u8) -> Self {
		DeviceUnresponsiveError(attempts)
	}

	/// The number of version queries that went unanswered.
	pub fn attempts(&self) -> u8 {
		self.0
	}
}

/// An I/O error occurred while issuing a motion command.
#[derive(Debug)]
pub struct DeviceUnreachableError(PortError);

impl_error_display! {
	DeviceUnreachableError,
	self =>
	"the device could not be reached: {}", self.0
}

impl DeviceUnreachableError {
	/// Create a new error from the underlying port error.
	pub(crate) const fn new(cause: PortError) -> Self {
		DeviceUnreachableError(cause)
	}

	/// Get the underlying port error.
	pub fn port_error(&self) -> &PortError {
		&self.0
	}
}

impl From<DeviceUnreachableError> for PortError {
	fn from(other: DeviceUnreachableError) -> Self {
		other.0
	}
}

error_enum! {
	/// Any error raised during a single command/reply exchange with the device.
	#[derive(Debug)]
	#[non_exhaustive]
	pub enum PortError {
		SerialDeviceInUseOrDisconnected(SerialDeviceInUseOrDisconnectedError),
		Io(std::io::Error),
		Malformed(MalformedReplyError),
	}
}
impl_is_timeout! { PortError }
impl_from_serialport_error! { PortError }

impl PortError {
	/// A convenience function for determining if the error occurred at the I/O
	/// boundary, as opposed to while decoding a reply.
	pub fn is_io(&self) -> bool {
		matches!(self, PortError::Io(_))
	}
}

error_enum! {
	/// Any error raised while establishing contact with the device.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	#[non_exhaustive]
	pub enum HandshakeError {
		Unresponsive(DeviceUnresponsiveError),
	}
}

error_enum! {
	/// Any error raised while issuing a motion command (move, sync, or abort).
	#[derive(Debug)]
	#[non_exhaustive]
	pub enum MotionError {
		DeviceUnreachable(DeviceUnreachableError),
	}
}

impl From<PortError> for MotionError {
	fn from(other: PortError) -> Self {
		MotionError::DeviceUnreachable(DeviceUnreachableError::new(other))
	}
}

error_enum! {
	/// Any error returned by this library.
	#[derive(Debug)]
	#[non_exhaustive]
	pub enum Error {
		SerialDeviceInUseOrDisconnected(SerialDeviceInUseOrDisconnectedError),
		Io(std::io::Error),
		Malformed(MalformedReplyError),
		Unresponsive(DeviceUnresponsiveError),
		Unreachable(DeviceUnreachableError),
	}

	impl From<PortError> {
		SerialDeviceInUseOrDisconnected => SerialDeviceInUseOrDisconnected,
		Io => Io,
		Malformed => Malformed,
	}

	impl From<HandshakeError> {
		Unresponsive => Unresponsive,
	}

	impl From<MotionError> {
		DeviceUnreachable => Unreachable,
	}
}
impl_is_timeout! { Error }
impl_from_serialport_error! { Error }

#[cfg(test)]
mod test {
	use super::*;
	use static_assertions::{assert_impl_all, const_assert};

	// Make sure the error enums stay small. This minimizes the size of
	// Result<T, Error> on every exchange.
	const _WORD_SIZE: usize = std::mem::size_of::<&usize>();
	const_assert!(std::mem::size_of::<PortError>() <= 3 * _WORD_SIZE);
	const_assert!(std::mem::size_of::<Error>() <= 4 * _WORD_SIZE);

	assert_impl_all!(Error: From<PortError>, From<HandshakeError>, From<MotionError>);
	assert_impl_all!(PortError: TryFrom<Error>);

	#[test]
	fn timeout_classification() {
		let err = PortError::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "oops"));
		assert!(err.is_timeout());
		assert!(err.is_io());

		let err = PortError::from(MalformedReplyError::new(b"abc#"));
		assert!(!err.is_timeout());
		assert!(!err.is_io());
	}

	#[test]
	fn malformed_reply_is_retrievable() {
		let err = MalformedReplyError::new(b"abc#");
		assert_eq!(err.reply(), "abc#");
	}

	#[test]
	fn unresponsive_records_attempts() {
		let err = DeviceUnresponsiveError::new(3);
		assert_eq!(err.attempts(), 3);
	}

	#[test]
	fn single_variant_enums_convert_both_ways() {
		let err: HandshakeError = DeviceUnresponsiveError::new(3).into();
		let inner = DeviceUnresponsiveError::try_from(err).unwrap();
		assert_eq!(inner.attempts(), 3);

		let err: MotionError = PortError::from(MalformedReplyError::new(b"abc#")).into();
		let inner = DeviceUnreachableError::try_from(err).unwrap();
		assert!(matches!(inner.port_error(), PortError::Malformed(_)));
	}
}
