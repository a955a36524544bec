//! A port for exchanging AstroStep request and reply frames.
//!
//! A [`Port`] owns the backend and executes one exchange at a time: the
//! protocol has no request IDs, so at most one command may ever be in flight.
//! Stale input is discarded before every write and after every successful
//! read so a previously timed-out exchange cannot misalign the next one.

#[cfg(any(test, feature = "mock"))]
use crate::backend::Mock;
use crate::{
	backend::{Backend, Serial, UNKNOWN_BACKEND_NAME},
	error::{MalformedReplyError, PortError},
	protocol::{Command, Query, ReplyShape},
};
use serialport as sp;
use std::{
	io,
	net::{TcpStream, ToSocketAddrs},
	time::Duration,
};

/// The per-read timeout the firmware documents (3 seconds).
///
/// Timeouts are hard and fixed, and apply per I/O operation.
const READ_TIMEOUT: Duration = Duration::from_secs(3);

/// The longest well-formed reply the firmware can produce.
const REPLY_BUFFER_LEN: usize = 32;

/// Options for configuring and opening a serial port.
///
/// ## Example
///
/// ```rust
/// # use astrostep::port::OpenSerialOptions;
/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// let mut port = OpenSerialOptions::new()
///     .baud_rate(115_200)
///     .open("/dev/ttyUSB0")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OpenSerialOptions {
	/// The custom baud rate
	baud_rate: u32,
}

impl OpenSerialOptions {
	/// The default baud rate for AstroStep controllers.
	const DEFAULT_BAUD_RATE: u32 = 9_600;

	/// Create a blank set of options ready for configuration.
	///
	/// The default baud rate is 9,600. The read timeout is always the
	/// protocol's fixed 3 seconds.
	///
	/// Equivalent to [`default`](OpenSerialOptions::default).
	pub fn new() -> Self {
		OpenSerialOptions {
			baud_rate: OpenSerialOptions::DEFAULT_BAUD_RATE,
		}
	}

	/// Set a custom baud rate.
	pub fn baud_rate(&mut self, baud_rate: u32) -> &mut Self {
		self.baud_rate = baud_rate;
		self
	}

	/// Open a [`Serial`] port configured for the AstroStep protocol at the specified path.
	fn open_serial_port(&self, path: &str) -> Result<Serial, PortError> {
		// Due to https://gitlab.com/susurrus/serialport-rs/-/issues/102, the
		// baud rate passed to new is ignored. It must be defined using the
		// baud_rate method below. Use the default baud_rate as it should be a
		// valid baud rate.
		sp::new(path, OpenSerialOptions::DEFAULT_BAUD_RATE)
			.data_bits(sp::DataBits::Eight)
			.parity(sp::Parity::None)
			.flow_control(sp::FlowControl::None)
			.stop_bits(sp::StopBits::One)
			.timeout(READ_TIMEOUT)
			.baud_rate(self.baud_rate)
			.open_native()
			.map(Serial)
			.map_err(Into::into)
	}

	/// Open the port at the specified path with the custom options.
	pub fn open(&self, path: &str) -> Result<Port<Serial>, PortError> {
		Ok(Port::from_backend(self.open_serial_port(path)?))
	}

	/// Open the port at the specified path with the custom options.
	///
	/// The type of the underlying backend is erased via dynamic dispatch,
	/// which does have runtime overhead. [`open`](OpenSerialOptions::open)
	/// should generally be used instead, except when the type of the underlying
	/// backend may not be known at compile time.
	pub fn open_dyn(&self, path: &str) -> Result<Port<Box<dyn Backend>>, PortError> {
		Ok(Port::from_backend(Box::new(self.open_serial_port(path)?)))
	}
}

impl Default for OpenSerialOptions {
	fn default() -> Self {
		OpenSerialOptions::new()
	}
}

/// Options for configuring and opening a TCP port.
///
/// ## Example
///
/// ```rust
/// # use astrostep::port::OpenTcpOptions;
/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// let mut port = OpenTcpOptions::new().open("192.168.0.1:9999")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OpenTcpOptions {}

impl OpenTcpOptions {
	/// Create a blank set of options ready for configuration.
	///
	/// The read timeout is always the protocol's fixed 3 seconds.
	pub fn new() -> Self {
		OpenTcpOptions {}
	}

	/// Open a [`TcpStream`] configured for the AstroStep protocol at the specified address.
	fn open_tcp_stream<A: ToSocketAddrs>(&self, address: A) -> io::Result<TcpStream> {
		let stream = TcpStream::connect(address)?;
		stream.set_read_timeout(Some(READ_TIMEOUT))?;
		Ok(stream)
	}

	/// Open the port at the specified address with the custom options.
	pub fn open<A: ToSocketAddrs>(&self, address: A) -> io::Result<Port<TcpStream>> {
		Ok(Port::from_backend(self.open_tcp_stream(address)?))
	}

	/// Open the port at the specified address with the custom options.
	///
	/// The type of the underlying backend is erased via dynamic dispatch,
	/// which does have runtime overhead. [`open`](OpenTcpOptions::open) should
	/// generally be used instead, except when the type of the underlying
	/// backend may not be known at compile time.
	pub fn open_dyn<A: ToSocketAddrs>(&self, address: A) -> io::Result<Port<Box<dyn Backend>>> {
		Ok(Port::from_backend(Box::new(self.open_tcp_stream(address)?)))
	}
}

impl Default for OpenTcpOptions {
	fn default() -> Self {
		OpenTcpOptions::new()
	}
}

/// A port for transmitting AstroStep commands and receiving their replies.
///
/// See the [`port`](crate::port) module documentation for the session
/// discipline a `Port` enforces.
#[derive(Debug)]
pub struct Port<B> {
	/// The backend to transmit/receive commands with
	backend: B,
}

impl Port<Serial> {
	/// Open the serial port at the specified path using the default options.
	///
	/// Alternatively, use [`OpenSerialOptions`] to customize how the port is opened.
	///
	/// ## Example
	///
	/// ```rust
	/// # use astrostep::port::Port;
	/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
	/// let mut port = Port::open_serial("/dev/ttyUSB0")?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn open_serial(path: &str) -> Result<Port<Serial>, PortError> {
		OpenSerialOptions::new().open(path)
	}
}

impl Port<TcpStream> {
	/// Open the TCP port at the specified address using the default options.
	///
	/// Alternatively, use [`OpenTcpOptions`] to customize how the port is opened.
	///
	/// ## Example
	///
	/// ```rust
	/// # use astrostep::port::Port;
	/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
	/// let mut port = Port::open_tcp("192.168.0.1:9999")?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn open_tcp<A: ToSocketAddrs>(address: A) -> Result<Port<TcpStream>, io::Error> {
		OpenTcpOptions::new().open(address)
	}
}

#[cfg(any(test, feature = "mock"))]
impl Port<Mock> {
	/// Open a mock port.
	pub fn open_mock() -> Port<Mock> {
		Port::from_backend(Mock::new())
	}
}

impl<B: Backend> Port<B> {
	/// Get a `Port` from the given backend.
	fn from_backend(backend: B) -> Port<B> {
		Port { backend }
	}

	/// Get exclusive access to the underlying backend, for staging test data.
	#[cfg(any(test, feature = "mock"))]
	pub fn backend_mut(&mut self) -> &mut B {
		&mut self.backend
	}

	/// The name of the underlying backend, for logging.
	fn name(&self) -> String {
		self.backend
			.name()
			.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string())
	}

	/// Transmit a command that elicits no reply (fire-and-forget).
	///
	/// Motion and settings commands fall in this category: the firmware
	/// acknowledges nothing, so a successful write is all there is to see.
	pub fn command(&mut self, command: &Command) -> Result<(), PortError> {
		self.transmit(command)
	}

	/// Transmit a query and receive its raw reply payload.
	///
	/// The reply is read either up to and including the `#` terminator or,
	/// for the version query, by its fixed byte count. On success the
	/// channel is flushed again to guarantee frame alignment for the next
	/// exchange.
	pub fn query(&mut self, query: Query) -> Result<Vec<u8>, PortError> {
		self.transmit(&Command::Query(query))?;
		let reply = match query.reply_shape() {
			ReplyShape::Terminated => self.read_terminated()?,
			ReplyShape::FixedLength(len) => self.read_fixed(len)?,
		};
		log::debug!("{} RX: {}", self.name(), String::from_utf8_lossy(&reply));
		self.backend.discard_buffers()?;
		Ok(reply)
	}

	/// Write a single frame, discarding any stale input first.
	fn transmit(&mut self, command: &Command) -> Result<(), PortError> {
		self.backend.discard_buffers()?;
		let frame = command.encode();
		log::debug!("{} TX: {}", self.name(), frame);
		self.backend.write_all(frame.as_bytes())?;
		self.backend.flush()?;
		Ok(())
	}

	/// Read a reply up to and including the `#` terminator.
	fn read_terminated(&mut self) -> Result<Vec<u8>, PortError> {
		let mut reply = Vec::with_capacity(REPLY_BUFFER_LEN);
		let mut byte = [0u8; 1];
		loop {
			self.backend.read_exact(&mut byte)?;
			reply.push(byte[0]);
			if byte[0] == b'#' {
				break;
			}
			if reply.len() == REPLY_BUFFER_LEN {
				return Err(MalformedReplyError::new(&reply).into());
			}
		}
		Ok(reply)
	}

	/// Read a reply of exactly `len` bytes (the version-query quirk).
	fn read_fixed(&mut self, len: usize) -> Result<Vec<u8>, PortError> {
		let mut reply = vec![0u8; len];
		self.backend.read_exact(&mut reply)?;
		Ok(reply)
	}
}
