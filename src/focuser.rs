//! The focuser state machine: authoritative device state and the move lifecycle.
//!
//! A [`Focuser`] owns a [`Port`] and layers two things on top of it: the
//! software state that must stay consistent with the physical device
//! (position, motion, temperature, settings), and the asynchronous move
//! lifecycle (issue a move, poll position, detect completion or expiry).
//!
//! The device reports nothing unprompted, so position and motion state are
//! refreshed by calling [`poll_tick`](Focuser::poll_tick) periodically. The
//! [`monitor`](crate::monitor) module provides a loop that does this.

use crate::{
	backend::Backend,
	error::{DeviceUnresponsiveError, HandshakeError, MotionError, PortError},
	port::Port,
	protocol::{reply, Command, Query},
};
use std::time::{Duration, Instant};

/// The number of version queries the handshake makes before giving up.
const HANDSHAKE_ATTEMPTS: u8 = 3;

/// The pause between handshake attempts, giving a freshly powered device
/// time to boot.
const HANDSHAKE_PAUSE: Duration = Duration::from_secs(1);

/// The smallest position delta (in steps) reported as a change by
/// [`Focuser::poll_tick`]. Smaller deltas are device jitter.
pub const POSITION_HYSTERESIS: u32 = 5;

/// The smallest temperature delta (in °C) reported as a change by
/// [`Focuser::poll_tick`].
pub const TEMPERATURE_HYSTERESIS: f32 = 0.5;

/// The default maximum position, in steps.
pub const DEFAULT_MAX_POSITION: u32 = 1_000_000;

/// Whether the motor coils are energized while the focuser is idle.
///
/// Keeping the coils powered holds position against gravity at the cost of
/// heat; releasing them avoids the heat but the drawtube can slip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoilPower {
	/// Coils stay energized between moves.
	On,
	/// Coils are released between moves.
	Off,
}

/// Direction of a relative or timed move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	/// Toward the minimum position.
	Inward,
	/// Toward the maximum position.
	Outward,
}

/// Idle/Busy/Alert classification of the focuser's current motion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
	/// No move is in flight.
	Idle,
	/// A move has been issued and the device has not yet reported it done.
	Busy,
	/// The last move could not be issued.
	Alert,
}

/// A snapshot of the software state tracking the physical device.
///
/// `current_position` and `is_moving` are only ever updated from a
/// successfully decoded device reply, never speculatively. `target_position`
/// is set as soon as a move is issued.
#[derive(Debug, Clone, PartialEq)]
pub struct FocuserState {
	/// The last position read back from the device, in steps.
	pub current_position: u32,
	/// The position the last issued move is heading toward, in steps.
	pub target_position: u32,
	/// Whether the device last reported itself as moving.
	pub is_moving: bool,
	/// The motor speed.
	pub speed: u32,
	/// The probe temperature, in °C.
	pub temperature: f32,
	/// The temperature calibration offset.
	pub temperature_calibration: f32,
	/// The temperature coefficient, in steps per degree.
	pub temperature_coefficient: f32,
	/// Whether temperature compensation is enabled.
	pub temperature_compensation: bool,
	/// Whether the motor coils are energized between moves.
	pub coil_power: CoilPower,
	/// Whether the motor direction is reversed.
	pub reversed: bool,
	/// The firmware version string reported during the handshake.
	pub firmware_version: String,
}

impl Default for FocuserState {
	fn default() -> Self {
		FocuserState {
			current_position: 0,
			target_position: 0,
			is_moving: false,
			speed: 0,
			temperature: 0.0,
			temperature_calibration: 0.0,
			temperature_coefficient: 0.0,
			temperature_compensation: false,
			coil_power: CoilPower::Off,
			reversed: false,
			firmware_version: String::new(),
		}
	}
}

/// What a single [`poll_tick`](Focuser::poll_tick) observed.
///
/// Position and temperature changes are filtered through a hysteresis
/// threshold to avoid flooding callers with device jitter; the authoritative
/// values in [`FocuserState`] are always the last raw reads.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PollReport {
	/// The new position, if it moved beyond the hysteresis threshold.
	pub position_changed: Option<u32>,
	/// The new temperature, if it drifted beyond the hysteresis threshold.
	pub temperature_changed: Option<f32>,
	/// Whether an in-flight move was observed to complete on this tick.
	pub move_completed: bool,
	/// Whether a timed move's deadline expired and was aborted on this tick.
	pub timed_move_ended: bool,
}

/// A connected AstroStep focuser.
///
/// See the [module](crate::focuser) documentation for an overview.
#[derive(Debug)]
pub struct Focuser<B> {
	/// The port all exchanges go through.
	port: Port<B>,
	/// The authoritative software state.
	state: FocuserState,
	/// Where the focuser is in the move lifecycle.
	phase: MotionPhase,
	/// The smallest position callers may move to.
	min_position: u32,
	/// The largest position callers may move to.
	max_position: u32,
	/// The position last reported through a poll, for hysteresis.
	last_reported_position: u32,
	/// The temperature last reported through a poll, for hysteresis.
	last_reported_temperature: f32,
	/// When the pending timed move must be aborted, if one is pending.
	timed_move_deadline: Option<Instant>,
}

impl<B: Backend> Focuser<B> {
	/// Wrap a port in a new focuser with the default position limits
	/// (`0..=`[`DEFAULT_MAX_POSITION`]).
	pub fn new(port: Port<B>) -> Focuser<B> {
		Focuser {
			port,
			state: FocuserState::default(),
			phase: MotionPhase::Idle,
			min_position: 0,
			max_position: DEFAULT_MAX_POSITION,
			last_reported_position: 0,
			last_reported_temperature: 0.0,
			timed_move_deadline: None,
		}
	}

	/// Set the position limits relative moves are clamped to.
	pub fn set_limits(&mut self, min_position: u32, max_position: u32) {
		self.min_position = min_position;
		self.max_position = max_position;
	}

	/// The current software state.
	pub fn state(&self) -> &FocuserState {
		&self.state
	}

	/// Where the focuser is in the move lifecycle.
	pub fn phase(&self) -> MotionPhase {
		self.phase
	}

	/// Get exclusive access to the underlying port, for staging test data.
	#[cfg(any(test, feature = "mock"))]
	pub fn port_mut(&mut self) -> &mut Port<B> {
		&mut self.port
	}

	/// Establish contact with the device.
	///
	/// A freshly powered controller may not answer immediately, so the
	/// version query is retried up to 3 times with a one second pause
	/// between attempts. The first decodable version string wins; after
	/// that every device parameter is read into the local state (individual
	/// read failures are logged and skipped). This is the only operation in
	/// the crate that retries internally.
	pub fn handshake(&mut self) -> Result<(), HandshakeError> {
		for attempt in 1..=HANDSHAKE_ATTEMPTS {
			match self.read_version() {
				Ok(version) => {
					log::info!("focuser online, firmware version {version}");
					self.state.firmware_version = version;
					self.refresh();
					return Ok(());
				}
				Err(err) => {
					log::warn!("handshake attempt {attempt} failed: {err}");
				}
			}
			if attempt < HANDSHAKE_ATTEMPTS {
				std::thread::sleep(HANDSHAKE_PAUSE);
			}
		}
		Err(DeviceUnresponsiveError::new(HANDSHAKE_ATTEMPTS).into())
	}

	/// Read every device parameter into the local state.
	///
	/// Each value is read independently; a failed read is logged and the
	/// corresponding state field is left unchanged.
	pub fn refresh(&mut self) {
		if let Err(err) = self.read_position() {
			log::warn!("could not read position: {err}");
		}
		self.last_reported_position = self.state.current_position;
		if let Err(err) = self.read_temperature() {
			log::warn!("could not read temperature: {err}");
		}
		self.last_reported_temperature = self.state.temperature;
		if let Err(err) = self.read_speed() {
			log::warn!("could not read speed: {err}");
		}
		if let Err(err) = self.read_coil_power() {
			log::warn!("could not read coil power: {err}");
		}
		if let Err(err) = self.read_temperature_calibration() {
			log::warn!("could not read temperature calibration: {err}");
		}
		if let Err(err) = self.read_temperature_coefficient() {
			log::warn!("could not read temperature coefficient: {err}");
		}
		if let Err(err) = self.read_reverse() {
			log::warn!("could not read reverse direction: {err}");
		}
	}

	/// Move to an absolute position.
	///
	/// The target is not clamped: callers are expected to respect the
	/// configured limits (relative moves clamp on their behalf). On success
	/// the target is recorded and the focuser is [`Busy`](MotionPhase::Busy)
	/// until a poll observes the device at rest.
	pub fn move_absolute(&mut self, target: u32) -> Result<MotionPhase, MotionError> {
		// A new move supersedes any pending timed-move abort.
		self.timed_move_deadline = None;
		if let Err(err) = self.issue_move(target) {
			self.phase = MotionPhase::Alert;
			return Err(err.into());
		}
		self.state.target_position = target;
		self.phase = MotionPhase::Busy;
		Ok(MotionPhase::Busy)
	}

	/// Move by `ticks` steps in `direction`.
	///
	/// The resulting target is clamped to the configured position limits,
	/// then issued as an absolute move.
	pub fn move_relative(&mut self, direction: Direction, ticks: u32) -> Result<MotionPhase, MotionError> {
		let offset = match direction {
			Direction::Inward => -i64::from(ticks),
			Direction::Outward => i64::from(ticks),
		};
		let target = (i64::from(self.state.current_position) + offset)
			.clamp(i64::from(self.min_position), i64::from(self.max_position));
		self.move_absolute(target as u32)
	}

	/// Move in `direction` at `speed` for `duration`, then stop.
	///
	/// The firmware's only motion primitive is "move to an absolute
	/// position", so this issues an open-ended move toward the extreme
	/// position in the requested direction and arms a one-shot deadline.
	/// The next [`poll_tick`](Focuser::poll_tick) at or after the deadline
	/// aborts the move and resets the motion status. Issuing any other
	/// motion command first cancels the pending deadline.
	pub fn move_timed(
		&mut self,
		direction: Direction,
		speed: u32,
		duration: Duration,
	) -> Result<MotionPhase, MotionError> {
		if speed != self.state.speed {
			self.set_speed(speed)?;
		}
		let target = match direction {
			Direction::Inward => self.min_position,
			Direction::Outward => self.max_position,
		};
		self.move_absolute(target)?;
		self.timed_move_deadline = Some(Instant::now() + duration);
		Ok(MotionPhase::Busy)
	}

	/// Relabel the device's current physical position as `position` without
	/// moving.
	///
	/// The firmware sends no confirmation for this command, so the local
	/// position is updated optimistically after a successful write and
	/// re-validated by the next poll. A short window of staleness is an
	/// accepted risk.
	pub fn sync(&mut self, position: u32) -> Result<(), MotionError> {
		self.command(&Command::SyncPosition(position))?;
		self.state.current_position = position;
		self.last_reported_position = position;
		Ok(())
	}

	/// Abort any motion in progress.
	///
	/// Always safe to call, including while idle: repeated aborts change
	/// nothing but the moving flag. Cancels any pending timed move.
	pub fn abort(&mut self) -> Result<(), MotionError> {
		self.timed_move_deadline = None;
		self.command(&Command::Abort)?;
		self.state.is_moving = false;
		self.phase = MotionPhase::Idle;
		Ok(())
	}

	/// Move to the home position.
	///
	/// If the device reports that it is moving, the motion is aborted first.
	/// Cancels any pending timed move either way.
	pub fn go_home(&mut self) -> Result<(), MotionError> {
		self.timed_move_deadline = None;
		if let Ok(true) = self.read_is_moving() {
			self.abort()?;
		}
		self.command(&Command::GoHome)?;
		self.phase = MotionPhase::Busy;
		Ok(())
	}

	/// Set the motor speed.
	pub fn set_speed(&mut self, speed: u32) -> Result<(), PortError> {
		self.port.command(&Command::SetSpeed(speed))?;
		self.state.speed = speed;
		Ok(())
	}

	/// Set the motor step mode.
	pub fn set_step_mode(&mut self, mode: u32) -> Result<(), PortError> {
		self.port.command(&Command::SetStepMode(mode))
	}

	/// Energize or release the motor coils between moves.
	pub fn set_coil_power(&mut self, coil_power: CoilPower) -> Result<(), PortError> {
		self.port
			.command(&Command::SetCoilPower(coil_power == CoilPower::On))?;
		self.state.coil_power = coil_power;
		Ok(())
	}

	/// Reverse the motor direction.
	pub fn set_reverse(&mut self, reversed: bool) -> Result<(), PortError> {
		self.port.command(&Command::SetReverse(reversed))?;
		self.state.reversed = reversed;
		Ok(())
	}

	/// Set the temperature calibration offset.
	pub fn set_temperature_calibration(&mut self, calibration: i32) -> Result<(), PortError> {
		self.port
			.command(&Command::SetTemperatureCalibration(calibration))?;
		self.state.temperature_calibration = calibration as f32;
		Ok(())
	}

	/// Set the temperature coefficient.
	pub fn set_temperature_coefficient(&mut self, coefficient: i32) -> Result<(), PortError> {
		self.port
			.command(&Command::SetTemperatureCoefficient(coefficient))?;
		self.state.temperature_coefficient = coefficient as f32;
		Ok(())
	}

	/// Enable or disable temperature compensation.
	pub fn set_temperature_compensation(&mut self, enable: bool) -> Result<(), PortError> {
		self.port
			.command(&Command::SetTemperatureCompensation(enable))?;
		self.state.temperature_compensation = enable;
		Ok(())
	}

	/// Refresh device-derived state and drive the move lifecycle forward.
	///
	/// Re-reads position and temperature, reporting changes through the
	/// hysteresis filter. If a move is in flight and the device reports
	/// itself at rest, the phase transitions back to
	/// [`Idle`](MotionPhase::Idle) and the completion is reported. A failed
	/// read is logged and the corresponding state is left unchanged; polls
	/// are never fatal and the next tick simply tries again.
	pub fn poll_tick(&mut self) -> PollReport {
		let mut report = PollReport::default();

		if let Some(deadline) = self.timed_move_deadline {
			if Instant::now() >= deadline {
				match self.abort() {
					Ok(()) => report.timed_move_ended = true,
					Err(err) => log::warn!("could not end timed move: {err}"),
				}
			}
		}

		match self.read_position() {
			Ok(position) => {
				if position.abs_diff(self.last_reported_position) > POSITION_HYSTERESIS {
					self.last_reported_position = position;
					report.position_changed = Some(position);
				}
			}
			Err(err) => log::warn!("could not read position: {err}"),
		}

		match self.read_temperature() {
			Ok(temperature) => {
				if (temperature - self.last_reported_temperature).abs() >= TEMPERATURE_HYSTERESIS {
					self.last_reported_temperature = temperature;
					report.temperature_changed = Some(temperature);
				}
			}
			Err(err) => log::warn!("could not read temperature: {err}"),
		}

		if self.phase == MotionPhase::Busy {
			match self.read_is_moving() {
				Ok(false) => {
					self.phase = MotionPhase::Idle;
					self.last_reported_position = self.state.current_position;
					report.move_completed = true;
					log::info!("focuser reached requested position");
				}
				Ok(true) => {}
				Err(err) => log::warn!("could not read moving state: {err}"),
			}
		}

		report
	}

	/// Issue the two-frame move sequence: set the target, then start motion.
	fn issue_move(&mut self, target: u32) -> Result<(), PortError> {
		self.port.command(&Command::SetTargetPosition(target))?;
		self.port.command(&Command::StartMotion)
	}

	/// Send a motion command, mapping failures to [`MotionError`].
	fn command(&mut self, command: &Command) -> Result<(), MotionError> {
		self.port.command(command).map_err(MotionError::from)
	}

	fn read_version(&mut self) -> Result<String, PortError> {
		let bytes = self.port.query(Query::Version)?;
		Ok(reply::version(&bytes))
	}

	fn read_position(&mut self) -> Result<u32, PortError> {
		let bytes = self.port.query(Query::Position)?;
		let position = reply::integer(&bytes)?;
		self.state.current_position = position;
		Ok(position)
	}

	fn read_speed(&mut self) -> Result<u32, PortError> {
		let bytes = self.port.query(Query::Speed)?;
		let speed = reply::integer(&bytes)?;
		self.state.speed = speed;
		Ok(speed)
	}

	fn read_temperature(&mut self) -> Result<f32, PortError> {
		let bytes = self.port.query(Query::Temperature)?;
		let temperature = reply::fixed_point(&bytes)?;
		self.state.temperature = temperature;
		Ok(temperature)
	}

	fn read_temperature_calibration(&mut self) -> Result<f32, PortError> {
		let bytes = self.port.query(Query::TemperatureCalibration)?;
		let calibration = reply::fixed_point(&bytes)?;
		self.state.temperature_calibration = calibration;
		Ok(calibration)
	}

	fn read_temperature_coefficient(&mut self) -> Result<f32, PortError> {
		let bytes = self.port.query(Query::TemperatureCoefficient)?;
		let coefficient = reply::fixed_point(&bytes)?;
		self.state.temperature_coefficient = coefficient;
		Ok(coefficient)
	}

	fn read_coil_power(&mut self) -> Result<CoilPower, PortError> {
		let bytes = self.port.query(Query::CoilPower)?;
		let coil_power = if reply::flag(&bytes)? {
			CoilPower::On
		} else {
			CoilPower::Off
		};
		self.state.coil_power = coil_power;
		Ok(coil_power)
	}

	fn read_reverse(&mut self) -> Result<bool, PortError> {
		let bytes = self.port.query(Query::Reverse)?;
		let reversed = reply::flag(&bytes)?;
		self.state.reversed = reversed;
		Ok(reversed)
	}

	fn read_is_moving(&mut self) -> Result<bool, PortError> {
		let bytes = self.port.query(Query::IsMoving)?;
		let moving = reply::flag(&bytes)?;
		self.state.is_moving = moving;
		Ok(moving)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::backend::Mock;

	fn focuser() -> Focuser<Mock> {
		Focuser::new(Port::open_mock())
	}

	#[test]
	fn move_absolute_issues_set_target_then_start() {
		let mut focuser = focuser();
		let phase = focuser.move_absolute(5000).unwrap();
		assert_eq!(phase, MotionPhase::Busy);
		assert_eq!(focuser.phase(), MotionPhase::Busy);
		assert_eq!(focuser.state().target_position, 5000);
		assert_eq!(
			focuser.port_mut().backend_mut().take_written(),
			b":SN000005000#:FG#"
		);
	}

	#[test]
	fn move_absolute_failure_is_an_alert() {
		let mut focuser = focuser();
		focuser
			.port_mut()
			.backend_mut()
			.write_error(Some(std::io::Error::new(
				std::io::ErrorKind::BrokenPipe,
				"unplugged",
			)));
		let err = focuser.move_absolute(5000).unwrap_err();
		assert!(matches!(err, MotionError::DeviceUnreachable(_)));
		assert_eq!(focuser.phase(), MotionPhase::Alert);
		// The target was never accepted by the device.
		assert_eq!(focuser.state().target_position, 0);
	}

	#[test]
	fn relative_moves_clamp_to_the_limits() {
		let mut focuser = focuser();
		focuser.sync(10).unwrap();
		focuser.move_relative(Direction::Inward, 1_000_000).unwrap();
		assert_eq!(focuser.state().target_position, 0);

		focuser.sync(999_990).unwrap();
		focuser
			.move_relative(Direction::Outward, 1_000_000)
			.unwrap();
		assert_eq!(focuser.state().target_position, DEFAULT_MAX_POSITION);
	}

	#[test]
	fn relative_moves_respect_custom_limits() {
		let mut focuser = focuser();
		focuser.set_limits(100, 900);
		focuser.sync(500).unwrap();
		focuser.move_relative(Direction::Inward, 10_000).unwrap();
		assert_eq!(focuser.state().target_position, 100);
	}

	#[test]
	fn sync_updates_position_optimistically() {
		let mut focuser = focuser();
		focuser.sync(4000).unwrap();
		assert_eq!(focuser.state().current_position, 4000);
		assert_eq!(
			focuser.port_mut().backend_mut().take_written(),
			b":SP000004000#"
		);
	}

	#[test]
	fn abort_is_idempotent_while_idle() {
		let mut focuser = focuser();
		focuser.sync(4000).unwrap();
		let before = focuser.state().clone();
		focuser.abort().unwrap();
		focuser.abort().unwrap();
		let after = focuser.state();
		assert!(!after.is_moving);
		assert_eq!(after.current_position, before.current_position);
		assert_eq!(after.target_position, before.target_position);
		assert_eq!(after.speed, before.speed);
		assert_eq!(focuser.phase(), MotionPhase::Idle);
	}

	#[test]
	fn handshake_succeeds_on_the_third_attempt() {
		let mut focuser = focuser();
		let unplugged =
			|| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged");
		focuser.port_mut().backend_mut().push_read_error(unplugged());
		focuser.port_mut().backend_mut().push_read_error(unplugged());
		focuser.port_mut().backend_mut().append_data(b"2.92");
		focuser.handshake().unwrap();
		assert_eq!(focuser.state().firmware_version, "2.92");
	}

	#[test]
	fn handshake_gives_up_after_three_attempts() {
		let mut focuser = focuser();
		// Nothing staged: every version query times out.
		let HandshakeError::Unresponsive(err) = focuser.handshake().unwrap_err();
		assert_eq!(err.attempts(), 3);
	}

	#[test]
	fn poll_position_changes_pass_through_hysteresis() {
		let mut focuser = focuser();
		focuser.sync(100).unwrap();

		let mut changes = Vec::new();
		for position in [102u32, 104, 106] {
			focuser
				.port_mut()
				.backend_mut()
				.append_data(format!("{position}#"));
			focuser.port_mut().backend_mut().append_data(b"20.0#");
			if let Some(changed) = focuser.poll_tick().position_changed {
				changes.push(changed);
			}
		}

		// Only the read that moved more than 5 steps from the last report
		// (100 -> 106) is a change; the authoritative position still tracks
		// every raw read.
		assert_eq!(changes, [106]);
		assert_eq!(focuser.state().current_position, 106);
	}

	#[test]
	fn poll_temperature_changes_pass_through_hysteresis() {
		let mut focuser = focuser();
		let mut changes = Vec::new();
		for temperature in ["20.0", "20.2", "20.5"] {
			focuser.port_mut().backend_mut().append_data(b"0#");
			focuser
				.port_mut()
				.backend_mut()
				.append_data(format!("{temperature}#"));
			if let Some(changed) = focuser.poll_tick().temperature_changed {
				changes.push(changed);
			}
		}
		// 0.0 -> 20.0 and 20.0 -> 20.5 both clear the 0.5 degree threshold.
		assert_eq!(changes, [20.0, 20.5]);
	}

	#[test]
	fn malformed_poll_replies_leave_state_unchanged() {
		let mut focuser = focuser();
		focuser.sync(100).unwrap();
		focuser.port_mut().backend_mut().append_data(b"abc#");
		focuser.port_mut().backend_mut().append_data(b"xyz#");
		let report = focuser.poll_tick();
		assert_eq!(report, PollReport::default());
		assert_eq!(focuser.state().current_position, 100);
	}

	#[test]
	fn move_lifecycle_completes_when_the_device_stops() {
		let mut focuser = focuser();
		focuser.sync(4000).unwrap();
		focuser.move_absolute(5000).unwrap();
		focuser.port_mut().backend_mut().take_written();

		// Still moving: position closes in on the target.
		focuser.port_mut().backend_mut().append_data(b"4995#");
		focuser.port_mut().backend_mut().append_data(b"20.0#");
		focuser.port_mut().backend_mut().append_data(b"1#");
		let report = focuser.poll_tick();
		assert_eq!(report.position_changed, Some(4995));
		assert!(!report.move_completed);
		assert_eq!(focuser.phase(), MotionPhase::Busy);
		assert!(focuser.state().is_moving);

		// At rest on target: the move is over.
		focuser.port_mut().backend_mut().append_data(b"5000#");
		focuser.port_mut().backend_mut().append_data(b"20.0#");
		focuser.port_mut().backend_mut().append_data(b"0#");
		let report = focuser.poll_tick();
		assert!(report.move_completed);
		assert_eq!(focuser.phase(), MotionPhase::Idle);
		assert_eq!(focuser.state().current_position, 5000);
		assert!(!focuser.state().is_moving);
	}

	#[test]
	fn poll_failures_do_not_end_the_move() {
		let mut focuser = focuser();
		focuser.move_absolute(5000).unwrap();
		// The whole tick times out; the move must still look in-flight.
		let report = focuser.poll_tick();
		assert!(!report.move_completed);
		assert_eq!(focuser.phase(), MotionPhase::Busy);
	}

	#[test]
	fn timed_move_aborts_at_its_deadline() {
		let mut focuser = focuser();
		focuser
			.move_timed(Direction::Inward, 0, Duration::ZERO)
			.unwrap();
		assert_eq!(focuser.phase(), MotionPhase::Busy);
		assert_eq!(
			focuser.port_mut().backend_mut().take_written(),
			b":SN000000000#:FG#"
		);

		let report = focuser.poll_tick();
		assert!(report.timed_move_ended);
		assert_eq!(focuser.phase(), MotionPhase::Idle);
		// The abort goes out before the tick's routine queries.
		assert_eq!(
			focuser.port_mut().backend_mut().take_written(),
			b":FQ#:GP#:GT#"
		);

		// The deadline is one-shot.
		assert!(!focuser.poll_tick().timed_move_ended);
	}

	#[test]
	fn timed_move_sets_the_speed_first() {
		let mut focuser = focuser();
		focuser.set_limits(0, 60_000);
		focuser
			.move_timed(Direction::Outward, 250, Duration::from_secs(60))
			.unwrap();
		assert_eq!(
			focuser.port_mut().backend_mut().take_written(),
			b":SD250#:SN000060000#:FG#"
		);
		assert_eq!(focuser.state().speed, 250);
	}

	#[test]
	fn new_moves_cancel_a_pending_timed_move() {
		let mut focuser = focuser();
		focuser
			.move_timed(Direction::Inward, 0, Duration::from_secs(60))
			.unwrap();
		focuser.move_absolute(123).unwrap();
		focuser.port_mut().backend_mut().take_written();

		focuser.port_mut().backend_mut().append_data(b"123#");
		focuser.port_mut().backend_mut().append_data(b"20.0#");
		focuser.port_mut().backend_mut().append_data(b"1#");
		let report = focuser.poll_tick();
		assert!(!report.timed_move_ended);
		// No stale abort was written.
		assert_eq!(focuser.port_mut().backend_mut().take_written(), b":GP#:GT#:GI#");
	}

	#[test]
	fn go_home_cancels_a_pending_timed_move() {
		let mut focuser = focuser();
		focuser
			.move_timed(Direction::Inward, 0, Duration::ZERO)
			.unwrap();
		// The device has not started moving yet, so no abort precedes homing.
		focuser.port_mut().backend_mut().append_data(b"0#");
		focuser.go_home().unwrap();
		focuser.port_mut().backend_mut().take_written();

		// The expired deadline must not kill the home move on the next poll.
		let report = focuser.poll_tick();
		assert!(!report.timed_move_ended);
		assert_eq!(focuser.phase(), MotionPhase::Busy);
		assert_eq!(
			focuser.port_mut().backend_mut().take_written(),
			b":GP#:GT#:GI#"
		);
	}

	#[test]
	fn go_home_aborts_a_move_in_progress() {
		let mut focuser = focuser();
		focuser.port_mut().backend_mut().append_data(b"1#");
		focuser.go_home().unwrap();
		assert_eq!(
			focuser.port_mut().backend_mut().take_written(),
			b":GI#:FQ#:HO#"
		);
	}

	#[test]
	fn settings_update_state_on_success() {
		let mut focuser = focuser();
		focuser.set_speed(200_000).unwrap();
		focuser.set_coil_power(CoilPower::On).unwrap();
		focuser.set_reverse(true).unwrap();
		focuser.set_temperature_compensation(true).unwrap();
		let state = focuser.state();
		assert_eq!(state.speed, 200_000);
		assert_eq!(state.coil_power, CoilPower::On);
		assert!(state.reversed);
		assert!(state.temperature_compensation);
		assert_eq!(
			focuser.port_mut().backend_mut().take_written(),
			b":SD200000#:SE1#:SR1#:+#"
		);
	}

	#[test]
	fn failed_settings_leave_state_unchanged() {
		let mut focuser = focuser();
		focuser
			.port_mut()
			.backend_mut()
			.write_error(Some(std::io::Error::new(
				std::io::ErrorKind::BrokenPipe,
				"unplugged",
			)));
		assert!(focuser.set_speed(42).is_err());
		assert_eq!(focuser.state().speed, 0);
	}
}
