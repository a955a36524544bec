//! A polling loop that turns focuser state changes into events.
//!
//! The device never volunteers information, so applications that want to
//! react to position changes, temperature drift, or move completion must
//! poll. A [`Monitor`] owns a [`Focuser`] and a handler, calls
//! [`poll_tick`](Focuser::poll_tick) on a fixed period, and invokes the
//! handler once per observed [`Event`]. The handler decides when the loop
//! ends by returning [`ControlFlow::Break`].

use crate::{
	backend::Backend,
	focuser::{Focuser, FocuserState},
};
use std::{fmt, ops::ControlFlow, time::Duration};

/// The default period between polls.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_millis(500);

/// A change observed by a [`Monitor`] poll.
///
/// Events are dispatched in a fixed order within one poll: the end of a
/// timed move first, then position, then temperature, then move completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
	/// The position moved beyond the hysteresis threshold.
	PositionChanged(u32),
	/// The temperature drifted beyond the hysteresis threshold.
	TemperatureChanged(f32),
	/// An in-flight move completed, with the final position.
	MoveComplete(u32),
	/// A timed move reached its deadline and was aborted.
	TimedMoveEnded,
}

/// A polling driver for a [`Focuser`].
///
/// See the [module](crate::monitor) documentation for details.
pub struct Monitor<B, F> {
	/// The focuser being polled.
	focuser: Focuser<B>,
	/// The period between polls.
	period: Duration,
	/// The event handler.
	handler: F,
}

impl<B, F> fmt::Debug for Monitor<B, F>
where
	B: fmt::Debug,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Monitor")
			.field("focuser", &self.focuser)
			.field("period", &self.period)
			.finish_non_exhaustive()
	}
}

impl<B, F> Monitor<B, F>
where
	B: Backend,
	F: FnMut(Event, &FocuserState) -> ControlFlow<()>,
{
	/// Wrap a focuser in a monitor with the [`DEFAULT_POLL_PERIOD`].
	pub fn new(focuser: Focuser<B>, handler: F) -> Monitor<B, F> {
		Monitor {
			focuser,
			period: DEFAULT_POLL_PERIOD,
			handler,
		}
	}

	/// Set the period between polls.
	pub fn period(&mut self, period: Duration) -> &mut Self {
		self.period = period;
		self
	}

	/// Get exclusive access to the focuser, e.g. to issue moves between polls.
	pub fn focuser_mut(&mut self) -> &mut Focuser<B> {
		&mut self.focuser
	}

	/// Consume the monitor and get the focuser back.
	pub fn into_focuser(self) -> Focuser<B> {
		self.focuser
	}

	/// Poll once and dispatch an event per observed change.
	///
	/// Returns [`ControlFlow::Break`] as soon as the handler does, skipping
	/// any remaining events from the same poll.
	pub fn tick(&mut self) -> ControlFlow<()> {
		let report = self.focuser.poll_tick();
		if report.timed_move_ended {
			(self.handler)(Event::TimedMoveEnded, self.focuser.state())?;
		}
		if let Some(position) = report.position_changed {
			(self.handler)(Event::PositionChanged(position), self.focuser.state())?;
		}
		if let Some(temperature) = report.temperature_changed {
			(self.handler)(Event::TemperatureChanged(temperature), self.focuser.state())?;
		}
		if report.move_completed {
			let position = self.focuser.state().current_position;
			(self.handler)(Event::MoveComplete(position), self.focuser.state())?;
		}
		ControlFlow::Continue(())
	}

	/// Poll on the configured period until the handler breaks.
	///
	/// This blocks the calling thread. The first poll happens immediately.
	pub fn run(&mut self) {
		while self.tick().is_continue() {
			std::thread::sleep(self.period);
		}
	}
}
