use std::{fmt, time::Instant};

/// Lifecycle of a session's transport
#[derive(Debug, Clone)]
pub enum SessionState {
	/// Bound to a job but no transport attached yet
	Detached { since: Instant },
	Live { attached_at: Instant, last_activity: Instant },
	Disconnected { reason: String, disconnected_at: Instant },
}

impl SessionState {
	#[must_use]
	pub fn detached() -> Self {
		Self::Detached { since: Instant::now() }
	}

	#[must_use]
	pub fn live() -> Self {
		let now = Instant::now();
		Self::Live {
			attached_at: now,
			last_activity: now,
		}
	}

	#[must_use]
	pub const fn is_live(&self) -> bool {
		matches!(self, Self::Live { .. })
	}

	#[must_use]
	pub const fn is_disconnected(&self) -> bool {
		matches!(self, Self::Disconnected { .. })
	}

	/// Record a heartbeat or delivery on a live session.
	pub fn record_activity(&mut self) {
		if let Self::Live { last_activity, .. } = self {
			*last_activity = Instant::now();
		}
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Detached { .. } => write!(f, "Detached"),
			Self::Live { .. } => write!(f, "Live"),
			Self::Disconnected { reason, .. } => write!(f, "Disconnected({reason})"),
		}
	}
}
