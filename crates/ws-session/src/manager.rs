use crate::{
	errors::SessionError,
	state::SessionState,
	types::{ConnectionId, SessionId},
};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How long a single delivery may wait on a full outbound channel.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct Transport<E> {
	connection: ConnectionId,
	sender: mpsc::Sender<E>,
}

#[derive(Debug)]
struct SessionEntry<J, E> {
	job: J,
	state: SessionState,
	transport: Option<Transport<E>>,
}

impl<J, E> SessionEntry<J, E> {
	fn detached(job: J) -> Self {
		Self {
			job,
			state: SessionState::detached(),
			transport: None,
		}
	}

	fn is_live(&self) -> bool {
		self.state.is_live() && self.transport.as_ref().is_some_and(|t| !t.sender.is_closed())
	}

	fn holds(&self, connection: ConnectionId) -> bool {
		self.transport.as_ref().is_some_and(|t| t.connection == connection)
	}
}

/// Tracks sessions, the job each one is bound to, and their live transports.
///
/// `J` is the job handle a session resolves to, `E` the event type pushed
/// down the transport.
#[derive(Debug)]
pub struct SessionManager<J, E> {
	sessions: Arc<DashMap<SessionId, SessionEntry<J, E>>>,
	delivery_timeout: Duration,
}

impl<J, E> Clone for SessionManager<J, E> {
	fn clone(&self) -> Self {
		Self {
			sessions: Arc::clone(&self.sessions),
			delivery_timeout: self.delivery_timeout,
		}
	}
}

impl<J: Clone, E> Default for SessionManager<J, E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<J: Clone, E> SessionManager<J, E> {
	#[must_use]
	pub fn new() -> Self {
		Self::with_delivery_timeout(DEFAULT_DELIVERY_TIMEOUT)
	}

	#[must_use]
	pub fn with_delivery_timeout(delivery_timeout: Duration) -> Self {
		Self {
			sessions: Arc::new(DashMap::new()),
			delivery_timeout,
		}
	}

	/// Bind a session to a job. Creates the session detached if it does not exist;
	/// an existing session keeps its state and transport and is rebound.
	pub fn bind(&self, session_id: SessionId, job: J) {
		match self.sessions.entry(session_id) {
			Entry::Occupied(mut occupied) => {
				occupied.get_mut().job = job;
				debug!(%session_id, "Session rebound");
			}
			Entry::Vacant(vacant) => {
				vacant.insert(SessionEntry::detached(job));
				debug!(%session_id, "Session created");
			}
		}
	}

	/// Attach a transport to a bound session and return its job.
	///
	/// Unknown sessions are refused without being recorded. A transport already
	/// attached to the session is replaced; its sender is dropped, which ends
	/// the old writer.
	pub fn connect(&self, session_id: SessionId, connection: ConnectionId, sender: mpsc::Sender<E>) -> Result<J, SessionError> {
		let Some(mut entry) = self.sessions.get_mut(&session_id) else {
			debug!(%session_id, %connection, "Refusing transport for unknown session");
			return Err(SessionError::NotFound(session_id));
		};

		if let Some(previous) = entry.transport.replace(Transport { connection, sender }) {
			info!(%session_id, replaced = %previous.connection, %connection, "Session transport replaced");
		} else {
			info!(%session_id, %connection, "Session attached");
		}
		entry.state = SessionState::live();

		Ok(entry.job.clone())
	}

	/// A session is live only while its transport is attached and still open.
	#[must_use]
	pub fn is_live(&self, session_id: SessionId) -> bool {
		self.sessions.get(&session_id).is_some_and(|entry| entry.is_live())
	}

	/// Whether `connection` is the session's current, open transport.
	#[must_use]
	pub fn is_attached(&self, session_id: SessionId, connection: ConnectionId) -> bool {
		self.sessions.get(&session_id).is_some_and(|entry| entry.is_live() && entry.holds(connection))
	}

	/// Deliver an event. Returns `false` when the session is unknown or not live;
	/// a closed or stalled transport is released as a side effect.
	pub async fn notify(&self, session_id: SessionId, event: E) -> bool {
		let target = match self.sessions.get(&session_id) {
			Some(entry) if entry.is_live() => entry.transport.as_ref().map(|t| (t.connection, t.sender.clone())),
			_ => None,
		};

		let Some((connection, sender)) = target else {
			return false;
		};

		match tokio::time::timeout(self.delivery_timeout, sender.send(event)).await {
			Ok(Ok(())) => {
				self.record_activity(session_id);
				true
			}
			Ok(Err(_)) => {
				warn!(%session_id, %connection, "Delivery failed, transport closed");
				self.release(session_id, connection, "transport closed");
				false
			}
			Err(_) => {
				warn!(%session_id, %connection, timeout = ?self.delivery_timeout, "Delivery timed out");
				self.release(session_id, connection, "delivery timed out");
				false
			}
		}
	}

	/// Drop the session's transport if it is still `connection`.
	///
	/// A transport that was already replaced leaves the session untouched, so a
	/// superseded socket's cleanup never cuts off its successor.
	pub fn release(&self, session_id: SessionId, connection: ConnectionId, reason: &str) -> bool {
		let Some(mut entry) = self.sessions.get_mut(&session_id) else {
			return false;
		};

		if !entry.holds(connection) {
			debug!(%session_id, %connection, reason, "Ignoring release of a superseded transport");
			return false;
		}

		let was_live = Self::drop_transport(&mut entry, reason);
		drop(entry);

		if was_live {
			info!(%session_id, %connection, reason, "Session disconnected");
		}
		was_live
	}

	/// Drop whatever transport the session has. Idempotent; the binding is kept.
	/// Returns `true` only when the session was live before the call.
	pub fn disconnect(&self, session_id: SessionId, reason: &str) -> bool {
		let Some(mut entry) = self.sessions.get_mut(&session_id) else {
			return false;
		};

		let was_live = Self::drop_transport(&mut entry, reason);
		drop(entry);

		if was_live {
			info!(%session_id, reason, "Session disconnected");
		}
		was_live
	}

	fn drop_transport(entry: &mut SessionEntry<J, E>, reason: &str) -> bool {
		let was_live = entry.state.is_live();
		entry.transport = None;
		if !entry.state.is_disconnected() {
			entry.state = SessionState::Disconnected {
				reason: reason.to_string(),
				disconnected_at: std::time::Instant::now(),
			};
		}
		was_live
	}

	#[must_use]
	pub fn job_for(&self, session_id: SessionId) -> Option<J> {
		self.sessions.get(&session_id).map(|entry| entry.job.clone())
	}

	#[must_use]
	pub fn state(&self, session_id: SessionId) -> Option<SessionState> {
		self.sessions.get(&session_id).map(|entry| entry.state.clone())
	}

	pub fn record_activity(&self, session_id: SessionId) {
		if let Some(mut entry) = self.sessions.get_mut(&session_id) {
			entry.state.record_activity();
		}
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.sessions.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.sessions.is_empty()
	}

	#[must_use]
	pub fn stats(&self) -> SessionStats {
		let mut stats = SessionStats {
			total: self.sessions.len(),
			..SessionStats::default()
		};

		for entry in self.sessions.iter() {
			match entry.state {
				_ if entry.is_live() => stats.live += 1,
				SessionState::Disconnected { .. } | SessionState::Live { .. } => stats.disconnected += 1,
				SessionState::Detached { .. } => stats.detached += 1,
			}
		}

		stats
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
	pub total: usize,
	pub live: usize,
	pub detached: usize,
	pub disconnected: usize,
}
