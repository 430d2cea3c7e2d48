use crate::types::SessionId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
	#[error("session {0} not found")]
	NotFound(SessionId),

	#[error("session {0} is not bound to a job")]
	Unbound(SessionId),

	#[error("invalid session id: {0}")]
	InvalidId(String),
}
