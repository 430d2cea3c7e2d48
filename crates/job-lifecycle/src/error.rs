use crate::{
	checkpoint::CheckpointError,
	types::{JobId, JobStatus},
};
use thiserror::Error;
use ws_session::SessionError;

/// Failures reported by the external collaborators (acquisition, inference,
/// synthesis, completion). The message is what ends up on the job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
	#[error("media acquisition failed: {0}")]
	Acquisition(String),

	#[error("transcription failed: {0}")]
	Inference(String),

	#[error("speech synthesis failed: {0}")]
	Synthesis(String),

	#[error("completion request failed: {0}")]
	Completion(String),

	#[error("service unavailable: {0}")]
	Unavailable(String),

	#[error("worker aborted: {0}")]
	WorkerAborted(String),
}

#[derive(Error, Debug)]
pub enum LifecycleError {
	#[error("job {0} not found")]
	NotFound(JobId),

	#[error("cannot {operation} job {job_id} while {status}")]
	InvalidState { job_id: JobId, status: JobStatus, operation: &'static str },

	#[error(transparent)]
	Collaborator(#[from] CollaboratorError),

	#[error("checkpoint persistence failed: {0}")]
	Persistence(#[from] CheckpointError),

	#[error(transparent)]
	Session(#[from] SessionError),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
