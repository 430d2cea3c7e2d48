use crate::{
	checkpoint::{Checkpoint, CheckpointError, CheckpointStore},
	error::{LifecycleError, Result},
	registry::JobRegistry,
	types::{Job, JobId, JobStatus},
};
use std::sync::Arc;
use tracing::{info, warn};
use ws_session::SessionId;

pub const RECOVERED_TITLE: &str = "Recovered transcription";

/// Outcome of recovering a job that has no live registry entry.
#[derive(Debug, Clone)]
pub enum ResumePlan {
	/// Finished earlier, stored text is final.
	AlreadyDone(Job),
	/// Partial text on disk, job waits for a new session to attach.
	Resumable(Job),
}

impl ResumePlan {
	#[must_use]
	pub const fn job(&self) -> &Job {
		match self {
			Self::AlreadyDone(job) | Self::Resumable(job) => job,
		}
	}

	#[must_use]
	pub fn into_job(self) -> Job {
		match self {
			Self::AlreadyDone(job) | Self::Resumable(job) => job,
		}
	}
}

#[derive(Clone)]
pub struct ResumptionPlanner {
	registry: JobRegistry,
	checkpoints: Arc<dyn CheckpointStore>,
	default_language: String,
}

impl ResumptionPlanner {
	pub fn new(registry: JobRegistry, checkpoints: Arc<dyn CheckpointStore>, default_language: impl Into<String>) -> Self {
		Self {
			registry,
			checkpoints,
			default_language: default_language.into(),
		}
	}

	/// Rebuild a registry record from the checkpoint of `job_id`.
	///
	/// A corrupt checkpoint counts as missing. When another caller rehydrated
	/// the same job first, that record is returned instead.
	pub async fn plan(&self, job_id: JobId) -> Result<ResumePlan> {
		let checkpoint = match self.checkpoints.load(job_id).await {
			Ok(Some(checkpoint)) => checkpoint,
			Ok(None) => return Err(LifecycleError::NotFound(job_id)),
			Err(CheckpointError::Corrupt { reason, .. }) => {
				warn!(%job_id, %reason, "Ignoring corrupt checkpoint");
				return Err(LifecycleError::NotFound(job_id));
			}
			Err(e) => return Err(e.into()),
		};

		let job = self.recovered_job(checkpoint);
		let completed = job.status == JobStatus::Completed;

		if self.registry.rehydrate(job.clone()) {
			info!(%job_id, status = %job.status, "Job rehydrated from checkpoint");
		}
		let job = self.registry.get(job_id).await.unwrap_or(job);

		Ok(if completed { ResumePlan::AlreadyDone(job) } else { ResumePlan::Resumable(job) })
	}

	fn recovered_job(&self, checkpoint: Checkpoint) -> Job {
		let Checkpoint {
			job_id,
			text,
			completed,
			saved_at,
			meta,
		} = checkpoint;

		let (status, transcript_text, resume_hint) = if completed {
			(JobStatus::Completed, text, None)
		} else {
			(JobStatus::AwaitingResume, String::new(), Some(text))
		};

		Job {
			id: job_id,
			session_id: SessionId::new(),
			source: meta.source,
			language: meta.language.unwrap_or_else(|| self.default_language.clone()),
			status,
			title: meta.title.filter(|t| !t.is_empty()).unwrap_or_else(|| RECOVERED_TITLE.to_string()),
			transcript_text,
			resume_hint,
			error: None,
			created_at: saved_at,
		}
	}
}
