//! Durable per-job transcript checkpoints.
//!
//! One JSON record per job under the checkpoint directory, written with a
//! temp file and rename so a reader never observes a half-written record.

use crate::types::{JobId, JobSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
	io,
	path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CheckpointError {
	#[error("checkpoint for job {0} is completed and cannot change")]
	Sealed(JobId),

	#[error("checkpoint for job {job_id} is corrupt: {reason}")]
	Corrupt { job_id: JobId, reason: String },

	#[error("checkpoint io error: {0}")]
	Io(#[from] io::Error),

	#[error("checkpoint serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Job details persisted next to the text so a recovered job can run again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointMeta {
	pub source: Option<JobSource>,
	pub title: Option<String>,
	pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
	pub job_id: JobId,
	pub text: String,
	pub completed: bool,
	pub saved_at: DateTime<Utc>,
	pub meta: CheckpointMeta,
}

impl Checkpoint {
	pub fn new(job_id: JobId, text: impl Into<String>, completed: bool) -> Self {
		Self {
			job_id,
			text: text.into(),
			completed,
			saved_at: Utc::now(),
			meta: CheckpointMeta::default(),
		}
	}

	#[must_use]
	pub fn with_meta(mut self, meta: CheckpointMeta) -> Self {
		self.meta = meta;
		self
	}
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
	/// Overwrite the checkpoint of a job. A completed checkpoint only accepts
	/// a save carrying the exact same text, which is a no-op.
	async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

	async fn load(&self, job_id: JobId) -> Result<Option<Checkpoint>, CheckpointError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRecord {
	text: String,
	timestamp: DateTime<Utc>,
	completed: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	source: Option<JobSource>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	title: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	language: Option<String>,
}

impl CheckpointRecord {
	fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
		Self {
			text: checkpoint.text.clone(),
			timestamp: checkpoint.saved_at,
			completed: checkpoint.completed,
			source: checkpoint.meta.source.clone(),
			title: checkpoint.meta.title.clone(),
			language: checkpoint.meta.language.clone(),
		}
	}

	fn into_checkpoint(self, job_id: JobId) -> Checkpoint {
		Checkpoint {
			job_id,
			text: self.text,
			completed: self.completed,
			saved_at: self.timestamp,
			meta: CheckpointMeta {
				source: self.source,
				title: self.title,
				language: self.language,
			},
		}
	}
}

/// Filesystem store, `<dir>/<job_id>.json` per job.
#[derive(Debug, Clone)]
pub struct FsCheckpointStore {
	dir: PathBuf,
}

impl FsCheckpointStore {
	pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
		let dir = dir.into();
		tokio::fs::create_dir_all(&dir).await?;
		Ok(Self { dir })
	}

	#[must_use]
	pub fn dir(&self) -> &Path {
		&self.dir
	}

	#[must_use]
	pub fn path_for(&self, job_id: JobId) -> PathBuf {
		self.dir.join(format!("{job_id}.json"))
	}
}

#[async_trait]
impl CheckpointStore for FsCheckpointStore {
	async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
		let job_id = checkpoint.job_id;

		match self.load(job_id).await {
			Ok(Some(existing)) if existing.completed => {
				if existing.text == checkpoint.text && checkpoint.completed {
					return Ok(());
				}
				return Err(CheckpointError::Sealed(job_id));
			}
			// A corrupt record is overwritten by the next good save.
			Ok(_) | Err(CheckpointError::Corrupt { .. }) => {}
			Err(e) => return Err(e),
		}

		let bytes = serde_json::to_vec_pretty(&CheckpointRecord::from_checkpoint(checkpoint))?;
		let path = self.path_for(job_id);
		let tmp = self.dir.join(format!(".{job_id}.json.tmp"));

		tokio::fs::write(&tmp, &bytes).await?;
		tokio::fs::rename(&tmp, &path).await?;

		debug!(%job_id, completed = checkpoint.completed, chars = checkpoint.text.chars().count(), "Checkpoint saved");
		Ok(())
	}

	async fn load(&self, job_id: JobId) -> Result<Option<Checkpoint>, CheckpointError> {
		let bytes = match tokio::fs::read(self.path_for(job_id)).await {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(e.into()),
		};

		let record: CheckpointRecord = serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Corrupt { job_id, reason: e.to_string() })?;
		Ok(Some(record.into_checkpoint(job_id)))
	}
}
