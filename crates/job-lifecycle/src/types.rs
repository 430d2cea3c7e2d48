use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use ws_session::SessionId;

/// Job ID type for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	#[must_use]
	pub const fn from_uuid(uuid: Uuid) -> Self {
		Self(uuid)
	}
}

impl Default for JobId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for JobId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Uuid::parse_str(s).map(Self)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
	RemoteUrl,
	LocalFile,
}

/// Where the audio of a job comes from. Immutable once the job exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSource {
	pub kind: SourceKind,
	pub reference: String,
}

impl JobSource {
	pub fn remote(url: impl Into<String>) -> Self {
		Self {
			kind: SourceKind::RemoteUrl,
			reference: url.into(),
		}
	}

	pub fn local(path: impl Into<String>) -> Self {
		Self {
			kind: SourceKind::LocalFile,
			reference: path.into(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Pending,
	AttachedProcessing,
	Completed,
	Failed,
	Cancelled,
	AwaitingResume,
}

impl JobStatus {
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::AttachedProcessing => "attached_processing",
			Self::Completed => "completed",
			Self::Failed => "failed",
			Self::Cancelled => "cancelled",
			Self::AwaitingResume => "awaiting_resume",
		}
	}

	/// Statuses a session attach may start processing from.
	#[must_use]
	pub const fn is_startable(self) -> bool {
		matches!(self, Self::Pending | Self::AwaitingResume)
	}
}

impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
	pub id: JobId,
	pub session_id: SessionId,
	/// `None` for jobs recovered from a checkpoint that predates source metadata.
	pub source: Option<JobSource>,
	pub language: String,
	pub status: JobStatus,
	pub title: String,
	pub transcript_text: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resume_hint: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	pub created_at: DateTime<Utc>,
}

impl Job {
	#[must_use]
	pub fn new(source: JobSource, language: impl Into<String>) -> Self {
		Self {
			id: JobId::new(),
			session_id: SessionId::new(),
			source: Some(source),
			language: language.into(),
			status: JobStatus::Pending,
			title: String::new(),
			transcript_text: String::new(),
			resume_hint: None,
			error: None,
			created_at: Utc::now(),
		}
	}

	/// Replace the transcript only when the new text is at least as long as the
	/// current one. Returns whether the text changed.
	pub fn advance_transcript(&mut self, text: &str) -> bool {
		if text.chars().count() < self.transcript_text.chars().count() || text == self.transcript_text {
			return false;
		}
		self.transcript_text = text.to_string();
		true
	}
}
