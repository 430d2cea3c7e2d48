use crate::types::JobId;
use serde::{Deserialize, Serialize};

/// Events pushed to the session attached to a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
	Status {
		message: String,
	},
	Progress {
		job_id: JobId,
		title: String,
		text: String,
		percent: u8,
		stage: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		elapsed: Option<String>,
	},
	Completed {
		job_id: JobId,
		title: String,
		elapsed: String,
	},
	Failed {
		#[serde(skip_serializing_if = "Option::is_none")]
		job_id: Option<JobId>,
		message: String,
	},
	Cancelled {
		job_id: JobId,
	},
}

impl JobEvent {
	pub fn status(message: impl Into<String>) -> Self {
		Self::Status { message: message.into() }
	}

	#[must_use]
	pub const fn percent(&self) -> Option<u8> {
		match self {
			Self::Progress { percent, .. } => Some(*percent),
			_ => None,
		}
	}

	/// After a terminal event nothing else is sent for the run.
	#[must_use]
	pub const fn is_terminal(&self) -> bool {
		matches!(self, Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled { .. })
	}
}
