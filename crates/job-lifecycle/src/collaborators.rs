//! Narrow interfaces to the external engines the lifecycle depends on.
//!
//! Acquisition, inference and synthesis are blocking calls of unknown
//! duration; the engine always runs them on the blocking pool.

use crate::{error::CollaboratorError, types::JobSource};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredAudio {
	pub audio_path: PathBuf,
	pub title: String,
}

/// Turns a job source into a local audio file. Retry strategies belong here.
pub trait AudioSource: Send + Sync {
	fn acquire(&self, source: &JobSource) -> Result<AcquiredAudio, CollaboratorError>;
}

pub trait SpeechToText: Send + Sync {
	fn transcribe(&self, audio_path: &Path, language: &str) -> Result<String, CollaboratorError>;

	/// Model used by the next call, reported to clients.
	fn model_name(&self) -> String;
}

pub trait TextToSpeech: Send + Sync {
	/// Write synthesized speech into `out_dir` and return the file path.
	fn synthesize(&self, text: &str, out_dir: &Path) -> Result<PathBuf, CollaboratorError>;
}

#[async_trait]
pub trait QuestionAnswering: Send + Sync {
	async fn answer(&self, transcript: &str, question: &str) -> Result<String, CollaboratorError>;

	/// Whether the backing service can be reached at all, reported on `/health`.
	fn is_configured(&self) -> bool {
		true
	}
}
