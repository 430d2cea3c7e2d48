use crate::{models::ModelCatalog, process};
use job_lifecycle::{CollaboratorError, SpeechToText};
use std::{
	fs,
	path::{Path, PathBuf},
	process::Command,
	sync::Arc,
};
use uuid::Uuid;

/// Speech-to-text through the `whisper` command line tool. The model is read
/// from the catalogue at every call, so a switch applies to the next job.
#[derive(Debug, Clone)]
pub struct WhisperCli {
	bin: String,
	models: Arc<ModelCatalog>,
	scratch_dir: PathBuf,
}

impl WhisperCli {
	pub fn new(bin: impl Into<String>, models: Arc<ModelCatalog>, scratch_dir: impl Into<PathBuf>) -> Self {
		Self {
			bin: bin.into(),
			models,
			scratch_dir: scratch_dir.into(),
		}
	}
}

impl SpeechToText for WhisperCli {
	fn transcribe(&self, audio_path: &Path, language: &str) -> Result<String, CollaboratorError> {
		let out_dir = self.scratch_dir.join(format!("whisper_{}", Uuid::new_v4()));
		fs::create_dir_all(&out_dir).map_err(|e| CollaboratorError::Inference(e.to_string()))?;

		let mut command = Command::new(&self.bin);
		command
			.arg(audio_path)
			.arg("--model")
			.arg(self.models.current())
			.args(["--language", language])
			.args(["--output_format", "txt", "--verbose", "False"])
			.arg("--output_dir")
			.arg(&out_dir);

		let result = process::run(command).map_err(|e| CollaboratorError::Inference(e.to_string())).and_then(|_| read_transcript(&out_dir, audio_path));
		if let Err(e) = fs::remove_dir_all(&out_dir) {
			tracing::debug!(dir = %out_dir.display(), error = %e, "Could not remove whisper scratch dir");
		}
		result
	}

	fn model_name(&self) -> String {
		self.models.current()
	}
}

fn read_transcript(out_dir: &Path, audio_path: &Path) -> Result<String, CollaboratorError> {
	let stem = audio_path.file_stem().ok_or_else(|| CollaboratorError::Inference(format!("bad audio path {}", audio_path.display())))?;
	let mut txt = PathBuf::from(stem);
	txt.set_extension("txt");

	let raw = fs::read_to_string(out_dir.join(txt)).map_err(|e| CollaboratorError::Inference(format!("reading whisper output: {e}")))?;
	Ok(join_segments(&raw))
}

/// Whisper writes one segment per line.
fn join_segments(raw: &str) -> String {
	raw.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>().join(" ")
}
