use crate::process;
use job_lifecycle::{CollaboratorError, TextToSpeech};
use std::{
	fs,
	path::{Path, PathBuf},
	process::Command,
};
use uuid::Uuid;

/// Text-to-speech through the `edge-tts` command line tool.
#[derive(Debug, Clone)]
pub struct EdgeTts {
	bin: String,
	voice: String,
}

impl EdgeTts {
	pub fn new(bin: impl Into<String>, voice: impl Into<String>) -> Self {
		Self {
			bin: bin.into(),
			voice: voice.into(),
		}
	}
}

impl TextToSpeech for EdgeTts {
	fn synthesize(&self, text: &str, out_dir: &Path) -> Result<PathBuf, CollaboratorError> {
		fs::create_dir_all(out_dir).map_err(|e| CollaboratorError::Synthesis(e.to_string()))?;
		let target = out_dir.join(format!("speech_{}.mp3", Uuid::new_v4()));

		let mut command = Command::new(&self.bin);
		command.args(["--voice", self.voice.as_str(), "--text", text]).arg("--write-media").arg(&target);
		process::run(command).map_err(|e| CollaboratorError::Synthesis(e.to_string()))?;

		if !target.is_file() {
			return Err(CollaboratorError::Synthesis(format!("{} did not write {}", self.bin, target.display())));
		}
		Ok(target)
	}
}
