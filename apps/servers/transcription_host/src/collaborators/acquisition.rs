use crate::process;
use job_lifecycle::{AcquiredAudio, AudioSource, CollaboratorError, JobSource, SourceKind};
use std::{
	fs,
	path::{Path, PathBuf},
	process::Command,
};
use tracing::{info, warn};
use uuid::Uuid;

const UNTITLED: &str = "Untitled video";

/// One yt-dlp attempt. Strategies are tried in order until one produces a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadStrategy {
	pub name: &'static str,
	pub format: &'static str,
}

pub const DEFAULT_STRATEGIES: [DownloadStrategy; 2] = [
	DownloadStrategy {
		name: "best audio",
		format: "bestaudio/best",
	},
	DownloadStrategy {
		name: "m4a fallback",
		format: "140/bestaudio/best",
	},
];

/// Downloads remote media with yt-dlp and extracts audio from uploads with ffmpeg.
#[derive(Debug, Clone)]
pub struct MediaAcquirer {
	yt_dlp_bin: String,
	ffmpeg_bin: String,
	audio_dir: PathBuf,
	strategies: &'static [DownloadStrategy],
}

impl MediaAcquirer {
	pub fn new(yt_dlp_bin: impl Into<String>, ffmpeg_bin: impl Into<String>, audio_dir: impl Into<PathBuf>) -> Self {
		Self {
			yt_dlp_bin: yt_dlp_bin.into(),
			ffmpeg_bin: ffmpeg_bin.into(),
			audio_dir: audio_dir.into(),
			strategies: &DEFAULT_STRATEGIES,
		}
	}

	fn download(&self, url: &str) -> Result<AcquiredAudio, CollaboratorError> {
		let download_id = Uuid::new_v4();
		let stem = format!("audio_{download_id}");
		let mut last_error = String::from("no download strategy configured");

		for (attempt, strategy) in self.strategies.iter().enumerate() {
			info!(url, attempt = attempt + 1, strategy = strategy.name, "Downloading audio");
			match self.try_strategy(url, &stem, strategy) {
				Ok(acquired) => return Ok(acquired),
				Err(e) => {
					warn!(url, strategy = strategy.name, error = %e, "Download strategy failed");
					last_error = e;
				}
			}
		}

		Err(CollaboratorError::Acquisition(last_error))
	}

	fn try_strategy(&self, url: &str, stem: &str, strategy: &DownloadStrategy) -> Result<AcquiredAudio, String> {
		let template = self.audio_dir.join(format!("{stem}.%(ext)s"));
		let mut command = Command::new(&self.yt_dlp_bin);
		command
			.args(["--no-playlist", "--geo-bypass", "--no-check-certificates"])
			.args(["--socket-timeout", "30", "--retries", "10", "--fragment-retries", "10"])
			.args(["-f", strategy.format])
			.args(["-x", "--audio-format", "mp3", "--audio-quality", "192K"])
			.args(["--print", "after_move:title", "--no-simulate"])
			.arg("-o")
			.arg(&template)
			.arg(url);

		let output = process::run(command).map_err(|e| e.to_string())?;
		let title = String::from_utf8_lossy(&output.stdout).lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or(UNTITLED).to_string();
		let audio_path = find_with_stem(&self.audio_dir, stem).ok_or_else(|| format!("yt-dlp produced no file for {stem}"))?;

		Ok(AcquiredAudio { audio_path, title })
	}

	fn extract(&self, input: &Path) -> Result<AcquiredAudio, CollaboratorError> {
		if !input.is_file() {
			return Err(CollaboratorError::Acquisition(format!("uploaded file not found: {}", input.display())));
		}

		let title = input.file_stem().map_or_else(|| "audio".to_string(), |s| s.to_string_lossy().into_owned());
		let is_wav = input.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
		let file_id = Uuid::new_v4();

		let audio_path = if is_wav {
			let target = self.audio_dir.join(format!("{title}_{file_id}.wav"));
			fs::copy(input, &target).map_err(|e| CollaboratorError::Acquisition(format!("copying {}: {e}", input.display())))?;
			target
		} else {
			let target = self.audio_dir.join(format!("{title}_{file_id}.mp3"));
			let mut command = Command::new(&self.ffmpeg_bin);
			command.arg("-y").arg("-i").arg(input).args(["-vn", "-acodec", "mp3"]).arg(&target);
			process::run(command).map_err(|e| CollaboratorError::Acquisition(e.to_string()))?;
			target
		};

		Ok(AcquiredAudio { audio_path, title })
	}
}

impl AudioSource for MediaAcquirer {
	fn acquire(&self, source: &JobSource) -> Result<AcquiredAudio, CollaboratorError> {
		fs::create_dir_all(&self.audio_dir).map_err(|e| CollaboratorError::Acquisition(e.to_string()))?;

		match source.kind {
			SourceKind::RemoteUrl => self.download(&source.reference),
			SourceKind::LocalFile => self.extract(Path::new(&source.reference)),
		}
	}
}

fn find_with_stem(dir: &Path, stem: &str) -> Option<PathBuf> {
	let prefix = format!("{stem}.");
	fs::read_dir(dir)
		.ok()?
		.filter_map(Result::ok)
		.map(|entry| entry.path())
		.find(|path| path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with(&prefix)))
}
