use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Clone, Debug, Serialize, Deserialize)]
#[command(name = "transcription_host")]
#[command(about = "Resumable media transcription over HTTP and WebSocket", long_about = None)]
pub struct Config {
	/// Use JSON formatting for tracing
	#[arg(long, env = "LOG_JSON", default_value = "false")]
	pub log_json: bool,

	/// Log filter, e.g. `info,job_lifecycle=debug`
	#[arg(long, env = "RUST_LOG", default_value = "info")]
	pub rust_log: String,

	/// Server host
	#[arg(long, env = "HOST", default_value = "0.0.0.0")]
	pub host: String,

	/// Server port
	#[arg(long, env = "PORT", default_value = "8000")]
	pub port: u16,

	/// Root for uploads, extracted audio, checkpoints and generated speech
	#[arg(long, env = "DATA_DIR", default_value = "data")]
	pub data_dir: PathBuf,

	/// Language handed to the transcriber when a job does not name one
	#[arg(long, env = "DEFAULT_LANGUAGE", default_value = "pt")]
	pub default_language: String,

	/// Whisper CLI executable
	#[arg(long, env = "WHISPER_BIN", default_value = "whisper")]
	pub whisper_bin: String,

	/// Whisper model loaded at start-up
	#[arg(long, env = "WHISPER_MODEL", default_value = "small")]
	pub whisper_model: String,

	#[arg(long, env = "YT_DLP_BIN", default_value = "yt-dlp")]
	pub yt_dlp_bin: String,

	#[arg(long, env = "FFMPEG_BIN", default_value = "ffmpeg")]
	pub ffmpeg_bin: String,

	#[arg(long, env = "EDGE_TTS_BIN", default_value = "edge-tts")]
	pub edge_tts_bin: String,

	/// Voice used for generated speech
	#[arg(long, env = "TTS_VOICE", default_value = "pt-BR-FranciscaNeural")]
	pub tts_voice: String,

	/// OpenRouter API key; insights are disabled without it
	#[arg(long, env = "OPENROUTER_API_KEY")]
	pub openrouter_api_key: Option<String>,

	#[arg(long, env = "OPENROUTER_MODEL", default_value = "google/gemini-2.5-flash-preview")]
	pub openrouter_model: String,

	#[arg(long, env = "OPENROUTER_URL", default_value = "https://openrouter.ai/api/v1/chat/completions")]
	pub openrouter_url: String,

	/// Pause between simulated progress updates, in milliseconds
	#[arg(long, env = "PROGRESS_STEP_DELAY_MS", default_value = "300")]
	pub progress_step_delay_ms: u64,

	/// Inference runs allowed at the same time
	#[arg(long, env = "MAX_CONCURRENT_TRANSCRIPTIONS", default_value = "1")]
	pub max_concurrent_transcriptions: usize,

	/// Request body limit in megabytes
	#[arg(long, env = "MAX_UPLOAD_MB", default_value = "512")]
	pub max_upload_mb: usize,

	/// Timeout for plain HTTP requests in seconds
	#[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "600")]
	pub request_timeout_secs: u64,

	#[arg(long, env = "MAX_CONCURRENT_REQUESTS", default_value = "256")]
	pub max_concurrent_requests: usize,
}

impl Config {
	/// Validate configuration values
	pub fn validate(&self) -> Result<(), String> {
		if self.port == 0 {
			return Err("port must be greater than 0".to_string());
		}

		if self.default_language.trim().is_empty() {
			return Err("default_language must not be empty".to_string());
		}

		if self.max_concurrent_transcriptions == 0 {
			return Err("max_concurrent_transcriptions must be at least 1".to_string());
		}

		if self.max_upload_mb == 0 {
			return Err("max_upload_mb must be greater than 0".to_string());
		}

		if self.request_timeout_secs == 0 {
			return Err("request_timeout_secs must be greater than 0".to_string());
		}

		if self.max_concurrent_requests == 0 {
			return Err("max_concurrent_requests must be greater than 0".to_string());
		}

		Ok(())
	}

	#[must_use]
	pub fn uploads_dir(&self) -> PathBuf {
		self.data_dir.join("uploads")
	}

	#[must_use]
	pub fn audio_dir(&self) -> PathBuf {
		self.data_dir.join("audio")
	}

	#[must_use]
	pub fn checkpoint_dir(&self) -> PathBuf {
		self.data_dir.join("transcripts")
	}

	#[must_use]
	pub fn speech_dir(&self) -> PathBuf {
		self.data_dir.join("generated_audio")
	}

	#[must_use]
	pub fn scratch_dir(&self) -> PathBuf {
		self.data_dir.join("tmp")
	}
}
