use crate::{error::AppError, AppState};
use axum::{
	extract::{Path, State},
	http::header::{HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE},
	response::{IntoResponse, Response},
	Json,
};
use job_lifecycle::CollaboratorError;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, instrument};

pub const SPEECH_FILE_HEADER: &str = "x-speech-file";

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
	pub text: String,
}

#[instrument(name = "synthesize", skip_all)]
pub async fn post_speech(State(state): State<AppState>, Json(request): Json<SpeechRequest>) -> Result<Response, AppError> {
	let text = request.text.trim().to_string();
	if text.is_empty() {
		return Err(AppError::BadRequest("text must not be empty".to_string()));
	}

	let speech = state.collaborators.speech.clone();
	let out_dir = state.core.config.speech_dir();
	let path = tokio::task::spawn_blocking(move || speech.synthesize(&text, &out_dir))
		.await
		.map_err(|e| CollaboratorError::WorkerAborted(e.to_string()))??;

	let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
	info!(file = %file_name, "Speech generated");
	audio_response(path, &file_name).await
}

#[instrument(name = "download_speech", skip(state))]
pub async fn get_speech(State(state): State<AppState>, Path(file): Path<String>) -> Result<Response, AppError> {
	let not_found = || AppError::NotFound(format!("speech file {file} not found"));
	if file.is_empty() || file.contains(['/', '\\']) || file.contains("..") {
		return Err(not_found());
	}

	let path = state.core.config.speech_dir().join(&file);
	if !tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
		return Err(not_found());
	}
	audio_response(path, &file).await
}

async fn audio_response(path: PathBuf, file_name: &str) -> Result<Response, AppError> {
	let bytes = tokio::fs::read(&path).await?;
	Ok((
		[
			(CONTENT_TYPE, "audio/mpeg".to_string()),
			(CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")),
			(HeaderName::from_static(SPEECH_FILE_HEADER), file_name.to_string()),
		],
		bytes,
	)
		.into_response())
}
