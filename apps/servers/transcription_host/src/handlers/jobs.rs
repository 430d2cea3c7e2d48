use crate::{config::Config, error::AppError};
use axum::{
	extract::{Multipart, Path, State},
	Json,
};
use job_lifecycle::{Job, JobId, JobSnapshot, JobSource, JobTicket, LifecycleEngine, ResumeTicket};
use serde::Deserialize;
use std::{path::PathBuf, sync::Arc};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UrlJobRequest {
	pub url: String,
	#[serde(default)]
	pub language: Option<String>,
}

#[instrument(name = "create_url_job", skip(engine))]
pub async fn create_url_job(State(engine): State<LifecycleEngine>, Json(request): Json<UrlJobRequest>) -> Result<Json<JobTicket>, AppError> {
	let url = request.url.trim();
	if !(url.starts_with("http://") || url.starts_with("https://")) {
		return Err(AppError::BadRequest(format!("not an http(s) url: {url:?}")));
	}

	Ok(Json(engine.create_job(JobSource::remote(url), request.language)))
}

#[instrument(name = "create_file_job", skip_all)]
pub async fn create_file_job(State(engine): State<LifecycleEngine>, State(config): State<Arc<Config>>, mut multipart: Multipart) -> Result<Json<JobTicket>, AppError> {
	let mut stored: Option<PathBuf> = None;
	let mut language: Option<String> = None;

	while let Some(mut field) = multipart.next_field().await? {
		match field.name() {
			Some("file") => {
				let name = sanitize_file_name(field.file_name().unwrap_or_default());
				let dir = config.uploads_dir().join(Uuid::new_v4().to_string());
				tokio::fs::create_dir_all(&dir).await?;

				let path = dir.join(name);
				let mut file = tokio::fs::File::create(&path).await?;
				let mut bytes = 0usize;
				while let Some(chunk) = field.chunk().await? {
					bytes += chunk.len();
					file.write_all(&chunk).await?;
				}
				file.flush().await?;

				info!(path = %path.display(), bytes, "Upload stored");
				stored = Some(path);
			}
			Some("language") => language = Some(field.text().await?),
			_ => {}
		}
	}

	let path = stored.ok_or_else(|| AppError::BadRequest("multipart field `file` is required".to_string()))?;
	Ok(Json(engine.create_job(JobSource::local(path.to_string_lossy()), language)))
}

#[instrument(name = "list_jobs", skip(engine))]
pub async fn list_jobs(State(engine): State<LifecycleEngine>) -> Json<Vec<Job>> {
	Json(engine.list_jobs().await)
}

#[instrument(name = "get_job", skip(engine))]
pub async fn get_job(State(engine): State<LifecycleEngine>, Path(job_id): Path<JobId>) -> Result<Json<JobSnapshot>, AppError> {
	Ok(Json(engine.get_job(job_id).await?))
}

#[instrument(name = "resume_job", skip(engine))]
pub async fn resume_job(State(engine): State<LifecycleEngine>, Path(job_id): Path<JobId>) -> Result<Json<ResumeTicket>, AppError> {
	Ok(Json(engine.resume_job(job_id).await?))
}

/// Keep only the final path component and a conservative character set.
fn sanitize_file_name(raw: &str) -> String {
	let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
	let cleaned: String = base.chars().map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' }).collect();
	let cleaned = cleaned.trim_start_matches('.');

	if cleaned.is_empty() {
		"upload".to_string()
	} else {
		cleaned.to_string()
	}
}
