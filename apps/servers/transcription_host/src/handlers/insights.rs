use crate::{error::AppError, AppState};
use axum::{extract::State, Json};
use job_lifecycle::JobId;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct InsightsRequest {
	#[serde(default)]
	pub job_id: Option<JobId>,
	pub question: String,
}

#[derive(Debug, Serialize)]
pub struct InsightsResponse {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub job_id: Option<JobId>,
	pub answer: String,
}

/// Answer a question about a job's transcript, or the latest completed one.
#[instrument(name = "insights", skip(state))]
pub async fn post_insights(State(state): State<AppState>, Json(request): Json<InsightsRequest>) -> Result<Json<InsightsResponse>, AppError> {
	let question = request.question.trim();
	if question.is_empty() {
		return Err(AppError::BadRequest("question must not be empty".to_string()));
	}

	let transcript = match request.job_id {
		Some(job_id) => state.engine.transcript_for(job_id).await?,
		None => state
			.engine
			.latest_transcript()
			.ok_or_else(|| AppError::BadRequest("no transcript available yet".to_string()))?,
	};
	if transcript.trim().is_empty() {
		return Err(AppError::BadRequest("transcript is empty".to_string()));
	}

	let answer = state.collaborators.insights.answer(&transcript, question).await?;
	Ok(Json(InsightsResponse { job_id: request.job_id, answer }))
}
