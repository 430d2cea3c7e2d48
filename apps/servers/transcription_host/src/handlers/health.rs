use crate::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use tracing::instrument;
use ws_session::SessionStats;

#[derive(Serialize)]
pub struct HealthResponse {
	status: &'static str,
	version: &'static str,
	model: String,
	jobs: usize,
	sessions: SessionStats,
	insights_configured: bool,
}

#[instrument(name = "health", skip(state))]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
	let response = HealthResponse {
		status: "healthy",
		version: env!("CARGO_PKG_VERSION"),
		model: state.engine.model_name(),
		jobs: state.engine.registry().len(),
		sessions: state.engine.sessions().stats(),
		insights_configured: state.collaborators.insights.is_configured(),
	};

	(StatusCode::OK, Json(response))
}
