use crate::{error::AppError, models::ModelListing, ModelCatalog};
use axum::{
	extract::{Path, State},
	Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Serialize)]
pub struct ModelSwitched {
	pub status: &'static str,
	pub model: &'static str,
}

#[instrument(name = "list_models", skip(models))]
pub async fn list_models(State(models): State<Arc<ModelCatalog>>) -> Json<ModelListing> {
	Json(models.listing())
}

#[instrument(name = "switch_model", skip(models))]
pub async fn switch_model(State(models): State<Arc<ModelCatalog>>, Path(name): Path<String>) -> Result<Json<ModelSwitched>, AppError> {
	let model = models.select(&name).ok_or_else(|| AppError::BadRequest(format!("model {name} is not available")))?;
	info!(model, "Whisper model switched");
	Ok(Json(ModelSwitched { status: "success", model }))
}
