use crate::handlers::models as routes;
use crate::ModelCatalog;
use axum::{
	extract::FromRef,
	routing::{get, post},
	Router,
};
use std::sync::Arc;

pub fn model_routes<S>() -> Router<S>
where
	S: Clone + Send + Sync + 'static,
	Arc<ModelCatalog>: FromRef<S>,
{
	Router::new().route("/models", get(routes::list_models)).route("/models/:name", post(routes::switch_model))
}
