use crate::handlers::health as routes;
use crate::AppState;
use axum::{extract::FromRef, routing::get, Router};

pub fn health_routes<S>() -> Router<S>
where
	S: Clone + Send + Sync + 'static,
	AppState: FromRef<S>,
{
	Router::new().route("/health", get(routes::health))
}
