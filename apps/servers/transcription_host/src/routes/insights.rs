use crate::handlers::insights as routes;
use crate::AppState;
use axum::{extract::FromRef, routing::post, Router};

pub fn insight_routes<S>() -> Router<S>
where
	S: Clone + Send + Sync + 'static,
	AppState: FromRef<S>,
{
	Router::new().route("/insights", post(routes::post_insights))
}
