use crate::handlers::speech as routes;
use crate::AppState;
use axum::{
	extract::FromRef,
	routing::{get, post},
	Router,
};

pub fn speech_routes<S>() -> Router<S>
where
	S: Clone + Send + Sync + 'static,
	AppState: FromRef<S>,
{
	Router::new().route("/speech", post(routes::post_speech)).route("/speech/:file", get(routes::get_speech))
}
