use crate::handlers::jobs as routes;
use crate::config::Config;
use axum::{
	extract::{DefaultBodyLimit, FromRef},
	routing::{get, post},
	Router,
};
use job_lifecycle::LifecycleEngine;
use std::sync::Arc;

pub fn job_routes<S>() -> Router<S>
where
	S: Clone + Send + Sync + 'static,
	LifecycleEngine: FromRef<S>,
	Arc<Config>: FromRef<S>,
{
	Router::new()
		.route("/jobs", get(routes::list_jobs))
		.route("/jobs/url", post(routes::create_url_job))
		// Uploads are capped by the global body limit layer instead.
		.route("/jobs/file", post(routes::create_file_job).layer(DefaultBodyLimit::disable()))
		.route("/jobs/:job_id", get(routes::get_job))
		.route("/jobs/:job_id/resume", post(routes::resume_job))
}
