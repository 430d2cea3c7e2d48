use axum::{extract::FromRef, middleware, routing::get, Router};
use job_lifecycle::{EngineConfig, FsCheckpointStore, LifecycleEngine, ProgressPlan, QuestionAnswering, TextToSpeech};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

pub mod collaborators;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod process;
pub mod routes;
pub mod websocket;

pub use config::Config;
pub use error::AppError;
pub use models::ModelCatalog;

use collaborators::{EdgeTts, MediaAcquirer, OpenRouterClient, WhisperCli};

/// Core: process-wide settings and the shutdown signal
#[derive(Clone)]
pub struct CoreContext {
	pub config: Arc<Config>,
	pub cancel_token: CancellationToken,
}

/// Collaborators used directly by HTTP handlers, outside the job lifecycle
#[derive(Clone)]
pub struct Collaborators {
	pub speech: Arc<dyn TextToSpeech>,
	pub insights: Arc<dyn QuestionAnswering>,
	pub models: Arc<ModelCatalog>,
}

#[derive(Clone)]
pub struct AppState {
	pub core: CoreContext,
	pub engine: LifecycleEngine,
	pub collaborators: Collaborators,
}

impl AppState {
	/// Wire the real collaborators from configuration
	pub async fn build(config: Arc<Config>, cancel_token: CancellationToken) -> anyhow::Result<Self> {
		for dir in [config.uploads_dir(), config.audio_dir(), config.speech_dir(), config.scratch_dir()] {
			tokio::fs::create_dir_all(&dir).await?;
		}

		let checkpoints = Arc::new(FsCheckpointStore::open(config.checkpoint_dir()).await?);
		let models = Arc::new(ModelCatalog::new(&config.whisper_model).map_err(anyhow::Error::msg)?);

		let audio = Arc::new(MediaAcquirer::new(&config.yt_dlp_bin, &config.ffmpeg_bin, config.audio_dir()));
		let stt = Arc::new(WhisperCli::new(&config.whisper_bin, Arc::clone(&models), config.scratch_dir()));
		let engine = LifecycleEngine::new(engine_config(&config), checkpoints, audio, stt);

		let collaborators = Collaborators {
			speech: Arc::new(EdgeTts::new(&config.edge_tts_bin, &config.tts_voice)),
			insights: Arc::new(OpenRouterClient::new(
				config.openrouter_api_key.clone(),
				&config.openrouter_model,
				&config.openrouter_url,
			)),
			models,
		};

		Ok(Self::from_parts(config, cancel_token, engine, collaborators))
	}

	#[must_use]
	pub const fn from_parts(config: Arc<Config>, cancel_token: CancellationToken, engine: LifecycleEngine, collaborators: Collaborators) -> Self {
		Self {
			core: CoreContext { config, cancel_token },
			engine,
			collaborators,
		}
	}
}

#[must_use]
pub fn engine_config(config: &Config) -> EngineConfig {
	EngineConfig {
		progress: ProgressPlan::default(),
		step_delay: Duration::from_millis(config.progress_step_delay_ms),
		max_concurrent_transcriptions: config.max_concurrent_transcriptions,
		default_language: config.default_language.clone(),
		..EngineConfig::default()
	}
}

/// Every route of the service, without the tower resilience stack.
pub fn app_router(state: AppState) -> Router {
	Router::new()
		.merge(routes::jobs::job_routes::<AppState>())
		.merge(routes::insights::insight_routes::<AppState>())
		.merge(routes::speech::speech_routes::<AppState>())
		.merge(routes::models::model_routes::<AppState>())
		.merge(routes::health::health_routes::<AppState>())
		.merge(websocket::ws_routes::<AppState>())
		.route("/metrics", get(metrics::metrics_handler))
		.route_layer(middleware::from_fn(metrics::metrics_middleware))
		.with_state(state)
}

impl FromRef<AppState> for LifecycleEngine {
	fn from_ref(state: &AppState) -> Self {
		state.engine.clone()
	}
}

impl FromRef<AppState> for Arc<Config> {
	fn from_ref(state: &AppState) -> Self {
		state.core.config.clone()
	}
}

impl FromRef<AppState> for Arc<ModelCatalog> {
	fn from_ref(state: &AppState) -> Self {
		state.collaborators.models.clone()
	}
}
