use crate::{
	checkpoint::{Checkpoint, CheckpointError, CheckpointMeta, CheckpointStore},
	collaborators::{AcquiredAudio, AudioSource, SpeechToText},
	error::{CollaboratorError, LifecycleError, Result},
	event::JobEvent,
	metrics::{JOB_TRANSITIONS, SESSION_NOTIFICATIONS, TRANSCRIPTION_DURATION},
	progress::ProgressPlan,
	registry::JobRegistry,
	resume::{ResumptionPlanner, RECOVERED_TITLE},
	types::{Job, JobId, JobSource, JobStatus, SourceKind},
};
use serde::Serialize;
use std::{
	sync::{Arc, PoisonError, RwLock},
	time::{Duration, Instant},
};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use ws_session::{ConnectionId, SessionError, SessionId, SessionManager, DEFAULT_DELIVERY_TIMEOUT};

pub type JobSessions = SessionManager<JobId, JobEvent>;

pub const CACHED_ELAPSED: &str = "0.0s (cache)";
const COMPLETE_STAGE: &str = "transcription complete";

#[derive(Debug, Clone)]
pub struct EngineConfig {
	pub progress: ProgressPlan,
	/// Pause between simulated progress steps.
	pub step_delay: Duration,
	pub max_concurrent_transcriptions: usize,
	pub default_language: String,
	pub delivery_timeout: Duration,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			progress: ProgressPlan::default(),
			step_delay: Duration::from_millis(300),
			max_concurrent_transcriptions: 1,
			default_language: "pt".to_string(),
			delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobTicket {
	pub job_id: JobId,
	pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumeTicket {
	pub job_id: JobId,
	pub session_id: SessionId,
	pub status: JobStatus,
	pub partial_text: String,
	pub has_prior_progress: bool,
}

impl ResumeTicket {
	fn for_job(job: &Job) -> Self {
		let partial_text = if job.status == JobStatus::Completed {
			job.transcript_text.clone()
		} else {
			job.resume_hint.clone().unwrap_or_default()
		};

		Self {
			job_id: job.id,
			session_id: job.session_id,
			status: job.status,
			has_prior_progress: !partial_text.is_empty(),
			partial_text,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
	#[serde(flatten)]
	pub job: Job,
	pub completed: bool,
}

/// What an attach did with the job behind the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
	/// A run was spawned.
	Started,
	/// The job was already running; the new transport receives the rest.
	Reconnected,
	/// The job had already ended; its outcome was sent again.
	Replayed,
}

struct EngineInner {
	config: EngineConfig,
	registry: JobRegistry,
	checkpoints: Arc<dyn CheckpointStore>,
	sessions: JobSessions,
	planner: ResumptionPlanner,
	audio: Arc<dyn AudioSource>,
	stt: Arc<dyn SpeechToText>,
	inference: Semaphore,
	latest_transcript: RwLock<Option<String>>,
}

/// Drives jobs from creation to a terminal status.
///
/// Cheap to clone; every clone shares the same registry, sessions and
/// inference gate.
#[derive(Clone)]
pub struct LifecycleEngine(Arc<EngineInner>);

impl LifecycleEngine {
	pub fn new(config: EngineConfig, checkpoints: Arc<dyn CheckpointStore>, audio: Arc<dyn AudioSource>, stt: Arc<dyn SpeechToText>) -> Self {
		let registry = JobRegistry::new();
		let planner = ResumptionPlanner::new(registry.clone(), Arc::clone(&checkpoints), config.default_language.clone());

		Self(Arc::new(EngineInner {
			sessions: JobSessions::with_delivery_timeout(config.delivery_timeout),
			inference: Semaphore::new(config.max_concurrent_transcriptions.max(1)),
			latest_transcript: RwLock::new(None),
			config,
			registry,
			checkpoints,
			planner,
			audio,
			stt,
		}))
	}

	#[must_use]
	pub fn config(&self) -> &EngineConfig {
		&self.0.config
	}

	#[must_use]
	pub fn sessions(&self) -> &JobSessions {
		&self.0.sessions
	}

	#[must_use]
	pub fn registry(&self) -> &JobRegistry {
		&self.0.registry
	}

	#[must_use]
	pub fn model_name(&self) -> String {
		self.0.stt.model_name()
	}

	pub fn create_job(&self, source: JobSource, language: Option<String>) -> JobTicket {
		let language = language.filter(|l| !l.trim().is_empty()).unwrap_or_else(|| self.0.config.default_language.clone());
		let job = self.0.registry.create(source, language);
		self.0.sessions.bind(job.session_id, job.id);
		JOB_TRANSITIONS.with_label_values(&[JobStatus::Pending.as_str()]).inc();

		info!(job_id = %job.id, session_id = %job.session_id, source = ?job.source, "Job registered");
		JobTicket {
			job_id: job.id,
			session_id: job.session_id,
		}
	}

	/// Attach a transport to a session and act on the job behind it.
	pub async fn attach(&self, session_id: SessionId, connection: ConnectionId, outbound: tokio::sync::mpsc::Sender<JobEvent>) -> Result<AttachOutcome> {
		let job_id = self.0.sessions.connect(session_id, connection, outbound)?;
		let job = self.0.registry.get(job_id).await.ok_or(LifecycleError::NotFound(job_id))?;

		if job.status == JobStatus::AttachedProcessing {
			self.notify(session_id, JobEvent::status("Reconnected to running transcription")).await;
			return Ok(AttachOutcome::Reconnected);
		}

		if let Some(checkpoint) = self.load_checkpoint(job_id).await?.filter(|c| c.completed) {
			debug!(%job_id, "Serving completed checkpoint");
			self.replay_completed(session_id, job_id, &checkpoint.text, checkpoint.meta.title).await?;
			return Ok(AttachOutcome::Replayed);
		}

		match job.status {
			JobStatus::Pending | JobStatus::AwaitingResume => {
				self.spawn_run(job_id);
				Ok(AttachOutcome::Started)
			}
			JobStatus::Completed => {
				self.replay_completed(session_id, job_id, &job.transcript_text, None).await?;
				Ok(AttachOutcome::Replayed)
			}
			JobStatus::Failed => {
				let message = job.error.unwrap_or_else(|| "transcription failed".to_string());
				self.notify(session_id, JobEvent::Failed { job_id: Some(job_id), message }).await;
				Ok(AttachOutcome::Replayed)
			}
			JobStatus::Cancelled | JobStatus::AttachedProcessing => {
				self.notify(session_id, JobEvent::Cancelled { job_id }).await;
				Ok(AttachOutcome::Replayed)
			}
		}
	}

	fn spawn_run(&self, job_id: JobId) {
		let engine = self.clone();
		tokio::spawn(async move {
			match engine.run_job(job_id).await {
				Ok(()) => {}
				Err(e @ LifecycleError::InvalidState { .. }) => debug!(%job_id, error = %e, "Run skipped"),
				Err(e) => error!(%job_id, error = %e, "Job run aborted"),
			}
		});
	}

	/// Run a job end to end on the calling task.
	///
	/// Collaborator failures end the job as `failed` and still return `Ok`;
	/// only a persistence failure is returned to the caller.
	pub async fn run_job(&self, job_id: JobId) -> Result<()> {
		let (session_id, source, language, resume_hint) = {
			let mut job = self.0.registry.lock(job_id).await.ok_or(LifecycleError::NotFound(job_id))?;
			if !job.status.is_startable() {
				return Err(LifecycleError::InvalidState {
					job_id,
					status: job.status,
					operation: "start",
				});
			}
			if !self.0.sessions.is_live(job.session_id) {
				debug!(%job_id, session_id = %job.session_id, "Session not live, run not started");
				return Ok(());
			}
			transition(&mut job, JobStatus::AttachedProcessing);
			(job.session_id, job.source.clone(), job.language.clone(), job.resume_hint.clone())
		};

		let Some(source) = source else {
			return self.fail(job_id, session_id, CollaboratorError::Acquisition("job has no recorded source".to_string())).await;
		};

		let acquired = match self.acquire(job_id, session_id, &source).await {
			Ok(acquired) => acquired,
			Err(e) => return self.fail(job_id, session_id, e).await,
		};

		let title = acquired.title.clone();
		let still_running = self
			.update_running(job_id, |job| {
				job.title.clone_from(&title);
			})
			.await?;
		if !still_running {
			return Ok(());
		}

		if let Some(hint) = resume_hint.filter(|h| !h.is_empty()) {
			self.notify(session_id, progress_event(job_id, &title, hint, 25, "resuming", None)).await;
		}

		let model = self.0.stt.model_name();
		let deliver = self.notify(session_id, JobEvent::status(format!("Starting transcription with model {model}"))).await;
		if !deliver {
			info!(%job_id, "Session gone before inference, continuing without notifications");
		}

		let (text, elapsed) = match self.transcribe(job_id, &acquired, &language).await {
			Ok(result) => result,
			Err(e) => return self.fail(job_id, session_id, e).await,
		};

		if !self.publish(job_id, session_id, &title, &text, &elapsed, deliver).await? {
			return Ok(());
		}

		*self.0.latest_transcript.write().unwrap_or_else(PoisonError::into_inner) = Some(text);
		self.notify(session_id, JobEvent::Completed { job_id, title, elapsed }).await;
		info!(%job_id, "Transcription completed");
		Ok(())
	}

	async fn acquire(&self, job_id: JobId, session_id: SessionId, source: &JobSource) -> std::result::Result<AcquiredAudio, CollaboratorError> {
		match source.kind {
			SourceKind::RemoteUrl => {
				self.notify(session_id, progress_event(job_id, "", String::new(), 10, "downloading", None)).await;
			}
			SourceKind::LocalFile => {
				self.notify(session_id, JobEvent::status("Extracting audio from file")).await;
			}
		}

		let audio = Arc::clone(&self.0.audio);
		let owned = source.clone();
		let acquired = tokio::task::spawn_blocking(move || audio.acquire(&owned))
			.await
			.map_err(|e| CollaboratorError::WorkerAborted(e.to_string()))??;

		info!(%job_id, title = %acquired.title, path = %acquired.audio_path.display(), "Audio acquired");
		match source.kind {
			SourceKind::RemoteUrl => {
				self.notify(session_id, progress_event(job_id, &acquired.title, String::new(), 20, "prepared", None)).await;
			}
			SourceKind::LocalFile => {
				self.notify(session_id, JobEvent::status(format!("Audio ready: {}", acquired.title))).await;
			}
		}
		Ok(acquired)
	}

	async fn transcribe(&self, job_id: JobId, acquired: &AcquiredAudio, language: &str) -> std::result::Result<(String, String), CollaboratorError> {
		let _permit = self.0.inference.acquire().await.map_err(|e| CollaboratorError::WorkerAborted(e.to_string()))?;

		let stt = Arc::clone(&self.0.stt);
		let path = acquired.audio_path.clone();
		let language = language.to_string();
		let started = Instant::now();
		let result = tokio::task::spawn_blocking(move || stt.transcribe(&path, &language))
			.await
			.map_err(|e| CollaboratorError::WorkerAborted(e.to_string()))
			.and_then(|r| r);

		let secs = started.elapsed().as_secs_f64();
		let outcome = if result.is_ok() { "ok" } else { "error" };
		TRANSCRIPTION_DURATION.with_label_values(&[outcome]).observe(secs);
		debug!(%job_id, secs, outcome, "Inference finished");

		Ok((result?, format!("{secs:.1}s")))
	}

	/// Walk the progress plan, checkpointing each step before announcing it.
	/// Returns `false` when the job stopped being processed in between.
	async fn publish(&self, job_id: JobId, session_id: SessionId, title: &str, text: &str, elapsed: &str, mut deliver: bool) -> Result<bool> {
		let plan = self.0.config.progress.clone();

		for frame in plan.frames(text) {
			if !frame.is_final && !deliver {
				continue;
			}

			{
				let mut job = self.0.registry.lock(job_id).await.ok_or(LifecycleError::NotFound(job_id))?;
				if job.status != JobStatus::AttachedProcessing {
					info!(%job_id, status = %job.status, percent = frame.percent, "Processing stopped at checkpoint boundary");
					return Ok(false);
				}

				let checkpoint = Checkpoint::new(job_id, frame.text, frame.is_final).with_meta(meta_of(&job));
				if let Err(e) = self.0.checkpoints.save(&checkpoint).await {
					error!(%job_id, percent = frame.percent, error = %e, "Checkpoint save failed");
					job.error = Some(e.to_string());
					transition(&mut job, JobStatus::Failed);
					drop(job);
					self.notify(session_id, JobEvent::Failed { job_id: Some(job_id), message: e.to_string() }).await;
					return Err(LifecycleError::Persistence(e));
				}

				if frame.is_final {
					job.transcript_text = frame.text.to_string();
					job.resume_hint = None;
					transition(&mut job, JobStatus::Completed);
				} else {
					job.advance_transcript(frame.text);
				}
			}

			let stage_elapsed = frame.is_final.then(|| elapsed.to_string());
			let event = progress_event(job_id, title, frame.text.to_string(), frame.percent, &frame.stage, stage_elapsed);
			if !self.notify(session_id, event).await && deliver {
				warn!(%job_id, %session_id, "Client unreachable, skipping remaining progress updates");
				deliver = false;
			}

			if !frame.is_final {
				tokio::time::sleep(self.0.config.step_delay).await;
			}
		}

		Ok(true)
	}

	/// Apply `f` only while the job is still being processed.
	async fn update_running<F>(&self, job_id: JobId, f: F) -> Result<bool>
	where
		F: FnOnce(&mut Job) + Send,
	{
		self.0
			.registry
			.update(job_id, |job| {
				if job.status != JobStatus::AttachedProcessing {
					return false;
				}
				f(job);
				true
			})
			.await
			.ok_or(LifecycleError::NotFound(job_id))
	}

	async fn fail(&self, job_id: JobId, session_id: SessionId, cause: CollaboratorError) -> Result<()> {
		let message = cause.to_string();
		let recorded = self
			.update_running(job_id, |job| {
				job.error = Some(message.clone());
				transition(job, JobStatus::Failed);
			})
			.await?;

		if recorded {
			warn!(%job_id, error = %message, "Job failed");
			self.notify(session_id, JobEvent::Failed { job_id: Some(job_id), message }).await;
		} else {
			debug!(%job_id, error = %message, "Discarding failure of a job no longer processing");
		}
		Ok(())
	}

	async fn replay_completed(&self, session_id: SessionId, job_id: JobId, text: &str, stored_title: Option<String>) -> Result<()> {
		let title = self
			.0
			.registry
			.update(job_id, |job| {
				text.clone_into(&mut job.transcript_text);
				if job.status != JobStatus::Completed {
					job.resume_hint = None;
					transition(job, JobStatus::Completed);
				}
				if job.title.is_empty() {
					job.title = stored_title.filter(|t| !t.is_empty()).unwrap_or_else(|| RECOVERED_TITLE.to_string());
				}
				job.title.clone()
			})
			.await
			.ok_or(LifecycleError::NotFound(job_id))?;

		self.notify(session_id, progress_event(job_id, &title, text.to_string(), 100, COMPLETE_STAGE, None)).await;
		self.notify(
			session_id,
			JobEvent::Completed {
				job_id,
				title,
				elapsed: CACHED_ELAPSED.to_string(),
			},
		)
		.await;
		Ok(())
	}

	/// Cancel the job a session currently drives. Only a job being processed can be
	/// cancelled, and a session left behind by a resumption no longer drives its job.
	pub async fn cancel(&self, session_id: SessionId) -> Result<JobId> {
		let job_id = self.0.registry.find_by_session(session_id).await.map(|job| job.id).ok_or(SessionError::Unbound(session_id))?;

		{
			let mut job = self.0.registry.lock(job_id).await.ok_or(LifecycleError::NotFound(job_id))?;
			if job.session_id != session_id {
				return Err(SessionError::Unbound(session_id).into());
			}
			if job.status != JobStatus::AttachedProcessing {
				return Err(LifecycleError::InvalidState {
					job_id,
					status: job.status,
					operation: "cancel",
				});
			}
			transition(&mut job, JobStatus::Cancelled);
		}

		self.notify(session_id, JobEvent::Cancelled { job_id }).await;
		Ok(job_id)
	}

	pub async fn get_job(&self, job_id: JobId) -> Result<JobSnapshot> {
		let mut job = match self.0.registry.get(job_id).await {
			Some(job) => job,
			None => {
				let job = self.0.planner.plan(job_id).await?.into_job();
				self.0.sessions.bind(job.session_id, job.id);
				job
			}
		};

		let checkpoint = self.load_checkpoint(job_id).await?;
		let completed = job.status == JobStatus::Completed || checkpoint.as_ref().is_some_and(|c| c.completed);
		if let Some(checkpoint) = checkpoint {
			job.advance_transcript(&checkpoint.text);
		}

		Ok(JobSnapshot { job, completed })
	}

	pub async fn list_jobs(&self) -> Vec<Job> {
		self.0.registry.list().await
	}

	/// Prepare a job to be picked up again by a new session.
	pub async fn resume_job(&self, job_id: JobId) -> Result<ResumeTicket> {
		let Some(mut job) = self.0.registry.lock(job_id).await else {
			let plan = self.0.planner.plan(job_id).await?;
			let job = plan.job();
			self.0.sessions.bind(job.session_id, job_id);
			info!(%job_id, status = %job.status, session_id = %job.session_id, "Job recovered for resumption");
			return Ok(ResumeTicket::for_job(job));
		};

		match job.status {
			JobStatus::Completed => return Ok(ResumeTicket::for_job(&job)),
			JobStatus::Pending | JobStatus::AttachedProcessing => {
				return Err(LifecycleError::InvalidState {
					job_id,
					status: job.status,
					operation: "resume",
				});
			}
			JobStatus::Failed | JobStatus::Cancelled | JobStatus::AwaitingResume => {}
		}

		let checkpoint = self.load_checkpoint(job_id).await?;
		if let Some(checkpoint) = checkpoint.as_ref().filter(|c| c.completed) {
			job.transcript_text.clone_from(&checkpoint.text);
			job.resume_hint = None;
			transition(&mut job, JobStatus::Completed);
			return Ok(ResumeTicket::for_job(&job));
		}

		let partial = checkpoint.map(|c| c.text).filter(|t| !t.is_empty());
		let hint = partial.or_else(|| job.resume_hint.take()).or_else(|| Some(std::mem::take(&mut job.transcript_text))).filter(|t| !t.is_empty());

		// the next run rebuilds the transcript; the partial text only survives as a hint
		job.transcript_text.clear();
		let previous_session = job.session_id;
		job.session_id = SessionId::new();
		job.resume_hint = hint;
		transition(&mut job, JobStatus::AwaitingResume);
		let ticket = ResumeTicket::for_job(&job);
		drop(job);

		self.0.sessions.disconnect(previous_session, "job resumed on a new session");
		self.0.sessions.bind(ticket.session_id, job_id);
		info!(%job_id, session_id = %ticket.session_id, has_prior_progress = ticket.has_prior_progress, "Job ready for resumption");
		Ok(ticket)
	}

	/// Full transcript of a job as known now.
	pub async fn transcript_for(&self, job_id: JobId) -> Result<String> {
		Ok(self.get_job(job_id).await?.job.transcript_text)
	}

	#[must_use]
	pub fn latest_transcript(&self) -> Option<String> {
		self.0.latest_transcript.read().unwrap_or_else(PoisonError::into_inner).clone()
	}

	async fn load_checkpoint(&self, job_id: JobId) -> Result<Option<Checkpoint>> {
		match self.0.checkpoints.load(job_id).await {
			Ok(checkpoint) => Ok(checkpoint),
			Err(CheckpointError::Corrupt { reason, .. }) => {
				warn!(%job_id, %reason, "Ignoring corrupt checkpoint");
				Ok(None)
			}
			Err(e) => Err(e.into()),
		}
	}

	async fn notify(&self, session_id: SessionId, event: JobEvent) -> bool {
		let delivered = self.0.sessions.notify(session_id, event).await;
		SESSION_NOTIFICATIONS.with_label_values(&[if delivered { "delivered" } else { "dropped" }]).inc();
		delivered
	}
}

fn transition(job: &mut Job, to: JobStatus) {
	let from = job.status;
	job.status = to;
	if to != JobStatus::Failed {
		job.error = None;
	}
	JOB_TRANSITIONS.with_label_values(&[to.as_str()]).inc();
	info!(job_id = %job.id, %from, %to, "Job status changed");
}

fn meta_of(job: &Job) -> CheckpointMeta {
	CheckpointMeta {
		source: job.source.clone(),
		title: Some(job.title.clone()).filter(|t| !t.is_empty()),
		language: Some(job.language.clone()),
	}
}

fn progress_event(job_id: JobId, title: &str, text: String, percent: u8, stage: &str, elapsed: Option<String>) -> JobEvent {
	JobEvent::Progress {
		job_id,
		title: title.to_string(),
		text,
		percent,
		stage: stage.to_string(),
		elapsed,
	}
}
