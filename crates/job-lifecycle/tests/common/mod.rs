#![allow(dead_code)]

use async_trait::async_trait;
use job_lifecycle::{
	AcquiredAudio, AudioSource, Checkpoint, CheckpointError, CheckpointStore, CollaboratorError, EngineConfig, FsCheckpointStore, JobEvent, JobId, JobSource, JobStatus,
	LifecycleEngine, SpeechToText,
};
use std::{
	path::{Path, PathBuf},
	sync::{
		atomic::{AtomicUsize, Ordering},
		mpsc, Arc, Mutex,
	},
	time::Duration,
};
use tempfile::TempDir;

pub const WAIT: Duration = Duration::from_secs(10);

/// Blocks the calling worker until the test opens it.
pub struct Gate(Mutex<mpsc::Receiver<()>>);

impl Gate {
	pub fn new() -> (mpsc::Sender<()>, Self) {
		let (tx, rx) = mpsc::channel();
		(tx, Self(Mutex::new(rx)))
	}

	fn wait(&self) {
		let _ = self.0.lock().unwrap().recv();
	}
}

pub struct FakeAudio {
	pub title: String,
	pub failure: Option<String>,
	pub gate: Option<Gate>,
	pub calls: AtomicUsize,
}

impl FakeAudio {
	pub fn titled(title: &str) -> Self {
		Self {
			title: title.to_string(),
			failure: None,
			gate: None,
			calls: AtomicUsize::new(0),
		}
	}

	pub fn failing(message: &str) -> Self {
		Self {
			failure: Some(message.to_string()),
			..Self::titled("")
		}
	}

	pub fn gated(title: &str) -> (mpsc::Sender<()>, Self) {
		let (open, gate) = Gate::new();
		(open, Self { gate: Some(gate), ..Self::titled(title) })
	}
}

impl AudioSource for FakeAudio {
	fn acquire(&self, source: &JobSource) -> Result<AcquiredAudio, CollaboratorError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if let Some(gate) = &self.gate {
			gate.wait();
		}
		if let Some(message) = &self.failure {
			return Err(CollaboratorError::Acquisition(message.clone()));
		}
		Ok(AcquiredAudio {
			audio_path: PathBuf::from(&source.reference),
			title: self.title.clone(),
		})
	}
}

pub struct FakeStt {
	pub text: Mutex<String>,
	pub failures_left: AtomicUsize,
	pub gate: Option<Gate>,
	pub calls: AtomicUsize,
}

impl FakeStt {
	pub fn returning(text: &str) -> Self {
		Self {
			text: Mutex::new(text.to_string()),
			failures_left: AtomicUsize::new(0),
			gate: None,
			calls: AtomicUsize::new(0),
		}
	}

	pub fn failing_once(text: &str) -> Self {
		Self {
			failures_left: AtomicUsize::new(1),
			..Self::returning(text)
		}
	}

	pub fn gated(text: &str) -> (mpsc::Sender<()>, Self) {
		let (open, gate) = Gate::new();
		(open, Self { gate: Some(gate), ..Self::returning(text) })
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Transcript returned by later calls, e.g. after a model switch.
	pub fn set_text(&self, text: &str) {
		*self.text.lock().unwrap() = text.to_string();
	}
}

impl SpeechToText for FakeStt {
	fn transcribe(&self, _audio_path: &Path, _language: &str) -> Result<String, CollaboratorError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if let Some(gate) = &self.gate {
			gate.wait();
		}
		let failed = self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1)).is_ok();
		if failed {
			return Err(CollaboratorError::Inference("model crashed".to_string()));
		}
		Ok(self.text.lock().unwrap().clone())
	}

	fn model_name(&self) -> String {
		"fake".to_string()
	}
}

/// Loads nothing, fails every save.
pub struct FailingStore;

#[async_trait]
impl CheckpointStore for FailingStore {
	async fn save(&self, _checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
		Err(CheckpointError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
	}

	async fn load(&self, _job_id: JobId) -> Result<Option<Checkpoint>, CheckpointError> {
		Ok(None)
	}
}

pub fn test_config() -> EngineConfig {
	EngineConfig {
		step_delay: Duration::from_millis(1),
		..EngineConfig::default()
	}
}

pub async fn fs_store(dir: &TempDir) -> Arc<FsCheckpointStore> {
	Arc::new(FsCheckpointStore::open(dir.path().join("transcripts")).await.unwrap())
}

pub fn engine_with(store: Arc<dyn CheckpointStore>, audio: Arc<FakeAudio>, stt: Arc<FakeStt>, config: EngineConfig) -> LifecycleEngine {
	LifecycleEngine::new(config, store, audio, stt)
}

/// Receive events until a terminal one arrives or the channel closes.
pub async fn collect_until_terminal(rx: &mut tokio::sync::mpsc::Receiver<JobEvent>) -> Vec<JobEvent> {
	let mut events = Vec::new();
	let collect = async {
		while let Some(event) = rx.recv().await {
			let terminal = event.is_terminal();
			events.push(event);
			if terminal {
				break;
			}
		}
	};
	tokio::time::timeout(WAIT, collect).await.expect("timed out waiting for events");
	events
}

pub fn percents(events: &[JobEvent]) -> Vec<u8> {
	events.iter().filter_map(JobEvent::percent).collect()
}

pub async fn wait_for_status(engine: &LifecycleEngine, job_id: JobId, wanted: JobStatus) {
	let poll = async {
		loop {
			if engine.registry().get(job_id).await.is_some_and(|job| job.status == wanted) {
				return;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	};
	tokio::time::timeout(WAIT, poll).await.expect("timed out waiting for job status");
}
