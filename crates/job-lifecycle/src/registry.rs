use crate::types::{Job, JobId, JobSource};
use dashmap::DashMap;
use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use ws_session::SessionId;

#[derive(Debug)]
struct Slot {
	seq: u64,
	job: Arc<Mutex<Job>>,
}

/// In-memory source of truth for job records. Each job sits behind its own
/// async mutex so multi-step updates on one job never interleave.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
	jobs: Arc<DashMap<JobId, Slot>>,
	next_seq: Arc<AtomicU64>,
}

impl JobRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn create(&self, source: JobSource, language: impl Into<String>) -> Job {
		let job = Job::new(source, language);
		self.insert(job.clone());
		debug!(job_id = %job.id, session_id = %job.session_id, "Job created");
		job
	}

	/// Insert a recovered record. An existing entry always wins.
	pub fn rehydrate(&self, job: Job) -> bool {
		if self.jobs.contains_key(&job.id) {
			return false;
		}
		self.insert(job)
	}

	fn insert(&self, job: Job) -> bool {
		let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
		let mut inserted = false;
		self.jobs.entry(job.id).or_insert_with(|| {
			inserted = true;
			Slot {
				seq,
				job: Arc::new(Mutex::new(job)),
			}
		});
		inserted
	}

	fn handle(&self, job_id: JobId) -> Option<Arc<Mutex<Job>>> {
		self.jobs.get(&job_id).map(|slot| Arc::clone(&slot.job))
	}

	pub async fn get(&self, job_id: JobId) -> Option<Job> {
		let handle = self.handle(job_id)?;
		let job = handle.lock().await;
		Some(job.clone())
	}

	/// Owned guard for critical sections spanning awaits.
	pub async fn lock(&self, job_id: JobId) -> Option<OwnedMutexGuard<Job>> {
		let handle = self.handle(job_id)?;
		Some(handle.lock_owned().await)
	}

	/// Atomic read-modify-write of one job.
	pub async fn update<F, T>(&self, job_id: JobId, f: F) -> Option<T>
	where
		F: FnOnce(&mut Job) -> T + Send,
	{
		let mut job = self.lock(job_id).await?;
		Some(f(&mut job))
	}

	/// Snapshot of every job in insertion order.
	pub async fn list(&self) -> Vec<Job> {
		let mut handles: Vec<(u64, Arc<Mutex<Job>>)> = self.jobs.iter().map(|slot| (slot.seq, Arc::clone(&slot.job))).collect();
		handles.sort_by_key(|(seq, _)| *seq);

		let mut jobs = Vec::with_capacity(handles.len());
		for (_, handle) in handles {
			jobs.push(handle.lock().await.clone());
		}
		jobs
	}

	pub async fn find_by_session(&self, session_id: SessionId) -> Option<Job> {
		for job in self.list().await {
			if job.session_id == session_id {
				return Some(job);
			}
		}
		None
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.jobs.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.jobs.is_empty()
	}
}
