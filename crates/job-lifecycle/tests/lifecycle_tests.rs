mod common;

#[cfg(test)]
mod tests {
	use super::common::*;
	use job_lifecycle::{
		AttachOutcome, Checkpoint, CheckpointMeta, CheckpointStore, EngineConfig, JobEvent, JobId, JobSource, JobStatus, LifecycleEngine, LifecycleError,
		CACHED_ELAPSED,
	};
	use std::{sync::Arc, time::Duration};
	use tempfile::TempDir;
	use tokio::sync::mpsc;
	use ws_session::{ConnectionId, SessionError, SessionId};

	async fn local_engine(dir: &TempDir, text: &str) -> (LifecycleEngine, Arc<FakeStt>) {
		let stt = Arc::new(FakeStt::returning(text));
		let engine = engine_with(fs_store(dir).await, Arc::new(FakeAudio::titled("Demo")), stt.clone(), test_config());
		(engine, stt)
	}

	async fn attach(engine: &LifecycleEngine, session_id: SessionId) -> (AttachOutcome, mpsc::Receiver<JobEvent>) {
		attach_as(engine, session_id, ConnectionId::new()).await
	}

	async fn attach_as(engine: &LifecycleEngine, session_id: SessionId, connection: ConnectionId) -> (AttachOutcome, mpsc::Receiver<JobEvent>) {
		let (tx, rx) = mpsc::channel(64);
		let outcome = engine.attach(session_id, connection, tx).await.unwrap();
		(outcome, rx)
	}

	#[tokio::test]
	async fn test_local_file_runs_to_completion() {
		let dir = TempDir::new().unwrap();
		let store = fs_store(&dir).await;
		let stt = Arc::new(FakeStt::returning("hello world"));
		let engine = engine_with(store.clone(), Arc::new(FakeAudio::titled("Demo")), stt.clone(), test_config());

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		let (outcome, mut rx) = attach(&engine, ticket.session_id).await;
		assert_eq!(outcome, AttachOutcome::Started);

		let events = collect_until_terminal(&mut rx).await;
		assert_eq!(percents(&events), vec![50, 70, 85, 95, 100]);
		match events.last().unwrap() {
			JobEvent::Completed { job_id, title, .. } => {
				assert_eq!(*job_id, ticket.job_id);
				assert_eq!(title, "Demo");
			}
			other => panic!("expected completion, got {other:?}"),
		}

		let checkpoint = store.load(ticket.job_id).await.unwrap().unwrap();
		assert_eq!(checkpoint.text, "hello world");
		assert!(checkpoint.completed);

		let snapshot = engine.get_job(ticket.job_id).await.unwrap();
		assert_eq!(snapshot.job.status, JobStatus::Completed);
		assert_eq!(snapshot.job.transcript_text, "hello world");
		assert!(snapshot.completed);
		assert_eq!(stt.calls(), 1);
		assert_eq!(engine.latest_transcript().as_deref(), Some("hello world"));
	}

	#[tokio::test]
	async fn test_remote_progress_is_monotonic() {
		let dir = TempDir::new().unwrap();
		let (engine, _stt) = local_engine(&dir, "uma transcrição de teste").await;

		let ticket = engine.create_job(JobSource::remote("https://www.youtube.com/watch?v=abc"), Some("pt".to_string()));
		let (_, mut rx) = attach(&engine, ticket.session_id).await;
		let events = collect_until_terminal(&mut rx).await;

		let seen = percents(&events);
		assert_eq!(seen, vec![10, 20, 50, 70, 85, 95, 100]);
		assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
		assert_eq!(seen.iter().filter(|p| **p == 100).count(), 1);

		let final_text = events.iter().rev().find_map(|e| match e {
			JobEvent::Progress { text, percent: 100, elapsed, .. } => Some((text.clone(), elapsed.clone())),
			_ => None,
		});
		let (text, elapsed) = final_text.unwrap();
		assert_eq!(text, "uma transcrição de teste");
		assert!(elapsed.unwrap().ends_with('s'));
	}

	#[tokio::test]
	async fn test_acquisition_failure_marks_job_failed() {
		let dir = TempDir::new().unwrap();
		let store = fs_store(&dir).await;
		let stt = Arc::new(FakeStt::returning("never"));
		let engine = engine_with(store.clone(), Arc::new(FakeAudio::failing("all download strategies failed")), stt.clone(), test_config());

		let ticket = engine.create_job(JobSource::remote("https://example.com/video"), None);
		let (_, mut rx) = attach(&engine, ticket.session_id).await;
		let events = collect_until_terminal(&mut rx).await;

		assert!(matches!(events.last(), Some(JobEvent::Failed { message, .. }) if message.contains("all download strategies failed")));

		let job = engine.get_job(ticket.job_id).await.unwrap().job;
		assert_eq!(job.status, JobStatus::Failed);
		assert!(job.error.is_some());
		assert!(store.load(ticket.job_id).await.unwrap().is_none());
		assert_eq!(stt.calls(), 0);
	}

	#[tokio::test]
	async fn test_attach_completed_job_serves_cached_result() {
		let dir = TempDir::new().unwrap();
		let (engine, stt) = local_engine(&dir, "hello world").await;

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		let (_, mut rx) = attach(&engine, ticket.session_id).await;
		collect_until_terminal(&mut rx).await;

		let (outcome, mut rx) = attach(&engine, ticket.session_id).await;
		assert_eq!(outcome, AttachOutcome::Replayed);
		let events = collect_until_terminal(&mut rx).await;

		assert_eq!(percents(&events), vec![100]);
		assert!(matches!(events.last(), Some(JobEvent::Completed { elapsed, .. }) if elapsed == CACHED_ELAPSED));
		assert_eq!(stt.calls(), 1);
	}

	#[tokio::test]
	async fn test_resume_unknown_job_is_not_found() {
		let dir = TempDir::new().unwrap();
		let (engine, _stt) = local_engine(&dir, "unused").await;

		let job_id = JobId::new();
		assert!(matches!(engine.resume_job(job_id).await, Err(LifecycleError::NotFound(id)) if id == job_id));
		assert!(matches!(engine.get_job(job_id).await, Err(LifecycleError::NotFound(_))));
	}

	#[tokio::test]
	async fn test_resume_completed_checkpoint_skips_inference() {
		let dir = TempDir::new().unwrap();
		let store = fs_store(&dir).await;
		let job_id = JobId::new();
		store.save(&Checkpoint::new(job_id, "stored transcript", true)).await.unwrap();

		let stt = Arc::new(FakeStt::returning("recomputed"));
		let engine = engine_with(store, Arc::new(FakeAudio::titled("Demo")), stt.clone(), test_config());

		let ticket = engine.resume_job(job_id).await.unwrap();
		assert_eq!(ticket.status, JobStatus::Completed);
		assert_eq!(ticket.partial_text, "stored transcript");

		let (outcome, mut rx) = attach(&engine, ticket.session_id).await;
		assert_eq!(outcome, AttachOutcome::Replayed);
		let events = collect_until_terminal(&mut rx).await;
		assert!(events.iter().any(|e| matches!(e, JobEvent::Progress { text, percent: 100, .. } if text == "stored transcript")));
		assert_eq!(stt.calls(), 0);
	}

	#[tokio::test]
	async fn test_resume_partial_checkpoint_after_restart() {
		let dir = TempDir::new().unwrap();
		let store = fs_store(&dir).await;
		let job_id = JobId::new();
		let meta = CheckpointMeta {
			source: Some(JobSource::local("audio.mp3")),
			title: Some("Demo".to_string()),
			language: Some("pt".to_string()),
		};
		store.save(&Checkpoint::new(job_id, "hello", false).with_meta(meta)).await.unwrap();

		let stt = Arc::new(FakeStt::returning("hello world"));
		let engine = engine_with(store.clone(), Arc::new(FakeAudio::titled("Demo")), stt.clone(), test_config());

		let ticket = engine.resume_job(job_id).await.unwrap();
		assert_eq!(ticket.status, JobStatus::AwaitingResume);
		assert_eq!(ticket.partial_text, "hello");
		assert!(ticket.has_prior_progress);

		let (outcome, mut rx) = attach(&engine, ticket.session_id).await;
		assert_eq!(outcome, AttachOutcome::Started);
		let events = collect_until_terminal(&mut rx).await;

		assert_eq!(percents(&events), vec![25, 50, 70, 85, 95, 100]);
		assert!(events.iter().any(|e| matches!(e, JobEvent::Progress { stage, text, .. } if stage == "resuming" && text == "hello")));
		assert!(store.load(job_id).await.unwrap().unwrap().completed);
		assert_eq!(stt.calls(), 1);
	}

	#[tokio::test]
	async fn test_resume_after_failure_uses_new_session() {
		let dir = TempDir::new().unwrap();
		let stt = Arc::new(FakeStt::failing_once("second try"));
		let engine = engine_with(fs_store(&dir).await, Arc::new(FakeAudio::titled("Demo")), stt.clone(), test_config());

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		let (_, mut rx) = attach(&engine, ticket.session_id).await;
		let events = collect_until_terminal(&mut rx).await;
		assert!(matches!(events.last(), Some(JobEvent::Failed { .. })));

		let resumed = engine.resume_job(ticket.job_id).await.unwrap();
		assert_eq!(resumed.status, JobStatus::AwaitingResume);
		assert_ne!(resumed.session_id, ticket.session_id);
		assert!(!resumed.has_prior_progress);
		assert!(engine.get_job(ticket.job_id).await.unwrap().job.error.is_none());

		let (_, mut rx) = attach(&engine, resumed.session_id).await;
		let events = collect_until_terminal(&mut rx).await;
		assert!(matches!(events.last(), Some(JobEvent::Completed { .. })));
		assert_eq!(stt.calls(), 2);
	}

	#[tokio::test]
	async fn test_resume_refused_while_pending_or_running() {
		let dir = TempDir::new().unwrap();
		let (open, stt) = FakeStt::gated("hello world");
		let engine = engine_with(fs_store(&dir).await, Arc::new(FakeAudio::titled("Demo")), Arc::new(stt), test_config());

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		let err = engine.resume_job(ticket.job_id).await.unwrap_err();
		assert!(matches!(err, LifecycleError::InvalidState { status: JobStatus::Pending, .. }));

		let (_, mut rx) = attach(&engine, ticket.session_id).await;
		wait_for_status(&engine, ticket.job_id, JobStatus::AttachedProcessing).await;
		let err = engine.resume_job(ticket.job_id).await.unwrap_err();
		assert!(matches!(err, LifecycleError::InvalidState { status: JobStatus::AttachedProcessing, .. }));

		open.send(()).unwrap();
		collect_until_terminal(&mut rx).await;
	}

	#[tokio::test]
	async fn test_cancel_outside_processing_is_invalid() {
		let dir = TempDir::new().unwrap();
		let (engine, _stt) = local_engine(&dir, "hello world").await;

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		let err = engine.cancel(ticket.session_id).await.unwrap_err();
		assert!(matches!(err, LifecycleError::InvalidState { status: JobStatus::Pending, .. }));

		let (_, mut rx) = attach(&engine, ticket.session_id).await;
		collect_until_terminal(&mut rx).await;
		wait_for_status(&engine, ticket.job_id, JobStatus::Completed).await;

		let err = engine.cancel(ticket.session_id).await.unwrap_err();
		assert!(matches!(err, LifecycleError::InvalidState { status: JobStatus::Completed, .. }));
	}

	#[tokio::test]
	async fn test_cancel_during_acquisition() {
		let dir = TempDir::new().unwrap();
		let store = fs_store(&dir).await;
		let (open, audio) = FakeAudio::gated("Demo");
		let stt = Arc::new(FakeStt::returning("hello world"));
		let engine = engine_with(store.clone(), Arc::new(audio), stt.clone(), test_config());

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		let (_, mut rx) = attach(&engine, ticket.session_id).await;
		assert!(matches!(rx.recv().await, Some(JobEvent::Status { .. })));

		assert_eq!(engine.cancel(ticket.session_id).await.unwrap(), ticket.job_id);
		open.send(()).unwrap();

		let events = collect_until_terminal(&mut rx).await;
		assert!(matches!(events.last(), Some(JobEvent::Cancelled { job_id }) if *job_id == ticket.job_id));

		tokio::time::sleep(Duration::from_millis(50)).await;
		assert_eq!(engine.get_job(ticket.job_id).await.unwrap().job.status, JobStatus::Cancelled);
		assert!(store.load(ticket.job_id).await.unwrap().is_none());
		assert_eq!(stt.calls(), 0);
	}

	#[tokio::test]
	async fn test_cancel_during_inference_discards_result() {
		let dir = TempDir::new().unwrap();
		let store = fs_store(&dir).await;
		let (open, stt) = FakeStt::gated("hello world");
		let engine = engine_with(store.clone(), Arc::new(FakeAudio::titled("Demo")), Arc::new(stt), test_config());

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		let (_, mut rx) = attach(&engine, ticket.session_id).await;
		while let Some(event) = rx.recv().await {
			if matches!(&event, JobEvent::Status { message } if message.starts_with("Starting transcription")) {
				break;
			}
		}
		engine.cancel(ticket.session_id).await.unwrap();
		open.send(()).unwrap();

		let events = collect_until_terminal(&mut rx).await;
		assert!(matches!(events.last(), Some(JobEvent::Cancelled { .. })));
		assert!(percents(&events).is_empty());

		tokio::time::sleep(Duration::from_millis(50)).await;
		assert!(store.load(ticket.job_id).await.unwrap().is_none());
		assert_eq!(engine.get_job(ticket.job_id).await.unwrap().job.status, JobStatus::Cancelled);
	}

	#[tokio::test]
	async fn test_disconnect_during_processing_still_completes() {
		let dir = TempDir::new().unwrap();
		let store = fs_store(&dir).await;
		let (open, stt) = FakeStt::gated("hello world");
		let engine = engine_with(store.clone(), Arc::new(FakeAudio::titled("Demo")), Arc::new(stt), test_config());

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		let (_, rx) = attach(&engine, ticket.session_id).await;
		wait_for_status(&engine, ticket.job_id, JobStatus::AttachedProcessing).await;

		drop(rx);
		engine.sessions().disconnect(ticket.session_id, "client went away");
		open.send(()).unwrap();

		wait_for_status(&engine, ticket.job_id, JobStatus::Completed).await;
		let checkpoint = store.load(ticket.job_id).await.unwrap().unwrap();
		assert!(checkpoint.completed);
		assert_eq!(checkpoint.text, "hello world");
	}

	#[tokio::test]
	async fn test_stalled_client_does_not_block_completion() {
		let dir = TempDir::new().unwrap();
		let store = fs_store(&dir).await;
		let config = EngineConfig {
			delivery_timeout: Duration::from_millis(20),
			..test_config()
		};
		let engine = engine_with(store.clone(), Arc::new(FakeAudio::titled("Demo")), Arc::new(FakeStt::returning("hello world")), config);

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		let (tx, _rx) = mpsc::channel(1);
		engine.attach(ticket.session_id, ConnectionId::new(), tx).await.unwrap();

		wait_for_status(&engine, ticket.job_id, JobStatus::Completed).await;
		assert!(!engine.sessions().is_live(ticket.session_id));
		assert!(store.load(ticket.job_id).await.unwrap().unwrap().completed);
	}

	#[tokio::test]
	async fn test_reattach_while_processing_reconnects() {
		let dir = TempDir::new().unwrap();
		let (open, stt) = FakeStt::gated("hello world");
		let engine = engine_with(fs_store(&dir).await, Arc::new(FakeAudio::titled("Demo")), Arc::new(stt), test_config());

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		let (_, _first) = attach(&engine, ticket.session_id).await;
		wait_for_status(&engine, ticket.job_id, JobStatus::AttachedProcessing).await;

		let (outcome, mut second) = attach(&engine, ticket.session_id).await;
		assert_eq!(outcome, AttachOutcome::Reconnected);
		open.send(()).unwrap();

		let events = collect_until_terminal(&mut second).await;
		assert!(matches!(events.last(), Some(JobEvent::Completed { .. })));
	}

	#[tokio::test]
	async fn test_old_socket_teardown_keeps_reattached_transport() {
		let dir = TempDir::new().unwrap();
		let (open, stt) = FakeStt::gated("hello world");
		let engine = engine_with(fs_store(&dir).await, Arc::new(FakeAudio::titled("Demo")), Arc::new(stt), test_config());

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		let (old, new) = (ConnectionId::new(), ConnectionId::new());
		let (_, mut first) = attach_as(&engine, ticket.session_id, old).await;
		wait_for_status(&engine, ticket.job_id, JobStatus::AttachedProcessing).await;

		let (outcome, mut second) = attach_as(&engine, ticket.session_id, new).await;
		assert_eq!(outcome, AttachOutcome::Reconnected);

		// the replaced transport drains and the old socket runs its cleanup
		while first.recv().await.is_some() {}
		assert!(!engine.sessions().release(ticket.session_id, old, "client disconnected"));
		assert!(engine.sessions().is_attached(ticket.session_id, new));

		open.send(()).unwrap();
		let events = collect_until_terminal(&mut second).await;
		assert_eq!(percents(&events), vec![50, 70, 85, 95, 100]);
		assert!(matches!(events.last(), Some(JobEvent::Completed { .. })));
	}

	#[tokio::test]
	async fn test_resumed_run_replaces_earlier_partial_transcript() {
		let dir = TempDir::new().unwrap();
		let store = fs_store(&dir).await;
		let long_text = "a".repeat(100);
		let stt = Arc::new(FakeStt::returning(&long_text));
		let config = EngineConfig {
			step_delay: Duration::from_millis(200),
			..test_config()
		};
		let engine = engine_with(store.clone(), Arc::new(FakeAudio::titled("Demo")), stt.clone(), config);

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		let (_, mut rx) = attach(&engine, ticket.session_id).await;
		while let Some(event) = rx.recv().await {
			if event.percent() == Some(85) {
				break;
			}
		}
		engine.cancel(ticket.session_id).await.unwrap();
		collect_until_terminal(&mut rx).await;
		assert_eq!(engine.get_job(ticket.job_id).await.unwrap().job.transcript_text.chars().count(), 85);

		stt.set_text("short final text");
		let resumed = engine.resume_job(ticket.job_id).await.unwrap();
		assert_eq!(resumed.partial_text.chars().count(), 85);
		assert!(engine.registry().get(ticket.job_id).await.unwrap().transcript_text.is_empty());
		assert!(matches!(engine.cancel(ticket.session_id).await, Err(LifecycleError::Session(SessionError::Unbound(_)))));

		let (_, mut rx) = attach(&engine, resumed.session_id).await;
		let events = collect_until_terminal(&mut rx).await;
		assert!(matches!(events.last(), Some(JobEvent::Completed { .. })));

		let checkpoint = store.load(ticket.job_id).await.unwrap().unwrap();
		assert!(checkpoint.completed);
		assert_eq!(checkpoint.text, "short final text");

		let snapshot = engine.get_job(ticket.job_id).await.unwrap();
		assert_eq!(snapshot.job.status, JobStatus::Completed);
		assert_eq!(snapshot.job.transcript_text, "short final text");
		assert_eq!(engine.transcript_for(ticket.job_id).await.unwrap(), "short final text");
	}

	#[tokio::test]
	async fn test_persistence_failure_fails_job() {
		let stt = Arc::new(FakeStt::returning("hello world"));
		let engine = engine_with(Arc::new(FailingStore), Arc::new(FakeAudio::titled("Demo")), stt, test_config());

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		let (_, mut rx) = attach(&engine, ticket.session_id).await;
		let events = collect_until_terminal(&mut rx).await;

		assert!(matches!(events.last(), Some(JobEvent::Failed { message, .. }) if message.contains("disk full")));
		wait_for_status(&engine, ticket.job_id, JobStatus::Failed).await;
	}

	#[tokio::test]
	async fn test_run_job_requires_live_session() {
		let dir = TempDir::new().unwrap();
		let (engine, stt) = local_engine(&dir, "hello world").await;

		let ticket = engine.create_job(JobSource::local("audio.mp3"), None);
		engine.run_job(ticket.job_id).await.unwrap();

		assert_eq!(engine.get_job(ticket.job_id).await.unwrap().job.status, JobStatus::Pending);
		assert_eq!(stt.calls(), 0);
	}

	#[tokio::test]
	async fn test_get_job_rehydrates_from_disk() {
		let dir = TempDir::new().unwrap();
		let store = fs_store(&dir).await;
		let job_id = JobId::new();
		store.save(&Checkpoint::new(job_id, "persisted", true)).await.unwrap();

		let engine = engine_with(store, Arc::new(FakeAudio::titled("Demo")), Arc::new(FakeStt::returning("x")), test_config());
		let snapshot = engine.get_job(job_id).await.unwrap();

		assert!(snapshot.completed);
		assert_eq!(snapshot.job.transcript_text, "persisted");
		assert_eq!(engine.list_jobs().await.len(), 1);
	}
}
