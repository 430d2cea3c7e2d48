use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static! {
	pub static ref JOB_TRANSITIONS: IntCounterVec =
		register_int_counter_vec!("transcription_job_transitions_total", "Job status transitions", &["status"]).expect("Failed to register job transitions counter");
	pub static ref TRANSCRIPTION_DURATION: HistogramVec = register_histogram_vec!(
		"transcription_inference_duration_seconds",
		"Wall-clock time spent in speech-to-text inference",
		&["outcome"],
		vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]
	)
	.expect("Failed to register transcription duration histogram");
	pub static ref SESSION_NOTIFICATIONS: IntCounterVec =
		register_int_counter_vec!("transcription_session_notifications_total", "Events pushed to sessions", &["outcome"]).expect("Failed to register session notifications counter");
}
