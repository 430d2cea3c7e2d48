//! Lifecycle of resumable transcription jobs.
//!
//! Jobs are created `pending`, start processing when a client session attaches,
//! and end `completed`, `failed` or `cancelled`. Every step of the simulated
//! progress feed is checkpointed first, so a job interrupted by a crash or a
//! dropped client can be recovered from disk and resumed on a new session.

pub mod checkpoint;
pub mod collaborators;
pub mod engine;
pub mod error;
pub mod event;
pub mod metrics;
pub mod progress;
pub mod registry;
pub mod resume;
pub mod types;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointMeta, CheckpointStore, FsCheckpointStore};
pub use collaborators::{AcquiredAudio, AudioSource, QuestionAnswering, SpeechToText, TextToSpeech};
pub use engine::{AttachOutcome, EngineConfig, JobSessions, JobSnapshot, JobTicket, LifecycleEngine, ResumeTicket, CACHED_ELAPSED};
pub use error::{CollaboratorError, LifecycleError, Result};
pub use event::JobEvent;
pub use progress::{ProgressPlan, DEFAULT_PROGRESS_STEPS};
pub use registry::JobRegistry;
pub use resume::{ResumePlan, ResumptionPlanner};
pub use types::{Job, JobId, JobSource, JobStatus, SourceKind};
