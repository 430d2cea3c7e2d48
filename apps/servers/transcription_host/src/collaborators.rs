//! Process-backed and HTTP-backed implementations of the job collaborators.

pub mod acquisition;
pub mod insights;
pub mod speech;
pub mod whisper;

pub use acquisition::{DownloadStrategy, MediaAcquirer};
pub use insights::OpenRouterClient;
pub use speech::EdgeTts;
pub use whisper::WhisperCli;
