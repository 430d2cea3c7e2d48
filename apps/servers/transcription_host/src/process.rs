use std::process::{Command, ExitStatus, Output};
use thiserror::Error;
use tracing::debug;

const STDERR_TAIL: usize = 400;

#[derive(Error, Debug)]
pub enum ProcessError {
	#[error("failed to start {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("{program} exited with {status}: {stderr}")]
	Failed { program: String, status: ExitStatus, stderr: String },
}

/// Run an external tool to completion. A non-zero exit becomes an error
/// carrying the tail of stderr.
pub fn run(mut command: Command) -> Result<Output, ProcessError> {
	let program = command.get_program().to_string_lossy().into_owned();
	debug!(%program, args = ?command.get_args().collect::<Vec<_>>(), "Running external tool");

	let output = match command.output() {
		Ok(output) => output,
		Err(source) => return Err(ProcessError::Spawn { program, source }),
	};
	if output.status.success() {
		return Ok(output);
	}

	let stderr = String::from_utf8_lossy(&output.stderr);
	let stderr = stderr.trim();
	let tail_start = stderr.char_indices().rev().nth(STDERR_TAIL).map_or(0, |(i, _)| i);
	Err(ProcessError::Failed {
		program,
		status: output.status,
		stderr: stderr[tail_start..].to_string(),
	})
}
