//! Simulated progress feed.
//!
//! The inference engine only hands back a finished transcript, so progress is
//! synthesized afterwards: the full text is revealed in growing prefixes at a
//! fixed set of percentages, each one checkpointed before it is announced.

use std::fmt;

pub const DEFAULT_PROGRESS_STEPS: [u8; 5] = [50, 70, 85, 95, 100];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidProgressPlan(String);

impl fmt::Display for InvalidProgressPlan {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "invalid progress plan: {}", self.0)
	}
}

impl std::error::Error for InvalidProgressPlan {}

/// Strictly increasing percentages ending at 100.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressPlan {
	steps: Vec<u8>,
}

impl Default for ProgressPlan {
	fn default() -> Self {
		Self {
			steps: DEFAULT_PROGRESS_STEPS.to_vec(),
		}
	}
}

impl ProgressPlan {
	pub fn new(steps: Vec<u8>) -> Result<Self, InvalidProgressPlan> {
		if steps.last() != Some(&100) {
			return Err(InvalidProgressPlan("last step must be 100".to_string()));
		}
		if steps.windows(2).any(|pair| pair[0] >= pair[1]) {
			return Err(InvalidProgressPlan(format!("steps must be strictly increasing: {steps:?}")));
		}
		Ok(Self { steps })
	}

	#[must_use]
	pub fn steps(&self) -> &[u8] {
		&self.steps
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.steps.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}

	/// One frame per step, in order.
	pub fn frames<'a>(&'a self, text: &'a str) -> impl Iterator<Item = ProgressFrame<'a>> + 'a {
		let total = self.steps.len();
		self.steps.iter().enumerate().map(move |(index, &percent)| ProgressFrame {
			percent,
			text: prefix_for(text, percent),
			stage: stage_label(index, total, percent),
			is_final: percent == 100,
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressFrame<'a> {
	pub percent: u8,
	pub text: &'a str,
	pub stage: String,
	pub is_final: bool,
}

/// Leading `percent`% of the characters of `text`, rounded down.
#[must_use]
pub fn prefix_for(text: &str, percent: u8) -> &str {
	if percent >= 100 {
		return text;
	}
	let chars = text.chars().count();
	let keep = chars * usize::from(percent) / 100;
	text.char_indices().nth(keep).map_or(text, |(byte, _)| &text[..byte])
}

fn stage_label(index: usize, total: usize, percent: u8) -> String {
	if percent >= 100 {
		"transcription complete".to_string()
	} else {
		format!("finalizing transcription ({}/{total})", index + 1)
	}
}
