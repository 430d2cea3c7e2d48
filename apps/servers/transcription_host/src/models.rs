use serde::Serialize;
use std::sync::{PoisonError, RwLock};

/// Whisper checkpoints the CLI can load, smallest first.
pub const WHISPER_MODELS: [(&str, &str); 7] = [
	("tiny", "Tiny (fastest, least accurate)"),
	("base", "Base (fast, reasonable accuracy)"),
	("small", "Small (balanced speed and accuracy)"),
	("medium", "Medium (slower, more accurate)"),
	("large", "Large (highest accuracy)"),
	("large-v2", "Large V2 (newer large release)"),
	("large-v3", "Large V3 (latest large release)"),
];

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
	pub name: &'static str,
	pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelListing {
	pub models: Vec<ModelInfo>,
	pub current: String,
}

/// Currently selected speech-to-text model. Later jobs pick up a switch,
/// runs already in inference keep the model they started with.
#[derive(Debug)]
pub struct ModelCatalog {
	current: RwLock<String>,
}

impl ModelCatalog {
	pub fn new(initial: &str) -> Result<Self, String> {
		let name = Self::lookup(initial).ok_or_else(|| format!("unknown whisper model: {initial}"))?;
		Ok(Self {
			current: RwLock::new(name.to_string()),
		})
	}

	fn lookup(name: &str) -> Option<&'static str> {
		WHISPER_MODELS.iter().find(|(known, _)| *known == name).map(|(known, _)| *known)
	}

	#[must_use]
	pub fn current(&self) -> String {
		self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
	}

	/// Switch the model; `None` when the name is not in the catalogue.
	pub fn select(&self, name: &str) -> Option<&'static str> {
		let name = Self::lookup(name)?;
		*self.current.write().unwrap_or_else(PoisonError::into_inner) = name.to_string();
		Some(name)
	}

	#[must_use]
	pub fn listing(&self) -> ModelListing {
		ModelListing {
			models: WHISPER_MODELS.iter().map(|&(name, description)| ModelInfo { name, description }).collect(),
			current: self.current(),
		}
	}
}
