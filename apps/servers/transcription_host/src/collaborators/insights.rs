use async_trait::async_trait;
use job_lifecycle::{CollaboratorError, QuestionAnswering};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Serialize)]
struct ChatRequest<'a> {
	model: &'a str,
	messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
	role: &'a str,
	content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
	#[serde(default)]
	choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
	message: Option<ChatContent>,
}

#[derive(Deserialize)]
struct ChatContent {
	content: Option<String>,
}

/// Question answering over a transcript via the OpenRouter chat completion API.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
	http: reqwest::Client,
	api_key: Option<String>,
	model: String,
	url: String,
}

impl OpenRouterClient {
	pub fn new(api_key: Option<String>, model: impl Into<String>, url: impl Into<String>) -> Self {
		Self {
			http: reqwest::Client::new(),
			api_key: api_key.filter(|k| !k.trim().is_empty()),
			model: model.into(),
			url: url.into(),
		}
	}
}

fn build_prompt(transcript: &str, question: &str) -> String {
	format!(
		"Using the transcript below, answer the user's question as well as you can.\n\nTranscript:\n---\n{transcript}\n---\n\nUser question:\n{question}\n\nAnswer:"
	)
}

#[async_trait]
impl QuestionAnswering for OpenRouterClient {
	async fn answer(&self, transcript: &str, question: &str) -> Result<String, CollaboratorError> {
		let Some(api_key) = &self.api_key else {
			return Err(CollaboratorError::Unavailable("OpenRouter API key is not configured".to_string()));
		};

		let prompt = build_prompt(transcript, question);
		let request = ChatRequest {
			model: &self.model,
			messages: [ChatMessage { role: "user", content: &prompt }],
		};

		debug!(model = %self.model, chars = transcript.chars().count(), "Requesting completion");
		let response = self
			.http
			.post(&self.url)
			.bearer_auth(api_key)
			.json(&request)
			.send()
			.await
			.map_err(|e| CollaboratorError::Completion(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			warn!(%status, "Completion request rejected");
			return Err(CollaboratorError::Completion(format!("{status}: {body}")));
		}

		let parsed: ChatResponse = response.json().await.map_err(|e| CollaboratorError::Completion(e.to_string()))?;
		parsed
			.choices
			.into_iter()
			.next()
			.and_then(|choice| choice.message)
			.and_then(|message| message.content)
			.filter(|content| !content.trim().is_empty())
			.ok_or_else(|| CollaboratorError::Completion("malformed completion response".to_string()))
	}

	fn is_configured(&self) -> bool {
		self.api_key.is_some()
	}
}
