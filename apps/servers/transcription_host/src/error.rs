use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use job_lifecycle::{CheckpointError, CollaboratorError, LifecycleError};
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
	#[error("{0}")]
	NotFound(String),

	#[error("{0}")]
	Conflict(String),

	#[error("{0}")]
	BadRequest(String),

	#[error("{0}")]
	UnprocessableEntity(String),

	#[error("{0}")]
	Upstream(String),

	#[error("{0}")]
	Unavailable(String),

	#[error("{0}")]
	Persistence(String),

	#[error("Request timeout")]
	RequestTimeout,

	#[error("Service temporarily overloaded")]
	ServiceOverloaded,

	#[error("Unexpected Tower Service error: {0}")]
	TowerError(#[from] tower::BoxError),

	#[error("I/O error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Multipart error: {0}")]
	Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl AppError {
	const fn status_code(&self) -> StatusCode {
		match self {
			Self::NotFound(_) => StatusCode::NOT_FOUND,
			Self::Conflict(_) => StatusCode::CONFLICT,
			Self::BadRequest(_) | Self::Multipart(_) => StatusCode::BAD_REQUEST,
			Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
			Self::Upstream(_) => StatusCode::BAD_GATEWAY,
			Self::Unavailable(_) | Self::ServiceOverloaded => StatusCode::SERVICE_UNAVAILABLE,
			Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
			Self::Persistence(_) | Self::TowerError(_) | Self::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl From<LifecycleError> for AppError {
	fn from(err: LifecycleError) -> Self {
		match err {
			LifecycleError::NotFound(_) => Self::NotFound(err.to_string()),
			LifecycleError::InvalidState { .. } => Self::Conflict(err.to_string()),
			LifecycleError::Collaborator(e) => e.into(),
			LifecycleError::Persistence(e) => e.into(),
			LifecycleError::Session(_) => Self::BadRequest(err.to_string()),
		}
	}
}

impl From<CollaboratorError> for AppError {
	fn from(err: CollaboratorError) -> Self {
		match err {
			CollaboratorError::Unavailable(_) => Self::Unavailable(err.to_string()),
			_ => Self::Upstream(err.to_string()),
		}
	}
}

impl From<CheckpointError> for AppError {
	fn from(err: CheckpointError) -> Self {
		Self::Persistence(err.to_string())
	}
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		if status.is_server_error() {
			tracing::error!(error = %self, status = status.as_u16(), "Request failed");
		} else {
			tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
		}

		(status, Json(json!({ "error": self.to_string() }))).into_response()
	}
}
