use axum::http::header::RETRY_AFTER;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use transcribe_queue::{JobFailure, Rejection, SubmitError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
	#[error("no audio payload provided")]
	EmptyPayload,

	#[error("no file provided")]
	MissingFilePart,

	#[error("could not read request body: {0}")]
	UnreadableBody(String),

	#[error("job not found: {0}")]
	JobNotFound(String),

	#[error("service busy")]
	ServiceBusy(Rejection),

	#[error("{}", .0.message)]
	Engine(JobFailure),

	#[error("service is shutting down")]
	ShuttingDown,
}

impl From<SubmitError> for ApiError {
	fn from(err: SubmitError) -> Self {
		match err {
			SubmitError::Busy(rejection) => Self::ServiceBusy(rejection),
			SubmitError::Engine(failure) => Self::Engine(failure),
			SubmitError::Shutdown => Self::ShuttingDown,
		}
	}
}

/// Uniform error body; the busy variant carries its full backoff
/// descriptor so clients can self-throttle
#[derive(Serialize)]
struct ErrorBody<'a> {
	error: &'static str,
	message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	retry_after_seconds: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	queue_status: Option<&'a transcribe_queue::QueueStatus>,
	#[serde(skip_serializing_if = "Option::is_none")]
	backoff_strategy: Option<&'a transcribe_queue::BackoffStrategy>,
}

impl ApiError {
	const fn status_code(&self) -> StatusCode {
		match self {
			Self::EmptyPayload | Self::MissingFilePart | Self::UnreadableBody(_) => StatusCode::BAD_REQUEST,
			Self::JobNotFound(_) => StatusCode::NOT_FOUND,
			Self::ServiceBusy(_) | Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
			Self::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	const fn error_code(&self) -> &'static str {
		match self {
			Self::EmptyPayload => "empty_payload",
			Self::MissingFilePart => "no_file_provided",
			Self::UnreadableBody(_) => "unreadable_body",
			Self::JobNotFound(_) => "job_not_found",
			Self::ServiceBusy(_) => "service_busy",
			Self::Engine(_) => "engine_error",
			Self::ShuttingDown => "shutting_down",
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		match self {
			Self::ServiceBusy(ref rejection) => {
				let body = ErrorBody {
					error: self.error_code(),
					message: "Transcription queue is full, retry with backoff".to_string(),
					retry_after_seconds: Some(rejection.retry_after_seconds),
					queue_status: Some(&rejection.queue_status),
					backoff_strategy: Some(&rejection.backoff_strategy),
				};
				(StatusCode::SERVICE_UNAVAILABLE, [(RETRY_AFTER, rejection.retry_after_seconds.to_string())], Json(body)).into_response()
			}
			_ => {
				let body = ErrorBody {
					error: self.error_code(),
					message: self.to_string(),
					retry_after_seconds: None,
					queue_status: None,
					backoff_strategy: None,
				};
				(self.status_code(), Json(body)).into_response()
			}
		}
	}
}
