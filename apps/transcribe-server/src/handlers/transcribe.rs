use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use transcribe_queue::{SubmitMode, SubmitOutcome};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SubmitParams {
	/// Poll-based contract opt-in: `?async=true`
	#[serde(default, rename = "async")]
	use_async: Option<String>,
	/// Alternative spelling: `?mode=async`
	#[serde(default)]
	mode: Option<String>,
}

impl SubmitParams {
	fn submit_mode(&self) -> SubmitMode {
		let flagged = matches!(self.use_async.as_deref(), Some("true" | "1"));
		if flagged || self.mode.as_deref() == Some("async") {
			SubmitMode::Async
		} else {
			SubmitMode::Sync
		}
	}
}

#[derive(Serialize)]
struct SyncResponse {
	text: String,
	duration_s: f64,
}

#[derive(Serialize)]
struct AsyncAccepted {
	job_id: String,
	status: &'static str,
}

/// Pull the audio bytes out of the request
///
/// Multipart uploads carry the audio in a `file` part; a multipart
/// envelope without one is a `400`. Any other content type is read as a
/// raw audio body.
async fn read_audio(request: Request) -> Result<Vec<u8>, ApiError> {
	let is_multipart = request
		.headers()
		.get(header::CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.is_some_and(|value| value.trim_start().starts_with("multipart/form-data"));

	if is_multipart {
		let mut parts = Multipart::from_request(request, &()).await.map_err(|err| ApiError::UnreadableBody(err.to_string()))?;
		while let Some(field) = parts.next_field().await.map_err(|err| ApiError::UnreadableBody(err.to_string()))? {
			if field.name() == Some("file") {
				let bytes = field.bytes().await.map_err(|err| ApiError::UnreadableBody(err.to_string()))?;
				return Ok(bytes.to_vec());
			}
		}
		return Err(ApiError::MissingFilePart);
	}

	let bytes = Bytes::from_request(request, &()).await.map_err(|err| ApiError::UnreadableBody(err.to_string()))?;
	Ok(bytes.to_vec())
}

/// Submit one transcription job
///
/// Sync (default): the request blocks until the job is terminal and
/// returns the transcript directly. Async: `202` with a job id to poll.
/// A saturated queue answers `503` with a backoff descriptor and a
/// `Retry-After` header.
#[axum::debug_handler]
#[instrument(name = "submit", skip_all)]
pub async fn submit(State(state): State<AppState>, Query(params): Query<SubmitParams>, request: Request) -> Result<Response, ApiError> {
	let audio = read_audio(request).await?;
	if audio.is_empty() {
		return Err(ApiError::EmptyPayload);
	}

	match state.queue.submit(audio, params.submit_mode()).await? {
		SubmitOutcome::Transcript(transcript) => Ok((
			StatusCode::OK,
			Json(SyncResponse {
				text: transcript.text,
				duration_s: transcript.duration_s,
			}),
		)
			.into_response()),
		SubmitOutcome::Accepted { job_id } => Ok((StatusCode::ACCEPTED, Json(AsyncAccepted { job_id, status: "queued" })).into_response()),
	}
}
