use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::instrument;
use transcribe_queue::JobStatusView;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
struct ResultBody {
	text: String,
	duration_s: f64,
}

#[derive(Serialize)]
struct FailureBody {
	code: &'static str,
	message: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
	status: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	result: Option<ResultBody>,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<FailureBody>,
}

impl From<JobStatusView> for StatusResponse {
	fn from(view: JobStatusView) -> Self {
		match view {
			JobStatusView::Queued => Self {
				status: "queued",
				result: None,
				error: None,
			},
			JobStatusView::Running => Self {
				status: "processing",
				result: None,
				error: None,
			},
			JobStatusView::Completed(transcript) => Self {
				status: "complete",
				result: Some(ResultBody {
					text: transcript.text,
					duration_s: transcript.duration_s,
				}),
				error: None,
			},
			JobStatusView::Failed(failure) => Self {
				status: "failed",
				result: None,
				error: Some(FailureBody {
					code: failure.code,
					message: failure.message,
				}),
			},
		}
	}
}

/// Poll one job by id
///
/// `404` covers both never-existed and already-evicted ids; callers must
/// not read it as a job failure.
#[axum::debug_handler]
#[instrument(name = "job_status", skip(state))]
pub async fn job_status(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
	state
		.queue
		.status(&job_id)
		.map(|view| (StatusCode::OK, Json(StatusResponse::from(view))))
		.ok_or(ApiError::JobNotFound(job_id))
}
