use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::gate::GateError;
use crate::tracker::QuotaError;

use super::types::{CheckQuotaResponse, ErrorResponse, QuotaUsageResponse, SubjectRequest};
use super::ApiState;

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn check_quota(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SubjectRequest>,
) -> ApiResult<CheckQuotaResponse> {
    let status = state
        .tracker
        .check_quota(&request.subject_id)
        .await
        .map_err(quota_error)?;

    Ok(Json(CheckQuotaResponse::new(
        status,
        state.tracker.resets_at(),
    )))
}

pub async fn get_quota(
    State(state): State<Arc<ApiState>>,
    Path(subject_id): Path<String>,
) -> ApiResult<QuotaUsageResponse> {
    let usage = state
        .tracker
        .get_quota(&subject_id)
        .await
        .map_err(quota_error)?;

    Ok(Json(QuotaUsageResponse::new(usage, state.tracker.resets_at())))
}

/// Records one completed action without enforcing the limit.
pub async fn increment_quota(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SubjectRequest>,
) -> ApiResult<QuotaUsageResponse> {
    let usage = state
        .tracker
        .increment_quota(&request.subject_id)
        .await
        .map_err(quota_error)?;

    Ok(Json(QuotaUsageResponse::new(usage, state.tracker.resets_at())))
}

/// Takes one slot through the configured gate, answering 429 once the
/// subject has nothing left today.
pub async fn claim_quota(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SubjectRequest>,
) -> ApiResult<QuotaUsageResponse> {
    let outcome = state
        .gate
        .run(&request.subject_id, || async { Ok::<_, Infallible>(()) })
        .await
        .map_err(|err| match err {
            GateError::QuotaExceeded {
                limit,
                used,
                resets_at,
            } => quota_exceeded(&request.subject_id, limit, used, resets_at),
            GateError::Quota(err) => quota_error(err),
            GateError::Action(never) => match never {},
        })?;

    Ok(Json(QuotaUsageResponse::new(
        outcome.usage,
        state.tracker.resets_at(),
    )))
}

pub async fn health_check(State(state): State<Arc<ApiState>>) -> ApiResult<serde_json::Value> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": "quota-tracker",
        "daily_limit": state.tracker.daily_limit(),
        "gate_mode": state.gate.mode().to_string(),
    })))
}

fn quota_error(err: QuotaError) -> ApiError {
    match err {
        QuotaError::InvalidSubject(_) => bad_request("invalid_subject", "subject_id is invalid"),
        QuotaError::Exceeded {
            subject_id,
            limit,
            used,
            resets_at,
        } => quota_exceeded(&subject_id, limit, used, resets_at),
        err @ QuotaError::StorageError(_) => internal_error(err),
    }
}

fn quota_exceeded(
    subject_id: &str,
    limit: u64,
    used: u64,
    resets_at: DateTime<Utc>,
) -> ApiError {
    info!(subject_id, limit, used, "rejecting action over daily quota");
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorResponse {
            error: "daily question limit reached".to_string(),
            code: "quota_exceeded".to_string(),
            details: Some(serde_json::json!({
                "limit": limit,
                "used": used,
                "remaining": 0,
                "resets_at": resets_at,
            })),
        }),
    )
}

fn bad_request(code: &str, message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
            details: None,
        }),
    )
}

fn internal_error<E: std::fmt::Display>(err: E) -> ApiError {
    error!(error = %err, "quota API internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal server error".to_string(),
            code: "internal_error".to_string(),
            details: Some(serde_json::json!({ "message": err.to_string() })),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn maps_quota_errors_to_status_codes() {
        let (status, body) = quota_error(QuotaError::InvalidSubject(String::new()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "invalid_subject");

        let (status, body) = quota_error(QuotaError::StorageError(StorageError::Poisoned));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "internal_error");

        let (status, body) = quota_error(QuotaError::Exceeded {
            subject_id: "u1".into(),
            limit: 15,
            used: 15,
            resets_at: Utc::now(),
        });
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body.code, "quota_exceeded");
        let details = body.0.details.expect("details should be present");
        assert_eq!(details["remaining"], 0);
        assert_eq!(details["limit"], 15);
    }
}
