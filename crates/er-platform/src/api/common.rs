//! Common API types and utilities

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::PlatformError;

/// Standard API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Reference date for listings. Defaults to today (UTC).
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AsOfQuery {
    /// Date in `YYYY-MM-DD` form
    pub as_of: Option<NaiveDate>,
}

impl AsOfQuery {
    pub fn date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }
}

pub type ApiResult<T> = Result<Json<T>, PlatformError>;

/// Unwrap a JSON body, reporting malformed input as a validation error
/// instead of axum's plain-text rejection.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, PlatformError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| PlatformError::validation(rejection.body_text()))
}

/// Path parameters, with a bad segment (e.g. a non-numeric id) reported as a
/// validation error.
pub fn path_param<T>(param: Result<Path<T>, PathRejection>) -> Result<T, PlatformError> {
    param
        .map(|Path(value)| value)
        .map_err(|rejection| PlatformError::validation(rejection.body_text()))
}

/// Query string, same treatment as `json_body`.
pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, PlatformError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| PlatformError::validation(rejection.body_text()))
}
