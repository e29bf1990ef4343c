//! Error values and the error handlers that render them.
//!
//! # Design Decisions
//! - [`Error`] is the structured kind: it carries an explicit status
//! - Anything else is opaque and resolves to `500`
//! - Dispatch asks [`HandlerError::status`] instead of matching on types
//! - Handlers write through [`ResponseWriter::send`], so an error response
//!   never overwrites one already written

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::context::Context;
use crate::http::request::RequestData;
use crate::http::response::{ResponseWriter, SendError};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body written by the terse policy in place of internal error details.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal error";

/// Structured application error, serialized as the response body.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("[{id}] {status} {code}: {detail}")]
pub struct Error {
    /// Unique occurrence id, useful to correlate client reports with logs.
    pub id: String,
    pub code: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Value>,
}

impl Error {
    pub fn new(status: StatusCode, code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            id: short_id(),
            code: code.into(),
            status: status.as_u16(),
            detail: detail.into(),
            meta: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", detail)
    }

    /// The request body is present but could not be decoded.
    pub fn invalid_encoding(err: impl fmt::Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_encoding", err.to_string())
    }

    pub fn missing_payload() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "missing_payload", "missing required payload")
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", detail)
    }
}

fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Error returned by handlers and middleware.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Structured(#[from] Error),

    #[error("{0}")]
    Opaque(BoxError),
}

impl HandlerError {
    pub fn opaque(err: impl Into<BoxError>) -> Self {
        HandlerError::Opaque(err.into())
    }

    /// Status this error resolves to; opaque errors are always 500.
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Structured(e) => e.status_code(),
            HandlerError::Opaque(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_structured(&self) -> Option<&Error> {
        match self {
            HandlerError::Structured(e) => Some(e),
            HandlerError::Opaque(_) => None,
        }
    }
}

impl From<BoxError> for HandlerError {
    fn from(err: BoxError) -> Self {
        HandlerError::Opaque(err)
    }
}

/// Writes the response for a failed request.
pub type ErrorHandler =
    Arc<dyn Fn(&Context, &ResponseWriter, &RequestData, &HandlerError) + Send + Sync>;

/// Verbose policy: structured errors keep their status and body, anything
/// else becomes a 500 carrying the error message.
pub fn default_error_handler(ctx: &Context, rw: &ResponseWriter, _req: &RequestData, err: &HandlerError) {
    let status = err.status();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        ctx.log_error(&err.to_string(), &[]);
    }
    let result = match err {
        HandlerError::Structured(e) => rw.send(status, e),
        HandlerError::Opaque(e) => rw.send(status, &e.to_string()),
    };
    log_send_failure(ctx, result);
}

/// Terse policy: like the verbose one, except that 500s never expose their
/// detail to the client.
pub fn terse_error_handler(ctx: &Context, rw: &ResponseWriter, _req: &RequestData, err: &HandlerError) {
    let status = err.status();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        ctx.log_error(&err.to_string(), &[]);
    }
    let result = match err.as_structured() {
        Some(e) if status != StatusCode::INTERNAL_SERVER_ERROR => rw.send(status, e),
        _ => rw.send(status, INTERNAL_ERROR_MESSAGE),
    };
    log_send_failure(ctx, result);
}

fn log_send_failure(ctx: &Context, result: Result<(), SendError>) {
    match result {
        Ok(()) | Err(SendError::AlreadyWritten) => {}
        Err(e) => ctx.log_error("failed to write error response", &[("err", e.to_string())]),
    }
}
