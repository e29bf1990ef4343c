//! Response state tracking.
//!
//! # Responsibilities
//! - Buffer the status, headers and body produced by handlers
//! - Guarantee at most one status/body pair per request
//! - Encode bodies with the content type negotiated for the request
//!
//! # Design Decisions
//! - Every write goes through the shared `Mutex<ResponseState>`
//! - A second `send` is rejected and leaves the first response intact
//! - A response nobody wrote becomes `200` with an empty body

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use serde::Serialize;
use thiserror::Error;

use crate::encoding::{EncodeError, Negotiated};

#[derive(Debug, Error)]
pub enum SendError {
    #[error("response already written")]
    AlreadyWritten,

    #[error("no encoder registered for the response")]
    NoEncoder,

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

#[derive(Debug, Default)]
struct ResponseState {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    /// Set by `send`: no further body bytes accepted.
    sealed: bool,
}

/// Handle on the response of one request; clones share state.
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    state: Arc<Mutex<ResponseState>>,
    encoder: Option<Negotiated>,
}

impl ResponseWriter {
    pub fn new(encoder: Option<Negotiated>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ResponseState::default())),
            encoder,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResponseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a status line has been committed.
    pub fn written(&self) -> bool {
        self.lock().status.is_some()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.lock().status
    }

    /// Body bytes written so far.
    pub fn len(&self) -> usize {
        self.lock().body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Negotiated response media type.
    pub fn content_type(&self) -> Option<&str> {
        self.encoder.as_ref().map(|n| n.content_type.as_str())
    }

    /// Set a header before the status is committed. Returns `false` afterwards.
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) -> bool {
        let mut state = self.lock();
        if state.status.is_some() {
            return false;
        }
        state.headers.insert(name, value);
        true
    }

    /// Encode `body` with the negotiated encoder and commit `status`.
    ///
    /// Fails without side effects if a response was already written.
    pub fn send<T>(&self, status: StatusCode, body: &T) -> Result<(), SendError>
    where
        T: Serialize + ?Sized,
    {
        let mut state = self.lock();
        if state.status.is_some() {
            return Err(SendError::AlreadyWritten);
        }
        let negotiated = self.encoder.as_ref().ok_or(SendError::NoEncoder)?;
        let value = serde_json::to_value(body).map_err(|e| EncodeError::Serialize(e.to_string()))?;
        let bytes = negotiated.encoder.encode(&value)?;
        if let Ok(ct) = HeaderValue::from_str(&negotiated.content_type) {
            state.headers.insert(header::CONTENT_TYPE, ct);
        }
        state.status = Some(status);
        state.body = bytes;
        state.sealed = true;
        Ok(())
    }

    /// Commit a status with raw headers; the body follows through [`ResponseWriter::write`].
    pub fn write_header(&self, status: StatusCode, headers: HeaderMap) -> Result<(), SendError> {
        let mut state = self.lock();
        if state.status.is_some() {
            return Err(SendError::AlreadyWritten);
        }
        state.headers.extend(headers);
        state.status = Some(status);
        Ok(())
    }

    /// Append raw body bytes, committing `200 OK` if no status was written.
    pub fn write(&self, bytes: &[u8]) -> Result<(), SendError> {
        let mut state = self.lock();
        if state.sealed {
            return Err(SendError::AlreadyWritten);
        }
        state.status.get_or_insert(StatusCode::OK);
        state.body.extend_from_slice(bytes);
        Ok(())
    }

    /// Drain the buffered response into an HTTP response.
    pub fn take_response(&self) -> Response {
        let mut state = self.lock();
        let state = std::mem::take(&mut *state);
        let mut response = Response::new(Body::from(state.body));
        *response.status_mut() = state.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = state.headers;
        response
    }
}
