//! Request state shared by the handlers of one request.
//!
//! # Responsibilities
//! - Hold the request head, the buffered body and the resolved parameters
//! - Carry the decoded payload set by an unmarshaler
//! - Decode bodies through the service codec registry

use std::any::Any;
use std::sync::{Arc, OnceLock};

use axum::body::Bytes;
use axum::http::{header, request::Parts, HeaderMap, Method, Uri, Version};
use serde::de::DeserializeOwned;

use crate::context::{Context, Params};
use crate::encoding::{Codecs, DecodeError};

/// One inbound request, immutable once dispatch starts except for the
/// write-once payload slot.
#[derive(Debug)]
pub struct RequestData {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    params: Params,
    payload: OnceLock<Box<dyn Any + Send + Sync>>,
}

impl RequestData {
    pub fn new(parts: Parts, body: Bytes, params: Params) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            params,
            payload: OnceLock::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Store the decoded payload. Returns `false` if one was already set.
    pub fn set_payload<T: Any + Send + Sync>(&self, payload: T) -> bool {
        self.payload.set(Box::new(payload)).is_ok()
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.get().and_then(|p| p.downcast_ref::<T>())
    }
}

/// Decode the request body into `T` using the decoder registered for its
/// content type on the context's service (built-in codecs otherwise).
pub fn decode_request<T: DeserializeOwned>(ctx: &Context, req: &RequestData) -> Result<T, DecodeError> {
    if req.body().is_empty() {
        return Err(DecodeError::MissingPayload);
    }
    let decoder = match ctx.service() {
        Some(service) => service.settings().codecs.decoder_for(req.content_type())?,
        None => Codecs::with_defaults().decoder_for(req.content_type())?,
    };
    let value = decoder.decode(req.body())?;
    serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))
}

/// An unmarshaler loads a request's payload before the handler runs.
#[derive(Clone)]
pub struct Unmarshaler(Arc<dyn Fn(&Context, &RequestData) -> Result<(), DecodeError> + Send + Sync>);

impl Unmarshaler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context, &RequestData) -> Result<(), DecodeError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Decode the body as `T` and store it as the payload.
    pub fn payload<T>() -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        Self::new(|ctx, req| {
            let payload: T = decode_request(ctx, req)?;
            req.set_payload(payload);
            Ok(())
        })
    }

    pub fn call(&self, ctx: &Context, req: &RequestData) -> Result<(), DecodeError> {
        (self.0)(ctx, req)
    }
}
