//! Content encoding and decoding.
//!
//! Decoders turn request bodies into a `serde_json::Value` and encoders turn
//! a `Value` into response bytes; typed payloads convert through `Value` so
//! both traits stay object safe. [`Codecs`] keys them by content type and
//! negotiates the response encoder from the `Accept` header.

mod json;
mod yaml;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

pub use json::JsonCodec;
pub use yaml::YamlCodec;

pub const JSON: &str = "application/json";
pub const YAML: &str = "application/x-yaml";

/// Content types with a codec shipped in this crate.
pub const BUILTIN_CONTENT_TYPES: &[&str] = &[JSON, YAML, "text/yaml"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing required payload")]
    MissingPayload,

    #[error("unsupported content type {0:?}")]
    UnsupportedContentType(String),

    #[error("failed to read body: {0}")]
    Read(String),

    #[error("{0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("failed to serialize body: {0}")]
    Serialize(String),
}

pub trait Decoder: Send + Sync {
    fn decode(&self, body: &[u8]) -> Result<Value, DecodeError>;
}

pub trait Encoder: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError>;
}

/// An encoder picked for one response, with the media type it answers to.
#[derive(Clone)]
pub struct Negotiated {
    pub content_type: String,
    pub encoder: Arc<dyn Encoder>,
}

impl std::fmt::Debug for Negotiated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Negotiated")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Decoder and encoder registries.
///
/// `encodable` keeps registration order; its first entry is the default used
/// when a client sends no `Accept` header or accepts anything.
#[derive(Clone, Default)]
pub struct Codecs {
    decoders: HashMap<String, Arc<dyn Decoder>>,
    encoders: HashMap<String, Arc<dyn Encoder>>,
    encodable: Vec<String>,
}

impl Codecs {
    /// JSON first, then YAML.
    pub fn with_defaults() -> Self {
        let mut codecs = Self::default();
        codecs.register_decoder(Arc::new(JsonCodec), &[JSON]);
        codecs.register_encoder(Arc::new(JsonCodec), &[JSON]);
        codecs.register_decoder(Arc::new(YamlCodec), &[YAML, "text/yaml"]);
        codecs.register_encoder(Arc::new(YamlCodec), &[YAML, "text/yaml"]);
        codecs
    }

    pub fn register_decoder(&mut self, decoder: Arc<dyn Decoder>, content_types: &[&str]) {
        for ct in content_types {
            self.decoders.insert(media_type(ct), decoder.clone());
        }
    }

    pub fn register_encoder(&mut self, encoder: Arc<dyn Encoder>, content_types: &[&str]) {
        for ct in content_types {
            let ct = media_type(ct);
            if !self.encodable.contains(&ct) {
                self.encodable.push(ct.clone());
            }
            self.encoders.insert(ct, encoder.clone());
        }
    }

    /// Make `content_type` the negotiation default.
    ///
    /// Fails when no encoder is registered for it.
    pub fn set_default(&mut self, content_type: &str) -> Result<(), String> {
        let ct = media_type(content_type);
        let Some(pos) = self.encodable.iter().position(|c| *c == ct) else {
            return Err(ct);
        };
        let ct = self.encodable.remove(pos);
        self.encodable.insert(0, ct);
        Ok(())
    }

    pub fn default_content_type(&self) -> Option<&str> {
        self.encodable.first().map(String::as_str)
    }

    pub fn encodable(&self) -> &[String] {
        &self.encodable
    }

    /// Decoder for a request's `Content-Type`.
    ///
    /// A missing header selects the decoder of the default content type.
    pub fn decoder_for(&self, content_type: Option<&str>) -> Result<Arc<dyn Decoder>, DecodeError> {
        let ct = match content_type {
            Some(ct) if !ct.trim().is_empty() => media_type(ct),
            _ => self.default_content_type().unwrap_or(JSON).to_string(),
        };
        self.decoders
            .get(&ct)
            .cloned()
            .ok_or(DecodeError::UnsupportedContentType(ct))
    }

    /// Pick the response encoder for an `Accept` header.
    ///
    /// Ranges are tried by descending `q`; `*/*` and unmatched headers fall
    /// back to the default. `None` only when no encoder is registered.
    pub fn negotiate(&self, accept: Option<&str>) -> Option<Negotiated> {
        let picked = accept
            .map(parse_accept)
            .unwrap_or_default()
            .into_iter()
            .find_map(|range| self.match_range(&range));
        let ct = picked.or_else(|| self.encodable.first().cloned())?;
        let encoder = self.encoders.get(&ct)?.clone();
        Some(Negotiated {
            content_type: ct,
            encoder,
        })
    }

    fn match_range(&self, range: &str) -> Option<String> {
        if range == "*/*" {
            return self.encodable.first().cloned();
        }
        if let Some(prefix) = range.strip_suffix("/*") {
            return self
                .encodable
                .iter()
                .find(|ct| ct.split('/').next() == Some(prefix))
                .cloned();
        }
        self.encoders.contains_key(range).then(|| range.to_string())
    }
}

/// Strip parameters and normalize case: `Application/JSON; charset=utf-8` → `application/json`.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Media ranges of an `Accept` header ordered by quality, `q=0` removed.
fn parse_accept(header: &str) -> Vec<String> {
    let mut ranges: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let range = pieces.next()?.trim().to_ascii_lowercase();
            if range.is_empty() {
                return None;
            }
            let q = pieces
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);
            Some((range, q))
        })
        .filter(|(_, q)| *q > 0.0)
        .collect();
    // stable: equal weights keep header order
    ranges.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranges.into_iter().map(|(r, _)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_normalization() {
        assert_eq!(media_type("Application/JSON; charset=utf-8"), "application/json");
        assert_eq!(media_type("  text/yaml "), "text/yaml");
    }

    #[test]
    fn test_negotiate_prefers_quality() {
        let codecs = Codecs::with_defaults();
        let n = codecs
            .negotiate(Some("application/json;q=0.5, application/x-yaml"))
            .unwrap();
        assert_eq!(n.content_type, YAML);

        let n = codecs.negotiate(Some("text/html, */*;q=0.1")).unwrap();
        assert_eq!(n.content_type, JSON);
    }

    #[test]
    fn test_negotiate_fallbacks() {
        let codecs = Codecs::with_defaults();
        assert_eq!(codecs.negotiate(None).unwrap().content_type, JSON);
        assert_eq!(codecs.negotiate(Some("image/png")).unwrap().content_type, JSON);
        assert_eq!(codecs.negotiate(Some("text/*")).unwrap().content_type, "text/yaml");
        assert!(Codecs::default().negotiate(Some("*/*")).is_none());
    }

    #[test]
    fn test_set_default_requires_encoder() {
        let mut codecs = Codecs::with_defaults();
        codecs.set_default(YAML).unwrap();
        assert_eq!(codecs.default_content_type(), Some(YAML));
        assert_eq!(codecs.negotiate(None).unwrap().content_type, YAML);

        assert_eq!(
            codecs.set_default("application/xml"),
            Err("application/xml".to_string())
        );
    }

    #[test]
    fn test_decoder_lookup() {
        let codecs = Codecs::with_defaults();
        assert!(codecs.decoder_for(Some("application/json; charset=utf-8")).is_ok());
        assert!(codecs.decoder_for(None).is_ok());
        assert_eq!(
            codecs.decoder_for(Some("application/xml")).err(),
            Some(DecodeError::UnsupportedContentType("application/xml".into()))
        );
    }
}
