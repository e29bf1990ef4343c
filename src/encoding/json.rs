use serde_json::Value;

use super::{DecodeError, Decoder, EncodeError, Encoder};

/// `application/json` via `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Decoder for JsonCodec {
    fn decode(&self, body: &[u8]) -> Result<Value, DecodeError> {
        serde_json::from_slice(body).map_err(|e| {
            if e.is_eof() && body.iter().all(u8::is_ascii_whitespace) {
                DecodeError::MissingPayload
            } else {
                DecodeError::Malformed(e.to_string())
            }
        })
    }
}

impl Encoder for JsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        serde_json::to_vec(value).map_err(|e| EncodeError::Serialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_errors() {
        assert_eq!(JsonCodec.decode(b"  \n").unwrap_err(), DecodeError::MissingPayload);
        assert!(matches!(
            JsonCodec.decode(b"{\"name\": ").unwrap_err(),
            DecodeError::Malformed(_)
        ));
        assert_eq!(JsonCodec.decode(b"{\"a\":1}").unwrap(), json!({"a": 1}));
    }
}
