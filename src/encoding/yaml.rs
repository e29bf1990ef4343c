use serde_json::Value;

use super::{DecodeError, Decoder, EncodeError, Encoder};

/// `application/x-yaml` via `serde_yaml`.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlCodec;

impl Decoder for YamlCodec {
    fn decode(&self, body: &[u8]) -> Result<Value, DecodeError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::MissingPayload);
        }
        serde_yaml::from_slice(body).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}

impl Encoder for YamlCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        serde_yaml::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| EncodeError::Serialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_yaml_decode() {
        let v = YamlCodec.decode(b"name: merlot\nvintage: 2015\n").unwrap();
        assert_eq!(v, json!({"name": "merlot", "vintage": 2015}));
        assert_eq!(YamlCodec.decode(b"").unwrap_err(), DecodeError::MissingPayload);
    }
}
