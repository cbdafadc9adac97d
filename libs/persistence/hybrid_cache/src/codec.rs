use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error("Deserialization failed: {0}")]
    Deserialization(String),
}

/// Wire format of cached payloads. Only the encode/decode step depends on
/// it; keys and tier behavior do not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    #[default]
    Json,
    Bincode,
}

#[derive(Debug, Clone, Copy)]
pub struct Codec {
    format: SerializationFormat,
}

impl Codec {
    pub fn new(format: SerializationFormat) -> Self { Self { format } }

    pub fn format(&self) -> SerializationFormat { self.format }

    pub fn encode<T>(&self, value: &T) -> Result<Bytes, CodecError>
    where
        T: Serialize,
    {
        let bytes = match self.format {
            SerializationFormat::Json => {
                serde_json::to_vec(value)
                    .map_err(|e| CodecError::Serialization(e.to_string()))?
            }
            SerializationFormat::Bincode => {
                bincode::serde::encode_to_vec(
                    value,
                    bincode::config::standard(),
                )
                .map_err(|e| CodecError::Serialization(e.to_string()))?
            }
        };
        Ok(Bytes::from(bytes))
    }

    pub fn decode<T>(&self, bytes: &[u8]) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
    {
        match self.format {
            SerializationFormat::Json => {
                serde_json::from_slice(bytes)
                    .map_err(|e| CodecError::Deserialization(e.to_string()))
            }
            SerializationFormat::Bincode => {
                bincode::serde::decode_from_slice(
                    bytes,
                    bincode::config::standard(),
                )
                .map(|(value, _)| value)
                .map_err(|e| CodecError::Deserialization(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: i64,
        name: String,
        tags: Vec<String>,
        parent: Option<i64>,
    }

    fn sample() -> Sample {
        Sample {
            id: 7,
            name: "widget".into(),
            tags: vec!["a".into(), "b".into()],
            parent: None,
        }
    }

    #[test]
    fn json_payload_is_readable_text() {
        let codec = Codec::new(SerializationFormat::Json);
        let bytes = codec.encode(&sample()).unwrap();

        assert!(std::str::from_utf8(&bytes).unwrap().contains("widget"));
        assert_eq!(codec.decode::<Sample>(&bytes).unwrap(), sample());
    }

    #[test]
    fn bincode_payload_is_smaller_than_json() {
        let json = Codec::new(SerializationFormat::Json)
            .encode(&sample())
            .unwrap();
        let codec = Codec::new(SerializationFormat::Bincode);
        let bin = codec.encode(&sample()).unwrap();

        assert!(bin.len() < json.len());
        assert_eq!(codec.decode::<Sample>(&bin).unwrap(), sample());
    }

    #[test]
    fn decoding_garbage_fails() {
        let codec = Codec::new(SerializationFormat::Json);
        assert!(matches!(
            codec.decode::<Sample>(b"not json"),
            Err(CodecError::Deserialization(_))
        ));
    }
}
