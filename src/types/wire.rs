use serde::{de::DeserializeOwned, Serialize};

use crate::types::error::{AkaError, AkaResult};

pub fn encode<T: Serialize>(message: &T) -> AkaResult<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| AkaError::MalformedMessage(e.to_string()))
}

/// Parses a received frame into its typed form; any shape mismatch is a
/// [`AkaError::MalformedMessage`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> AkaResult<T> {
    serde_json::from_slice(bytes).map_err(|e| AkaError::MalformedMessage(e.to_string()))
}

pub mod hex_array {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes.try_into().map_err(|bytes: Vec<u8>| {
            D::Error::custom(format!("expected {} bytes, got {}", N, bytes.len()))
        })
    }
}

pub mod hex_vec {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(&encoded).map_err(D::Error::custom)
    }
}
