use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

use super::EncodingError;
use crate::error::Result;

/// Serialize a value using bincode
pub fn serialize<T: Serialize>(value: &T) -> Vec<u8> {
    bincode::serialize(value).expect("serialization should not fail")
}

/// Serialize a value into a writer using bincode
pub fn serialize_into<T: Serialize, W: Write>(writer: W, value: &T) -> Result<()> {
    bincode::serialize_into(writer, value)
        .map_err(|e| EncodingError::InvalidFormat(format!("serialization failed: {e}")).into())
}

/// Deserialize a value from a byte slice using bincode
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| EncodingError::InvalidFormat(format!("deserialization failed: {e}")).into())
}

/// Deserialize a value from a reader using bincode
pub fn deserialize_from<T: DeserializeOwned, R: Read>(reader: R) -> Result<T> {
    bincode::deserialize_from(reader)
        .map_err(|e| EncodingError::InvalidFormat(format!("deserialization failed: {e}")).into())
}

/// Deserialize a value from a reader, returning None on a clean EOF
pub fn maybe_deserialize_from<T: DeserializeOwned, R: Read>(reader: R) -> Result<Option<T>> {
    match bincode::deserialize_from(reader) {
        Ok(value) => Ok(Some(value)),
        Err(err) => match *err {
            bincode::ErrorKind::Io(ref io)
                if io.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: u32,
        name: String,
        active: bool,
    }

    #[test]
    fn test_serialize_deserialize() {
        let original = Sample {
            id: 42,
            name: "test".to_string(),
            active: true,
        };

        let serialized = serialize(&original);
        let deserialized: Sample = deserialize(&serialized).unwrap();

        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_serialize_into_and_deserialize_from() {
        let original = Sample {
            id: 123,
            name: "stream".to_string(),
            active: false,
        };

        let mut buffer = Vec::new();
        serialize_into(&mut buffer, &original).unwrap();

        let deserialized: Sample = deserialize_from(buffer.as_slice()).unwrap();
        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_maybe_deserialize_from() {
        let original = vec![1i32, 2, 3];
        let serialized = serialize(&original);

        let result: Option<Vec<i32>> = maybe_deserialize_from(serialized.as_slice()).unwrap();
        assert_eq!(Some(original), result);

        // A drained reader is a clean end of stream, not an error.
        let empty: &[u8] = &[];
        let result: Option<Vec<i32>> = maybe_deserialize_from(empty).unwrap();
        assert_eq!(None, result);
    }

    #[test]
    fn test_invalid_data() {
        let invalid = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<String> = deserialize(&invalid);
        assert!(result.is_err());
    }
}
