pub mod bincode;
pub mod format;
pub mod keycode;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Encoding failures, converted into Error::InvalidData at the crate boundary.
#[derive(Debug)]
pub enum EncodingError {
    /// The buffer ended before the element was complete.
    TruncatedData,
    /// The bytes do not match the expected element layout.
    InvalidFormat(String),
    /// A string element was not valid UTF-8.
    InvalidUtf8,
}

impl From<EncodingError> for Error {
    fn from(err: EncodingError) -> Self {
        match err {
            EncodingError::TruncatedData => Error::InvalidData("truncated data".to_string()),
            EncodingError::InvalidFormat(msg) => Error::InvalidData(msg),
            EncodingError::InvalidUtf8 => Error::InvalidData("invalid utf-8".to_string()),
        }
    }
}

/// Trait for composite keys with order preservation.
///
/// Keys must maintain lexicographic ordering after encoding to support
/// range scans and merge joins over sorted stores. Implementations encode
/// their fields in order using the keycode module.
pub trait Key: Sized {
    /// Encode the key to bytes while preserving sort order.
    fn encode(&self) -> Vec<u8>;

    /// Decode bytes back to the original key type.
    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// Trait for encoding values for storage using bincode.
///
/// Values don't need to preserve ordering, so we use ordinary
/// serialization.
pub trait Value: Serialize + DeserializeOwned {
    /// Encode the value to bytes.
    fn encode(&self) -> Vec<u8> {
        bincode::serialize(self)
    }

    /// Decode bytes back to the original value type.
    fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
    }
}

impl<T> Value for T where T: Serialize + DeserializeOwned {}
