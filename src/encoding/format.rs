//! Formats raw keys and values for logs and test diagnostics, decoding
//! keycode tuples where possible.

use itertools::Itertools as _;

use super::keycode::{self, Decoder};

/// Formats encoded keys and values.
pub trait Formatter {
    /// Formats a key.
    fn key(key: &[u8]) -> String;

    /// Formats a value. Also takes the key to determine the kind of value.
    fn value(key: &[u8], value: &[u8]) -> String;

    /// Formats a key/value pair.
    fn key_value(key: &[u8], value: &[u8]) -> String {
        format!("{} => {}", Self::key(key), Self::value(key, value))
    }
}

/// Formats raw byte slices without any decoding.
pub struct Raw;

impl Raw {
    /// Formats raw bytes as escaped ASCII strings.
    pub fn bytes(bytes: &[u8]) -> String {
        let escaped = bytes
            .iter()
            .copied()
            .flat_map(std::ascii::escape_default)
            .collect_vec();
        format!("\"{}\"", String::from_utf8_lossy(&escaped))
    }
}

impl Formatter for Raw {
    fn key(key: &[u8]) -> String {
        Self::bytes(key)
    }

    fn value(_key: &[u8], value: &[u8]) -> String {
        Self::bytes(value)
    }
}

/// Formats keycode-encoded tuples element by element, falling back to raw
/// bytes on anything that doesn't decode.
pub struct Keycode;

impl Keycode {
    fn tuple(bytes: &[u8]) -> String {
        let mut decoder = Decoder::new(bytes);
        let mut elements = Vec::new();
        while let Some(tag) = decoder.peek_tag() {
            let element = match tag {
                keycode::TAG_INT32 => decoder.int32().map(|v| v.to_string()),
                keycode::TAG_INT64 => decoder.int64().map(|v| v.to_string()),
                keycode::TAG_STRING => decoder.string(),
                _ => Err(crate::errdata!("unknown element tag {tag:#04x}")),
            };
            match element {
                Ok(element) => elements.push(element),
                Err(_) => return Raw::bytes(bytes),
            }
        }
        elements.iter().join("/")
    }
}

impl Formatter for Keycode {
    fn key(key: &[u8]) -> String {
        Self::tuple(key)
    }

    fn value(_key: &[u8], value: &[u8]) -> String {
        Self::tuple(value)
    }
}
