use super::EncodingError;
use crate::error::Result;

// Type prefixes for order-preserving encoding
// Order matters: these determine cross-type ordering
const TYPE_INT32: u8 = 0x01;
const TYPE_INT64: u8 = 0x02;
const TYPE_STRING: u8 = 0x03;

/// Encode a 32-bit integer with order preservation
pub fn encode_int32(i: i32) -> Vec<u8> {
    // Flip the sign bit to ensure negative numbers sort before positive
    let unsigned = (i as u32) ^ (1u32 << 31);
    let mut result = vec![TYPE_INT32];
    result.extend_from_slice(&unsigned.to_be_bytes());
    result
}

/// Encode a 64-bit integer with order preservation
pub fn encode_int64(i: i64) -> Vec<u8> {
    let unsigned = (i as u64) ^ (1u64 << 63);
    let mut result = vec![TYPE_INT64];
    result.extend_from_slice(&unsigned.to_be_bytes());
    result
}

/// Encode a string with order preservation
pub fn encode_string(s: &str) -> Vec<u8> {
    let mut result = vec![TYPE_STRING];
    result.extend_from_slice(s.as_bytes());
    // Null terminator to handle prefix scans correctly
    result.push(0x00);
    result
}

/// Cursor over a composite key, decoding one element at a time in the
/// order they were encoded.
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// True once every element has been consumed.
    pub fn done(&self) -> bool {
        self.buf.is_empty()
    }

    fn expect_tag(&mut self, tag: u8, name: &str) -> Result<()> {
        match self.buf.first() {
            None => Err(EncodingError::TruncatedData.into()),
            Some(&t) if t != tag => {
                Err(EncodingError::InvalidFormat(format!("expected {name} element")).into())
            }
            Some(_) => {
                self.buf = &self.buf[1..];
                Ok(())
            }
        }
    }

    /// Decode the next element as a 32-bit integer
    pub fn int32(&mut self) -> Result<i32> {
        self.expect_tag(TYPE_INT32, "int32")?;
        if self.buf.len() < 4 {
            return Err(EncodingError::TruncatedData.into());
        }
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.buf[..4]);
        self.buf = &self.buf[4..];
        let unsigned = u32::from_be_bytes(bytes);
        // Flip the sign bit back
        Ok((unsigned ^ (1u32 << 31)) as i32)
    }

    /// Decode the next element as a 64-bit integer
    pub fn int64(&mut self) -> Result<i64> {
        self.expect_tag(TYPE_INT64, "int64")?;
        if self.buf.len() < 8 {
            return Err(EncodingError::TruncatedData.into());
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.buf[..8]);
        self.buf = &self.buf[8..];
        let unsigned = u64::from_be_bytes(bytes);
        Ok((unsigned ^ (1u64 << 63)) as i64)
    }

    /// Decode the next element as a string
    pub fn string(&mut self) -> Result<String> {
        self.expect_tag(TYPE_STRING, "string")?;
        let end = self
            .buf
            .iter()
            .position(|&b| b == 0x00)
            .ok_or(EncodingError::TruncatedData)?;
        let s = std::str::from_utf8(&self.buf[..end]).map_err(|_| EncodingError::InvalidUtf8)?;
        self.buf = &self.buf[end + 1..];
        Ok(s.to_string())
    }

    /// The tag of the next element, if any. Used by the generic key
    /// formatter.
    pub fn peek_tag(&self) -> Option<u8> {
        self.buf.first().copied()
    }
}

/// Tag values exposed for the generic formatter.
pub(crate) const TAG_INT32: u8 = TYPE_INT32;
pub(crate) const TAG_INT64: u8 = TYPE_INT64;
pub(crate) const TAG_STRING: u8 = TYPE_STRING;
