use crate::encoding::keycode::{self, Decoder};
use crate::encoding::Key;
use crate::error::Result;

/// Identity of a logical measurement episode. `session_id` is the session
/// start in microseconds since the epoch.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionKey {
    pub node_id: String,
    pub anonymization_context: String,
    pub session_id: i64,
}

impl SessionKey {
    /// Decodes the session prefix of any store key that leads with
    /// (node, context, session).
    pub fn decode_prefix(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        Ok(Self {
            node_id: decoder.string()?,
            anonymization_context: decoder.string()?,
            session_id: decoder.int64()?,
        })
    }
}

/// Key of a trace record in pipeline stores.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TraceKey {
    pub node_id: String,
    pub anonymization_context: String,
    pub session_id: i64,
    pub sequence_number: i32,
}

impl TraceKey {
    pub fn new(
        node_id: impl Into<String>,
        anonymization_context: impl Into<String>,
        session_id: i64,
        sequence_number: i32,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            anonymization_context: anonymization_context.into(),
            session_id,
            sequence_number,
        }
    }

    pub fn session(&self) -> SessionKey {
        SessionKey {
            node_id: self.node_id.clone(),
            anonymization_context: self.anonymization_context.clone(),
            session_id: self.session_id,
        }
    }
}

impl Key for TraceKey {
    fn encode(&self) -> Vec<u8> {
        let mut key = keycode::encode_string(&self.node_id);
        key.extend_from_slice(&keycode::encode_string(&self.anonymization_context));
        key.extend_from_slice(&keycode::encode_int64(self.session_id));
        key.extend_from_slice(&keycode::encode_int32(self.sequence_number));
        key
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        Ok(Self {
            node_id: decoder.string()?,
            anonymization_context: decoder.string()?,
            session_id: decoder.int64()?,
            sequence_number: decoder.int32()?,
        })
    }
}

/// Key of an address-table record: resolves a trace-local address id to a
/// device from a point in the sequence onward.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AddressKey {
    pub node_id: String,
    pub anonymization_context: String,
    pub session_id: i64,
    pub sequence_number: i32,
    pub address_id: i32,
}

impl Key for AddressKey {
    fn encode(&self) -> Vec<u8> {
        let mut key = keycode::encode_string(&self.node_id);
        key.extend_from_slice(&keycode::encode_string(&self.anonymization_context));
        key.extend_from_slice(&keycode::encode_int64(self.session_id));
        key.extend_from_slice(&keycode::encode_int32(self.sequence_number));
        key.extend_from_slice(&keycode::encode_int32(self.address_id));
        key
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        Ok(Self {
            node_id: decoder.string()?,
            anonymization_context: decoder.string()?,
            session_id: decoder.int64()?,
            sequence_number: decoder.int32()?,
            address_id: decoder.int32()?,
        })
    }
}

/// Key of a per-device lookup count.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DeviceLookupKey {
    pub node_id: String,
    pub mac_address: String,
    pub domain: String,
}

impl Key for DeviceLookupKey {
    fn encode(&self) -> Vec<u8> {
        let mut key = keycode::encode_string(&self.node_id);
        key.extend_from_slice(&keycode::encode_string(&self.mac_address));
        key.extend_from_slice(&keycode::encode_string(&self.domain));
        key
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        Ok(Self {
            node_id: decoder.string()?,
            mac_address: decoder.string()?,
            domain: decoder.string()?,
        })
    }
}

/// Key of a per-device, per-hour lookup count.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct HourlyLookupKey {
    pub node_id: String,
    pub mac_address: String,
    pub domain: String,
    pub hour_timestamp_secs: i64,
}

impl Key for HourlyLookupKey {
    fn encode(&self) -> Vec<u8> {
        let mut key = keycode::encode_string(&self.node_id);
        key.extend_from_slice(&keycode::encode_string(&self.mac_address));
        key.extend_from_slice(&keycode::encode_string(&self.domain));
        key.extend_from_slice(&keycode::encode_int64(self.hour_timestamp_secs));
        key
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        Ok(Self {
            node_id: decoder.string()?,
            mac_address: decoder.string()?,
            domain: decoder.string()?,
            hour_timestamp_secs: decoder.int64()?,
        })
    }
}

/// Encodes an aggregate count value.
pub fn encode_count(count: i64) -> Vec<u8> {
    keycode::encode_int64(count)
}

/// Decodes an aggregate count value.
pub fn decode_count(bytes: &[u8]) -> Result<i64> {
    Decoder::new(bytes).int64()
}

/// Encodes a device identifier value for the address table.
pub fn encode_mac(mac: &str) -> Vec<u8> {
    keycode::encode_string(mac)
}

/// Decodes a device identifier value from the address table.
pub fn decode_mac(bytes: &[u8]) -> Result<String> {
    Decoder::new(bytes).string()
}
