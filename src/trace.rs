use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Traces sharing a chunk are grouped by sequence_number / CHUNKING_FACTOR.
pub const CHUNKING_FACTOR: i32 = 1000;

/// Signature recorded for traces captured without an anonymization pass.
pub const UNANONYMIZED: &str = "unanonymized";

/// Wall-clock seconds covered by one sequence step. Capture devices emit
/// one trace per 30-second interval, so a trace's timestamp is the session
/// start plus 30 seconds per sequence number.
pub const TRACE_INTERVAL_SECS: i64 = 30;

/// A DNS A record observed inside a trace.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsARecord {
    pub address_id: i32,
    pub anonymized: bool,
    pub domain: String,
}

/// A DNS CNAME record observed inside a trace. The queried domain and the
/// canonical name carry independent anonymization flags.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsCnameRecord {
    pub address_id: i32,
    pub domain_anonymized: bool,
    pub domain: String,
    pub cname_anonymized: bool,
    pub cname: String,
}

/// A decoded measurement record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub node_id: String,
    pub anonymization_signature: Option<String>,
    pub process_start_time_microseconds: i64,
    pub sequence_number: i32,
    pub a_records: Vec<DnsARecord>,
    pub cname_records: Vec<DnsCnameRecord>,
    /// Uninterpreted remainder of the capture record, carried verbatim
    /// through indexing.
    pub payload: Vec<u8>,
}

impl Trace {
    /// The anonymization signature, defaulting for unanonymized captures.
    pub fn signature(&self) -> &str {
        self.anonymization_signature.as_deref().unwrap_or(UNANONYMIZED)
    }

    /// The chunk this trace belongs to.
    pub fn chunk_id(&self) -> ChunkId {
        ChunkId {
            node_id: self.node_id.clone(),
            anonymization_signature: self.signature().to_string(),
            process_start_time_microseconds: self.process_start_time_microseconds,
            sequence_bucket: self.sequence_number / CHUNKING_FACTOR,
        }
    }

    /// Composite index ordering:
    /// (node, signature, process start time, sequence number) ascending.
    pub fn index_cmp(&self, other: &Trace) -> Ordering {
        (
            &self.node_id,
            self.signature(),
            self.process_start_time_microseconds,
            self.sequence_number,
        )
            .cmp(&(
                &other.node_id,
                other.signature(),
                other.process_start_time_microseconds,
                other.sequence_number,
            ))
    }
}

/// Identifies one chunk file: all traces sharing this tuple are stored
/// together.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChunkId {
    pub node_id: String,
    pub anonymization_signature: String,
    pub process_start_time_microseconds: i64,
    pub sequence_bucket: i32,
}

/// Wall-clock time of a trace in microseconds since the epoch.
pub fn trace_timestamp_microseconds(session_id: i64, sequence_number: i32) -> i64 {
    session_id + sequence_number as i64 * TRACE_INTERVAL_SECS * 1_000_000
}

/// The hour bucket (seconds since the epoch, truncated to the hour) a
/// trace's timestamp falls in.
pub fn hour_bucket_secs(session_id: i64, sequence_number: i32) -> i64 {
    let secs = trace_timestamp_microseconds(session_id, sequence_number) / 1_000_000;
    secs / 3600 * 3600
}
