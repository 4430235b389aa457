use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::encoding::bincode;
use crate::error::{Error, Result};
use crate::trace::Trace;

/// Traces decoded from one archive. Entry-level decode failures are kept
/// aside by entry name so one bad trace doesn't fail the bundle.
pub struct ArchiveTraces {
    pub traces: Vec<Trace>,
    pub failures: Vec<(String, Error)>,
}

/// Decodes one gzip-compressed trace entry.
fn read_trace(reader: impl Read) -> Result<Trace> {
    bincode::deserialize_from(GzDecoder::new(reader))
}

/// Streams every entry of a tar archive. A malformed entry header fails
/// the whole archive.
pub fn read_archive(path: &Path) -> Result<ArchiveTraces> {
    let mut archive = tar::Archive::new(File::open(path)?);
    let mut traces = Vec::new();
    let mut failures = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        let name = entry
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "<unreadable entry name>".to_string());
        match read_trace(entry) {
            Ok(trace) => traces.push(trace),
            Err(err) => failures.push((name, err)),
        }
    }
    Ok(ArchiveTraces { traces, failures })
}
