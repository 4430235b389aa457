use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::encoding::bincode;
use crate::error::Result;
use crate::trace::{ChunkId, Trace};

/// Path of the chunk file for a chunk id:
/// `traces/<node>-<signature>/<process_start_us>-<bucket>`.
pub fn chunk_path(index_root: &Path, id: &ChunkId) -> PathBuf {
    index_root
        .join("traces")
        .join(format!("{}-{}", id.node_id, id.anonymization_signature))
        .join(format!(
            "{}-{}",
            id.process_start_time_microseconds, id.sequence_bucket
        ))
}

/// Path of the marker symlink recording that an archive has been indexed.
pub fn marker_path(index_root: &Path, archive: &Path) -> PathBuf {
    index_root
        .join("tarballs")
        .join(archive.file_name().unwrap_or_default())
}

/// Path of the log file for an indexer run, named by its wall-clock start
/// time.
pub fn indexer_log_path(index_root: &Path) -> PathBuf {
    index_root
        .join("logs")
        .join(Local::now().format("%Y%m%d-%H%M%S").to_string())
}

/// Reads and decodes an existing chunk. Returns None if the file does not
/// exist. A chunk that exists but cannot be decoded is an error: the merge
/// must fail rather than overwrite it.
pub fn read_chunk(path: &Path) -> Result<Option<Vec<Trace>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let traces = bincode::deserialize_from(GzDecoder::new(BufReader::new(file)))?;
    Ok(Some(traces))
}

/// Merges new traces into an existing ascending list, deduplicating by
/// sequence number. The first writer of a sequence number wins.
pub fn merge_traces(existing: &mut Vec<Trace>, new_traces: Vec<Trace>) {
    for trace in new_traces {
        match existing.binary_search_by_key(&trace.sequence_number, |t| t.sequence_number) {
            Ok(_) => continue,
            Err(position) => existing.insert(position, trace),
        }
    }
}

/// Read-modify-write of one chunk file. Returns the number of traces the
/// chunk held before the merge. New traces are merged one by one, so the
/// result is sorted and unique by sequence number even when the input
/// concatenates runs from several archives. The merged chunk is written to
/// a temporary path and renamed into place, so readers observe either the
/// prior or the new content.
pub fn write_chunk(path: &Path, new_traces: Vec<Trace>) -> Result<usize> {
    let (mut traces, pre_existing) = match read_chunk(path)? {
        Some(existing) => {
            let pre_existing = existing.len();
            (existing, pre_existing)
        }
        None => (Vec::new(), 0),
    };
    merge_traces(&mut traces, new_traces);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(&tmp)?), Compression::default());
    bincode::serialize_into(&mut encoder, &traces)?;
    encoder.finish()?.flush()?;
    fs::rename(&tmp, path)?;
    Ok(pre_existing)
}
