pub mod archive;
pub mod metrics;

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use crate::chunk;
use crate::config::IndexConfig;
use crate::encoding::{Key as _, Value as _};
use crate::error::Result;
use crate::pipeline::key::TraceKey;
use crate::pipeline::{Record, StoreWriter};
use crate::trace::{ChunkId, Trace};
use metrics::Metrics;

/// Traces and contributing archives accumulated for the chunk currently
/// being built. Archives are appended only once fully drained, so a flush
/// commits every archive whose traces it completes.
#[derive(Default)]
struct Pending {
    chunk_id: Option<ChunkId>,
    traces: Vec<Trace>,
    archives: Vec<PathBuf>,
}

/// Idempotent, resumable ingestion of trace archives into the chunked
/// index. Archives are the source of truth; a marker symlink under
/// `tarballs/` is the only commit signal, installed after every chunk the
/// archive contributed to has been rewritten.
pub struct Indexer {
    config: IndexConfig,
    metrics: Metrics,
}

impl Indexer {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            metrics: Metrics::default(),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Indexes every unmarked archive under the archive root, then logs
    /// the final counter values.
    pub fn run(&self) -> Result<()> {
        tracing::info!("scanning archives");
        let archives = self.scan_archives()?;
        tracing::info!(available = archives.len(), "archives available");

        tracing::info!("scanning index");
        let to_index = self.partition(&archives);
        tracing::info!(indexing = to_index.len(), "indexing archives");

        let mut pending = Pending::default();
        for archive_path in to_index {
            let bundle = match archive::read_archive(&archive_path) {
                Ok(bundle) => bundle,
                Err(err) => {
                    tracing::warn!(archive = %archive_path.display(), %err, "failed to read archive");
                    self.metrics.tars_failed.incr();
                    continue;
                }
            };
            self.metrics.traces_failed.add(bundle.failures.len() as i64);
            for (entry, err) in &bundle.failures {
                tracing::warn!(archive = %archive_path.display(), entry = %entry, %err, "failed to decode trace");
            }

            let mut traces = bundle.traces;
            traces.sort_by(Trace::index_cmp);

            let mut tainted = false;
            for trace in traces {
                let chunk_id = trace.chunk_id();
                if pending.chunk_id.as_ref() != Some(&chunk_id) {
                    if pending.chunk_id.is_some() && !self.flush(std::mem::take(&mut pending)) {
                        tainted = true;
                    }
                    pending.chunk_id = Some(chunk_id);
                }
                pending.traces.push(trace);
            }

            if tainted {
                // One of this archive's chunks failed to write, so its
                // marker must not be installed. It will be reprocessed on
                // the next run.
                self.metrics.tars_failed.incr();
                tracing::warn!(archive = %archive_path.display(), "chunk write failed; archive left unmarked");
            } else {
                pending.archives.push(archive_path);
            }
        }
        if !pending.traces.is_empty() || !pending.archives.is_empty() {
            self.flush(pending);
        }

        tracing::info!("done");
        self.metrics.log_summary();
        Ok(())
    }

    /// Enumerates `*.tar` files under the archive root in ascending path
    /// order. The root is canonicalized so marker targets are absolute.
    fn scan_archives(&self) -> Result<Vec<PathBuf>> {
        let root = fs::canonicalize(&self.config.archive_root)?;
        let mut archives = Vec::new();
        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("tar") {
                archives.push(path);
            }
        }
        archives.sort();
        Ok(archives)
    }

    /// Splits off the archives whose marker already points at them.
    fn partition(&self, archives: &[PathBuf]) -> Vec<PathBuf> {
        let mut to_index = Vec::new();
        for archive in archives {
            self.metrics.tars_scanned.incr();
            match fs::read_link(chunk::marker_path(&self.config.index_root, archive)) {
                Ok(target) if &target == archive => {
                    self.metrics.tars_skipped.incr();
                    continue;
                }
                Ok(_) => self.metrics.tars_skipped_invalid_link.incr(),
                Err(_) => {}
            }
            to_index.push(archive.clone());
        }
        to_index
    }

    /// Merges the pending traces into their chunk and, on success,
    /// installs markers for every fully drained archive. Returns whether
    /// the chunk write succeeded.
    fn flush(&self, pending: Pending) -> bool {
        let Pending {
            chunk_id,
            traces,
            archives,
        } = pending;

        let chunk_id = match chunk_id {
            Some(chunk_id) => chunk_id,
            None => {
                // Archives that contributed no traces at all still count
                // as indexed and get their markers.
                self.metrics.tars_indexed.add(archives.len() as i64);
                for archive in &archives {
                    self.install_marker(archive);
                }
                return true;
            }
        };

        let trace_count = traces.len() as i64;
        let path = chunk::chunk_path(&self.config.index_root, &chunk_id);
        match chunk::write_chunk(&path, traces) {
            Ok(pre_existing) => {
                self.metrics.chunks_indexed.incr();
                self.metrics.traces_indexed.add(trace_count);
                self.metrics.tars_indexed.add(archives.len() as i64);
                if pre_existing > 0 {
                    self.metrics.chunks_reread.incr();
                    self.metrics.traces_reread.add(pre_existing as i64);
                }
                for archive in &archives {
                    self.install_marker(archive);
                }
                true
            }
            Err(err) => {
                tracing::warn!(chunk = %path.display(), %err, "failed to write chunk");
                self.metrics.chunks_failed.incr();
                self.metrics.tars_failed.add(archives.len() as i64);
                self.metrics.traces_failed.add(trace_count);
                false
            }
        }
    }

    /// Installs the marker symlink for a fully indexed archive. A failure
    /// here only means the archive gets reprocessed next run.
    fn install_marker(&self, archive: &Path) {
        let marker = chunk::marker_path(&self.config.index_root, archive);
        if let Some(parent) = marker.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                tracing::warn!(dir = %parent.display(), %err, "failed to create marker directory");
                self.metrics.tars_link_failed.incr();
                return;
            }
        }
        if let Err(err) = symlink(archive, &marker) {
            tracing::warn!(
                archive = %archive.display(),
                marker = %marker.display(),
                %err,
                "failed to create marker; archive will be reprocessed next run"
            );
            self.metrics.tars_link_failed.incr();
            return;
        }
        self.metrics.tars_linked.incr();
    }
}

/// Loads every chunk under the index root and writes its traces into a
/// pipeline store keyed by TraceKey, in ascending key order. The trace's
/// anonymization signature becomes the key's context and its process
/// start time becomes the session id.
pub fn export_traces(index_root: &Path, writer: &mut dyn StoreWriter) -> Result<()> {
    let mut records = Vec::new();
    let traces_dir = index_root.join("traces");
    if traces_dir.exists() {
        for group in fs::read_dir(&traces_dir)? {
            for file in fs::read_dir(group?.path())? {
                let path = file?.path();
                let Some(traces) = chunk::read_chunk(&path)? else {
                    continue;
                };
                for trace in traces {
                    let key = TraceKey::new(
                        trace.node_id.clone(),
                        trace.signature(),
                        trace.process_start_time_microseconds,
                        trace.sequence_number,
                    );
                    records.push((key.encode(), trace.encode()));
                }
            }
        }
    }
    records.sort();

    writer.begin_writing()?;
    for (key, value) in records {
        writer.write_record(Record { key, value })?;
    }
    writer.end_writing()?;
    Ok(())
}
