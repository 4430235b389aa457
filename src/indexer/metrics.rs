use std::sync::atomic::{AtomicI64, Ordering};

/// A monotonically increasing integer metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicI64);

impl Counter {
    pub fn add(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn incr(&self) {
        self.add(1);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters describing one indexer run, enumerated at shutdown.
#[derive(Debug, Default)]
pub struct Metrics {
    pub chunks_indexed: Counter,
    pub chunks_failed: Counter,
    pub chunks_reread: Counter,
    pub tars_scanned: Counter,
    pub tars_indexed: Counter,
    pub tars_failed: Counter,
    pub tars_skipped: Counter,
    pub tars_skipped_invalid_link: Counter,
    pub tars_linked: Counter,
    pub tars_link_failed: Counter,
    pub traces_indexed: Counter,
    pub traces_failed: Counter,
    pub traces_reread: Counter,
}

impl Metrics {
    /// Name/value pairs for every counter, in declaration order.
    pub fn snapshot(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("chunks_indexed", self.chunks_indexed.get()),
            ("chunks_failed", self.chunks_failed.get()),
            ("chunks_reread", self.chunks_reread.get()),
            ("tars_scanned", self.tars_scanned.get()),
            ("tars_indexed", self.tars_indexed.get()),
            ("tars_failed", self.tars_failed.get()),
            ("tars_skipped", self.tars_skipped.get()),
            (
                "tars_skipped_invalid_link",
                self.tars_skipped_invalid_link.get(),
            ),
            ("tars_linked", self.tars_linked.get()),
            ("tars_link_failed", self.tars_link_failed.get()),
            ("traces_indexed", self.traces_indexed.get()),
            ("traces_failed", self.traces_failed.get()),
            ("traces_reread", self.traces_reread.get()),
        ]
    }

    /// Logs the final value of every counter.
    pub fn log_summary(&self) {
        for (counter, value) in self.snapshot() {
            tracing::info!(counter, value, "final counter value");
        }
    }
}
