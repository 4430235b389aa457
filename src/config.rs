use std::path::PathBuf;

/// Configuration for the trace index
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Directory scanned for `*.tar` archive bundles
    pub archive_root: PathBuf,

    /// Directory holding the derived index (chunks, markers, logs)
    pub index_root: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            archive_root: PathBuf::from("./archives"),
            index_root: PathBuf::from("./traceindex"),
        }
    }
}

impl IndexConfig {
    /// Create a new config with the given archive and index directories
    pub fn new(archive_root: impl Into<PathBuf>, index_root: impl Into<PathBuf>) -> Self {
        Self {
            archive_root: archive_root.into(),
            index_root: index_root.into(),
        }
    }

    /// Set the archive directory
    pub fn archive_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_root = dir.into();
        self
    }

    /// Set the index directory
    pub fn index_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_root = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IndexConfig::default();
        assert_eq!(config.archive_root, PathBuf::from("./archives"));
        assert_eq!(config.index_root, PathBuf::from("./traceindex"));
    }

    #[test]
    fn test_config_builder() {
        let config = IndexConfig::default()
            .archive_root("/data/tarballs")
            .index_root("/data/index");

        assert_eq!(config.archive_root, PathBuf::from("/data/tarballs"));
        assert_eq!(config.index_root, PathBuf::from("/data/index"));
    }
}
