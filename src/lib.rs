pub mod chunk;
pub mod config;
pub mod encoding;
pub mod error;
pub mod indexer;
pub mod pipeline;
pub mod trace;

pub use config::IndexConfig;
pub use error::Error;
pub use indexer::Indexer;
pub use trace::Trace;
