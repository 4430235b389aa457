pub mod disk;
pub mod filter_sessions;
pub mod include_nodes;
pub mod join;
pub mod key;
pub mod lookups_per_device;
pub mod slice;

use crate::encoding::format::{Formatter as _, Keycode};
use crate::errdata;
use crate::error::Result;

/// A key/value record flowing between pipeline stages.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Sequential read side of a store. Records come back in ascending key
/// order.
pub trait StoreReader {
    fn begin_reading(&mut self) -> Result<()>;

    /// The next record, or None once the store is drained.
    fn read_record(&mut self) -> Result<Option<Record>>;

    fn end_reading(&mut self) -> Result<()>;
}

/// Bulk write side of a store. Writers must produce strictly ascending
/// keys; a violation is a stage bug and fails the pipeline.
pub trait StoreWriter {
    fn begin_writing(&mut self) -> Result<()>;

    fn write_record(&mut self, record: Record) -> Result<()>;

    fn end_writing(&mut self) -> Result<()>;
}

/// Hands out readers and writers for named stores. Handles for the same
/// name address the same contents, so one stage's output store can be a
/// later stage's input store.
pub trait StoreManager {
    fn reader(&self, name: &str) -> Box<dyn StoreReader>;
    fn writer(&self, name: &str) -> Box<dyn StoreWriter>;
}

/// A pure function from sorted input streams to sorted output streams.
pub trait Transform {
    fn run(
        &mut self,
        inputs: &mut [Box<dyn StoreReader>],
        outputs: &mut [Box<dyn StoreWriter>],
    ) -> Result<()>;
}

/// One stage of a pipeline: a transform bound to its input and output
/// stores.
pub struct Stage {
    pub name: &'static str,
    pub inputs: Vec<Box<dyn StoreReader>>,
    pub outputs: Vec<Box<dyn StoreWriter>>,
    pub transform: Box<dyn Transform>,
}

impl Stage {
    pub fn new(name: &'static str, transform: impl Transform + 'static) -> Self {
        Self {
            name,
            inputs: Vec::new(),
            outputs: Vec::new(),
            transform: Box::new(transform),
        }
    }

    /// Bind an input store
    pub fn input(mut self, reader: Box<dyn StoreReader>) -> Self {
        self.inputs.push(reader);
        self
    }

    /// Bind an output store
    pub fn output(mut self, writer: Box<dyn StoreWriter>) -> Self {
        self.outputs.push(writer);
        self
    }
}

/// Runs stages sequentially in declared order. Each stage observes only
/// the fully written output of earlier stages.
pub fn run_pipeline(stages: Vec<Stage>) -> Result<()> {
    for mut stage in stages {
        for input in &mut stage.inputs {
            input.begin_reading()?;
        }
        for output in &mut stage.outputs {
            output.begin_writing()?;
        }
        stage.transform.run(&mut stage.inputs, &mut stage.outputs)?;
        for input in &mut stage.inputs {
            input.end_reading()?;
        }
        for output in &mut stage.outputs {
            output.end_writing()?;
        }
        tracing::debug!(stage = stage.name, "stage complete");
    }
    Ok(())
}

/// Shared ascending-key check for store writers.
pub(crate) fn check_ascending(last_key: &mut Option<Vec<u8>>, key: &[u8]) -> Result<()> {
    if let Some(last) = last_key {
        if key <= last.as_slice() {
            return errdata!(
                "keys must be strictly ascending: {} after {}",
                Keycode::key(key),
                Keycode::key(last)
            );
        }
    }
    *last_key = Some(key.to_vec());
    Ok(())
}
