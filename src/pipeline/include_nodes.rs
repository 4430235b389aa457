use std::collections::BTreeSet;

use super::{Stage, StoreManager, StoreReader, StoreWriter, Transform};
use crate::encoding::keycode::Decoder;
use crate::errinput;
use crate::error::Result;

/// Passes through records whose node (the leading key element) is in the
/// permitted set, preserving input order.
pub struct IncludeNodes {
    nodes: BTreeSet<String>,
}

impl IncludeNodes {
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transform for IncludeNodes {
    fn run(
        &mut self,
        inputs: &mut [Box<dyn StoreReader>],
        outputs: &mut [Box<dyn StoreWriter>],
    ) -> Result<()> {
        let [input] = inputs else {
            return errinput!("include-nodes takes exactly one input store");
        };
        let [output] = outputs else {
            return errinput!("include-nodes takes exactly one output store");
        };
        while let Some(record) = input.read_record()? {
            let node_id = Decoder::new(&record.key).string()?;
            if self.nodes.contains(&node_id) {
                output.write_record(record)?;
            }
        }
        Ok(())
    }
}

/// Builds the one-stage projection reading `traces` and writing
/// `included-traces`.
pub fn include_nodes_pipeline<I, S>(nodes: I, manager: &dyn StoreManager) -> Vec<Stage>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    vec![Stage::new("include-nodes", IncludeNodes::new(nodes))
        .input(manager.reader("traces"))
        .output(manager.writer("included-traces"))]
}
