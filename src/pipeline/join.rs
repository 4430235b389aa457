use super::key::SessionKey;
use super::{Record, StoreReader};
use crate::error::Result;

/// Streams a sorted store as per-session groups of records, in ascending
/// session order. Every key in the store must lead with the
/// (node, context, session) prefix.
pub struct SessionGroups<'a> {
    reader: &'a mut dyn StoreReader,
    lookahead: Option<(SessionKey, Record)>,
    primed: bool,
}

impl<'a> SessionGroups<'a> {
    pub fn new(reader: &'a mut dyn StoreReader) -> Self {
        Self {
            reader,
            lookahead: None,
            primed: false,
        }
    }

    fn pull(&mut self) -> Result<Option<(SessionKey, Record)>> {
        match self.reader.read_record()? {
            Some(record) => {
                let session = SessionKey::decode_prefix(&record.key)?;
                Ok(Some((session, record)))
            }
            None => Ok(None),
        }
    }

    /// The next session and all of its records, in key order.
    pub fn next_group(&mut self) -> Result<Option<(SessionKey, Vec<Record>)>> {
        if !self.primed {
            self.lookahead = self.pull()?;
            self.primed = true;
        }
        let (session, first) = match self.lookahead.take() {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let mut records = vec![first];
        loop {
            match self.pull()? {
                Some((next, record)) if next == session => records.push(record),
                other => {
                    self.lookahead = other;
                    return Ok(Some((session, records)));
                }
            }
        }
    }
}
