use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{check_ascending, Record, StoreManager, StoreReader, StoreWriter};
use crate::error::{Error, Result};

type Shared = Arc<Mutex<Vec<Record>>>;

/// In-memory stores for tests and small runs. Readers and writers handed
/// out for the same name share contents, so one stage's output store can
/// be a later stage's input store.
#[derive(Default)]
pub struct SliceManager {
    stores: Mutex<HashMap<String, Shared>>,
}

impl SliceManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self, name: &str) -> Shared {
        let mut stores = self.stores.lock().unwrap();
        stores.entry(name.to_string()).or_default().clone()
    }
}

impl StoreManager for SliceManager {
    fn reader(&self, name: &str) -> Box<dyn StoreReader> {
        Box::new(SliceReader {
            store: self.store(name),
            position: 0,
            reading: false,
        })
    }

    fn writer(&self, name: &str) -> Box<dyn StoreWriter> {
        Box::new(SliceWriter {
            store: self.store(name),
            last_key: None,
            writing: false,
        })
    }
}

pub struct SliceReader {
    store: Shared,
    position: usize,
    reading: bool,
}

impl StoreReader for SliceReader {
    fn begin_reading(&mut self) -> Result<()> {
        self.position = 0;
        self.reading = true;
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        if !self.reading {
            return Err(Error::ReadOnly);
        }
        let records = self.store.lock().unwrap();
        match records.get(self.position) {
            Some(record) => {
                self.position += 1;
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    fn end_reading(&mut self) -> Result<()> {
        self.reading = false;
        Ok(())
    }
}

pub struct SliceWriter {
    store: Shared,
    last_key: Option<Vec<u8>>,
    writing: bool,
}

impl StoreWriter for SliceWriter {
    fn begin_writing(&mut self) -> Result<()> {
        self.store.lock().unwrap().clear();
        self.last_key = None;
        self.writing = true;
        Ok(())
    }

    fn write_record(&mut self, record: Record) -> Result<()> {
        if !self.writing {
            return Err(Error::ReadOnly);
        }
        check_ascending(&mut self.last_key, &record.key)?;
        self.store.lock().unwrap().push(record);
        Ok(())
    }

    fn end_writing(&mut self) -> Result<()> {
        self.writing = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &[u8]) -> Record {
        Record {
            key: key.to_vec(),
            value: Vec::new(),
        }
    }

    #[test]
    fn test_write_then_read() {
        let manager = SliceManager::new();

        let mut writer = manager.writer("store");
        writer.begin_writing().unwrap();
        writer.write_record(record(b"a")).unwrap();
        writer.write_record(record(b"b")).unwrap();
        writer.end_writing().unwrap();

        let mut reader = manager.reader("store");
        reader.begin_reading().unwrap();
        assert_eq!(reader.read_record().unwrap(), Some(record(b"a")));
        assert_eq!(reader.read_record().unwrap(), Some(record(b"b")));
        assert_eq!(reader.read_record().unwrap(), None);
    }

    #[test]
    fn test_access_outside_session() {
        let manager = SliceManager::new();
        assert_eq!(
            manager.writer("store").write_record(record(b"a")),
            Err(Error::ReadOnly)
        );
        assert_eq!(manager.reader("store").read_record(), Err(Error::ReadOnly));
    }

    #[test]
    fn test_rewrite_replaces_contents() {
        let manager = SliceManager::new();

        let mut writer = manager.writer("store");
        writer.begin_writing().unwrap();
        writer.write_record(record(b"a")).unwrap();
        writer.end_writing().unwrap();

        writer.begin_writing().unwrap();
        writer.write_record(record(b"z")).unwrap();
        writer.end_writing().unwrap();

        let mut reader = manager.reader("store");
        reader.begin_reading().unwrap();
        assert_eq!(reader.read_record().unwrap(), Some(record(b"z")));
        assert_eq!(reader.read_record().unwrap(), None);
    }
}
