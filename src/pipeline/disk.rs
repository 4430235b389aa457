use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::{check_ascending, Record, StoreManager, StoreReader, StoreWriter};
use crate::error::{Error, Result};

/// Persistent stores: one length-delimited record file per store name
/// under a common directory. Records are framed as
/// `[key len u32][key][value len u32][value]`, big-endian.
pub struct DiskManager {
    dir: PathBuf,
}

impl DiskManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl StoreManager for DiskManager {
    fn reader(&self, name: &str) -> Box<dyn StoreReader> {
        Box::new(DiskReader {
            path: self.path(name),
            reader: None,
        })
    }

    fn writer(&self, name: &str) -> Box<dyn StoreWriter> {
        Box::new(DiskWriter {
            path: self.path(name),
            writer: None,
            last_key: None,
        })
    }
}

pub struct DiskReader {
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl StoreReader for DiskReader {
    fn begin_reading(&mut self) -> Result<()> {
        self.reader = Some(BufReader::new(File::open(&self.path)?));
        Ok(())
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        let reader = self.reader.as_mut().ok_or(Error::ReadOnly)?;
        let key_len = match reader.read_u32::<BigEndian>() {
            Ok(len) => len,
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut key = vec![0; key_len as usize];
        reader.read_exact(&mut key)?;
        let value_len = reader.read_u32::<BigEndian>()?;
        let mut value = vec![0; value_len as usize];
        reader.read_exact(&mut value)?;
        Ok(Some(Record { key, value }))
    }

    fn end_reading(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }
}

pub struct DiskWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    last_key: Option<Vec<u8>>,
}

impl DiskWriter {
    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl StoreWriter for DiskWriter {
    fn begin_writing(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.writer = Some(BufWriter::new(File::create(self.tmp_path())?));
        self.last_key = None;
        Ok(())
    }

    fn write_record(&mut self, record: Record) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Error::ReadOnly)?;
        check_ascending(&mut self.last_key, &record.key)?;
        writer.write_u32::<BigEndian>(record.key.len() as u32)?;
        writer.write_all(&record.key)?;
        writer.write_u32::<BigEndian>(record.value.len() as u32)?;
        writer.write_all(&record.value)?;
        Ok(())
    }

    fn end_writing(&mut self) -> Result<()> {
        let mut writer = self.writer.take().ok_or(Error::ReadOnly)?;
        writer.flush()?;
        drop(writer);
        fs::rename(self.tmp_path(), &self.path)?;
        Ok(())
    }
}
