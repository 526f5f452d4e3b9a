use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};

use hashbrown::HashMap;

use super::{ArchiveEntry, ArchivePreamble, ArchiveVersion};
use crate::{
    binio::{ByteOrder, ByteReader},
    Error, Result,
};

/// Read-only view of a GPKG archive.
///
/// The container owns its source exclusively. Every [ArchiveContainer::read]
/// leaves the cursor back at the data origin, so entries can be read in any
/// order. After [ArchiveContainer::close] all lookups fail with
/// [Error::Closed].
#[derive(Debug)]
pub struct ArchiveContainer<R> {
    reader: Option<ByteReader<R>>,
    version: ArchiveVersion,
    data_origin: u64,
    entries: Vec<ArchiveEntry>,
    index: HashMap<String, usize>,
}

impl ArchiveContainer<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> ArchiveContainer<R> {
    /// Parses the header and entry table of an archive starting at the
    /// current position of `source`.
    pub fn from_reader(source: R) -> Result<Self> {
        let mut reader = ByteReader::from_reader(source, ByteOrder::Little)?;
        let start = reader.position();

        let preamble: ArchivePreamble = reader.read_struct()?;
        let order = preamble.byte_order().ok_or_else(|| {
            Error::format(format!("bad archive magic {:02X?}", preamble.magic))
        })?;
        reader.set_order(order);

        let version = preamble.version();
        if version > ArchiveVersion::CURRENT {
            return Err(Error::UnsupportedVersion {
                found: version.to_string(),
                supported: ArchiveVersion::CURRENT.to_string(),
            });
        }

        let data_origin = start + reader.read_u32()? as u64;
        let entry_count = reader.read_u32()?;
        if entry_count == 0 {
            return Err(Error::format("archive declares no entries"));
        }

        // Smallest possible entry has a one byte name
        let plausible = (reader.remaining() / 11).min(entry_count as u64) as usize;
        let mut entries = Vec::with_capacity(plausible);
        let mut index = HashMap::with_capacity(plausible);
        for _ in 0..entry_count {
            let entry = read_entry(&mut reader)?;
            if index.insert(entry.name.clone(), entries.len()).is_some() {
                return Err(Error::format(format!(
                    "entry {:?} appears twice in the table",
                    entry.name
                )));
            }
            entries.push(entry);
        }

        if data_origin < reader.position() {
            return Err(Error::validation(format!(
                "data origin {data_origin} overlaps the entry table ending at {}",
                reader.position()
            )));
        }
        if data_origin > reader.len() {
            return Err(Error::validation(format!(
                "data origin {data_origin} is past the end of the archive ({})",
                reader.len()
            )));
        }

        let data_len = reader.len() - data_origin;
        if let Some(entry) = entries
            .iter()
            .find(|e| e.origin as u64 + e.size as u64 > data_len)
        {
            return Err(Error::validation(format!(
                "entry {:?} spans {}..{} but the data region holds {data_len} bytes",
                entry.name,
                entry.origin,
                entry.origin as u64 + entry.size as u64
            )));
        }

        reader.seek_to(data_origin)?;

        Ok(Self {
            reader: Some(reader),
            version,
            data_origin,
            entries,
            index,
        })
    }

    pub fn version(&self) -> ArchiveVersion {
        self.version
    }

    pub fn byte_order(&self) -> Option<ByteOrder> {
        self.reader.as_ref().map(ByteReader::order)
    }

    pub fn data_origin(&self) -> u64 {
        self.data_origin
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in table order.
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter()
    }

    pub fn entry(&self, name: &str) -> Result<&ArchiveEntry> {
        if self.reader.is_none() {
            return Err(Error::Closed);
        }
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| Error::EntryNotFound(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        if self.reader.is_none() {
            return Err(Error::Closed);
        }
        Ok(self.index.contains_key(name))
    }

    /// Reads the whole entry named `name`.
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        let (origin, size) = {
            let entry = self.entry(name)?;
            (entry.origin as u64, entry.size as usize)
        };
        let data_origin = self.data_origin;
        let reader = self.reader.as_mut().ok_or(Error::Closed)?;

        let data = reader
            .seek_to(data_origin + origin)
            .and_then(|_| reader.read_bytes(size));
        reader.seek_to(data_origin)?;
        data
    }

    /// Releases the underlying source. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.reader.take();
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

fn read_entry<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<ArchiveEntry> {
    let name_len = reader.read_u16()? as usize;
    if name_len == 0 {
        return Err(Error::format("entry with an empty name"));
    }
    let name = String::from_utf8(reader.read_bytes(name_len)?)
        .map_err(|_| Error::format("entry name is not valid UTF-8"))?;

    Ok(ArchiveEntry {
        name,
        origin: reader.read_u32()?,
        size: reader.read_u32()?,
    })
}
