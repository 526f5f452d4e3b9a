use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use hashbrown::HashSet;
use walkdir::WalkDir;

use super::{table_size, ArchivePreamble, ArchiveVersion, HEADER_SIZE};
use crate::{
    binio::{ByteOrder, ByteSink},
    Error, Result,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Byte order of every integer in the written archive.
    pub byte_order: ByteOrder,
    pub version: ArchiveVersion,
}

#[derive(Debug)]
enum Source {
    File(PathBuf),
    Memory(Bytes),
}

#[derive(Debug)]
struct PendingEntry {
    name: String,
    size: u32,
    source: Source,
}

/// Collects named blobs and writes them as one GPKG archive.
///
/// Names must be unique: adding a name twice fails with
/// [Error::DuplicateEntry] and leaves the builder unchanged.
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    options: BuildOptions,
    entries: Vec<PendingEntry>,
    names: HashSet<String>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: BuildOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: String, size: u64, source: Source) -> Result<&mut Self> {
        if name.is_empty() || name.len() > u16::MAX as usize {
            return Err(Error::validation(format!(
                "entry name of {} bytes does not fit the table",
                name.len()
            )));
        }
        let size = u32::try_from(size).map_err(|_| {
            Error::validation(format!("entry {name:?} is {size} bytes, over the 4 GiB limit"))
        })?;
        if self.names.contains(&name) {
            return Err(Error::DuplicateEntry(name));
        }

        tracing::debug!(name = %name, size, "queued entry");
        self.names.insert(name.clone());
        self.entries.push(PendingEntry { name, size, source });
        Ok(self)
    }

    pub fn add_bytes(&mut self, name: impl Into<String>, data: impl Into<Bytes>) -> Result<&mut Self> {
        let data = data.into();
        self.push(name.into(), data.len() as u64, Source::Memory(data))
    }

    /// Queues the file at `path`. Its contents are read when the archive is
    /// written.
    pub fn add_file(&mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        let size = File::open(path)?.metadata()?.len();
        self.push(name.into(), size, Source::File(path.to_path_buf()))
    }

    /// Queues every regular file below `dir`, named by its path relative to
    /// `dir` with `/` separators. Files are visited in lexical order.
    pub fn add_dir(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self> {
        self.add_dir_except(dir.as_ref(), None)
    }

    /// [Self::add_dir], leaving out the file that canonicalizes to `skip`.
    fn add_dir_except(&mut self, dir: &Path, skip: Option<&Path>) -> Result<&mut Self> {
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if skip.is_some() && entry.path().canonicalize().ok().as_deref() == skip {
                tracing::debug!("skipping output {}", entry.path().display());
                continue;
            }

            let name = archive_name(dir, entry.path())?;
            self.add_file(name, entry.path())?;
        }
        Ok(self)
    }

    /// Offset of the data region: header plus the whole entry table.
    fn data_origin(&self) -> u64 {
        HEADER_SIZE + self.entries.iter().map(|e| table_size(&e.name)).sum::<u64>()
    }

    pub fn write_to_sink(&self, sink: &mut ByteSink) -> Result<u64> {
        if self.entries.is_empty() {
            return Err(Error::format("an archive needs at least one entry"));
        }

        let data_origin = u32::try_from(self.data_origin())
            .map_err(|_| Error::validation("entry table exceeds 4 GiB"))?;
        let data_len: u64 = self.entries.iter().map(|e| e.size as u64).sum();
        if data_len > u32::MAX as u64 {
            return Err(Error::validation("data region exceeds 4 GiB"));
        }

        let start = sink.len();
        sink.set_order(self.options.byte_order);
        sink.append_struct(&ArchivePreamble::new(
            self.options.byte_order,
            self.options.version,
        ))?;
        sink.append_u32(data_origin)?;
        sink.append_u32(self.entries.len() as u32)?;

        let mut origin = 0u32;
        for entry in &self.entries {
            sink.append_u16(entry.name.len() as u16)?;
            sink.append_bytes(entry.name.as_bytes())?;
            sink.append_u32(origin)?;
            sink.append_u32(entry.size)?;
            origin += entry.size;
        }

        for entry in &self.entries {
            let copied = match &entry.source {
                Source::Memory(data) => {
                    sink.append_bytes(data)?;
                    data.len() as u64
                }
                Source::File(path) => {
                    let file = File::open(path)?;
                    sink.append_from_reader(file.take(entry.size as u64))?
                }
            };
            if copied != entry.size as u64 {
                return Err(Error::validation(format!(
                    "{:?} changed size while building: expected {} bytes, read {copied}",
                    entry.name, entry.size
                )));
            }
        }

        Ok(sink.len() - start)
    }

    /// Writes the archive to `output`. A partially written file is removed
    /// on failure.
    pub fn write(&self, output: impl AsRef<Path>) -> Result<u64> {
        let output = output.as_ref();
        let mut sink = ByteSink::create(output, self.options.byte_order)?;

        let written = self
            .write_to_sink(&mut sink)
            .and_then(|written| sink.close().map(|_| written));
        drop(sink);

        written.inspect_err(|_| {
            std::fs::remove_file(output)
                .inspect_err(|e| tracing::warn!("unable to remove {}: {e}", output.display()))
                .ok();
        })
    }
}

fn archive_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| Error::validation(format!("{} is outside {}", path.display(), root.display())))?;

    relative
        .components()
        .map(|c| {
            c.as_os_str()
                .to_str()
                .ok_or_else(|| Error::validation(format!("{} is not valid UTF-8", path.display())))
        })
        .collect::<Result<Vec<_>>>()
        .map(|parts| parts.join("/"))
}

/// Packs every regular file under `input_dir` into a new archive at
/// `output`. Returns the archive size in bytes.
pub fn build(input_dir: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<u64> {
    build_with_options(input_dir, output, BuildOptions::default())
}

pub fn build_with_options(
    input_dir: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: BuildOptions,
) -> Result<u64> {
    // An archive left inside the input tree by an earlier run is about to be
    // truncated and must not be packed into itself
    let existing = output.as_ref().canonicalize().ok();
    let mut builder = ArchiveBuilder::with_options(options);
    builder.add_dir_except(input_dir.as_ref(), existing.as_deref())?;

    let written = builder.write(output.as_ref())?;
    tracing::info!(
        entries = builder.len(),
        bytes = written,
        "built {}",
        output.as_ref().display()
    );
    Ok(written)
}
