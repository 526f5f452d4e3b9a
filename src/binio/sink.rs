use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
};

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{Immutable, IntoBytes};

use super::ByteOrder;
use crate::{Error, Result};

#[derive(Debug)]
enum Backing {
    Memory(BytesMut),
    File(BufWriter<File>),
}

/// Append-only byte destination backed by memory or by a file.
///
/// [ByteSink::close] flushes and releases the backing exactly once. Closing a
/// sink that is already closed is a no-op; any append after that fails with
/// [Error::Closed].
#[derive(Debug)]
pub struct ByteSink {
    backing: Option<Backing>,
    order: ByteOrder,
    written: u64,
}

macro_rules! append_scalars {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self, value: $ty) -> Result<()> {
                let bytes = match self.order {
                    ByteOrder::Little => value.to_le_bytes(),
                    ByteOrder::Big => value.to_be_bytes(),
                };
                self.put(&bytes)
            }
        )*
    };
}

impl ByteSink {
    pub fn memory(order: ByteOrder) -> Self {
        Self::with_backing(Backing::Memory(BytesMut::new()), order)
    }

    /// Creates (or truncates) `path` and writes straight to it.
    pub fn create(path: impl AsRef<Path>, order: ByteOrder) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_file(file, order))
    }

    pub fn from_file(file: File, order: ByteOrder) -> Self {
        Self::with_backing(Backing::File(BufWriter::new(file)), order)
    }

    fn with_backing(backing: Backing, order: ByteOrder) -> Self {
        Self {
            backing: Some(backing),
            order,
            written: 0,
        }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    /// Bytes appended so far.
    pub fn len(&self) -> u64 {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    pub fn is_closed(&self) -> bool {
        self.backing.is_none()
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        match self.backing.as_mut().ok_or(Error::Closed)? {
            Backing::Memory(buf) => buf.put_slice(bytes),
            Backing::File(writer) => writer.write_all(bytes)?,
        }
        self.written += bytes.len() as u64;
        Ok(())
    }

    pub fn append_u8(&mut self, value: u8) -> Result<()> {
        self.put(&[value])
    }

    pub fn append_i8(&mut self, value: i8) -> Result<()> {
        self.put(&[value as u8])
    }

    append_scalars! {
        append_u16: u16,
        append_u32: u32,
        append_u64: u64,
        append_i16: i16,
        append_i32: i32,
        append_i64: i64,
        append_f32: f32,
        append_f64: f64,
    }

    /// Writes `value` followed by a NUL terminator.
    pub fn append_string(&mut self, value: &str) -> Result<()> {
        if value.as_bytes().contains(&0) {
            return Err(Error::validation("string contains an interior NUL"));
        }
        self.put(value.as_bytes())?;
        self.put(&[0])
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.put(bytes)
    }

    /// Writes the in-memory representation of `value` verbatim, ignoring the
    /// sink's byte order.
    pub fn append_struct<T: IntoBytes + Immutable + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.put(value.as_bytes())
    }

    /// Streams `reader` to the end into the sink. Returns the byte count.
    pub fn append_from_reader(&mut self, mut reader: impl Read) -> Result<u64> {
        let copied = match self.backing.as_mut().ok_or(Error::Closed)? {
            Backing::Memory(buf) => std::io::copy(&mut reader, &mut buf.writer())?,
            Backing::File(writer) => std::io::copy(&mut reader, writer)?,
        };
        self.written += copied;
        Ok(copied)
    }

    /// Flushes and releases the backing. Calling it again does nothing.
    pub fn close(&mut self) -> Result<()> {
        match self.backing.take() {
            Some(Backing::File(mut writer)) => {
                writer.flush()?;
                writer
                    .into_inner()
                    .map_err(|e| e.into_error())?
                    .sync_all()?;
            }
            Some(Backing::Memory(_)) | None => {}
        }
        Ok(())
    }

    /// Closes a memory sink and hands back everything written to it.
    pub fn take_bytes(&mut self) -> Result<Bytes> {
        match self.backing.take() {
            Some(Backing::Memory(buf)) => Ok(buf.freeze()),
            Some(file @ Backing::File(_)) => {
                self.backing = Some(file);
                Err(Error::validation("file-backed sink has no in-memory buffer"))
            }
            None => Err(Error::Closed),
        }
    }
}
