use std::{
    fs::File,
    io::{BufReader, Cursor, ErrorKind, Read, Seek, SeekFrom},
    path::Path,
};

use zerocopy::{FromBytes, IntoBytes};

use super::ByteOrder;
use crate::{Error, Result};

/// Cursor over a byte source of known length.
///
/// Every read checks the remaining length first, so a read that would run
/// past the end fails with [Error::Truncated] and consumes nothing.
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: R,
    order: ByteOrder,
    pos: u64,
    len: u64,
}

macro_rules! read_scalars {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self) -> Result<$ty> {
                let bytes = self.read_array()?;
                Ok(match self.order {
                    ByteOrder::Little => <$ty>::from_le_bytes(bytes),
                    ByteOrder::Big => <$ty>::from_be_bytes(bytes),
                })
            }
        )*
    };
}

impl<'a> ByteReader<Cursor<&'a [u8]>> {
    pub fn new(bytes: &'a [u8], order: ByteOrder) -> Self {
        Self {
            len: bytes.len() as u64,
            inner: Cursor::new(bytes),
            order,
            pos: 0,
        }
    }
}

impl ByteReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, order: ByteOrder) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), order)
    }
}

impl<R: Read + Seek> ByteReader<R> {
    /// Wraps `inner`, starting at its current position. The end of the
    /// stream is taken as the end of readable data.
    pub fn from_reader(mut inner: R, order: ByteOrder) -> Result<Self> {
        let pos = inner.stream_position()?;
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;

        Ok(Self {
            inner,
            order,
            pos,
            len,
        })
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Total length of the underlying source.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        if pos > self.len {
            return Err(Error::validation(format!(
                "seek to {pos} is past the end ({})",
                self.len
            )));
        }
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.ensure_available(count)?;
        self.seek_to(self.pos + count)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn ensure_available(&self, needed: u64) -> Result<()> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(Error::Truncated { needed, remaining });
        }
        Ok(())
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let needed = buf.len() as u64;
        self.ensure_available(needed)?;

        // The source may shrink underneath a file reader
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => Error::Truncated {
                needed,
                remaining: 0,
            },
            _ => Error::Io(e),
        })?;
        self.pos += needed;
        Ok(())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        self.fill(&mut bytes)?;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    read_scalars! {
        read_u16: u16,
        read_u32: u32,
        read_u64: u64,
        read_i16: i16,
        read_i32: i32,
        read_i64: i64,
        read_f32: f32,
        read_f64: f64,
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.ensure_available(count as u64)?;
        let mut bytes = vec![0u8; count];
        self.fill(&mut bytes)?;
        Ok(bytes)
    }

    /// Everything from the cursor to the end of the source.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let remaining = usize::try_from(self.remaining())
            .map_err(|_| Error::validation("remaining data does not fit in memory"))?;
        self.read_bytes(remaining)
    }

    /// Reads a NUL-terminated UTF-8 string. The terminator is consumed.
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        let mut bytes = vec![];
        loop {
            if self.remaining() == 0 {
                let consumed = self.pos - start;
                self.seek_to(start)?;
                return Err(Error::Truncated {
                    needed: consumed + 1,
                    remaining: consumed,
                });
            }
            match self.read_u8()? {
                0 => break,
                byte => bytes.push(byte),
            }
        }
        String::from_utf8(bytes).map_err(|_| Error::format("string is not valid UTF-8"))
    }

    /// Reads a plain-old-data value verbatim, ignoring the reader's byte order.
    pub fn read_struct<T: FromBytes + IntoBytes>(&mut self) -> Result<T> {
        let mut value = T::new_zeroed();
        self.fill(value.as_mut_bytes())?;
        Ok(value)
    }
}
