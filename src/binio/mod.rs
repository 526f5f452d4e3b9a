//! Scalar-level binary I/O shared by the texture codec and the archive.
//!
//! [ByteSink] appends, [ByteReader] consumes. Both carry a [ByteOrder] that
//! every multi-byte scalar goes through; single bytes are copied as-is.

mod reader;
mod sink;

pub use reader::ByteReader;
pub use sink::ByteSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    #[cfg(target_endian = "little")]
    pub const NATIVE: Self = Self::Little;
    #[cfg(target_endian = "big")]
    pub const NATIVE: Self = Self::Big;

    pub const fn swapped(self) -> Self {
        match self {
            Self::Little => Self::Big,
            Self::Big => Self::Little,
        }
    }
}

impl Default for ByteOrder {
    /// Both on-disk formats default to little-endian.
    fn default() -> Self {
        Self::Little
    }
}
