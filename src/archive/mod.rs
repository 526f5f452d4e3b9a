//! GPKG: one file holding many named blobs.
//!
//! Layout:
//! \[u8; 4\] magic `GPKG`, u8 major version, u8 minor version, u32 data origin,
//! u32 entry count, then the entry table, then the data region starting at
//! the data origin. Each entry is a u16 name length, the UTF-8 name, a u32
//! origin relative to the data region and a u32 size.
//!
//! Integers are little-endian. An archive whose magic reads `GKPG` was
//! written big-endian and is read that way.

mod builder;
mod reader;

pub use builder::{build, build_with_options, ArchiveBuilder, BuildOptions};
pub use reader::ArchiveContainer;

use core::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::binio::ByteOrder;

pub const ARCHIVE_MAGIC: [u8; 4] = *b"GPKG";

/// Magic, version, data origin and entry count.
pub const HEADER_SIZE: u64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchiveVersion {
    pub major: u8,
    pub minor: u8,
}

impl ArchiveVersion {
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl Default for ArchiveVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ArchiveVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct ArchivePreamble {
    magic: [u8; 4],
    version_major: u8,
    version_minor: u8,
}

impl ArchivePreamble {
    fn new(order: ByteOrder, version: ArchiveVersion) -> Self {
        let mut magic = ARCHIVE_MAGIC;
        if order == ByteOrder::Big {
            magic.reverse();
        }
        Self {
            magic,
            version_major: version.major,
            version_minor: version.minor,
        }
    }

    /// Byte order the rest of the archive uses, or `None` for foreign magic.
    fn byte_order(&self) -> Option<ByteOrder> {
        let mut reversed = ARCHIVE_MAGIC;
        reversed.reverse();

        if self.magic == ARCHIVE_MAGIC {
            Some(ByteOrder::Little)
        } else if self.magic == reversed {
            Some(ByteOrder::Big)
        } else {
            None
        }
    }

    fn version(&self) -> ArchiveVersion {
        ArchiveVersion::new(self.version_major, self.version_minor)
    }
}

/// One named byte range of the data region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveEntry {
    pub name: String,
    /// Offset from the start of the data region.
    pub origin: u32,
    pub size: u32,
}

impl ArchiveEntry {
    /// Bytes this entry occupies in the table.
    pub fn table_size(&self) -> u64 {
        table_size(&self.name)
    }
}

fn table_size(name: &str) -> u64 {
    2 + name.len() as u64 + 4 + 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_order_by_major_then_minor() {
        assert!(ArchiveVersion::new(0, 9) < ArchiveVersion::CURRENT);
        assert!(ArchiveVersion::new(1, 1) > ArchiveVersion::CURRENT);
        assert!(ArchiveVersion::new(2, 0) > ArchiveVersion::new(1, 255));
        assert_eq!(ArchiveVersion::CURRENT.to_string(), "1.0");
    }

    #[test]
    fn magic_selects_byte_order() {
        let le = ArchivePreamble::new(ByteOrder::Little, ArchiveVersion::CURRENT);
        assert_eq!(&le.magic, b"GPKG");
        assert_eq!(le.byte_order(), Some(ByteOrder::Little));

        let be = ArchivePreamble::new(ByteOrder::Big, ArchiveVersion::CURRENT);
        assert_eq!(&be.magic, b"GKPG");
        assert_eq!(be.byte_order(), Some(ByteOrder::Big));

        let foreign = ArchivePreamble {
            magic: *b"GTEX",
            ..le
        };
        assert_eq!(foreign.byte_order(), None);
        assert_eq!(le.as_bytes().len(), 6);
    }

    #[test]
    fn entry_table_size() {
        let entry = ArchiveEntry {
            name: "sub/b.gtex".into(),
            origin: 0,
            size: 99,
        };
        assert_eq!(entry.table_size(), 20);
    }
}
