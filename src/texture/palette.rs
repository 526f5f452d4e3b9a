use std::io::{Read, Seek};

use crate::{
    binio::{ByteReader, ByteSink},
    Error, Result,
};

use super::PixelFormat;

/// Width of the color count written in front of the palette entries.
///
/// Inside GTEX the width follows the pixel format: `Indexed8*` formats use a
/// u8 count and so hold at most 255 colors, `Indexed16*` formats a u16 count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountWidth {
    U8,
    U16,
}

impl CountWidth {
    /// Narrowest width that can hold `len`.
    pub fn for_len(len: usize) -> Self {
        if len <= u8::MAX as usize {
            Self::U8
        } else {
            Self::U16
        }
    }

    /// Width used inside GTEX blobs, fixed by the index size of the format.
    pub fn for_format(format: PixelFormat) -> Option<Self> {
        match format.index_width()? {
            1 => Some(Self::U8),
            _ => Some(Self::U16),
        }
    }

    pub fn max_len(self) -> usize {
        match self {
            Self::U8 => u8::MAX as usize,
            Self::U16 => u16::MAX as usize,
        }
    }
}

/// Color lookup table for the indexed pixel formats.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Palette {
    Rgb(Vec<[u8; 3]>),
    Rgba(Vec<[u8; 4]>),
}

impl Palette {
    pub fn len(&self) -> usize {
        match self {
            Self::Rgb(colors) => colors.len(),
            Self::Rgba(colors) => colors.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::Rgba(_))
    }

    fn entry_size(has_alpha: bool) -> usize {
        if has_alpha {
            4
        } else {
            3
        }
    }

    /// Writes the count followed by the packed entries.
    pub fn encode(&self, sink: &mut ByteSink, width: CountWidth) -> Result<()> {
        let len = self.len();
        if len > width.max_len() {
            return Err(Error::validation(format!(
                "palette of {len} colors does not fit a {width:?} count"
            )));
        }

        match width {
            CountWidth::U8 => sink.append_u8(len as u8)?,
            CountWidth::U16 => sink.append_u16(len as u16)?,
        }
        match self {
            Self::Rgb(colors) => colors.iter().try_for_each(|c| sink.append_bytes(c)),
            Self::Rgba(colors) => colors.iter().try_for_each(|c| sink.append_bytes(c)),
        }
    }

    pub fn decode<R: Read + Seek>(
        reader: &mut ByteReader<R>,
        has_alpha: bool,
        width: CountWidth,
    ) -> Result<Self> {
        let count = match width {
            CountWidth::U8 => reader.read_u8()? as usize,
            CountWidth::U16 => reader.read_u16()? as usize,
        };

        let needed = count * Self::entry_size(has_alpha);
        if (needed as u64) > reader.remaining() {
            return Err(Error::format(format!(
                "palette declares {count} colors but only {} bytes remain",
                reader.remaining()
            )));
        }

        let bytes = reader.read_bytes(needed)?;
        Ok(if has_alpha {
            Self::Rgba(
                bytes
                    .chunks_exact(4)
                    .map(|c| [c[0], c[1], c[2], c[3]])
                    .collect(),
            )
        } else {
            Self::Rgb(bytes.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
        })
    }

    fn color(&self, index: usize) -> Option<[u8; 4]> {
        match self {
            Self::Rgb(colors) => colors.get(index).map(|&[r, g, b]| [r, g, b, u8::MAX]),
            Self::Rgba(colors) => colors.get(index).copied(),
        }
    }

    /// Replaces each index of `pixels` with its color.
    ///
    /// Output is RGB for `Indexed8`/`Indexed16` and RGBA for the alpha
    /// variants, whose alpha comes from the pixel rather than the palette.
    pub fn expand(&self, format: PixelFormat, pixels: &[u8]) -> Result<Vec<u8>> {
        let index_width = format
            .index_width()
            .ok_or_else(|| Error::validation(format!("{format:?} is not an indexed format")))?;
        let stride = format.stride();
        let out_stride = if format.has_alpha() { 4 } else { 3 };

        let mut out = Vec::with_capacity(pixels.len() / stride * out_stride);
        for pixel in pixels.chunks_exact(stride) {
            let index = read_index(pixel, index_width);
            let [r, g, b, _] = self.color(index).ok_or_else(|| {
                Error::validation(format!("index {index} outside palette of {}", self.len()))
            })?;
            out.extend_from_slice(&[r, g, b]);
            if format.has_alpha() {
                out.push(pixel[index_width]);
            }
        }
        Ok(out)
    }
}

/// Palette indices are stored little-endian.
pub(crate) fn read_index(pixel: &[u8], index_width: usize) -> usize {
    match index_width {
        1 => pixel[0] as usize,
        _ => u16::from_le_bytes([pixel[0], pixel[1]]) as usize,
    }
}
