use std::io::{Read, Seek};

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, TryFromBytes, Unaligned};

use crate::{
    binio::{ByteReader, ByteSink},
    Error, Result,
};

pub const TEXTURE_MAGIC: [u8; 4] = *b"GTEX";
pub const TEXTURE_FORMAT_VERSION: u8 = 1;

/// Shape of the pixel data, stored in the low three bits of the flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(u8)]
pub enum Target {
    Texture1D = 0,
    Texture2D = 1,
    Texture3D = 2,
    Cubemap = 3,
    Texture1DArray = 4,
    Texture2DArray = 5,
    CubemapArray = 6,
}

impl Target {
    const MASK: u8 = 0b111;

    pub fn from_bits(bits: u8) -> Result<Self> {
        let bits = bits & Self::MASK;
        Self::try_read_from_bytes(&[bits]).map_err(|_| Error::InvalidTarget(bits))
    }

    /// How many `u16` dimension fields follow the pixel format byte.
    pub fn dimension_count(self) -> usize {
        match self {
            Self::Texture1D | Self::Texture1DArray => 1,
            Self::Texture2D | Self::Texture2DArray | Self::Cubemap => 2,
            Self::Texture3D | Self::CubemapArray => 3,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            Self::Texture1DArray | Self::Texture2DArray | Self::CubemapArray
        )
    }

    /// Whether the header alone fixes the pixel count. Array targets hold a
    /// whole number of layers, implied by the payload length.
    pub fn has_fixed_extent(self) -> bool {
        !self.is_array()
    }
}

/// Pixel layout, stored in the low seven bits of the pixel format byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(u8)]
pub enum PixelFormat {
    Grayscale = 0,
    GrayscaleAlpha = 1,
    Indexed8 = 2,
    Indexed8Alpha = 3,
    Indexed16 = 4,
    Indexed16Alpha = 5,
    Rgb = 6,
    Rgba = 7,
}

impl PixelFormat {
    const RLE_BIT: u8 = 0x80;

    pub fn from_bits(bits: u8) -> Result<Self> {
        let bits = bits & !Self::RLE_BIT;
        Self::try_read_from_bytes(&[bits])
            .map_err(|_| Error::format(format!("unknown pixel format {bits}")))
    }

    /// Bytes per pixel.
    pub fn stride(self) -> usize {
        match self {
            Self::Grayscale | Self::Indexed8 => 1,
            Self::GrayscaleAlpha | Self::Indexed8Alpha | Self::Indexed16 => 2,
            Self::Indexed16Alpha | Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    pub fn is_indexed(self) -> bool {
        self.index_width().is_some()
    }

    /// Width in bytes of the palette index at the start of each pixel.
    pub fn index_width(self) -> Option<usize> {
        match self {
            Self::Indexed8 | Self::Indexed8Alpha => Some(1),
            Self::Indexed16 | Self::Indexed16Alpha => Some(2),
            _ => None,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::GrayscaleAlpha | Self::Indexed8Alpha | Self::Indexed16Alpha | Self::Rgba
        )
    }
}

/// Sampling hints packed into bits 3..8 of the flags byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SamplerFlags {
    pub point_filter: bool,
    pub mipmaps: bool,
    pub clamp_r: bool,
    pub clamp_s: bool,
    pub clamp_t: bool,
}

impl SamplerFlags {
    const POINT_FILTER: u8 = 1 << 3;
    const MIPMAPS: u8 = 1 << 4;
    const CLAMP_R: u8 = 1 << 5;
    const CLAMP_S: u8 = 1 << 6;
    const CLAMP_T: u8 = 1 << 7;

    pub fn from_bits(bits: u8) -> Self {
        Self {
            point_filter: bits & Self::POINT_FILTER != 0,
            mipmaps: bits & Self::MIPMAPS != 0,
            clamp_r: bits & Self::CLAMP_R != 0,
            clamp_s: bits & Self::CLAMP_S != 0,
            clamp_t: bits & Self::CLAMP_T != 0,
        }
    }

    pub fn bits(self) -> u8 {
        [
            (self.point_filter, Self::POINT_FILTER),
            (self.mipmaps, Self::MIPMAPS),
            (self.clamp_r, Self::CLAMP_R),
            (self.clamp_s, Self::CLAMP_S),
            (self.clamp_t, Self::CLAMP_T),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .fold(0, |acc, (_, bit)| acc | bit)
    }
}

/// Fixed leading bytes of every GTEX blob.
#[derive(Debug, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct TexturePreamble {
    magic: [u8; 4],
    version: u8,
    flags: u8,
    pixel_format: u8,
}

/// Decoded GTEX header. Dimensions the target does not serialize are 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHeader {
    pub version: u8,
    pub target: Target,
    pub flags: SamplerFlags,
    pub format: PixelFormat,
    pub width: u16,
    pub height: u16,
    pub depth: u16,
}

impl TextureHeader {
    /// `extent` is `[width, height, depth]`; entries past
    /// [Target::dimension_count] are dropped.
    pub fn new(target: Target, format: PixelFormat, extent: [u16; 3]) -> Self {
        let mut dims = [0u16; 3];
        let count = target.dimension_count();
        dims[..count].copy_from_slice(&extent[..count]);

        Self {
            version: TEXTURE_FORMAT_VERSION,
            target,
            flags: SamplerFlags::default(),
            format,
            width: dims[0],
            height: dims[1],
            depth: dims[2],
        }
    }

    pub fn new_1d(format: PixelFormat, width: u16) -> Self {
        Self::new(Target::Texture1D, format, [width, 0, 0])
    }

    pub fn new_2d(format: PixelFormat, width: u16, height: u16) -> Self {
        Self::new(Target::Texture2D, format, [width, height, 0])
    }

    pub fn new_3d(format: PixelFormat, width: u16, height: u16, depth: u16) -> Self {
        Self::new(Target::Texture3D, format, [width, height, depth])
    }

    pub fn new_cubemap(format: PixelFormat, width: u16, height: u16) -> Self {
        Self::new(Target::Cubemap, format, [width, height, 0])
    }

    pub fn new_1d_array(format: PixelFormat, width: u16) -> Self {
        Self::new(Target::Texture1DArray, format, [width, 0, 0])
    }

    pub fn new_2d_array(format: PixelFormat, width: u16, height: u16) -> Self {
        Self::new(Target::Texture2DArray, format, [width, height, 0])
    }

    pub fn new_cubemap_array(format: PixelFormat, width: u16, height: u16, depth: u16) -> Self {
        Self::new(Target::CubemapArray, format, [width, height, depth])
    }

    pub fn with_flags(mut self, flags: SamplerFlags) -> Self {
        self.flags = flags;
        self
    }

    fn dimensions(&self) -> [u16; 3] {
        [self.width, self.height, self.depth]
    }

    /// `width × max(height, 1) × max(depth, 1)`: the whole image for plain
    /// targets, one layer for array targets.
    pub fn layer_pixel_count(&self) -> usize {
        self.width as usize * (self.height.max(1) as usize) * (self.depth.max(1) as usize)
    }

    /// Pixel count implied by the header, or `None` for array targets whose
    /// layer count comes from the payload.
    pub fn pixel_count(&self) -> Option<usize> {
        self.target
            .has_fixed_extent()
            .then(|| self.layer_pixel_count())
    }

    /// Whether `pixels` pixels fit this header: exactly for plain targets, a
    /// whole number of layers for array targets.
    pub fn accepts_pixel_count(&self, pixels: usize) -> bool {
        match self.pixel_count() {
            Some(count) => pixels == count,
            None => match self.layer_pixel_count() {
                0 => pixels == 0,
                layer => pixels % layer == 0,
            },
        }
    }

    pub(crate) fn write(&self, sink: &mut ByteSink, run_length: bool) -> Result<()> {
        let preamble = TexturePreamble {
            magic: TEXTURE_MAGIC,
            version: self.version,
            flags: self.target as u8 | self.flags.bits(),
            pixel_format: self.format as u8 | if run_length { PixelFormat::RLE_BIT } else { 0 },
        };
        sink.append_struct(&preamble)?;

        for dim in &self.dimensions()[..self.target.dimension_count()] {
            sink.append_u16(*dim)?;
        }
        Ok(())
    }

    /// Parses a header and reports whether the pixel data is run-length
    /// encoded.
    pub(crate) fn read<R: Read + Seek>(reader: &mut ByteReader<R>) -> Result<(Self, bool)> {
        let preamble: TexturePreamble = reader.read_struct()?;
        if preamble.magic != TEXTURE_MAGIC {
            return Err(Error::format(format!(
                "bad texture magic {:02X?}",
                preamble.magic
            )));
        }
        if preamble.version > TEXTURE_FORMAT_VERSION {
            return Err(Error::UnsupportedVersion {
                found: preamble.version.to_string(),
                supported: TEXTURE_FORMAT_VERSION.to_string(),
            });
        }

        let target = Target::from_bits(preamble.flags)?;
        let format = PixelFormat::from_bits(preamble.pixel_format)?;
        let run_length = preamble.pixel_format & PixelFormat::RLE_BIT != 0;

        let mut dims = [0u16; 3];
        for dim in &mut dims[..target.dimension_count()] {
            *dim = reader.read_u16()?;
        }

        let header = Self {
            version: preamble.version,
            target,
            flags: SamplerFlags::from_bits(preamble.flags),
            format,
            width: dims[0],
            height: dims[1],
            depth: dims[2],
        };
        Ok((header, run_length))
    }
}
