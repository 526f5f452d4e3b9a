//! GTEX: self-describing texture blobs.
//!
//! Layout:
//! \[u8; 4\] magic `GTEX`, u8 format version, u8 flags, u8 pixel format,
//! then one to three u16 dimensions depending on [Target]. Indexed formats
//! follow with a [Palette]; the pixel data closes the blob, either raw or as
//! [rle] packets. Multi-byte values are little-endian.

mod header;
mod palette;
pub mod rle;

pub use header::{
    PixelFormat, SamplerFlags, Target, TextureHeader, TEXTURE_FORMAT_VERSION, TEXTURE_MAGIC,
};
pub use palette::{CountWidth, Palette};

use tap::Pipe;

use crate::{
    binio::{ByteOrder, ByteReader, ByteSink},
    Error, Result,
};

/// Decoded texture. Indexed formats keep their indices in `pixels`; use
/// [Texture::to_direct_color] for concrete colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub header: TextureHeader,
    pub palette: Option<Palette>,
    pub pixels: Vec<u8>,
    /// Whether the blob stored its pixels as run-length packets.
    pub run_length: bool,
}

impl Texture {
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_texture(
            &self.header,
            self.palette.as_ref(),
            &self.pixels,
            self.run_length,
        )
    }

    pub fn to_direct_color(&self) -> Result<Vec<u8>> {
        match &self.palette {
            Some(palette) => palette.expand(self.header.format, &self.pixels),
            None => Ok(self.pixels.clone()),
        }
    }
}

fn check_indices(format: PixelFormat, palette: &Palette, pixels: &[u8]) -> Result<()> {
    let Some(index_width) = format.index_width() else {
        return Ok(());
    };

    pixels
        .chunks_exact(format.stride())
        .map(|pixel| palette::read_index(pixel, index_width))
        .find(|&index| index >= palette.len())
        .map_or(Ok(()), |index| {
            Err(Error::validation(format!(
                "pixel index {index} outside palette of {} colors",
                palette.len()
            )))
        })
}

fn extent_mismatch(header: &TextureHeader, len: usize) -> String {
    let layer = header.layer_pixel_count() * header.format.stride();
    format!(
        "{:?} of {}x{}x{} needs {} {layer} bytes, got {len}",
        header.target,
        header.width,
        header.height,
        header.depth,
        if header.target.is_array() { "a multiple of" } else { "exactly" },
    )
}

fn check_inputs(header: &TextureHeader, palette: Option<&Palette>, pixels: &[u8]) -> Result<()> {
    if header.version > TEXTURE_FORMAT_VERSION {
        return Err(Error::UnsupportedVersion {
            found: header.version.to_string(),
            supported: TEXTURE_FORMAT_VERSION.to_string(),
        });
    }

    let format = header.format;
    let stride = format.stride();
    if pixels.len() % stride != 0 {
        return Err(Error::validation(format!(
            "{} pixel bytes is not a multiple of the {stride}-byte {format:?} stride",
            pixels.len()
        )));
    }
    if !header.accepts_pixel_count(pixels.len() / stride) {
        return Err(Error::validation(extent_mismatch(header, pixels.len())));
    }

    match (format.is_indexed(), palette) {
        (true, Some(palette)) => {
            if palette.has_alpha() != format.has_alpha() {
                return Err(Error::validation(format!(
                    "{format:?} needs a palette with{} alpha",
                    if format.has_alpha() { "" } else { "out" }
                )));
            }
            check_indices(format, palette, pixels)
        }
        (true, None) => Err(Error::validation(format!("{format:?} needs a palette"))),
        (false, Some(_)) => Err(Error::validation(format!(
            "{format:?} is not indexed but a palette was given"
        ))),
        (false, None) => Ok(()),
    }
}

/// Serializes a texture into a GTEX blob.
pub fn encode_texture(
    header: &TextureHeader,
    palette: Option<&Palette>,
    pixels: &[u8],
    run_length: bool,
) -> Result<Vec<u8>> {
    check_inputs(header, palette, pixels)?;

    let mut sink = ByteSink::memory(ByteOrder::Little);
    header.write(&mut sink, run_length)?;

    if let (Some(palette), Some(width)) = (palette, CountWidth::for_format(header.format)) {
        palette.encode(&mut sink, width)?;
    }

    if run_length {
        rle::encode_into(&mut sink, pixels, header.format.stride())?;
    } else {
        sink.append_bytes(pixels)?;
    }

    sink.take_bytes()?.pipe(Vec::from).pipe(Ok)
}

/// Encodes both raw and run-length forms and keeps the shorter one. Ties go
/// to raw.
pub fn encode_texture_smallest(
    header: &TextureHeader,
    palette: Option<&Palette>,
    pixels: &[u8],
) -> Result<Vec<u8>> {
    let raw = encode_texture(header, palette, pixels, false)?;
    let packed = encode_texture(header, palette, pixels, true)?;
    Ok(if packed.len() < raw.len() { packed } else { raw })
}

/// Parses a GTEX blob. The returned buffers are owned by the caller.
pub fn decode_texture(bytes: &[u8]) -> Result<Texture> {
    let mut reader = ByteReader::new(bytes, ByteOrder::Little);
    let (header, run_length) = TextureHeader::read(&mut reader)?;
    let format = header.format;

    let palette = CountWidth::for_format(format)
        .map(|width| Palette::decode(&mut reader, format.has_alpha(), width))
        .transpose()?;

    let stride = format.stride();
    let expected = header.pixel_count();
    let pixels = if run_length {
        rle::decode(&mut reader, stride, expected)?
    } else {
        match expected {
            Some(count) => reader.read_bytes(count * stride)?,
            None => reader.read_to_end()?,
        }
    };

    if reader.remaining() != 0 {
        return Err(Error::format(format!(
            "{} trailing bytes after pixel data",
            reader.remaining()
        )));
    }
    if pixels.len() % stride != 0 {
        return Err(Error::format(format!(
            "{} pixel bytes is not a whole number of {format:?} pixels",
            pixels.len()
        )));
    }
    if !header.accepts_pixel_count(pixels.len() / stride) {
        return Err(Error::format(extent_mismatch(&header, pixels.len())));
    }
    if let Some(palette) = &palette {
        check_indices(format, palette, &pixels)?;
    }

    Ok(Texture {
        header,
        palette,
        pixels,
        run_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(header: TextureHeader, palette: Option<Palette>, pixels: Vec<u8>) {
        for run_length in [false, true] {
            let bytes = encode_texture(&header, palette.as_ref(), &pixels, run_length).unwrap();
            let texture = decode_texture(&bytes).unwrap();
            assert_eq!(texture.header, header);
            assert_eq!(texture.palette, palette);
            assert_eq!(texture.pixels, pixels);
            assert_eq!(texture.run_length, run_length);
        }
    }

    #[test]
    fn roundtrip_direct_formats() {
        let flags = SamplerFlags {
            mipmaps: true,
            clamp_s: true,
            ..Default::default()
        };
        roundtrip(
            TextureHeader::new_2d(PixelFormat::Rgba, 2, 2).with_flags(flags),
            None,
            (0..16).collect(),
        );
        roundtrip(
            TextureHeader::new_1d(PixelFormat::Grayscale, 5),
            None,
            vec![1, 1, 1, 2, 2],
        );
        roundtrip(
            TextureHeader::new_3d(PixelFormat::Rgb, 2, 2, 2),
            None,
            vec![3; 24],
        );
        roundtrip(
            TextureHeader::new_cubemap(PixelFormat::GrayscaleAlpha, 2, 1),
            None,
            vec![0, 255, 0, 255],
        );
        roundtrip(
            TextureHeader::new_cubemap_array(PixelFormat::Grayscale, 1, 2, 2),
            None,
            vec![1, 1, 2, 2, 3, 3, 4, 4],
        );
        roundtrip(
            TextureHeader::new_2d_array(PixelFormat::Rgb, 1, 1),
            None,
            vec![9, 8, 7, 9, 8, 7],
        );
    }

    #[test]
    fn roundtrip_indexed_formats() {
        let rgb = Palette::Rgb(vec![[255, 0, 0], [0, 255, 0], [0, 0, 255]]);
        let rgba = Palette::Rgba(vec![[1, 2, 3, 4], [5, 6, 7, 8]]);

        roundtrip(
            TextureHeader::new_2d(PixelFormat::Indexed8, 2, 2),
            Some(rgb.clone()),
            vec![0, 1, 2, 2],
        );
        roundtrip(
            TextureHeader::new_1d(PixelFormat::Indexed8Alpha, 2),
            Some(rgba.clone()),
            vec![1, 128, 0, 255],
        );
        roundtrip(
            TextureHeader::new_1d_array(PixelFormat::Indexed16, 3),
            Some(rgb),
            vec![2, 0, 1, 0, 0, 0],
        );

        let large = Palette::Rgba((0..300u16).map(|i| [i as u8, 0, 0, 255]).collect());
        roundtrip(
            TextureHeader::new_1d(PixelFormat::Indexed16Alpha, 2),
            Some(large),
            vec![0x2B, 0x01, 10, 0, 0, 20],
        );
    }

    #[test]
    fn two_by_two_rgba_layout() {
        let header = TextureHeader::new_2d(PixelFormat::Rgba, 2, 2);
        let pixels: Vec<u8> = (100..116).collect();
        let bytes = encode_texture(&header, None, &pixels, false).unwrap();

        assert_eq!(&bytes[..4], b"GTEX");
        assert_eq!(bytes[4], TEXTURE_FORMAT_VERSION);
        assert_eq!(bytes[5], Target::Texture2D as u8);
        assert_eq!(bytes[6], PixelFormat::Rgba as u8);
        assert_eq!(&bytes[7..11], [2, 0, 2, 0]);
        assert_eq!(&bytes[11..], &pixels[..]);
    }

    #[test]
    fn smallest_encoding_prefers_rle_for_flat_images() {
        let header = TextureHeader::new_2d(PixelFormat::Grayscale, 16, 16);
        let flat = vec![0u8; 256];
        let bytes = encode_texture_smallest(&header, None, &flat).unwrap();
        assert!(decode_texture(&bytes).unwrap().run_length);

        let noisy: Vec<u8> = (0..=255).collect();
        let bytes = encode_texture_smallest(&header, None, &noisy).unwrap();
        let texture = decode_texture(&bytes).unwrap();
        assert!(!texture.run_length);
        assert_eq!(texture.pixels, noisy);
    }

    #[test]
    fn corrupted_magic_is_rejected() {
        let header = TextureHeader::new_2d(PixelFormat::Rgba, 2, 2);
        let bytes = encode_texture(&header, None, &[0; 16], false).unwrap();
        for i in 0..4 {
            let mut corrupt = bytes.clone();
            corrupt[i] ^= 0xFF;
            assert!(matches!(decode_texture(&corrupt), Err(Error::Format(_))));
        }
    }

    #[test]
    fn newer_version_is_rejected() {
        let header = TextureHeader::new_2d(PixelFormat::Rgba, 2, 2);
        let mut bytes = encode_texture(&header, None, &[0; 16], false).unwrap();
        bytes[4] = TEXTURE_FORMAT_VERSION + 1;
        assert!(matches!(
            decode_texture(&bytes),
            Err(Error::UnsupportedVersion { .. })
        ));

        let newer = TextureHeader {
            version: TEXTURE_FORMAT_VERSION + 1,
            ..header
        };
        assert!(matches!(
            encode_texture(&newer, None, &[0; 16], false),
            Err(Error::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn invalid_target_and_truncation() {
        let header = TextureHeader::new_2d(PixelFormat::Rgba, 2, 2);
        let bytes = encode_texture(&header, None, &[0; 16], true).unwrap();

        let mut bad_target = bytes.clone();
        bad_target[5] |= 0b111;
        assert!(matches!(
            decode_texture(&bad_target),
            Err(Error::InvalidTarget(7))
        ));

        assert!(matches!(
            decode_texture(&bytes[..bytes.len() - 1]),
            Err(Error::Truncated { .. })
        ));
        assert!(matches!(
            decode_texture(&bytes[..9]),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn cubemap_needs_exact_extent() {
        let header = TextureHeader::new_cubemap(PixelFormat::Rgb, 2, 2);
        for pixels in [&[1u8, 2, 3][..], &[][..], &[0; 24][..]] {
            assert!(matches!(
                encode_texture(&header, None, pixels, false),
                Err(Error::Validation(_))
            ));
        }
        assert!(encode_texture(&header, None, &[0; 12], true).is_ok());

        // Hand-built blob: 2x2 cubemap header followed by a single pixel
        let mut bytes = encode_texture(&header, None, &[0; 12], false).unwrap();
        bytes.truncate(bytes.len() - 9);
        assert!(matches!(decode_texture(&bytes), Err(Error::Truncated { .. })));
    }

    #[test]
    fn arrays_hold_whole_layers() {
        let header = TextureHeader::new_2d_array(PixelFormat::Grayscale, 2, 2);
        assert!(encode_texture(&header, None, &[0; 8], false).is_ok());
        assert!(matches!(
            encode_texture(&header, None, &[0; 6], false),
            Err(Error::Validation(_))
        ));

        let mut raw = encode_texture(&header, None, &[7; 8], false).unwrap();
        raw.pop();
        assert!(matches!(decode_texture(&raw), Err(Error::Format(_))));

        // Three pixels of run-length data for a four pixel layer
        let mut packed = encode_texture(&header, None, &[7; 4], true).unwrap();
        let count = packed.len() - 2;
        packed[count] = 3;
        assert!(matches!(decode_texture(&packed), Err(Error::Format(_))));
    }

    #[test]
    fn large_array_payload_decodes() {
        let header = TextureHeader::new_2d_array(PixelFormat::Rgba, 1, 1);
        let pixels: Vec<u8> = (0..2_000_000u32).flat_map(|i| i.to_le_bytes()).collect();
        let bytes = encode_texture(&header, None, &pixels, true).unwrap();
        assert_eq!(bytes.len(), 11 + 2_000_000 * 6);

        let texture = decode_texture(&bytes).unwrap();
        assert!(texture.run_length);
        assert_eq!(texture.pixels.len(), pixels.len());
        assert_eq!(texture.pixels, pixels);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let header = TextureHeader::new_1d(PixelFormat::Grayscale, 2);
        let mut bytes = encode_texture(&header, None, &[1, 2], false).unwrap();
        bytes.push(0);
        assert!(matches!(decode_texture(&bytes), Err(Error::Format(_))));
    }

    #[test]
    fn encode_validates_inputs() {
        let header = TextureHeader::new_2d(PixelFormat::Indexed8, 1, 2);
        let palette = Palette::Rgb(vec![[0; 3]; 2]);
        let rgba = Palette::Rgba(vec![[0; 4]; 2]);

        assert!(encode_texture(&header, Some(&palette), &[0, 1], false).is_ok());
        for (palette, pixels) in [
            (None, &[0u8, 1][..]),
            (Some(&palette), &[0, 2][..]),
            (Some(&palette), &[0][..]),
            (Some(&rgba), &[0, 1][..]),
        ] {
            assert!(matches!(
                encode_texture(&header, palette, pixels, false),
                Err(Error::Validation(_))
            ));
        }

        let direct = TextureHeader::new_1d(PixelFormat::Rgb, 1);
        assert!(matches!(
            encode_texture(&direct, Some(&palette), &[0; 3], false),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn indexed8_palettes_stop_at_255_colors() {
        let header = TextureHeader::new_1d(PixelFormat::Indexed8, 1);
        let full = Palette::Rgb(vec![[0; 3]; 255]);
        assert!(encode_texture(&header, Some(&full), &[254], false).is_ok());

        let over = Palette::Rgb(vec![[0; 3]; 256]);
        assert!(matches!(
            encode_texture(&header, Some(&over), &[0], false),
            Err(Error::Validation(_))
        ));

        let wide = TextureHeader::new_1d(PixelFormat::Indexed16, 1);
        assert!(encode_texture(&wide, Some(&over), &[255, 0], false).is_ok());
    }

    #[test]
    fn decode_rejects_out_of_range_indices() {
        let header = TextureHeader::new_1d(PixelFormat::Indexed8, 2);
        let palette = Palette::Rgb(vec![[0; 3]; 2]);
        let mut bytes = encode_texture(&header, Some(&palette), &[0, 1], false).unwrap();
        *bytes.last_mut().unwrap() = 5;
        assert!(matches!(decode_texture(&bytes), Err(Error::Validation(_))));
    }

    #[test]
    fn direct_color_expansion() {
        let header = TextureHeader::new_1d(PixelFormat::Indexed8, 2);
        let palette = Palette::Rgb(vec![[1, 2, 3], [4, 5, 6]]);
        let bytes = encode_texture(&header, Some(&palette), &[1, 0], true).unwrap();
        let texture = decode_texture(&bytes).unwrap();
        assert_eq!(texture.pixels, [1, 0]);
        assert_eq!(texture.to_direct_color().unwrap(), [4, 5, 6, 1, 2, 3]);
        assert_eq!(texture.encode().unwrap(), bytes);
    }
}
