//! Run-length packets for pixel streams.
//!
//! A packet is one count byte followed by one pixel value, padded with zeros
//! up to a width fixed by the stride:
//!
//! | stride | packet | padding |
//! |--------|--------|---------|
//! | 1      | 2      | 0       |
//! | 2      | 4      | 1       |
//! | 3      | 4      | 0       |
//! | 4      | 6      | 1       |

use std::io::{Read, Seek};

use crate::{
    binio::{ByteReader, ByteSink},
    Error, Result,
};

pub const MAX_RUN: usize = u8::MAX as usize;

pub fn packet_width(stride: usize) -> Result<usize> {
    match stride {
        1 => Ok(2),
        2 | 3 => Ok(4),
        4 => Ok(6),
        _ => Err(Error::validation(format!(
            "no run-length packet layout for stride {stride}"
        ))),
    }
}

/// Appends the packets for `pixels` to `sink`. Returns the bytes written.
pub fn encode_into(sink: &mut ByteSink, pixels: &[u8], stride: usize) -> Result<u64> {
    let width = packet_width(stride)?;
    if pixels.len() % stride != 0 {
        return Err(Error::validation(format!(
            "{} bytes is not a whole number of {stride}-byte pixels",
            pixels.len()
        )));
    }

    let start = sink.len();
    let mut packet = [0u8; 6];
    let mut pixels = pixels.chunks_exact(stride).peekable();
    while let Some(value) = pixels.next() {
        let mut run = 1;
        while run < MAX_RUN && pixels.next_if_eq(&value).is_some() {
            run += 1;
        }

        packet.fill(0);
        packet[0] = run as u8;
        packet[1..=stride].copy_from_slice(value);
        sink.append_bytes(&packet[..width])?;
    }
    Ok(sink.len() - start)
}

pub fn encode(pixels: &[u8], stride: usize) -> Result<Vec<u8>> {
    let mut sink = ByteSink::memory(Default::default());
    encode_into(&mut sink, pixels, stride)?;
    Ok(sink.take_bytes()?.into())
}

/// Expands packets from `reader` into a flat pixel buffer.
///
/// With `expected_pixels` set, decoding stops once that many pixels exist and
/// running out of packets first is [Error::Truncated]. Without it, every
/// remaining byte of the reader is consumed.
pub fn decode<R: Read + Seek>(
    reader: &mut ByteReader<R>,
    stride: usize,
    expected_pixels: Option<usize>,
) -> Result<Vec<u8>> {
    let width = packet_width(stride)?;

    // One pixel per packet at least; longer runs grow the buffer as decoded
    let packets = (reader.remaining() / width as u64) as usize;
    let capacity = expected_pixels.map_or(packets, |expected| expected.min(packets));
    let mut out = Vec::with_capacity(capacity * stride);
    let mut produced = 0usize;

    loop {
        if expected_pixels.is_some_and(|expected| produced >= expected) {
            break;
        }
        if reader.remaining() == 0 {
            match expected_pixels {
                Some(expected) => {
                    return Err(Error::Truncated {
                        needed: ((expected - produced) * stride) as u64,
                        remaining: 0,
                    })
                }
                None => break,
            }
        }

        let packet = reader.read_bytes(width)?;
        let run = packet[0] as usize;
        if run == 0 {
            return Err(Error::format("run-length packet with a zero count"));
        }
        if let Some(expected) = expected_pixels {
            if produced + run > expected {
                return Err(Error::format(format!(
                    "run of {run} overflows the {expected} expected pixels"
                )));
            }
        }

        let value = &packet[1..=stride];
        for _ in 0..run {
            out.extend_from_slice(value);
        }
        produced += run;
    }

    Ok(out)
}
