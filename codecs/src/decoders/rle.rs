//! Support for RLE Lossless image decoding.
//!
//! See <https://dicom.nema.org/medical/dicom/2023e/output/chtml/part05/chapter_G.html>

#[cfg(feature = "rle")]
use byteorder::{ByteOrder, LittleEndian};

use crate::error::Result;
use crate::frame::ImageFrame;
#[cfg(feature = "rle")]
use crate::error::decode_error;
#[cfg(feature = "rle")]
use crate::frame::{PixelBuffer, PixelRepresentation, PlanarConfiguration};

/// Decode a single RLE Lossless frame.
///
/// The frame bytes start with the RLE header
/// (segment count and per-segment start offsets),
/// followed by the PackBits-compressed segments.
#[cfg(feature = "rle")]
pub fn decode(frame: ImageFrame, data: &[u8]) -> Result<ImageFrame> {
    match frame.bits_allocated {
        8 => match frame.planar_configuration {
            PlanarConfiguration::Interleaved => decode_8(frame, data),
            PlanarConfiguration::Planar => decode_8_planar(frame, data),
        },
        16 => decode_16(frame, data),
        bits_allocated => decode_error::UnsupportedPixelFormatSnafu { bits_allocated }.fail(),
    }
}

#[cfg(not(feature = "rle"))]
pub fn decode(_frame: ImageFrame, _data: &[u8]) -> Result<ImageFrame> {
    crate::error::decode_error::CodecNotLoadedSnafu { name: "RLE" }.fail()
}

#[cfg(feature = "rle")]
/// Read the RLE header and return the segment byte ranges.
///
/// The header holds a little-endian 32-bit segment count followed by
/// the start offset of each segment; a zero end offset means the
/// segment extends to the end of the buffer.
fn read_segments(data: &[u8]) -> Result<Vec<(usize, usize)>> {
    snafu::ensure!(
        data.len() >= 64,
        decode_error::PixelDataTooShortSnafu {
            expected: 64_usize,
            actual: data.len(),
        }
    );

    let nr_segments = LittleEndian::read_u32(&data[0..4]) as usize;
    snafu::ensure!(
        nr_segments <= 15,
        decode_error::CodecDecodeFailureSnafu {
            codec: "RLE",
            message: format!("invalid segment count {}", nr_segments),
        }
    );

    let mut starts = vec![0_u32; nr_segments];
    LittleEndian::read_u32_into(&data[4..4 + 4 * nr_segments], &mut starts);

    let mut segments = Vec::with_capacity(nr_segments);
    for s in 0..nr_segments {
        let start = starts[s] as usize;
        let end = match starts.get(s + 1) {
            Some(&0) | None => data.len(),
            Some(&next) => next as usize,
        };
        snafu::ensure!(
            start <= end && end <= data.len(),
            decode_error::CodecDecodeFailureSnafu {
                codec: "RLE",
                message: format!("segment {} range {}..{} out of bounds", s, start, end),
            }
        );
        segments.push((start, end));
    }
    Ok(segments)
}

#[cfg(feature = "rle")]
/// Expand one PackBits-compressed segment, up to `max_out` bytes.
///
/// A control byte `n` in 0..=127 copies the next `n + 1` literal bytes;
/// in -127..=-1 it repeats the following byte `-n + 1` times;
/// -128 is a no-op.
fn unpack_segment(segment: &[u8], max_out: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(max_out);
    let mut pos = 0;

    while pos < segment.len() && out.len() < max_out {
        let n = segment[pos] as i8;
        pos += 1;

        if n >= 0 {
            let count = (n as usize + 1).min(segment.len() - pos);
            let take = count.min(max_out - out.len());
            out.extend_from_slice(&segment[pos..pos + take]);
            pos += count;
        } else if n != -128 {
            let Some(&value) = segment.get(pos) else {
                break;
            };
            pos += 1;
            let count = (-(n as isize) as usize + 1).min(max_out - out.len());
            out.resize(out.len() + count, value);
        }
        // n == -128 is a no-op
    }

    out
}

#[cfg(feature = "rle")]
fn decode_8(mut frame: ImageFrame, data: &[u8]) -> Result<ImageFrame> {
    let segments = read_segments(data)?;
    let frame_size = frame.pixel_count();
    let samples_per_pixel = frame.samples_per_pixel as usize;
    let mut out = vec![0_u8; frame_size * samples_per_pixel];

    // segments interleave per sample: segment s holds sample s of every pixel
    for (s, &(start, end)) in segments.iter().enumerate() {
        let decoded = unpack_segment(&data[start..end], frame_size);
        for (k, &value) in decoded.iter().enumerate() {
            let index = s + k * samples_per_pixel;
            if index >= out.len() {
                break;
            }
            out[index] = value;
        }
    }

    frame.pixel_data = PixelBuffer::U8(out);
    Ok(frame)
}

#[cfg(feature = "rle")]
fn decode_8_planar(mut frame: ImageFrame, data: &[u8]) -> Result<ImageFrame> {
    let segments = read_segments(data)?;
    let frame_size = frame.pixel_count();
    let samples_per_pixel = frame.samples_per_pixel as usize;
    let mut out = vec![0_u8; frame_size * samples_per_pixel];

    // each segment is one contiguous sample plane
    for (s, &(start, end)) in segments.iter().enumerate() {
        let decoded = unpack_segment(&data[start..end], frame_size);
        let base = s * frame_size;
        let take = decoded.len().min(out.len().saturating_sub(base));
        out[base..base + take].copy_from_slice(&decoded[..take]);
    }

    frame.pixel_data = PixelBuffer::U8(out);
    Ok(frame)
}

#[cfg(feature = "rle")]
fn decode_16(mut frame: ImageFrame, data: &[u8]) -> Result<ImageFrame> {
    let segments = read_segments(data)?;
    let frame_size = frame.pixel_count();
    let samples_per_pixel = frame.samples_per_pixel as usize;

    snafu::ensure!(
        segments.len() == samples_per_pixel * 2,
        decode_error::CodecDecodeFailureSnafu {
            codec: "RLE",
            message: format!(
                "expected {} segments for 16-bit data, found {}",
                samples_per_pixel * 2,
                segments.len()
            ),
        }
    );

    let mut bytes = vec![0_u8; frame_size * samples_per_pixel * 2];

    // two segments combine per sample plane:
    // the first supplies the high byte, the second the low byte,
    // written out in little-endian interleaved order
    for plane in 0..samples_per_pixel {
        for (half, byte_offset) in [(0, 1), (1, 0)] {
            let (start, end) = segments[plane * 2 + half];
            let decoded = unpack_segment(&data[start..end], frame_size);
            for (k, &value) in decoded.iter().enumerate() {
                let index = (k * samples_per_pixel + plane) * 2 + byte_offset;
                if index >= bytes.len() {
                    break;
                }
                bytes[index] = value;
            }
        }
    }

    frame.pixel_data = match frame.pixel_representation {
        PixelRepresentation::Unsigned => {
            let mut out = vec![0_u16; frame_size * samples_per_pixel];
            LittleEndian::read_u16_into(&bytes, &mut out);
            PixelBuffer::U16(out)
        }
        PixelRepresentation::Signed => {
            let mut out = vec![0_i16; frame_size * samples_per_pixel];
            LittleEndian::read_i16_into(&bytes, &mut out);
            PixelBuffer::I16(out)
        }
    };
    Ok(frame)
}

#[cfg(all(test, feature = "rle"))]
mod tests {
    use super::*;
    use crate::frame::{PhotometricInterpretation, PixelRepresentation, PlanarConfiguration};

    /// Build an RLE frame buffer from already-compressed segments.
    fn rle_fragment(segments: &[&[u8]]) -> Vec<u8> {
        let mut header = vec![0_u8; 64];
        LittleEndian::write_u32(&mut header[0..4], segments.len() as u32);
        let mut offset = 64;
        for (s, segment) in segments.iter().enumerate() {
            LittleEndian::write_u32(&mut header[4 + s * 4..8 + s * 4], offset as u32);
            offset += segment.len();
        }
        let mut out = header;
        for segment in segments {
            out.extend_from_slice(segment);
        }
        out
    }

    /// A minimal PackBits encoder: one literal run per segment.
    fn packbits_literal(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in data.chunks(128) {
            out.push((chunk.len() - 1) as u8);
            out.extend_from_slice(chunk);
        }
        out
    }

    #[test]
    fn unpack_literal_then_replicate() {
        // control 4 -> five literals, control -2 -> three copies of x
        let segment = [4, b'a', b'b', b'c', b'd', b'e', (-2_i8) as u8, b'x'];
        let decoded = unpack_segment(&segment, 8);
        assert_eq!(decoded, b"abcdexxx");
    }

    #[test]
    fn unpack_ignores_no_op_control() {
        let segment = [(-128_i8) as u8, 0, b'z'];
        let decoded = unpack_segment(&segment, 4);
        assert_eq!(decoded, b"z");
    }

    #[test]
    fn decode_8_bit_single_segment() {
        let mut frame = ImageFrame::new(2, 4, 1, 8, PhotometricInterpretation::Monochrome2);
        frame.planar_configuration = PlanarConfiguration::Interleaved;

        let segment = [4, b'a', b'b', b'c', b'd', b'e', (-2_i8) as u8, b'x'];
        let data = rle_fragment(&[&segment]);

        let decoded = decode(frame, &data).unwrap();
        assert_eq!(decoded.pixel_data, PixelBuffer::U8(b"abcdexxx".to_vec()));
    }

    #[test]
    fn decode_8_bit_three_samples_interleaves() {
        let mut frame = ImageFrame::new(1, 2, 3, 8, PhotometricInterpretation::Rgb);
        frame.planar_configuration = PlanarConfiguration::Interleaved;

        let r = packbits_literal(&[1, 10]);
        let g = packbits_literal(&[2, 20]);
        let b = packbits_literal(&[3, 30]);
        let data = rle_fragment(&[&r, &g, &b]);

        let decoded = decode(frame, &data).unwrap();
        assert_eq!(
            decoded.pixel_data,
            PixelBuffer::U8(vec![1, 2, 3, 10, 20, 30])
        );
    }

    #[test]
    fn decode_8_bit_planar_keeps_planes() {
        let mut frame = ImageFrame::new(1, 2, 3, 8, PhotometricInterpretation::Rgb);
        frame.planar_configuration = PlanarConfiguration::Planar;

        let r = packbits_literal(&[1, 10]);
        let g = packbits_literal(&[2, 20]);
        let b = packbits_literal(&[3, 30]);
        let data = rle_fragment(&[&r, &g, &b]);

        let decoded = decode(frame, &data).unwrap();
        assert_eq!(
            decoded.pixel_data,
            PixelBuffer::U8(vec![1, 10, 2, 20, 3, 30])
        );
    }

    #[test]
    fn decode_16_bit_combines_high_and_low_segments() {
        let mut frame = ImageFrame::new(1, 2, 1, 16, PhotometricInterpretation::Monochrome2);
        frame.pixel_representation = PixelRepresentation::Unsigned;

        let high = packbits_literal(&[0x12, 0xAB]);
        let low = packbits_literal(&[0x34, 0xCD]);
        let data = rle_fragment(&[&high, &low]);

        let decoded = decode(frame, &data).unwrap();
        assert_eq!(decoded.pixel_data, PixelBuffer::U16(vec![0x1234, 0xABCD]));
    }

    #[test]
    fn decode_16_bit_signed() {
        let mut frame = ImageFrame::new(1, 1, 1, 16, PhotometricInterpretation::Monochrome2);
        frame.pixel_representation = PixelRepresentation::Signed;

        let high = packbits_literal(&[0xFF]);
        let low = packbits_literal(&[0xFE]);
        let data = rle_fragment(&[&high, &low]);

        let decoded = decode(frame, &data).unwrap();
        assert_eq!(decoded.pixel_data, PixelBuffer::I16(vec![-2]));
    }

    #[test]
    fn round_trip_with_replicate_runs() {
        // a frame with long runs compresses into replicate controls;
        // decoding must restore it exactly
        let original: Vec<u8> = std::iter::repeat(7)
            .take(64)
            .chain(std::iter::repeat(200).take(64))
            .collect();

        // encode: two replicate runs of 64 (-63 control)
        let segment = [(-63_i8) as u8, 7, (-63_i8) as u8, 200];
        let mut frame = ImageFrame::new(8, 16, 1, 8, PhotometricInterpretation::Monochrome2);
        frame.planar_configuration = PlanarConfiguration::Interleaved;
        let data = rle_fragment(&[&segment]);

        let decoded = decode(frame, &data).unwrap();
        assert_eq!(decoded.pixel_data, PixelBuffer::U8(original));
    }

    #[test]
    fn zero_end_offset_extends_to_buffer_end() {
        let mut frame = ImageFrame::new(1, 3, 1, 8, PhotometricInterpretation::Monochrome2);
        frame.planar_configuration = PlanarConfiguration::Interleaved;

        // single segment, no explicit end
        let mut data = vec![0_u8; 64];
        LittleEndian::write_u32(&mut data[0..4], 1);
        LittleEndian::write_u32(&mut data[4..8], 64);
        data.extend_from_slice(&[2, 5, 6, 7]);

        let decoded = decode(frame, &data).unwrap();
        assert_eq!(decoded.pixel_data, PixelBuffer::U8(vec![5, 6, 7]));
    }

    #[test]
    fn header_shorter_than_64_bytes_is_rejected() {
        let frame = ImageFrame::new(1, 1, 1, 8, PhotometricInterpretation::Monochrome2);
        assert!(decode(frame, &[0; 10]).is_err());
    }
}
