//! Decoding of uncompressed (raw endian) pixel data.
//!
//! The encoded bytes are always copied into a newly allocated typed
//! buffer: a typed view over the source bytes would require the source
//! to be suitably aligned, which cannot be guaranteed for slices taken
//! out of a larger dataset at arbitrary byte offsets.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{decode_error, Result};
use crate::frame::{ImageFrame, PixelBuffer, PixelRepresentation};

/// Decode raw little-endian pixel data
/// into the typed buffer selected by Bits Allocated
/// and Pixel Representation.
pub fn decode_little_endian(mut frame: ImageFrame, data: &[u8]) -> Result<ImageFrame> {
    frame.pixel_data = match frame.bits_allocated {
        1 => one_bit_buffer(&frame, data),
        8 => PixelBuffer::U8(data.to_vec()),
        16 => match frame.pixel_representation {
            PixelRepresentation::Unsigned => {
                let mut out = vec![0_u16; data.len() / 2];
                LittleEndian::read_u16_into(&data[..out.len() * 2], &mut out);
                PixelBuffer::U16(out)
            }
            PixelRepresentation::Signed => {
                let mut out = vec![0_i16; data.len() / 2];
                LittleEndian::read_i16_into(&data[..out.len() * 2], &mut out);
                PixelBuffer::I16(out)
            }
        },
        32 => {
            let mut out = vec![0_f32; data.len() / 4];
            LittleEndian::read_f32_into(&data[..out.len() * 4], &mut out);
            PixelBuffer::F32(out)
        }
        bits_allocated => {
            return decode_error::UnsupportedPixelFormatSnafu { bits_allocated }.fail()
        }
    };
    Ok(frame)
}

/// Decode raw big-endian pixel data.
///
/// Equivalent to the little-endian decoder with every 16-bit sample
/// byte-swapped (`((v & 0xFF) << 8) | ((v >> 8) & 0xFF)`).
pub fn decode_big_endian(mut frame: ImageFrame, data: &[u8]) -> Result<ImageFrame> {
    frame.pixel_data = match frame.bits_allocated {
        1 => one_bit_buffer(&frame, data),
        8 => PixelBuffer::U8(data.to_vec()),
        16 => match frame.pixel_representation {
            PixelRepresentation::Unsigned => {
                let mut out = vec![0_u16; data.len() / 2];
                BigEndian::read_u16_into(&data[..out.len() * 2], &mut out);
                PixelBuffer::U16(out)
            }
            PixelRepresentation::Signed => {
                let mut out = vec![0_i16; data.len() / 2];
                BigEndian::read_i16_into(&data[..out.len() * 2], &mut out);
                PixelBuffer::I16(out)
            }
        },
        32 => {
            let mut out = vec![0_f32; data.len() / 4];
            BigEndian::read_f32_into(&data[..out.len() * 4], &mut out);
            PixelBuffer::F32(out)
        }
        bits_allocated => {
            return decode_error::UnsupportedPixelFormatSnafu { bits_allocated }.fail()
        }
    };
    Ok(frame)
}

/// Single-bit pixel data may arrive either still packed
/// or already expanded to one byte per pixel by frame extraction.
fn one_bit_buffer(frame: &ImageFrame, data: &[u8]) -> PixelBuffer {
    if data.len() == frame.pixel_count() {
        PixelBuffer::U8(data.to_vec())
    } else {
        PixelBuffer::Bit(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{PhotometricInterpretation, PixelRepresentation};

    fn frame_16(representation: PixelRepresentation) -> ImageFrame {
        let mut frame = ImageFrame::new(1, 2, 1, 16, PhotometricInterpretation::Monochrome2);
        frame.pixel_representation = representation;
        frame
    }

    #[test]
    fn little_endian_16_bit_unsigned() {
        let frame = frame_16(PixelRepresentation::Unsigned);
        let decoded = decode_little_endian(frame, &[0x01, 0x02, 0xFF, 0xFF]).unwrap();
        assert_eq!(decoded.pixel_data, PixelBuffer::U16(vec![0x0201, 0xFFFF]));
    }

    #[test]
    fn little_endian_16_bit_signed() {
        let frame = frame_16(PixelRepresentation::Signed);
        let decoded = decode_little_endian(frame, &[0xFF, 0xFF, 0x00, 0x80]).unwrap();
        assert_eq!(decoded.pixel_data, PixelBuffer::I16(vec![-1, i16::MIN]));
    }

    #[test]
    fn big_endian_equals_little_endian_of_swapped_bytes() {
        let be_bytes = [0x12, 0x34, 0xAB, 0xCD];
        let le_bytes = [0x34, 0x12, 0xCD, 0xAB];

        let be = decode_big_endian(frame_16(PixelRepresentation::Unsigned), &be_bytes).unwrap();
        let le = decode_little_endian(frame_16(PixelRepresentation::Unsigned), &le_bytes).unwrap();

        assert_eq!(be.pixel_data, le.pixel_data);
        assert_eq!(be.pixel_data, PixelBuffer::U16(vec![0x1234, 0xABCD]));
    }

    #[test]
    fn eight_bit_is_copied_as_is() {
        let mut frame = ImageFrame::new(1, 4, 1, 8, PhotometricInterpretation::Monochrome2);
        frame.pixel_representation = PixelRepresentation::Unsigned;
        let decoded = decode_little_endian(frame, &[1, 2, 3, 4]).unwrap();
        assert_eq!(decoded.pixel_data, PixelBuffer::U8(vec![1, 2, 3, 4]));
    }

    #[test]
    fn one_bit_data_stays_packed() {
        let frame = ImageFrame::new(2, 4, 1, 1, PhotometricInterpretation::Monochrome2);
        let decoded = decode_little_endian(frame, &[0b1010_1010]).unwrap();
        assert_eq!(decoded.pixel_data, PixelBuffer::Bit(vec![0b1010_1010]));
    }

    #[test]
    fn thirty_two_bit_float() {
        let mut frame = ImageFrame::new(1, 1, 1, 32, PhotometricInterpretation::Monochrome2);
        frame.pixel_representation = PixelRepresentation::Unsigned;
        let decoded = decode_little_endian(frame, &1.5_f32.to_le_bytes()).unwrap();
        assert_eq!(decoded.pixel_data, PixelBuffer::F32(vec![1.5]));
    }

    #[test]
    fn unsupported_bits_allocated() {
        let frame = ImageFrame::new(1, 1, 1, 24, PhotometricInterpretation::Monochrome2);
        assert!(decode_little_endian(frame, &[0; 3]).is_err());
    }
}
