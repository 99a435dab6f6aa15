//! Support for JPEG Baseline and Extended image decoding.

#[cfg(feature = "jpeg")]
use std::io::Cursor;

#[cfg(feature = "jpeg")]
use byteorder::{BigEndian, ByteOrder};

use crate::error::Result;
use crate::frame::ImageFrame;

/// Decode a JPEG Baseline (8-bit) or Extended (12-bit) frame
/// with the embedded JPEG decoder.
///
/// The decoder's output color model is passed through as-is;
/// color conversion is handled uniformly downstream.
#[cfg(feature = "jpeg")]
pub fn decode(frame: ImageFrame, data: &[u8]) -> Result<ImageFrame> {
    decode_with(frame, data, "JPEG")
}

#[cfg(not(feature = "jpeg"))]
pub fn decode(_frame: ImageFrame, _data: &[u8]) -> Result<ImageFrame> {
    crate::error::decode_error::CodecNotLoadedSnafu { name: "JPEG" }.fail()
}

#[cfg(feature = "jpeg")]
pub(crate) fn decode_with(
    mut frame: ImageFrame,
    data: &[u8],
    codec: &'static str,
) -> Result<ImageFrame> {
    use crate::error::decode_error;
    use crate::frame::{PixelBuffer, PixelRepresentation};
    use jpeg_decoder::PixelFormat;

    let mut decoder = jpeg_decoder::Decoder::new(Cursor::new(data));
    let pixels = decoder
        .decode()
        .map_err(|e| decode_error::CodecDecodeFailureSnafu {
            codec,
            message: e.to_string(),
        }
        .build())?;

    let info = decoder
        .info()
        .ok_or_else(|| decode_error::CodecDecodeFailureSnafu {
            codec,
            message: "no frame header".to_string(),
        }
        .build())?;

    frame.pixel_data = match info.pixel_format {
        PixelFormat::L8 | PixelFormat::RGB24 => PixelBuffer::U8(pixels),
        PixelFormat::L16 => {
            // the embedded decoder emits 16-bit samples in big-endian order
            let mut out = vec![0_u16; pixels.len() / 2];
            BigEndian::read_u16_into(&pixels[..out.len() * 2], &mut out);
            match frame.pixel_representation {
                PixelRepresentation::Unsigned => PixelBuffer::U16(out),
                PixelRepresentation::Signed => {
                    PixelBuffer::I16(out.into_iter().map(|v| v as i16).collect())
                }
            }
        }
        other => {
            return decode_error::CodecDecodeFailureSnafu {
                codec,
                message: format!("unsupported output pixel format {:?}", other),
            }
            .fail()
        }
    };

    Ok(frame)
}
