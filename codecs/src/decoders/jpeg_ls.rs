//! Support for JPEG-LS image decoding.

use crate::error::Result;
use crate::frame::ImageFrame;

/// Decode a JPEG-LS frame through CharLS.
///
/// The decoder handle owns all of its native allocations
/// and releases them when dropped, on success and failure alike.
/// Near-lossless codestreams decode successfully;
/// any fatal condition surfaces as `CodecDecodeFailure`
/// carrying the reported error.
#[cfg(feature = "charls")]
pub fn decode(mut frame: ImageFrame, data: &[u8]) -> Result<ImageFrame> {
    use byteorder::{ByteOrder, LittleEndian};

    use crate::error::decode_error;
    use crate::frame::{PixelBuffer, PixelRepresentation};

    let mut charls = charls::CharLS::default();
    let decoded = charls
        .decode(data)
        .map_err(|e| decode_error::CodecDecodeFailureSnafu {
            codec: "JPEG-LS",
            message: e.to_string(),
        }
        .build())?;

    frame.pixel_data = if frame.bits_allocated <= 8 {
        PixelBuffer::U8(decoded)
    } else {
        match frame.pixel_representation {
            PixelRepresentation::Unsigned => {
                let mut out = vec![0_u16; decoded.len() / 2];
                LittleEndian::read_u16_into(&decoded[..out.len() * 2], &mut out);
                PixelBuffer::U16(out)
            }
            PixelRepresentation::Signed => {
                let mut out = vec![0_i16; decoded.len() / 2];
                LittleEndian::read_i16_into(&decoded[..out.len() * 2], &mut out);
                PixelBuffer::I16(out)
            }
        }
    };

    Ok(frame)
}

#[cfg(not(feature = "charls"))]
pub fn decode(_frame: ImageFrame, _data: &[u8]) -> Result<ImageFrame> {
    crate::error::decode_error::CodecNotLoadedSnafu { name: "JPEG-LS" }.fail()
}
