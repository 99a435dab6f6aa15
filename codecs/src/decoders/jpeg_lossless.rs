//! Support for JPEG Lossless (process 14) image decoding.

use crate::error::Result;
use crate::frame::ImageFrame;

/// Decode a JPEG Lossless, Non-Hierarchical frame.
///
/// The output byte width follows Bits Allocated
/// (one byte per sample up to 8 bits, two bytes otherwise),
/// with the final typed view selected by Pixel Representation.
#[cfg(feature = "jpeg")]
pub fn decode(frame: ImageFrame, data: &[u8]) -> Result<ImageFrame> {
    super::jpeg::decode_with(frame, data, "JPEG Lossless")
}

#[cfg(not(feature = "jpeg"))]
pub fn decode(_frame: ImageFrame, _data: &[u8]) -> Result<ImageFrame> {
    crate::error::decode_error::CodecNotLoadedSnafu {
        name: "JPEG Lossless",
    }
    .fail()
}
