//! Whole-image decoding of 8-bit color baseline JPEG frames.
//!
//! 8-bit baseline JPEG with 3 or 4 samples per pixel bypasses the
//! generic decode pipeline: the compressed bytes go through a complete
//! image decoder which produces display-ready RGBA directly,
//! so the downstream color space converter must be skipped.

use crate::error::Result;
use crate::frame::ImageFrame;

/// Whether this frame and transfer syntax combination
/// takes the whole-image color JPEG path.
pub fn is_jpeg_baseline_8bit_color(frame: &ImageFrame, transfer_syntax_uid: &str) -> bool {
    frame.bits_allocated == 8
        && transfer_syntax_uid == crate::dispatch::uids::JPEG_BASELINE
        && (frame.samples_per_pixel == 3 || frame.samples_per_pixel == 4)
}

/// Decode a complete 8-bit color JPEG into RGBA pixel data.
///
/// Rows and columns are taken from the decoded image,
/// and the smallest/largest pixel values are computed here
/// since the frame skips the rest of the pipeline.
#[cfg(feature = "native-color")]
pub fn decode(mut frame: ImageFrame, data: &[u8]) -> Result<ImageFrame> {
    use crate::error::decode_error;
    use crate::frame::PixelBuffer;

    let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg).map_err(
        |e| {
            decode_error::CodecDecodeFailureSnafu {
                codec: "JPEG (color)",
                message: e.to_string(),
            }
            .build()
        },
    )?;

    let rgba = decoded.to_rgba8();
    frame.columns = rgba.width();
    frame.rows = rgba.height();
    frame.pixel_data = PixelBuffer::Rgba(rgba.into_raw());

    if let Some((min, max)) = frame.pixel_data.min_max() {
        frame.smallest_pixel_value = Some(min);
        frame.largest_pixel_value = Some(max);
    }

    Ok(frame)
}

#[cfg(not(feature = "native-color"))]
pub fn decode(_frame: ImageFrame, _data: &[u8]) -> Result<ImageFrame> {
    crate::error::decode_error::CodecNotLoadedSnafu {
        name: "JPEG (color)",
    }
    .fail()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PhotometricInterpretation;

    #[test]
    fn detects_8bit_color_baseline() {
        let frame = ImageFrame::new(8, 8, 3, 8, PhotometricInterpretation::YbrFull422);
        assert!(is_jpeg_baseline_8bit_color(
            &frame,
            crate::dispatch::uids::JPEG_BASELINE
        ));
    }

    #[test]
    fn grayscale_baseline_is_not_special_cased() {
        let frame = ImageFrame::new(8, 8, 1, 8, PhotometricInterpretation::Monochrome2);
        assert!(!is_jpeg_baseline_8bit_color(
            &frame,
            crate::dispatch::uids::JPEG_BASELINE
        ));
    }

    #[test]
    fn twelve_bit_color_is_not_special_cased() {
        let mut frame = ImageFrame::new(8, 8, 3, 8, PhotometricInterpretation::YbrFull422);
        frame.bits_allocated = 16;
        assert!(!is_jpeg_baseline_8bit_color(
            &frame,
            crate::dispatch::uids::JPEG_BASELINE
        ));
        let frame = ImageFrame::new(8, 8, 3, 8, PhotometricInterpretation::YbrFull422);
        assert!(!is_jpeg_baseline_8bit_color(
            &frame,
            crate::dispatch::uids::JPEG_EXTENDED
        ));
    }
}
