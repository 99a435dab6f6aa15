//! Support for JPEG 2000 image decoding.

use crate::error::Result;
use crate::frame::ImageFrame;

/// Decode a JPEG 2000 frame through the OpenJPEG Rust port.
///
/// The frame's rows and columns are overwritten with the dimensions
/// declared in the codestream header.
/// When the decoded image has more than one component,
/// the photometric interpretation is forced to RGB
/// regardless of the declared value.
#[cfg(feature = "openjp2")]
pub fn decode(mut frame: ImageFrame, data: &[u8]) -> Result<ImageFrame> {
    use byteorder::ByteOrder;

    use crate::error::decode_error;
    use crate::frame::{PhotometricInterpretation, PixelBuffer, PixelRepresentation};

    let image =
        jpeg2k::Image::from_bytes(data).map_err(|e| decode_error::CodecDecodeFailureSnafu {
            codec: "JPEG 2000",
            message: e.to_string(),
        }
        .build())?;

    frame.columns = image.width();
    frame.rows = image.height();

    let components = image.components();
    snafu::ensure!(
        !components.is_empty(),
        decode_error::CodecDecodeFailureSnafu {
            codec: "JPEG 2000",
            message: "decoded image has no components".to_string(),
        }
    );

    if components.len() > 1 {
        frame.photometric_interpretation = PhotometricInterpretation::Rgb;
    }

    let num_components = components.len();
    if num_components > frame.samples_per_pixel as usize {
        tracing::warn!(
            "JPEG 2000 image has more components than declared ({} > {})",
            num_components,
            frame.samples_per_pixel
        );
    }
    let samples = frame.pixel_count() * num_components;
    let bytes_per_sample = if frame.bits_allocated <= 8 { 1 } else { 2 };

    // interleave the component planes into standard sample layout
    let mut bytes = vec![0_u8; samples * bytes_per_sample];
    for (c, component) in components.iter().enumerate() {
        for (i, &sample) in component.data().iter().enumerate() {
            let offset = (i * num_components + c) * bytes_per_sample;
            if offset + bytes_per_sample > bytes.len() {
                break;
            }
            bytes[offset..offset + bytes_per_sample]
                .copy_from_slice(&sample.to_le_bytes()[..bytes_per_sample]);
        }
    }

    frame.pixel_data = if bytes_per_sample == 1 {
        PixelBuffer::U8(bytes)
    } else {
        match frame.pixel_representation {
            PixelRepresentation::Unsigned => {
                let mut out = vec![0_u16; samples];
                byteorder::LittleEndian::read_u16_into(&bytes, &mut out);
                PixelBuffer::U16(out)
            }
            PixelRepresentation::Signed => {
                let mut out = vec![0_i16; samples];
                byteorder::LittleEndian::read_i16_into(&bytes, &mut out);
                PixelBuffer::I16(out)
            }
        }
    };

    Ok(frame)
}

#[cfg(not(feature = "openjp2"))]
pub fn decode(_frame: ImageFrame, _data: &[u8]) -> Result<ImageFrame> {
    crate::error::decode_error::CodecNotLoadedSnafu { name: "JPEG 2000" }.fail()
}
