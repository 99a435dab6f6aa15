//! Assembly of decoded frames into display-ready images.

use std::sync::OnceLock;
use std::time::Duration;

use snafu::{ResultExt, Snafu};

use pixelpipe_codecs::{
    calculate_min_max, convert_color_space, get_min_max, ImageFrame, PhotometricInterpretation,
    PixelBuffer,
};

use crate::meta::MetaDataProvider;

/// The frame could not be assembled into an image.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum AssembleError {
    /// The frame carries no pixel data.
    #[snafu(display("The file does not contain image data"))]
    EmptyPixelData,

    #[snafu(display("Color space conversion failed"))]
    ColorConversion {
        source: pixelpipe_codecs::DecodeError,
    },
}

/// A display-ready image: the decoded, converted pixel buffer
/// merged with the metadata the viewer needs to present it.
#[derive(Debug)]
pub struct DisplayImage {
    pub image_id: String,
    /// whether the pixel data is color (RGBA)
    pub color: bool,
    pub rows: u32,
    pub columns: u32,
    pub row_pixel_spacing: Option<f64>,
    pub column_pixel_spacing: Option<f64>,
    /// modality LUT rescale slope
    pub slope: f64,
    /// modality LUT rescale intercept
    pub intercept: f64,
    /// display should invert the grayscale ramp (MONOCHROME1)
    pub invert: bool,
    pub min_pixel_value: f64,
    pub max_pixel_value: f64,
    pub window_center: f64,
    pub window_width: f64,
    pub size_in_bytes: usize,
    pub decode_time: Duration,
    pixel_data: PixelBuffer,
    /// original float samples, kept when the pixel data was quantized
    float_pixel_data: Option<Vec<f32>>,
    raster: OnceLock<Option<image::RgbaImage>>,
}

impl DisplayImage {
    /// The stored pixel buffer.
    pub fn pixel_data(&self) -> &PixelBuffer {
        &self.pixel_data
    }

    /// The original floating-point samples,
    /// when the source data was 32-bit float.
    pub fn float_pixel_data(&self) -> Option<&[f32]> {
        self.float_pixel_data.as_deref()
    }

    /// A raster surface of the image, for color images only.
    ///
    /// Built on first access and cached.
    pub fn raster(&self) -> Option<&image::RgbaImage> {
        self.raster
            .get_or_init(|| {
                let PixelBuffer::Rgba(rgba) = &self.pixel_data else {
                    return None;
                };
                image::RgbaImage::from_raw(self.columns, self.rows, rgba.clone())
            })
            .as_ref()
    }
}

/// Quantization of float pixel data into a 16-bit representation.
struct IntPixelData {
    data: Vec<u16>,
    min: f64,
    max: f64,
    slope: f64,
    intercept: f64,
}

/// Linearly rescale float samples across their observed range
/// into unsigned 16-bit integers,
/// recording the slope and intercept needed to invert the mapping.
fn convert_to_int_pixel_data(float_pixel_data: &[f32]) -> IntPixelData {
    let min_max = get_min_max(float_pixel_data);
    let float_min = min_max.map(|m| m.min as f64).unwrap_or(0.);
    let float_max = min_max.map(|m| m.max as f64).unwrap_or(0.);
    let float_range = (float_max - float_min).abs();
    let int_range = 65535.;
    let slope = if float_range == 0. {
        1.
    } else {
        float_range / int_range
    };
    let intercept = float_min;

    let mut min = int_range;
    let mut max: f64 = 0.;
    let data = float_pixel_data
        .iter()
        .map(|&value| {
            let rescaled = ((value as f64 - intercept) / slope).floor();
            min = min.min(rescaled);
            max = max.max(rescaled);
            rescaled as u16
        })
        .collect();

    IntPixelData {
        data,
        min,
        max,
        slope,
        intercept,
    }
}

/// Merge a decoded frame with the image's metadata modules
/// into the final display-ready image.
///
/// Pixel data which is already RGBA
/// (the whole-image color JPEG path)
/// skips normalization and color conversion.
pub fn create_image(
    image_id: &str,
    mut frame: ImageFrame,
    provider: &dyn MetaDataProvider,
) -> Result<DisplayImage, AssembleError> {
    snafu::ensure!(!frame.pixel_data.is_empty(), EmptyPixelDataSnafu);

    let plane = provider.image_plane_module(image_id).unwrap_or_default();
    let voi = provider.voi_lut_module(image_id).unwrap_or_default();
    let modality = provider.modality_lut_module(image_id).unwrap_or_default();

    let color = frame.photometric_interpretation.is_color();

    if !frame.pixel_data.is_rgba() {
        if color {
            convert_color_space(&mut frame).context(ColorConversionSnafu)?;
            // the converted buffer invalidates any declared range
            frame.smallest_pixel_value = None;
            frame.largest_pixel_value = None;
        }
        if frame.smallest_pixel_value.is_none() || frame.largest_pixel_value.is_none() {
            calculate_min_max(&mut frame, false);
        }
    }

    let mut slope = modality.rescale_slope.unwrap_or(1.);
    let mut intercept = modality.rescale_intercept.unwrap_or(0.);
    let mut min_pixel_value = frame.smallest_pixel_value.unwrap_or(0.);
    let mut max_pixel_value = frame.largest_pixel_value.unwrap_or(0.);

    // 32-bit float data is quantized into 16-bit integers for display
    let mut float_pixel_data = None;
    if matches!(frame.pixel_data, PixelBuffer::F32(_)) {
        let floats = match std::mem::replace(&mut frame.pixel_data, PixelBuffer::U8(Vec::new())) {
            PixelBuffer::F32(floats) => floats,
            _ => unreachable!(),
        };
        let quantized = convert_to_int_pixel_data(&floats);
        min_pixel_value = quantized.min;
        max_pixel_value = quantized.max;
        slope = quantized.slope;
        intercept = quantized.intercept;
        frame.pixel_data = PixelBuffer::U16(quantized.data);
        float_pixel_data = Some(floats);
    }

    let (mut window_center, mut window_width) = (voi.window_center, voi.window_width);
    if color {
        window_width = Some(255.);
        window_center = Some(127.);
    }

    // cover the dynamic range of the image when no values are supplied
    let (window_center, window_width) = match (window_center, window_width) {
        (Some(center), Some(width)) => (center, width),
        _ => {
            let max_voi = max_pixel_value * slope + intercept;
            let min_voi = min_pixel_value * slope + intercept;
            ((max_voi + min_voi) / 2., max_voi - min_voi)
        }
    };

    Ok(DisplayImage {
        image_id: image_id.to_string(),
        color,
        rows: frame.rows,
        columns: frame.columns,
        row_pixel_spacing: plane.row_pixel_spacing,
        column_pixel_spacing: plane.column_pixel_spacing,
        slope,
        intercept,
        invert: frame.photometric_interpretation == PhotometricInterpretation::Monochrome1,
        min_pixel_value,
        max_pixel_value,
        window_center,
        window_width,
        size_in_bytes: frame.pixel_data.byte_len(),
        decode_time: frame.decode_time.unwrap_or_default(),
        pixel_data: frame.pixel_data,
        float_pixel_data,
        raster: OnceLock::new(),
    })
}
