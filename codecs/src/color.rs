//! Color space conversion of decoded pixel data into display-ready RGBA.

use std::borrow::Cow;

use snafu::OptionExt;

use crate::error::{decode_error, Result};
use crate::frame::{
    ImageFrame, PaletteLut, PhotometricInterpretation, PixelBuffer, PlanarConfiguration,
};

/// Convert the frame's pixel data to 8-bit RGBA
/// according to its photometric interpretation,
/// replacing the pixel buffer.
///
/// Grayscale interpretations have no color space conversion
/// and are rejected with `UnsupportedPhotometricInterpretation`.
pub fn convert_color_space(frame: &mut ImageFrame) -> Result<()> {
    let num_pixels = frame.pixel_count();
    let mut rgba = vec![0_u8; num_pixels * 4];

    match frame.photometric_interpretation {
        PhotometricInterpretation::Rgb
        | PhotometricInterpretation::YbrRct
        | PhotometricInterpretation::YbrIct
        | PhotometricInterpretation::YbrFull422 => {
            // the samples already hold RGB values at this point
            // (YBR_RCT/ICT/422 are transformed by their codecs)
            let samples = color_samples(frame, num_pixels * 3)?;
            match frame.planar_configuration {
                PlanarConfiguration::Interleaved => convert_rgb_by_pixel(&samples, &mut rgba),
                PlanarConfiguration::Planar => convert_rgb_by_plane(&samples, &mut rgba),
            }
        }
        PhotometricInterpretation::YbrFull => {
            let samples = color_samples(frame, num_pixels * 3)?;
            match frame.planar_configuration {
                PlanarConfiguration::Interleaved => convert_ybr_full_by_pixel(&samples, &mut rgba),
                PlanarConfiguration::Planar => convert_ybr_full_by_plane(&samples, &mut rgba),
            }
        }
        PhotometricInterpretation::PaletteColor => {
            let palette = frame
                .palette
                .as_ref()
                .context(decode_error::MissingPaletteSnafu)?;
            match &frame.pixel_data {
                PixelBuffer::U8(v) => {
                    convert_palette_color(v.iter().map(|&i| i as i32), palette, &mut rgba)
                }
                PixelBuffer::U16(v) => {
                    convert_palette_color(v.iter().map(|&i| i as i32), palette, &mut rgba)
                }
                _ => {
                    return decode_error::UnsupportedPixelFormatSnafu {
                        bits_allocated: frame.bits_allocated,
                    }
                    .fail()
                }
            }
        }
        pi => return decode_error::UnsupportedPhotometricInterpretationSnafu { pi }.fail(),
    }

    frame.pixel_data = PixelBuffer::Rgba(rgba);
    Ok(())
}

/// Obtain the frame's color samples as 8-bit values,
/// checking that the expected sample count is present.
fn color_samples<'a>(frame: &'a ImageFrame, expected: usize) -> Result<Cow<'a, [u8]>> {
    let samples: Cow<[u8]> = match &frame.pixel_data {
        PixelBuffer::U8(v) => Cow::Borrowed(&v[..]),
        PixelBuffer::U16(v) => Cow::Owned(v.iter().map(|&s| s.min(255) as u8).collect()),
        _ => {
            return decode_error::UnsupportedPixelFormatSnafu {
                bits_allocated: frame.bits_allocated,
            }
            .fail()
        }
    };
    snafu::ensure!(
        samples.len() >= expected,
        decode_error::PixelDataTooShortSnafu {
            expected,
            actual: samples.len(),
        }
    );
    Ok(samples)
}

fn convert_rgb_by_pixel(samples: &[u8], rgba: &mut [u8]) {
    let num_pixels = rgba.len() / 4;
    let mut rgb_index = 0;
    let mut rgba_index = 0;
    for _ in 0..num_pixels {
        rgba[rgba_index] = samples[rgb_index];
        rgba[rgba_index + 1] = samples[rgb_index + 1];
        rgba[rgba_index + 2] = samples[rgb_index + 2];
        rgba[rgba_index + 3] = 255;
        rgb_index += 3;
        rgba_index += 4;
    }
}

fn convert_rgb_by_plane(samples: &[u8], rgba: &mut [u8]) {
    let num_pixels = rgba.len() / 4;
    let (mut r_index, mut g_index, mut b_index) = (0, num_pixels, num_pixels * 2);
    let mut rgba_index = 0;
    for _ in 0..num_pixels {
        rgba[rgba_index] = samples[r_index];
        rgba[rgba_index + 1] = samples[g_index];
        rgba[rgba_index + 2] = samples[b_index];
        rgba[rgba_index + 3] = 255;
        r_index += 1;
        g_index += 1;
        b_index += 1;
        rgba_index += 4;
    }
}

#[inline]
fn ybr_to_rgb(y: f32, cb: f32, cr: f32) -> [u8; 3] {
    let r = y + 1.402_00 * (cr - 128.);
    let g = y - 0.344_14 * (cb - 128.) - 0.714_14 * (cr - 128.);
    let b = y + 1.772_00 * (cb - 128.);
    [
        r.round().clamp(0., 255.) as u8,
        g.round().clamp(0., 255.) as u8,
        b.round().clamp(0., 255.) as u8,
    ]
}

fn convert_ybr_full_by_pixel(samples: &[u8], rgba: &mut [u8]) {
    let num_pixels = rgba.len() / 4;
    let mut ybr_index = 0;
    let mut rgba_index = 0;
    for _ in 0..num_pixels {
        let y = samples[ybr_index] as f32;
        let cb = samples[ybr_index + 1] as f32;
        let cr = samples[ybr_index + 2] as f32;
        rgba[rgba_index..rgba_index + 3].copy_from_slice(&ybr_to_rgb(y, cb, cr));
        rgba[rgba_index + 3] = 255;
        ybr_index += 3;
        rgba_index += 4;
    }
}

fn convert_ybr_full_by_plane(samples: &[u8], rgba: &mut [u8]) {
    let num_pixels = rgba.len() / 4;
    let mut rgba_index = 0;
    for i in 0..num_pixels {
        let y = samples[i] as f32;
        let cb = samples[num_pixels + i] as f32;
        let cr = samples[num_pixels * 2 + i] as f32;
        rgba[rgba_index..rgba_index + 3].copy_from_slice(&ybr_to_rgb(y, cb, cr));
        rgba[rgba_index + 3] = 255;
        rgba_index += 4;
    }
}

/// Reduce a palette lookup table to 8 bits of precision.
fn convert_lut_to_8bit(lut: &[u16], shift: u32) -> Vec<u8> {
    lut.iter().map(|&entry| (entry >> shift) as u8).collect()
}

fn convert_palette_color(
    indices: impl Iterator<Item = i32>,
    palette: &PaletteLut,
    rgba: &mut [u8],
) {
    let shift = if palette.bits_per_entry == 8 { 0 } else { 8 };
    let red = convert_lut_to_8bit(&palette.red, shift);
    let green = convert_lut_to_8bit(&palette.green, shift);
    let blue = convert_lut_to_8bit(&palette.blue, shift);

    let start = palette.first_mapped;
    let len = red.len() as i32;

    let mut rgba_index = 0;
    for value in indices {
        if rgba_index + 4 > rgba.len() {
            break;
        }
        // clamp the stored value into the range mapped by the tables
        let entry = if value < start {
            0
        } else if value > start + len - 1 {
            len - 1
        } else {
            value - start
        } as usize;

        rgba[rgba_index] = red[entry];
        rgba[rgba_index + 1] = green[entry];
        rgba[rgba_index + 2] = blue[entry];
        rgba[rgba_index + 3] = 255;
        rgba_index += 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::frame::{ImageFrame, PhotometricInterpretation, PixelBuffer, PlanarConfiguration};

    fn rgb_frame(planar: PlanarConfiguration, data: Vec<u8>) -> ImageFrame {
        let mut frame = ImageFrame::new(1, 2, 3, 8, PhotometricInterpretation::Rgb);
        frame.planar_configuration = planar;
        frame.pixel_data = PixelBuffer::U8(data);
        frame
    }

    #[test]
    fn rgb_by_pixel_copies_and_sets_alpha() {
        let mut frame = rgb_frame(
            PlanarConfiguration::Interleaved,
            vec![1, 2, 3, 10, 20, 30],
        );
        convert_color_space(&mut frame).unwrap();
        assert_eq!(
            frame.pixel_data,
            PixelBuffer::Rgba(vec![1, 2, 3, 255, 10, 20, 30, 255])
        );
    }

    #[test]
    fn rgb_by_plane_interleaves_planes() {
        // planes: R = [1, 10], G = [2, 20], B = [3, 30]
        let mut frame = rgb_frame(PlanarConfiguration::Planar, vec![1, 10, 2, 20, 3, 30]);
        convert_color_space(&mut frame).unwrap();
        assert_eq!(
            frame.pixel_data,
            PixelBuffer::Rgba(vec![1, 2, 3, 255, 10, 20, 30, 255])
        );
    }

    #[test]
    fn ybr_full_gray_point() {
        // Y=128, Cb=Cr=128 is mid gray
        let mut frame = ImageFrame::new(1, 1, 3, 8, PhotometricInterpretation::YbrFull);
        frame.pixel_data = PixelBuffer::U8(vec![128, 128, 128]);
        convert_color_space(&mut frame).unwrap();
        assert_eq!(frame.pixel_data, PixelBuffer::Rgba(vec![128, 128, 128, 255]));
    }

    #[test]
    fn ybr_full_red_component() {
        // Cr far above neutral drives red up and green down
        let mut frame = ImageFrame::new(1, 1, 3, 8, PhotometricInterpretation::YbrFull);
        frame.pixel_data = PixelBuffer::U8(vec![100, 128, 255]);
        convert_color_space(&mut frame).unwrap();
        let PixelBuffer::Rgba(rgba) = &frame.pixel_data else {
            panic!("expected RGBA output");
        };
        // R = 100 + 1.402 * 127 = 278.05, clamped
        assert_eq!(rgba[0], 255);
        // G = 100 - 0.71414 * 127 = 9.3
        assert_eq!(rgba[1], 9);
        // B = 100
        assert_eq!(rgba[2], 100);
        assert_eq!(rgba[3], 255);
    }

    #[test]
    fn palette_color_lookup_with_clamping() {
        let mut frame = ImageFrame::new(1, 4, 1, 8, PhotometricInterpretation::PaletteColor);
        frame.palette = Some(PaletteLut {
            first_mapped: 2,
            bits_per_entry: 8,
            red: vec![10, 20, 30],
            green: vec![11, 21, 31],
            blue: vec![12, 22, 32],
        });
        // 0 is below the first mapped value, 9 is above the last
        frame.pixel_data = PixelBuffer::U8(vec![0, 2, 3, 9]);
        convert_color_space(&mut frame).unwrap();
        assert_eq!(
            frame.pixel_data,
            PixelBuffer::Rgba(vec![
                10, 11, 12, 255, //
                10, 11, 12, 255, //
                20, 21, 22, 255, //
                30, 31, 32, 255,
            ])
        );
    }

    #[test]
    fn palette_color_16_bit_entries_are_narrowed() {
        let mut frame = ImageFrame::new(1, 1, 1, 8, PhotometricInterpretation::PaletteColor);
        frame.palette = Some(PaletteLut {
            first_mapped: 0,
            bits_per_entry: 16,
            red: vec![0xFF00],
            green: vec![0x8000],
            blue: vec![0x00FF],
        });
        frame.pixel_data = PixelBuffer::U8(vec![0]);
        convert_color_space(&mut frame).unwrap();
        assert_eq!(frame.pixel_data, PixelBuffer::Rgba(vec![0xFF, 0x80, 0x00, 255]));
    }

    #[test]
    fn every_output_pixel_has_opaque_alpha() {
        let mut frame = ImageFrame::new(2, 2, 3, 8, PhotometricInterpretation::YbrFull);
        frame.pixel_data = PixelBuffer::U8(vec![
            0, 0, 0, 255, 255, 255, 13, 64, 200, 90, 128, 128,
        ]);
        convert_color_space(&mut frame).unwrap();
        let PixelBuffer::Rgba(rgba) = &frame.pixel_data else {
            panic!("expected RGBA output");
        };
        assert!(rgba.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn monochrome_has_no_conversion() {
        let mut frame = ImageFrame::new(1, 2, 1, 8, PhotometricInterpretation::Monochrome2);
        frame.pixel_data = PixelBuffer::U8(vec![0, 1]);
        let err = convert_color_space(&mut frame).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnsupportedPhotometricInterpretation { .. }
        ));
    }
}
