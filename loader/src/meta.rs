//! Metadata module collaborator interface.
//!
//! Plane geometry and LUT information do not live in the pixel data
//! itself; they are supplied by an external metadata provider,
//! addressed by image id.

use snafu::{OptionExt, ResultExt, Snafu};

use pixelpipe_codecs::{
    ImageFrame, PaletteLut, PhotometricInterpretation, PixelRepresentation, PlanarConfiguration,
};

/// The Image Pixel module of one image.
#[derive(Debug, Clone)]
pub struct ImagePixelModule {
    pub rows: u32,
    pub columns: u32,
    pub samples_per_pixel: u16,
    pub bits_allocated: u16,
    pub bits_stored: Option<u16>,
    /// 0 = unsigned, 1 = signed
    pub pixel_representation: u16,
    /// 0 = pixel-interleaved, 1 = plane-interleaved
    pub planar_configuration: Option<u16>,
    pub photometric_interpretation: String,
    pub smallest_pixel_value: Option<f64>,
    pub largest_pixel_value: Option<f64>,
    pub palette: Option<PaletteLut>,
}

/// The Image Plane module of one image.
#[derive(Debug, Clone, Default)]
pub struct ImagePlaneModule {
    pub row_pixel_spacing: Option<f64>,
    pub column_pixel_spacing: Option<f64>,
}

/// The VOI LUT module of one image.
#[derive(Debug, Clone, Default)]
pub struct VoiLutModule {
    pub window_center: Option<f64>,
    pub window_width: Option<f64>,
}

/// The Modality LUT module of one image.
#[derive(Debug, Clone, Default)]
pub struct ModalityLutModule {
    pub rescale_intercept: Option<f64>,
    pub rescale_slope: Option<f64>,
}

/// Provider of metadata modules by image id.
/// Implemented by the hosting viewer's metadata layer.
pub trait MetaDataProvider: Send + Sync {
    fn image_pixel_module(&self, image_id: &str) -> Option<ImagePixelModule>;

    fn image_plane_module(&self, _image_id: &str) -> Option<ImagePlaneModule> {
        None
    }

    fn voi_lut_module(&self, _image_id: &str) -> Option<VoiLutModule> {
        None
    }

    fn modality_lut_module(&self, _image_id: &str) -> Option<ModalityLutModule> {
        None
    }
}

/// A metadata module required to build the frame was missing or invalid.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum MetadataError {
    #[snafu(display("No image pixel module for image `{image_id}`"))]
    MissingImagePixelModule { image_id: String },

    #[snafu(display("Invalid image pixel module for image `{image_id}`: {source}"))]
    InvalidPhotometricInterpretation {
        image_id: String,
        source: pixelpipe_codecs::frame::FromPhotometricInterpretationError,
    },
}

/// Build an undecoded [`ImageFrame`] descriptor
/// from the image pixel module of the given image id.
pub fn image_frame_from_metadata(
    provider: &dyn MetaDataProvider,
    image_id: &str,
) -> Result<ImageFrame, MetadataError> {
    let module = provider
        .image_pixel_module(image_id)
        .context(MissingImagePixelModuleSnafu { image_id })?;

    let photometric_interpretation =
        PhotometricInterpretation::from_keyword(&module.photometric_interpretation)
            .context(InvalidPhotometricInterpretationSnafu { image_id })?;

    let mut frame = ImageFrame::new(
        module.rows,
        module.columns,
        module.samples_per_pixel,
        module.bits_allocated,
        photometric_interpretation,
    );
    frame.bits_stored = module.bits_stored;
    frame.pixel_representation = if module.pixel_representation == 1 {
        PixelRepresentation::Signed
    } else {
        PixelRepresentation::Unsigned
    };
    frame.planar_configuration = if module.planar_configuration == Some(1) {
        PlanarConfiguration::Planar
    } else {
        PlanarConfiguration::Interleaved
    };
    frame.smallest_pixel_value = module.smallest_pixel_value;
    frame.largest_pixel_value = module.largest_pixel_value;
    frame.palette = module.palette;

    Ok(frame)
}
