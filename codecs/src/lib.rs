//! This crate contains the pixel data handlers of the pixelpipe project.
//! It decodes transfer-syntax encoded pixel data into typed buffers,
//! normalizes sample values,
//! and converts color frames into display-ready RGBA.
//!
//! The entry point is [`decode_image_frame`],
//! which routes the encoded bytes of a single frame
//! to the decoder selected by the transfer syntax UID.
//!
//! # Example
//! ```no_run
//! use pixelpipe_codecs::{
//!     decode_image_frame, uids, DecodeConfig, ImageFrame, PhotometricInterpretation,
//! };
//!
//! # fn main() -> Result<(), pixelpipe_codecs::DecodeError> {
//! let frame = ImageFrame::new(64, 64, 1, 16, PhotometricInterpretation::Monochrome2);
//! # let encoded: Vec<u8> = vec![];
//! let frame = decode_image_frame(
//!     frame,
//!     uids::EXPLICIT_VR_LITTLE_ENDIAN,
//!     &encoded,
//!     &DecodeConfig::default(),
//! )?;
//! assert!(frame.decode_time.is_some());
//! # Ok(())
//! # }
//! ```

pub mod color;
pub mod decoders;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod minmax;

pub use color::convert_color_space;
pub use decoders::bitpack::unpack_binary_frame;
pub use decoders::jpeg_color::is_jpeg_baseline_8bit_color;
pub use dispatch::{decode_image_frame, uids, DecodeConfig, TransferSyntax};
pub use error::DecodeError;
pub use frame::{
    ImageFrame, PaletteLut, PhotometricInterpretation, PixelBuffer, PixelRepresentation,
    PlanarConfiguration,
};
pub use minmax::{calculate_min_max, get_min_max, MinMax};
