//! Per-transfer-syntax pixel data decoders.
//!
//! Every decoder takes an [`ImageFrame`](crate::frame::ImageFrame)
//! descriptor and the frame's encoded bytes,
//! and returns the frame with `pixel_data` replaced by a typed buffer.
//! Decoders whose codestream carries its own dimensions
//! may overwrite the declared rows and columns.

pub mod bitpack;
pub mod jpeg;
pub mod jpeg_2000;
pub mod jpeg_color;
pub mod jpeg_lossless;
pub mod jpeg_ls;
pub mod rle;
pub mod uncompressed;
