//! Error types for the pixel data decode pipeline.

use snafu::Snafu;

use crate::frame::PhotometricInterpretation;

/// The possible error conditions when decoding pixel data.
///
/// All variants are fatal for the frame being decoded;
/// this layer performs no retries.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)), module(decode_error))]
pub enum DecodeError {
    /// The transfer syntax is not known to the dispatcher.
    #[snafu(display("Unsupported transfer syntax `{uid}`"))]
    UnsupportedTransferSyntax { uid: String },

    /// The combination of Bits Allocated and the selected codec
    /// cannot be decoded.
    #[snafu(display("Unsupported pixel format: {bits_allocated} bits allocated"))]
    UnsupportedPixelFormat { bits_allocated: u16 },

    /// The photometric interpretation has no color space conversion.
    #[snafu(display("Unsupported photometric interpretation `{pi}`"))]
    UnsupportedPhotometricInterpretation { pi: PhotometricInterpretation },

    /// The decoder for this transfer syntax was not compiled in.
    #[snafu(display("Codec `{name}` is not available in this build"))]
    CodecNotLoaded { name: &'static str },

    /// The codec rejected the compressed byte stream.
    #[snafu(display("{codec} decoder failed: {message}"))]
    CodecDecodeFailure {
        codec: &'static str,
        message: String,
    },

    /// The compressed byte stream ended prematurely.
    #[snafu(display("Pixel data too short: expected {expected} bytes, got {actual}"))]
    PixelDataTooShort { expected: usize, actual: usize },

    /// The frame is missing the palette lookup tables required
    /// for PALETTE COLOR conversion.
    #[snafu(display("Missing palette color lookup table data"))]
    MissingPalette,
}

/// The result of decoding pixel data.
pub type Result<T, E = DecodeError> = std::result::Result<T, E>;
