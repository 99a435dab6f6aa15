//! Transfer syntax identification and decoder dispatch.
//!
//! The dispatcher maps a transfer syntax UID to the decoder responsible
//! for it through a closed match over [`TransferSyntax`],
//! so that an unrecognized identifier can never reach a decoder.

use std::time::Instant;

use snafu::OptionExt;

use crate::decoders;
use crate::error::{decode_error, Result};
use crate::frame::{ImageFrame, PixelRepresentation};

/// The UIDs of the supported transfer syntaxes.
pub mod uids {
    /// Implicit VR Little Endian: Default Transfer Syntax for DICOM
    pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
    /// Explicit VR Little Endian
    pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
    /// Deflated Explicit VR Little Endian
    pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1.99";
    /// Explicit VR Big Endian (retired)
    pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";
    /// RLE Lossless
    pub const RLE_LOSSLESS: &str = "1.2.840.10008.1.2.5";
    /// JPEG Baseline (Process 1): 8-bit lossy JPEG
    pub const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";
    /// JPEG Extended (Process 2 & 4): 12-bit lossy JPEG
    pub const JPEG_EXTENDED: &str = "1.2.840.10008.1.2.4.51";
    /// JPEG Lossless, Non-Hierarchical (Process 14)
    pub const JPEG_LOSSLESS_NON_HIERARCHICAL: &str = "1.2.840.10008.1.2.4.57";
    /// JPEG Lossless, Non-Hierarchical, First-Order Prediction
    /// (Process 14 [Selection Value 1])
    pub const JPEG_LOSSLESS_FIRST_ORDER_PREDICTION: &str = "1.2.840.10008.1.2.4.70";
    /// JPEG-LS Lossless Image Compression
    pub const JPEG_LS_LOSSLESS: &str = "1.2.840.10008.1.2.4.80";
    /// JPEG-LS Lossy (Near-Lossless) Image Compression
    pub const JPEG_LS_NEAR_LOSSLESS: &str = "1.2.840.10008.1.2.4.81";
    /// JPEG 2000 Image Compression (Lossless Only)
    pub const JPEG_2000_LOSSLESS: &str = "1.2.840.10008.1.2.4.90";
    /// JPEG 2000 Image Compression
    pub const JPEG_2000: &str = "1.2.840.10008.1.2.4.91";
}

/// A transfer syntax with pixel data decoding support.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum TransferSyntax {
    ImplicitVrLittleEndian,
    ExplicitVrLittleEndian,
    /// deflated data sets reach pixel decoding already inflated,
    /// so the pixel data itself is plain little endian
    DeflatedExplicitVrLittleEndian,
    ExplicitVrBigEndian,
    RleLossless,
    JpegBaseline,
    JpegExtended,
    JpegLosslessNonHierarchical,
    JpegLosslessFirstOrderPrediction,
    JpegLsLossless,
    JpegLsNearLossless,
    Jpeg2000Lossless,
    Jpeg2000,
}

impl TransferSyntax {
    /// Identify a transfer syntax from its UID.
    ///
    /// A trailing null padding character is tolerated.
    pub fn from_uid(uid: &str) -> Option<Self> {
        let uid = uid.trim_end_matches('\0');
        match uid {
            uids::IMPLICIT_VR_LITTLE_ENDIAN => Some(Self::ImplicitVrLittleEndian),
            uids::EXPLICIT_VR_LITTLE_ENDIAN => Some(Self::ExplicitVrLittleEndian),
            uids::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN => Some(Self::DeflatedExplicitVrLittleEndian),
            uids::EXPLICIT_VR_BIG_ENDIAN => Some(Self::ExplicitVrBigEndian),
            uids::RLE_LOSSLESS => Some(Self::RleLossless),
            uids::JPEG_BASELINE => Some(Self::JpegBaseline),
            uids::JPEG_EXTENDED => Some(Self::JpegExtended),
            uids::JPEG_LOSSLESS_NON_HIERARCHICAL => Some(Self::JpegLosslessNonHierarchical),
            uids::JPEG_LOSSLESS_FIRST_ORDER_PREDICTION => {
                Some(Self::JpegLosslessFirstOrderPrediction)
            }
            uids::JPEG_LS_LOSSLESS => Some(Self::JpegLsLossless),
            uids::JPEG_LS_NEAR_LOSSLESS => Some(Self::JpegLsNearLossless),
            uids::JPEG_2000_LOSSLESS => Some(Self::Jpeg2000Lossless),
            uids::JPEG_2000 => Some(Self::Jpeg2000),
            _ => None,
        }
    }

    /// The UID of this transfer syntax.
    pub fn uid(self) -> &'static str {
        match self {
            Self::ImplicitVrLittleEndian => uids::IMPLICIT_VR_LITTLE_ENDIAN,
            Self::ExplicitVrLittleEndian => uids::EXPLICIT_VR_LITTLE_ENDIAN,
            Self::DeflatedExplicitVrLittleEndian => uids::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
            Self::ExplicitVrBigEndian => uids::EXPLICIT_VR_BIG_ENDIAN,
            Self::RleLossless => uids::RLE_LOSSLESS,
            Self::JpegBaseline => uids::JPEG_BASELINE,
            Self::JpegExtended => uids::JPEG_EXTENDED,
            Self::JpegLosslessNonHierarchical => uids::JPEG_LOSSLESS_NON_HIERARCHICAL,
            Self::JpegLosslessFirstOrderPrediction => uids::JPEG_LOSSLESS_FIRST_ORDER_PREDICTION,
            Self::JpegLsLossless => uids::JPEG_LS_LOSSLESS,
            Self::JpegLsNearLossless => uids::JPEG_LS_NEAR_LOSSLESS,
            Self::Jpeg2000Lossless => uids::JPEG_2000_LOSSLESS,
            Self::Jpeg2000 => uids::JPEG_2000,
        }
    }
}

/// Configuration for the decode pipeline.
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// In strict mode, declared smallest/largest pixel values
    /// are kept and mismatches against the computed values
    /// are only logged.
    pub strict: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        DecodeConfig { strict: true }
    }
}

/// Decode one frame of pixel data
/// according to the given transfer syntax UID.
///
/// After the codec runs, samples of signed frames are sign-extended
/// from Bits Stored significant bits to the full container width,
/// the smallest/largest pixel values are reconciled with the decoded
/// samples per the configured strictness,
/// and the time spent decoding is recorded on the frame.
pub fn decode_image_frame(
    frame: ImageFrame,
    transfer_syntax_uid: &str,
    data: &[u8],
    config: &DecodeConfig,
) -> Result<ImageFrame> {
    let start = Instant::now();

    let transfer_syntax_uid = transfer_syntax_uid.trim_end_matches('\0');
    let ts = TransferSyntax::from_uid(transfer_syntax_uid).context(
        decode_error::UnsupportedTransferSyntaxSnafu {
            uid: transfer_syntax_uid,
        },
    )?;

    let mut frame = match ts {
        TransferSyntax::ImplicitVrLittleEndian
        | TransferSyntax::ExplicitVrLittleEndian
        | TransferSyntax::DeflatedExplicitVrLittleEndian => {
            decoders::uncompressed::decode_little_endian(frame, data)?
        }
        TransferSyntax::ExplicitVrBigEndian => {
            decoders::uncompressed::decode_big_endian(frame, data)?
        }
        TransferSyntax::RleLossless => decoders::rle::decode(frame, data)?,
        TransferSyntax::JpegBaseline
            if decoders::jpeg_color::is_jpeg_baseline_8bit_color(&frame, transfer_syntax_uid) =>
        {
            decoders::jpeg_color::decode(frame, data)?
        }
        TransferSyntax::JpegBaseline | TransferSyntax::JpegExtended => {
            decoders::jpeg::decode(frame, data)?
        }
        TransferSyntax::JpegLosslessNonHierarchical
        | TransferSyntax::JpegLosslessFirstOrderPrediction => {
            decoders::jpeg_lossless::decode(frame, data)?
        }
        TransferSyntax::JpegLsLossless | TransferSyntax::JpegLsNearLossless => {
            decoders::jpeg_ls::decode(frame, data)?
        }
        TransferSyntax::Jpeg2000Lossless | TransferSyntax::Jpeg2000 => {
            decoders::jpeg_2000::decode(frame, data)?
        }
    };

    if frame.pixel_representation == PixelRepresentation::Signed {
        if let Some(bits_stored) = frame.bits_stored {
            frame.pixel_data.sign_extend(bits_stored);
        }
    }

    crate::minmax::calculate_min_max(&mut frame, config.strict);

    frame.decode_time = Some(start.elapsed());
    Ok(frame)
}
