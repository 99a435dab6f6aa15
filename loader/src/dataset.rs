//! Parsed dataset collaborators and per-frame pixel data extraction.
//!
//! The byte-stream parser itself is an external collaborator:
//! this module defines the traits it must satisfy
//! ([`DataSetParser`] to turn raw bytes into a document,
//! [`DataSetDocument`] to address the parsed pixel data)
//! and implements frame extraction on top of them,
//! for both native and encapsulated pixel data.

use snafu::{ensure, OptionExt, Snafu};

use pixelpipe_codecs::unpack_binary_frame;

/// Parses raw source document bytes into a tag/element-addressable
/// dataset. Implemented by the external byte-stream parser.
pub trait DataSetParser: Send + Sync + 'static {
    type DataSet: Send + Sync + 'static;

    fn parse(&self, bytes: Vec<u8>) -> Result<Self::DataSet, DatasetParseError>;
}

/// The parser rejected the source document.
#[derive(Debug, Snafu)]
#[snafu(display("{message}"))]
pub struct DatasetParseError {
    pub message: String,
}

/// A parsed source document, addressable for pixel data extraction.
pub trait DataSetDocument: Send + Sync {
    /// The transfer syntax UID the pixel data is encoded with.
    fn transfer_syntax_uid(&self) -> &str;

    fn rows(&self) -> Option<u16>;
    fn columns(&self) -> Option<u16>;
    fn samples_per_pixel(&self) -> Option<u16>;
    fn bits_allocated(&self) -> Option<u16>;

    fn number_of_frames(&self) -> u32 {
        1
    }

    /// The whole native (non-encapsulated) pixel data value,
    /// or `None` if the pixel data is encapsulated or absent.
    fn native_pixel_data(&self) -> Option<&[u8]>;

    /// The encapsulated pixel data fragments,
    /// or `None` for native pixel data.
    fn fragments(&self) -> Option<&[Vec<u8>]>;

    /// The basic offset table of the encapsulated pixel data,
    /// or `None`/empty if not present.
    fn basic_offset_table(&self) -> Option<&[u32]>;
}

/// Why a frame could not be extracted from a dataset.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ExtractError {
    /// The requested frame offset exceeds the pixel data buffer.
    #[snafu(display("Frame {frame} exceeds the size of the pixel data"))]
    FrameIndexOutOfRange { frame: u32 },

    /// The dataset has no pixel data element.
    #[snafu(display("The dataset does not contain pixel data"))]
    MissingPixelData,

    /// An attribute required for frame addressing is absent.
    #[snafu(display("Missing required attribute `{name}`"))]
    MissingAttribute { name: &'static str },

    /// Frame addressing is not defined for this Bits Allocated.
    #[snafu(display("Unsupported pixel format: {bits_allocated} bits allocated"))]
    UnsupportedPixelFormat { bits_allocated: u16 },

    /// Fragmented multi-frame pixel data cannot be addressed
    /// without a basic offset table.
    #[snafu(display("Fragmented pixel data without a basic offset table"))]
    MissingOffsetTable,
}

/// Extract the encoded bytes of one frame from a parsed dataset.
///
/// Native pixel data is sliced by the frame size derived from the
/// image attributes (single-bit frames are unpacked to one byte per
/// pixel in the process); encapsulated pixel data is resolved through
/// the basic offset table, falling back to a 1:1 frame-to-fragment
/// mapping when the table is empty.
pub fn get_frame_pixel_data(
    doc: &dyn DataSetDocument,
    frame: u32,
) -> Result<Vec<u8>, ExtractError> {
    if doc.fragments().is_some() {
        get_encapsulated_frame(doc, frame)
    } else {
        get_native_frame(doc, frame)
    }
}

fn get_native_frame(doc: &dyn DataSetDocument, frame: u32) -> Result<Vec<u8>, ExtractError> {
    let data = doc.native_pixel_data().context(MissingPixelDataSnafu)?;
    let rows = doc.rows().context(MissingAttributeSnafu { name: "Rows" })? as usize;
    let columns = doc
        .columns()
        .context(MissingAttributeSnafu { name: "Columns" })? as usize;
    let samples_per_pixel = doc.samples_per_pixel().context(MissingAttributeSnafu {
        name: "SamplesPerPixel",
    })? as usize;
    let bits_allocated = doc.bits_allocated().context(MissingAttributeSnafu {
        name: "BitsAllocated",
    })?;

    let pixels_per_frame = rows * columns * samples_per_pixel;
    let frame = frame as usize;

    match bits_allocated {
        8 => slice_frame(data, frame * pixels_per_frame, pixels_per_frame),
        16 => slice_frame(data, frame * pixels_per_frame * 2, pixels_per_frame * 2),
        32 => slice_frame(data, frame * pixels_per_frame * 4, pixels_per_frame * 4),
        1 => {
            let bit_offset = frame * pixels_per_frame;
            let end_byte = (bit_offset + pixels_per_frame + 7) / 8;
            ensure!(
                end_byte <= data.len(),
                FrameIndexOutOfRangeSnafu {
                    frame: frame as u32,
                }
            );
            Ok(unpack_binary_frame(data, bit_offset, pixels_per_frame))
        }
        bits_allocated => UnsupportedPixelFormatSnafu { bits_allocated }.fail(),
    }
}

fn slice_frame(data: &[u8], offset: usize, len: usize) -> Result<Vec<u8>, ExtractError> {
    let end = offset + len;
    ensure!(
        end <= data.len(),
        FrameIndexOutOfRangeSnafu {
            frame: if len == 0 { 0 } else { (offset / len) as u32 },
        }
    );
    Ok(data[offset..end].to_vec())
}

fn get_encapsulated_frame(doc: &dyn DataSetDocument, frame: u32) -> Result<Vec<u8>, ExtractError> {
    let fragments = doc.fragments().context(MissingPixelDataSnafu)?;
    let number_of_frames = doc.number_of_frames();

    ensure!(
        frame < number_of_frames,
        FrameIndexOutOfRangeSnafu { frame }
    );

    let offset_table = doc.basic_offset_table().unwrap_or(&[]);

    if !offset_table.is_empty() {
        // Offsets index the frame's first fragment,
        // measured from the first fragment's item header.
        // Gather every fragment between this frame's offset
        // and the next frame's.
        let base_offset = *offset_table
            .get(frame as usize)
            .context(FrameIndexOutOfRangeSnafu { frame })?
            as usize;
        let next_offset = offset_table.get(frame as usize + 1).map(|&o| o as usize);

        let mut offset = 0;
        let mut frame_data = Vec::new();
        for fragment in fragments {
            if offset >= base_offset {
                frame_data.extend_from_slice(fragment);
            }
            offset += fragment.len() + 8;
            if let Some(next_offset) = next_offset {
                if offset >= next_offset {
                    break;
                }
            }
        }
        return Ok(frame_data);
    }

    // empty offset table
    if fragments.len() as u32 == number_of_frames {
        return Ok(fragments[frame as usize].clone());
    }
    if number_of_frames == 1 {
        // a single frame may span all fragments
        let mut frame_data = Vec::new();
        for fragment in fragments {
            frame_data.extend_from_slice(fragment);
        }
        return Ok(frame_data);
    }

    MissingOffsetTableSnafu.fail()
}
