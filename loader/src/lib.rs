//! Image loading over the pixelpipe decode pipeline.
//!
//! This crate ties the decode pipeline to its collaborators:
//! an HTTP transport fetching source documents by URI,
//! a reference-counted single-flight [dataset cache](cache::DataSetCache),
//! per-frame pixel data [extraction](dataset::get_frame_pixel_data),
//! an asynchronous [decoder service](decode::ImageDecoder)
//! over the worker pool,
//! and the [image assembler](image::create_image)
//! producing the final display-ready value.
//!
//! The byte-stream parser and the metadata provider are consumed as
//! trait interfaces ([`DataSetParser`], [`MetaDataProvider`]);
//! the hosting viewer supplies the implementations.

pub mod cache;
pub mod dataset;
pub mod decode;
pub mod image;
pub mod meta;
pub mod transport;
pub mod wadors;

pub use cache::{
    CacheAction, CacheEvent, CacheInfo, DataSetCache, DataSetLoader, LoadError, LoadedDataSet,
};
pub use dataset::{
    get_frame_pixel_data, DataSetDocument, DataSetParser, DatasetParseError, ExtractError,
};
pub use decode::{DecodeHandle, DecodeJob, DecodeRunner, ImageDecoder};
pub use image::{create_image, AssembleError, DisplayImage};
pub use meta::{
    image_frame_from_metadata, ImagePixelModule, ImagePlaneModule, MetaDataProvider,
    MetadataError, ModalityLutModule, VoiLutModule,
};
pub use transport::{HttpTransport, TransportError, WadoUriLoader};
pub use wadors::{extract_multipart_frame, fetch_frame, MalformedMultipartResponse, MultipartFrame};
