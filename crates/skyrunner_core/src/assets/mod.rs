//! Asset data consumed by the renderer
//!
//! File decoding lives with the game; this module only accepts already
//! decoded attribute streams and pixel buffers and shapes them for upload.

pub mod geometry;
pub mod pixels;

pub use geometry::{assemble, widen_indices, Geometry, GeometrySource};
pub use pixels::{CubemapPixels, TexturePixels};

use thiserror::Error;

use crate::render::vulkan::vertex_descriptor::AttributeUsage;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to load asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Index buffers must be 16 or 32 bits wide
    #[error("Unsupported index width: {0} bytes")]
    UnsupportedIndexWidth(u32),

    /// Index data length is not a multiple of the index width
    #[error("{len} bytes of index data is not a whole number of {width}-byte indices")]
    MalformedIndexData {
        /// Data length in bytes
        len: usize,
        /// Index width in bytes
        width: u32,
    },

    /// Index refers past the last vertex
    #[error("Index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index
        index: u32,
        /// Vertices available
        vertex_count: usize,
    },

    /// Attribute streams disagree on the vertex count
    #[error("{usage:?} has {actual} entries, expected {expected}")]
    AttributeCountMismatch {
        /// Stream with the wrong length
        usage: AttributeUsage,
        /// Length of the first non-empty stream
        expected: usize,
        /// Length of this stream
        actual: usize,
    },

    /// Vertex type size does not match the layout stride
    #[error("Vertex layout stride is {expected} bytes but the vertex type is {actual}")]
    StrideMismatch {
        /// Layout stride
        expected: usize,
        /// `size_of` the vertex type
        actual: usize,
    },

    /// Attribute uses a format the assembler cannot write
    #[error("{usage:?} uses unsupported format {format}")]
    UnsupportedAttributeFormat {
        /// Attribute
        usage: AttributeUsage,
        /// Format name
        format: String,
    },

    /// Pixel buffer does not match its dimensions
    #[error("{width}x{height} image needs {expected} bytes, got {actual}")]
    PixelCountMismatch {
        /// Width
        width: u32,
        /// Height
        height: u32,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Cubemap face is not a square of the shared size
    #[error("Cubemap face {index} is {width}x{height}, expected {size}x{size}")]
    CubemapFace {
        /// Face index
        index: usize,
        /// Face width
        width: u32,
        /// Face height
        height: u32,
        /// Size of face 0
        size: u32,
    },

    /// IO error during asset loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
