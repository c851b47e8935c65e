//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`AssetError`] covers all failure modes:
//! - Structural errors: malformed JSON, missing sections or objects,
//!   duplicate identifiers, dangling references
//! - I/O errors: open/read/write failures, short reads
//! - Invariant violations: out-of-range encoded regions, accessor bounds,
//!   size limits
//!
//! All failures are fatal for the operation that detected them; there is no
//! retry or local recovery. Public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, AssetError>`.

use thiserror::Error;

/// The main error type for the asset model.
#[derive(Error, Debug)]
pub enum AssetError {
    // ========================================================================
    // Structural / parse errors
    // ========================================================================
    /// The scene JSON could not be parsed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document root is not a JSON object.
    #[error("JSON document root must be a JSON object")]
    RootNotObject,

    /// A dictionary's backing section is absent from the document.
    #[error("missing section \"{section}\"")]
    MissingSection { section: &'static str },

    /// An id was referenced but has no entry in its section.
    #[error("missing object with id \"{id}\" in \"{section}\"")]
    MissingObject { id: String, section: &'static str },

    /// A section entry exists but is not a JSON object.
    #[error("object with id \"{id}\" is not a JSON object")]
    NotAnObject { id: String },

    /// Two objects with the same id exist in the asset.
    #[error("two objects with the same id \"{id}\" exist")]
    DuplicateId { id: String },

    /// An object's references lead back to itself while it is still being
    /// materialized.
    #[error("object with id \"{id}\" is part of a reference cycle")]
    CyclicReference { id: String },

    /// A base64 data URI payload failed to decode.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A buffer with a stated non-zero length has no uri to load it from.
    #[error("buffer \"{id}\" with non-zero length is missing the \"uri\" attribute")]
    MissingUri { id: String },

    /// A buffer's loaded size disagrees with its stated byteLength.
    #[error("buffer \"{id}\": expected {expected} bytes, but found {found}")]
    SizeMismatch {
        id: String,
        expected: usize,
        found: usize,
    },

    /// An accessor componentType code is not part of the format.
    #[error("unknown component type code {0}")]
    UnknownComponentType(u32),

    /// An accessor type string is not SCALAR/VECn/MATn.
    #[error("unknown element type \"{0}\"")]
    UnknownElementType(String),

    // ========================================================================
    // I/O errors
    // ========================================================================
    /// File or stream I/O error (including short reads).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The scene JSON is shorter than the smallest legal document.
    #[error("no JSON file contents")]
    NoJsonContent,

    /// The scene JSON exceeds the 4 GiB container limit.
    #[error("JSON size greater than 4GB")]
    JsonTooLarge,

    /// The binary container header is malformed.
    #[error("invalid binary header: {reason}")]
    InvalidHeader { reason: &'static str },

    // ========================================================================
    // Invariant violations
    // ========================================================================
    /// An encoded region does not fit inside its buffer.
    #[error(
        "encoded region with offset/length {offset}/{length} is out of range for a buffer of {byte_length} bytes"
    )]
    RegionOutOfRange {
        offset: usize,
        length: usize,
        byte_length: usize,
    },

    /// No encoded region with the given id is marked on the buffer.
    #[error("encoded region with id \"{id}\" not found")]
    RegionNotFound { id: String },

    /// An encoded region was marked with no decoded data.
    #[error("decoded data must be provided when marking an encoded region")]
    EmptyRegionData,

    /// A byte range does not fit the buffer it addresses.
    #[error("byte range {offset}+{len} is out of range for {available} available bytes")]
    OutOfRange {
        offset: usize,
        len: usize,
        available: usize,
    },

    /// A buffer view does not fit inside its buffer.
    #[error(
        "buffer view \"{id}\" with offset/length {offset}/{length} exceeds buffer length {buffer_length}"
    )]
    ViewOutOfRange {
        id: String,
        offset: usize,
        length: usize,
        buffer_length: usize,
    },

    /// An accessor's elements do not fit inside its buffer view.
    #[error(
        "accessor \"{id}\": {count} elements with stride {stride} exceed buffer view length {view_length}"
    )]
    AccessorBounds {
        id: String,
        count: u32,
        stride: usize,
        view_length: usize,
    },

    /// A required reference was never set.
    #[error("required reference is unset: {what}")]
    UnsetReference { what: &'static str },

    /// An accessor element is wider than the requested output type.
    #[error("accessor element of {element} bytes does not fit an output type of {output} bytes")]
    ElementTooLarge { element: usize, output: usize },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AssetError>;
