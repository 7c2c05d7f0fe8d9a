//! Error types for serializer operations

use std::string::FromUtf8Error;
use thiserror::Error;

/// Error type for registration and (de)serialization.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("stream truncated")]
    StreamTruncated,
    #[error("malformed varint")]
    MalformedVarint,
    #[error("unknown type id: {0}")]
    UnknownTypeId(u32),
    #[error("malformed text: {0}")]
    MalformedText(#[from] FromUtf8Error),
    #[error("invalid data in {0}: {1}")]
    InvalidData(&'static str, String), // context, message
    #[error("extra data found: {0} bytes")]
    ExtraData(usize),
    #[error("type not registered: {0}")]
    UnregisteredType(String),
    #[error("type mismatch: expected {0}")]
    TypeMismatch(&'static str),
    #[error("routine not generated: {0}")]
    MissingRoutine(&'static str),
}
