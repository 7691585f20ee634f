use thiserror::Error;

pub type Result<T, E = CodecError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unknown content encoding: {0}")]
    UnknownEncoding(String),

    #[error("Unknown mime type: {0}")]
    UnknownMimeType(String),

    #[error("Malformed schema version: {0}")]
    MalformedVersion(String),

    #[error("Failed to compress payload.")]
    CompressFailure(#[source] anyhow::Error),

    #[error("Failed to decompress payload.")]
    DecompressFailure(#[source] anyhow::Error),

    #[error("Failed to encode document.")]
    EncodeFailure(#[source] anyhow::Error),

    #[error("Failed to decode archive.")]
    DecodeFailure(#[source] anyhow::Error),

    #[error("Malformed XML archive: {0}")]
    MalformedXml(String),
}
