//! Serialization contract between transport clients and the broker.
//!
//! A payload travels as raw bytes tagged with a mime type and a content
//! encoding. The mime type selects an archive (binary, JSON, XML) that maps
//! bytes to a [Document]; the content encoding is a byte-stream filter
//! (identity, deflate, gzip, lz4) applied before the archive on decode and
//! after it on encode.

mod document;
mod encoding;
mod mime;
mod registry;
mod version;
mod xml;

pub mod errors;

pub use document::Document;
pub use encoding::{compress, decompress, ContentEncoding};
pub use mime::MimeType;
pub use registry::{BinaryArchive, CodecRegistry, ContentCodec, JsonArchive, XmlArchive};
pub use version::SchemaVersion;
