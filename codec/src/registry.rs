use crate::document::Document;
use crate::errors::{CodecError, Result};
use crate::mime::MimeType;
use crate::version::SchemaVersion;
use crate::xml;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// An archive that maps payload bytes to a [Document] and back.
///
/// Compression is not a codec concern; callers apply
/// [decompress](crate::decompress)/[compress](crate::compress) around the
/// archive.
pub trait ContentCodec: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<(Document, SchemaVersion)>;
    fn write(&self, doc: &Document, version: SchemaVersion) -> Result<Vec<u8>>;
}

/// Maps mime types to their archives.
///
/// Mime types without a registered archive (`Bson`, `Text` by default) are
/// not an error: their payloads simply pass through the broker undecoded.
pub struct CodecRegistry {
    codecs: HashMap<MimeType, Arc<dyn ContentCodec>>,
}

impl CodecRegistry {
    pub fn register(&mut self, mime: MimeType, codec: Arc<dyn ContentCodec>) {
        self.codecs.insert(mime, codec);
    }

    pub fn get(&self, mime: MimeType) -> Option<&Arc<dyn ContentCodec>> {
        self.codecs.get(&mime)
    }

    /// Parses payload bytes with the archive registered for `mime`.
    ///
    /// Returns `Ok(None)` for recognized mime types that carry no archive.
    pub fn parse(&self, mime: MimeType, bytes: &[u8]) -> Result<Option<(Document, SchemaVersion)>> {
        match self.codecs.get(&mime) {
            Some(codec) => codec.parse(bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Serializes a document with the archive registered for `mime`.
    ///
    /// Returns `Ok(None)` for recognized mime types that carry no archive.
    pub fn write(
        &self,
        mime: MimeType,
        doc: &Document,
        version: SchemaVersion,
    ) -> Result<Option<Vec<u8>>> {
        match self.codecs.get(&mime) {
            Some(codec) => codec.write(doc, version).map(Some),
            None => Ok(None),
        }
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let mut registry = Self {
            codecs: HashMap::new(),
        };
        registry.register(MimeType::Binary, Arc::new(BinaryArchive));
        registry.register(MimeType::Json, Arc::new(JsonArchive));
        registry.register(MimeType::Xml, Arc::new(XmlArchive::standard()));
        registry.register(MimeType::ImportedXml, Arc::new(XmlArchive::imported()));
        registry
    }
}

/// MessagePack archive: a two element array of packed schema version and
/// document.
pub struct BinaryArchive;

impl ContentCodec for BinaryArchive {
    fn parse(&self, bytes: &[u8]) -> Result<(Document, SchemaVersion)> {
        let (packed, doc): (u32, Document) =
            rmp_serde::from_slice(bytes).map_err(|e| CodecError::DecodeFailure(e.into()))?;
        Ok((doc, SchemaVersion::from_packed(packed)))
    }

    fn write(&self, doc: &Document, version: SchemaVersion) -> Result<Vec<u8>> {
        rmp_serde::to_vec(&(version.packed(), doc))
            .map_err(|e| CodecError::EncodeFailure(e.into()))
    }
}

#[derive(Serialize)]
struct JsonEnvelopeRef<'a> {
    version: String,
    data: &'a Document,
}

#[derive(Deserialize)]
struct JsonEnvelope {
    #[serde(default)]
    version: Option<String>,
    data: Document,
}

/// JSON archive: `{"version": "M.m", "data": …}`.
pub struct JsonArchive;

impl ContentCodec for JsonArchive {
    fn parse(&self, bytes: &[u8]) -> Result<(Document, SchemaVersion)> {
        let envelope: JsonEnvelope =
            serde_json::from_slice(bytes).map_err(|e| CodecError::DecodeFailure(e.into()))?;
        let version = match envelope.version {
            Some(text) => text.parse()?,
            None => SchemaVersion::default(),
        };
        Ok((envelope.data, version))
    }

    fn write(&self, doc: &Document, version: SchemaVersion) -> Result<Vec<u8>> {
        serde_json::to_vec(&JsonEnvelopeRef {
            version: version.to_string(),
            data: doc,
        })
        .map_err(|e| CodecError::EncodeFailure(e.into()))
    }
}

/// XML archive over the canonical typed-element mapping.
pub struct XmlArchive {
    wrap_root: bool,
}

impl XmlArchive {
    /// Standard archive with a `<document version="M.m">` root wrapper.
    pub fn standard() -> Self {
        Self { wrap_root: true }
    }

    /// Imported variant without the root wrapper; carries no version.
    pub fn imported() -> Self {
        Self { wrap_root: false }
    }
}

impl ContentCodec for XmlArchive {
    fn parse(&self, bytes: &[u8]) -> Result<(Document, SchemaVersion)> {
        xml::parse_document(bytes, self.wrap_root)
    }

    fn write(&self, doc: &Document, version: SchemaVersion) -> Result<Vec<u8>> {
        xml::write_document(doc, version, self.wrap_root)
    }
}
