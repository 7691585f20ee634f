use crate::errors::{QueueError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::error;
use seisbus_codec::{
    compress, decompress, CodecRegistry, ContentEncoding, Document, MimeType, SchemaVersion,
};

/// Message type. From [Transient](MessageKind::Transient) on, messages bypass
/// the ring and the processing pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageKind {
    #[default]
    Unspecified,
    Regular,
    Transient,
    Status,
}

/// One payload plus its routing and codec metadata.
///
/// A message may live in the ring and be in flight to any number of group
/// members at the same time; the queue shares it behind an `Arc` once it is
/// published.
#[derive(Clone, Debug)]
pub struct Message {
    pub sender: String,
    /// Target group, or client name for peer-to-peer delivery.
    pub target: String,
    pub mime_type: String,
    /// Content encoding name; empty means identity.
    pub encoding: String,
    pub payload: Bytes,
    /// Decoded representation, populated by [decode](Message::decode).
    pub object: Option<Document>,
    pub schema_version: SchemaVersion,
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: MessageKind,
    /// Whether members must not receive their own messages back.
    pub self_discard: bool,
    pub processed: bool,
    pub sequence_number: Option<u64>,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            sender: String::new(),
            target: String::new(),
            mime_type: String::new(),
            encoding: String::new(),
            payload: Bytes::new(),
            object: None,
            schema_version: SchemaVersion::default(),
            timestamp: None,
            kind: MessageKind::Unspecified,
            self_discard: true,
            processed: false,
            sequence_number: None,
        }
    }
}

impl Message {
    pub fn regular(target: &str, payload: impl Into<Bytes>) -> Self {
        Self {
            target: target.to_owned(),
            payload: payload.into(),
            kind: MessageKind::Regular,
            ..Self::default()
        }
    }

    pub fn transient(target: &str, payload: impl Into<Bytes>) -> Self {
        Self {
            target: target.to_owned(),
            payload: payload.into(),
            kind: MessageKind::Transient,
            ..Self::default()
        }
    }

    /// A state-of-health message with a `k=v&…` payload.
    pub fn status(target: &str, payload: impl Into<Bytes>) -> Self {
        Self {
            target: target.to_owned(),
            payload: payload.into(),
            kind: MessageKind::Status,
            ..Self::default()
        }
    }

    /// Skeleton for membership notifications sent on behalf of the broker.
    pub(crate) fn membership(sender: &str, target: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            sender: sender.to_owned(),
            target: target.to_owned(),
            timestamp: Some(timestamp),
            ..Self::default()
        }
    }

    /// Decodes the payload into [object](Message::object) according to mime
    /// type and content encoding.
    ///
    /// A no-op when the object is already present. Mime types without an
    /// archive succeed with the object left unset. On failure the object is
    /// cleared; the message never keeps a half-decoded state.
    pub fn decode(&mut self, registry: &CodecRegistry) -> Result<()> {
        if self.object.is_some() {
            return Ok(());
        }

        let encoding = self
            .content_encoding()
            .ok_or(QueueError::MessageDecodingFailed)?;
        let mime: MimeType = self
            .mime_type
            .parse()
            .map_err(|_| QueueError::MessageDecodingFailed)?;

        self.schema_version = SchemaVersion::default();

        let bytes = decompress(&self.payload, encoding).map_err(|e| {
            error!("message decoding failed: {e}");
            QueueError::MessageDecodingFailed
        })?;

        match registry.parse(mime, &bytes) {
            Ok(Some((object, version))) => {
                self.object = Some(object);
                self.schema_version = version;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                error!("message decoding failed: {e}");
                self.object = None;
                Err(QueueError::MessageDecodingFailed)
            }
        }
    }

    /// Serializes [object](Message::object) into the payload, compressing as
    /// configured. An unset object clears the payload and succeeds.
    pub fn encode(&mut self, registry: &CodecRegistry) -> Result<()> {
        self.payload = Bytes::new();

        let Some(object) = &self.object else {
            return Ok(());
        };

        let encoding = self
            .content_encoding()
            .ok_or(QueueError::MessageEncodingFailed)?;
        let mime: MimeType = self
            .mime_type
            .parse()
            .map_err(|_| QueueError::MessageEncodingFailed)?;

        match registry.write(mime, object, self.schema_version) {
            Ok(Some(bytes)) => {
                let bytes = compress(&bytes, encoding).map_err(|e| {
                    error!("message encoding failed: {e}");
                    QueueError::MessageEncodingFailed
                })?;
                self.payload = bytes.into();
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                error!("message encoding failed: {e}");
                Err(QueueError::MessageEncodingFailed)
            }
        }
    }

    fn content_encoding(&self) -> Option<ContentEncoding> {
        if self.encoding.is_empty() {
            return Some(ContentEncoding::Identity);
        }
        self.encoding.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seisbus_codec::Document;

    fn object() -> Document {
        let mut map = std::collections::BTreeMap::new();
        map.insert("phase".to_owned(), Document::from("P"));
        map.insert("weight".to_owned(), Document::from(1.0));
        Document::Map(map)
    }

    #[test]
    fn encode_decode_round_trip() {
        let registry = CodecRegistry::default();
        let mut msg = Message::regular("PICK", "");
        msg.mime_type = MimeType::Json.as_str().to_owned();
        msg.encoding = "deflate".to_owned();
        msg.object = Some(object());
        msg.schema_version = SchemaVersion::new(0, 12);

        msg.encode(&registry).unwrap();
        assert!(!msg.payload.is_empty());

        msg.object = None;
        msg.decode(&registry).unwrap();
        assert_eq!(msg.object, Some(object()));
        assert_eq!(msg.schema_version, SchemaVersion::new(0, 12));
    }

    #[test]
    fn decode_is_a_no_op_when_object_present() {
        let registry = CodecRegistry::default();
        let mut msg = Message::regular("PICK", "not an archive");
        msg.mime_type = MimeType::Binary.as_str().to_owned();
        msg.object = Some(object());
        assert!(msg.decode(&registry).is_ok());
    }

    #[test]
    fn unknown_mime_or_encoding_fails() {
        let registry = CodecRegistry::default();

        let mut msg = Message::regular("PICK", "x");
        msg.mime_type = "application/acme".to_owned();
        assert_eq!(msg.decode(&registry), Err(QueueError::MessageDecodingFailed));

        let mut msg = Message::regular("PICK", "x");
        msg.mime_type = MimeType::Json.as_str().to_owned();
        msg.encoding = "snappy".to_owned();
        assert_eq!(msg.decode(&registry), Err(QueueError::MessageDecodingFailed));
    }

    #[test]
    fn failed_decode_clears_the_object() {
        let registry = CodecRegistry::default();
        let mut msg = Message::regular("PICK", "{not json");
        msg.mime_type = MimeType::Json.as_str().to_owned();
        assert!(msg.decode(&registry).is_err());
        assert!(msg.object.is_none());
    }

    #[test]
    fn encode_without_object_clears_payload() {
        let registry = CodecRegistry::default();
        let mut msg = Message::regular("PICK", "stale");
        msg.mime_type = MimeType::Json.as_str().to_owned();
        msg.encode(&registry).unwrap();
        assert!(msg.payload.is_empty());
    }

    #[test]
    fn archiveless_mime_passes_through() {
        let registry = CodecRegistry::default();
        let mut msg = Message::regular("PICK", "free text");
        msg.mime_type = MimeType::Text.as_str().to_owned();
        assert!(msg.decode(&registry).is_ok());
        assert!(msg.object.is_none());
        assert_eq!(&msg.payload[..], b"free text");
    }

    #[test]
    fn kind_ordering_marks_unprocessed_types() {
        assert!(MessageKind::Transient >= MessageKind::Transient);
        assert!(MessageKind::Status >= MessageKind::Transient);
        assert!(MessageKind::Regular < MessageKind::Transient);
        assert!(MessageKind::Unspecified < MessageKind::Transient);
    }
}
