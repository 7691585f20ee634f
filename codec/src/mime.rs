use crate::errors::{CodecError, Result};
use std::fmt;
use std::str::FromStr;

/// Mime type of a message payload.
///
/// `Bson` and `Text` are recognized on the wire but carry no archive: their
/// payloads pass through the broker untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MimeType {
    Binary,
    Json,
    Bson,
    Xml,
    /// XML without the archive root wrapper, as produced by external tools.
    ImportedXml,
    Text,
}

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Binary => "application/x-sc-bin",
            MimeType::Json => "text/json",
            MimeType::Bson => "application/x-sc-bson",
            MimeType::Xml => "application/x-sc-xml",
            MimeType::ImportedXml => "text/xml",
            MimeType::Text => "text/plain",
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MimeType {
    type Err = CodecError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "application/x-sc-bin" => Ok(MimeType::Binary),
            "text/json" => Ok(MimeType::Json),
            "application/x-sc-bson" => Ok(MimeType::Bson),
            "application/x-sc-xml" => Ok(MimeType::Xml),
            "text/xml" => Ok(MimeType::ImportedXml),
            "text/plain" => Ok(MimeType::Text),
            other => Err(CodecError::UnknownMimeType(other.to_owned())),
        }
    }
}
