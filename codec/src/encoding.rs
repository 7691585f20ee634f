use crate::errors::{CodecError, Result};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Byte-stream filter applied to a payload independently of its mime type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContentEncoding {
    #[default]
    Identity,
    Deflate,
    GZip,
    Lz4,
}

impl ContentEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Identity => "identity",
            ContentEncoding::Deflate => "deflate",
            ContentEncoding::GZip => "gzip",
            ContentEncoding::Lz4 => "lz4",
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentEncoding {
    type Err = CodecError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "identity" => Ok(ContentEncoding::Identity),
            "deflate" => Ok(ContentEncoding::Deflate),
            "gzip" => Ok(ContentEncoding::GZip),
            "lz4" => Ok(ContentEncoding::Lz4),
            other => Err(CodecError::UnknownEncoding(other.to_owned())),
        }
    }
}

/// Applies the given encoding to a plain byte stream.
pub fn compress(data: &[u8], encoding: ContentEncoding) -> Result<Vec<u8>> {
    match encoding {
        ContentEncoding::Identity => Ok(data.to_vec()),
        ContentEncoding::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            write_all(&mut encoder, data)?;
            encoder
                .finish()
                .map_err(|e| CodecError::CompressFailure(e.into()))
        }
        ContentEncoding::GZip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            write_all(&mut encoder, data)?;
            encoder
                .finish()
                .map_err(|e| CodecError::CompressFailure(e.into()))
        }
        ContentEncoding::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
    }
}

/// Reverses [compress]. Truncated or corrupt input is reported as a
/// decompression failure, never a panic.
pub fn decompress(data: &[u8], encoding: ContentEncoding) -> Result<Vec<u8>> {
    match encoding {
        ContentEncoding::Identity => Ok(data.to_vec()),
        ContentEncoding::Deflate => read_all(ZlibDecoder::new(data)),
        ContentEncoding::GZip => read_all(GzDecoder::new(data)),
        ContentEncoding::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| CodecError::DecompressFailure(e.into())),
    }
}

fn write_all<W: Write>(writer: &mut W, data: &[u8]) -> Result<()> {
    writer
        .write_all(data)
        .map_err(|e| CodecError::CompressFailure(e.into()))
}

fn read_all<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .map_err(|e| CodecError::DecompressFailure(e.into()))?;
    Ok(out)
}
