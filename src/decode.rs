//! Turns possibly-encoded flow bytes into canonical JSON bytes.
//!
//! Flows reach us in three shapes: plain JSON, raw gzip, or base64 text
//! wrapping gzip. The file and HTTP transports signal compression
//! differently, so each gets its own way of picking an [`Encoding`].
use std::io::{Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use thiserror::Error;

/// Conventional gzip magic bytes (RFC 1952, offsets 0 and 1).
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Response header telling us the HTTP body is base64(gzip(json)).
pub const FLOW_COMPRESSED_HEADER: &str = "flow-compressed";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(String),

    #[error("gzip stream is empty")]
    Empty,

    #[error("corrupt gzip stream: {0}")]
    Gzip(String),
}

/// How a byte payload is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Already canonical JSON.
    Plain,
    /// Raw gzip bytes.
    Gzip,
    /// Base64 text whose decoded bytes are gzip.
    Base64Gzip,
}

/// Which byte offsets the file transport inspects for the gzip magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GzipSniffing {
    /// `0x1F` at offset 0 and `0x8B` at offset 2.
    ///
    /// This is what deployed flow files have always been checked against, even
    /// though real gzip streams carry `0x8B` at offset 1 (offset 2 is the
    /// compression method, `0x08`). A genuine gzip file is therefore *not*
    /// detected in this mode and falls through to the JSON parser.
    #[default]
    Legacy,
    /// `0x1F 0x8B` at offsets 0 and 1.
    Standard,
}

impl GzipSniffing {
    pub fn matches(&self, bytes: &[u8]) -> bool {
        match self {
            GzipSniffing::Legacy => bytes.len() > 2 && bytes[0] == 0x1f && bytes[2] == 0x8b,
            GzipSniffing::Standard => bytes.starts_with(&GZIP_MAGIC),
        }
    }
}

impl std::str::FromStr for GzipSniffing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(GzipSniffing::Legacy),
            "standard" => Ok(GzipSniffing::Standard),
            other => Err(format!("unknown gzip sniffing mode `{}`", other)),
        }
    }
}

impl Encoding {
    /// File transport: compression is detected from the content itself.
    pub fn sniff_file(bytes: &[u8], sniffing: GzipSniffing) -> Self {
        if sniffing.matches(bytes) {
            Encoding::Gzip
        } else {
            Encoding::Plain
        }
    }

    /// HTTP transport: compression is signalled by the `flow-compressed` header.
    /// Only a case-insensitive `true` counts; anything else (or no header) is plain.
    pub fn from_flow_compressed_header(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("true") => Encoding::Base64Gzip,
            _ => Encoding::Plain,
        }
    }
}

/// Decode `bytes` according to `encoding`, yielding canonical JSON bytes.
pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<Vec<u8>, DecodeError> {
    match encoding {
        Encoding::Plain => Ok(bytes.to_vec()),
        Encoding::Gzip => unzip(bytes),
        Encoding::Base64Gzip => decode_and_unzip(bytes),
    }
}

/// Base64-decode `encoded` and gunzip the result.
///
/// Surrounding whitespace (a trailing newline in an HTTP body, say) is ignored.
/// Malformed base64 is an error rather than an empty buffer.
pub fn decode_and_unzip(encoded: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let decoded = BASE64_STANDARD
        .decode(encoded.trim_ascii())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    unzip(&decoded)
}

/// Fully drain a gzip stream. Empty and truncated streams are errors.
pub fn unzip(compressed: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if compressed.is_empty() {
        return Err(DecodeError::Empty);
    }
    let mut decoder = GzDecoder::new(compressed);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| DecodeError::Gzip(e.to_string()))?;
    Ok(out)
}

/// Inverse of [`decode_and_unzip`]: gzip `json` and base64-encode it.
pub fn zip_and_encode(json: &[u8]) -> Result<String, DecodeError> {
    Ok(BASE64_STANDARD.encode(zip(json)?))
}

/// Gzip `data` with the default compression level.
pub fn zip(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| DecodeError::Gzip(e.to_string()))?;
    encoder.finish().map_err(|e| DecodeError::Gzip(e.to_string()))
}
