//! Text encodings for the upload and download paths.
//!
//! [`TextEncoding`] covers the Unicode encodings (UTF-8, UTF-16, UTF-32) and
//! ASCII natively and delegates legacy code pages to [`encoding_rs`]. Labels
//! are accepted either as names (`utf-8`, `unicode`, `windows-1252`, ...) or as
//! Windows code page numbers (`65001`, `1252`, ...).

mod reconcile;

use std::fmt;

use encoding_rs::{Encoding, EncoderResult};

pub use self::reconcile::reconcile_file_encoding;
use crate::{Error, Result};

/// A resolved text encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    /// UTF-8, also the default when no encoding is given.
    Utf8,
    /// Little-endian UTF-16 (`unicode`).
    Utf16Le,
    /// Big-endian UTF-16 (`bigendianunicode`).
    Utf16Be,
    /// Little-endian UTF-32.
    Utf32Le,
    /// Big-endian UTF-32.
    Utf32Be,
    /// 7-bit US-ASCII.
    Ascii,
    /// Single or multi-byte legacy encoding backed by `encoding_rs`.
    Legacy(&'static Encoding),
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::Utf8
    }
}

impl TextEncoding {
    /// Resolves an encoding label or code page number.
    ///
    /// An empty label resolves to UTF-8. UTF-7 is not supported.
    pub fn from_label(label: &str) -> Result<Self> {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return Ok(Self::Utf8);
        }

        if let Ok(code_page) = trimmed.parse::<u16>() {
            return Self::from_code_page(code_page).ok_or_else(|| Error::encoding(label));
        }

        let lowered = trimmed.to_ascii_lowercase();
        let encoding = match lowered.as_str() {
            "utf-8" | "utf8" => Self::Utf8,
            "unicode" | "utf-16" | "utf-16le" | "utf16" => Self::Utf16Le,
            "bigendianunicode" | "unicodefffe" | "utf-16be" => Self::Utf16Be,
            "utf-32" | "utf-32le" | "utf32" => Self::Utf32Le,
            "utf-32be" => Self::Utf32Be,
            "ascii" | "us-ascii" => Self::Ascii,
            "utf-7" | "utf7" => return Err(Error::encoding(label)),
            other => Encoding::for_label_no_replacement(other.as_bytes())
                .map(Self::from_encoding)
                .ok_or_else(|| Error::encoding(label))?,
        };

        Ok(encoding)
    }

    /// Resolves a stored `Content-Encoding` value as a text encoding.
    ///
    /// Returns `None` for compression codings (`gzip`, ...) and unknown values.
    pub fn from_content_encoding(value: Option<&str>) -> Option<Self> {
        let value = value?.trim();
        let is_compression = ["gzip", "deflate", "br", "compress", "identity", "zstd"]
            .iter()
            .any(|coding| value.eq_ignore_ascii_case(coding));
        if value.is_empty() || is_compression {
            return None;
        }

        Self::from_label(value).ok()
    }

    /// Resolves a Windows code page number.
    pub fn from_code_page(code_page: u16) -> Option<Self> {
        let encoding = match code_page {
            65001 => Self::Utf8,
            1200 => Self::Utf16Le,
            1201 => Self::Utf16Be,
            12000 => Self::Utf32Le,
            12001 => Self::Utf32Be,
            20127 => Self::Ascii,
            874 => Self::Legacy(encoding_rs::WINDOWS_874),
            932 => Self::Legacy(encoding_rs::SHIFT_JIS),
            936 => Self::Legacy(encoding_rs::GBK),
            949 => Self::Legacy(encoding_rs::EUC_KR),
            950 => Self::Legacy(encoding_rs::BIG5),
            20866 => Self::Legacy(encoding_rs::KOI8_R),
            1250..=1258 => Self::from_legacy_label(&format!("windows-{code_page}"))?,
            28591..=28605 => Self::from_legacy_label(&format!("iso-8859-{}", code_page - 28590))?,
            _ => return None,
        };

        Some(encoding)
    }

    fn from_legacy_label(label: &str) -> Option<Self> {
        Encoding::for_label_no_replacement(label.as_bytes()).map(Self::from_encoding)
    }

    fn from_encoding(encoding: &'static Encoding) -> Self {
        if encoding == encoding_rs::UTF_8 {
            Self::Utf8
        } else if encoding == encoding_rs::UTF_16LE {
            Self::Utf16Le
        } else if encoding == encoding_rs::UTF_16BE {
            Self::Utf16Be
        } else {
            Self::Legacy(encoding)
        }
    }

    /// Canonical name, used for comparisons and as the `Content-Encoding` value.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf16Le => "utf-16",
            Self::Utf16Be => "utf-16BE",
            Self::Utf32Le => "utf-32",
            Self::Utf32Be => "utf-32BE",
            Self::Ascii => "us-ascii",
            Self::Legacy(encoding) => encoding.name(),
        }
    }

    /// Byte-order mark written in front of rewritten files.
    pub fn preamble(&self) -> &'static [u8] {
        match self {
            Self::Utf8 => &[0xEF, 0xBB, 0xBF],
            Self::Utf16Le => &[0xFF, 0xFE],
            Self::Utf16Be => &[0xFE, 0xFF],
            Self::Utf32Le => &[0xFF, 0xFE, 0x00, 0x00],
            Self::Utf32Be => &[0x00, 0x00, 0xFE, 0xFF],
            Self::Ascii | Self::Legacy(_) => &[],
        }
    }

    /// Sniffs the encoding of `bytes` from its byte-order mark.
    ///
    /// Returns the encoding and the length of the mark. Without a recognizable
    /// mark the platform default, UTF-8, is assumed.
    pub fn detect(bytes: &[u8]) -> (Self, usize) {
        match bytes {
            [0xFF, 0xFE, 0x00, 0x00, ..] => (Self::Utf32Le, 4),
            [0x00, 0x00, 0xFE, 0xFF, ..] => (Self::Utf32Be, 4),
            [0xEF, 0xBB, 0xBF, ..] => (Self::Utf8, 3),
            [0xFF, 0xFE, ..] => (Self::Utf16Le, 2),
            [0xFE, 0xFF, ..] => (Self::Utf16Be, 2),
            _ => (Self::Utf8, 0),
        }
    }

    /// Decodes `bytes` after skipping a byte-order mark, sniffing the encoding
    /// from that mark.
    pub fn decode_detected(bytes: &[u8]) -> String {
        let (encoding, bom_len) = Self::detect(bytes);
        encoding.decode(&bytes[bom_len..])
    }

    /// Decodes `bytes`, replacing malformed sequences.
    ///
    /// A leading byte-order mark of this encoding is kept as `U+FEFF`; use
    /// [`decode_without_bom`](Self::decode_without_bom) to drop it.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => decode_with(encoding_rs::UTF_8, bytes),
            Self::Utf16Le => decode_with(encoding_rs::UTF_16LE, bytes),
            Self::Utf16Be => decode_with(encoding_rs::UTF_16BE, bytes),
            Self::Utf32Le => decode_utf32(bytes, u32::from_le_bytes),
            Self::Utf32Be => decode_utf32(bytes, u32::from_be_bytes),
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '?' })
                .collect(),
            Self::Legacy(encoding) => decode_with(encoding, bytes),
        }
    }

    /// Decodes `bytes`, dropping this encoding's byte-order mark if present.
    pub fn decode_without_bom(&self, bytes: &[u8]) -> String {
        let preamble = self.preamble();
        match bytes.strip_prefix(preamble) {
            Some(rest) if !preamble.is_empty() => self.decode(rest),
            _ => self.decode(bytes),
        }
    }

    /// Encodes `text` without a byte-order mark.
    ///
    /// Characters the encoding cannot represent are written as `?`.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Self::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Self::Utf32Le => text.chars().flat_map(|c| u32::from(c).to_le_bytes()).collect(),
            Self::Utf32Be => text.chars().flat_map(|c| u32::from(c).to_be_bytes()).collect(),
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Self::Legacy(encoding) => encode_legacy(encoding, text),
        }
    }

    /// Encodes `text` prefixed with this encoding's byte-order mark.
    pub fn encode_with_preamble(&self, text: &str) -> Vec<u8> {
        let mut bytes = self.preamble().to_vec();
        bytes.extend(self.encode(text));
        bytes
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> String {
    encoding.decode_without_bom_handling(bytes).0.into_owned()
}

fn decode_utf32(bytes: &[u8], read: fn([u8; 4]) -> u32) -> String {
    let chunks = bytes.chunks_exact(4);
    let truncated = !chunks.remainder().is_empty();
    let mut text: String = chunks
        .map(|chunk| {
            let unit = read([chunk[0], chunk[1], chunk[2], chunk[3]]);
            char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER)
        })
        .collect();
    if truncated {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

fn encode_legacy(encoding: &'static Encoding, text: &str) -> Vec<u8> {
    let mut encoder = encoding.new_encoder();
    let mut output = Vec::with_capacity(text.len());
    let mut buffer = [0u8; 1024];
    let mut remaining = text;

    loop {
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(remaining, &mut buffer, true);
        output.extend_from_slice(&buffer[..written]);
        remaining = &remaining[read..];

        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(_) => output.push(b'?'),
        }
    }

    output
}
