//! Upload-side byte transformation: optional text re-encoding and gzip.

use std::io::Write;
use std::path::Path;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio_util::io::ReaderStream;

use crate::encoding::TextEncoding;
use crate::{Result, TRACING_TARGET_FS};

/// Default chunk size used when streaming upload bodies.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Flags selecting one of the four transform modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformOptions {
    /// Gzip the (possibly re-encoded) bytes.
    pub compress: bool,
    /// Decode the source as text and re-encode it with [`encoding`](Self::encoding).
    pub treat_as_text: bool,
    /// Target encoding for text mode.
    pub encoding: TextEncoding,
}

impl TransformOptions {
    /// Builds options from an encoding label, failing on unsupported labels.
    pub fn new(compress: bool, treat_as_text: bool, encoding: &str) -> Result<Self> {
        Ok(Self {
            compress,
            treat_as_text,
            encoding: TextEncoding::from_label(encoding)?,
        })
    }

    /// Returns `true` if the transform yields an unchanged file stream.
    pub fn is_passthrough(&self) -> bool {
        !self.compress && !self.treat_as_text
    }
}

/// Result of [`StreamTransformer::transform`].
#[derive(Debug)]
pub enum TransformedStream {
    /// Read-only handle to the untouched source file, read lazily.
    File(tokio::fs::File),
    /// Fully materialized transformed bytes.
    Buffer(Bytes),
}

impl TransformedStream {
    /// Size in bytes, if known without reading.
    #[allow(clippy::len_without_is_empty)]
    pub async fn len(&self) -> Result<u64> {
        match self {
            Self::File(file) => Ok(file.metadata().await?.len()),
            Self::Buffer(bytes) => Ok(bytes.len() as u64),
        }
    }

    /// Splits the body into chunks of at most `chunk_size` bytes.
    pub fn into_chunks(self, chunk_size: usize) -> BoxStream<'static, std::io::Result<Bytes>> {
        let chunk_size = chunk_size.max(1);
        match self {
            Self::File(file) => ReaderStream::with_capacity(file, chunk_size).boxed(),
            Self::Buffer(bytes) => {
                let chunks: Vec<_> = (0..bytes.len())
                    .step_by(chunk_size)
                    .map(|start| Ok(bytes.slice(start..(start + chunk_size).min(bytes.len()))))
                    .collect();
                stream::iter(chunks).boxed()
            }
        }
    }

    /// Reads the whole body into memory.
    pub async fn into_bytes(self) -> Result<Bytes> {
        match self {
            Self::File(mut file) => {
                use tokio::io::AsyncReadExt;

                let mut buffer = Vec::new();
                file.read_to_end(&mut buffer).await?;
                Ok(Bytes::from(buffer))
            }
            Self::Buffer(bytes) => Ok(bytes),
        }
    }
}

/// Produces upload bodies from local files without mutating them.
///
/// | compress | text  | result                                            |
/// |----------|-------|---------------------------------------------------|
/// | false    | false | raw file handle                                   |
/// | false    | true  | text decoded (BOM sniffed) and re-encoded, no BOM |
/// | true     | false | gzip of the raw bytes                             |
/// | true     | true  | gzip of the re-encoded text                       |
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamTransformer;

impl StreamTransformer {
    /// Transforms `source` according to `options`.
    ///
    /// The buffered modes read the file to the end and release the handle
    /// before returning.
    pub async fn transform(source: &Path, options: &TransformOptions) -> Result<TransformedStream> {
        if options.is_passthrough() {
            let file = tokio::fs::File::open(source).await?;
            return Ok(TransformedStream::File(file));
        }

        let raw = tokio::fs::read(source).await?;
        let mut bytes = if options.treat_as_text {
            let text = TextEncoding::decode_detected(&raw);
            options.encoding.encode(&text)
        } else {
            raw
        };

        if options.compress {
            bytes = gzip(&bytes)?;
        }

        tracing::debug!(
            target: TRACING_TARGET_FS,
            source = %source.display(),
            compress = options.compress,
            treat_as_text = options.treat_as_text,
            encoding = options.encoding.name(),
            size = bytes.len(),
            "transformed upload body"
        );

        Ok(TransformedStream::Buffer(Bytes::from(bytes)))
    }
}

/// Gzips `bytes` with the default compression level.
pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Inflates gzip-compressed `bytes`.
pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    use std::io::Read;

    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut output = Vec::new();
    decoder.read_to_end(&mut output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use tempfile::TempDir;

    use super::*;

    const TEXT: &str = "Line one\nZeile zwei: äöü\n第三行\n";

    async fn source_file(dir: &TempDir, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("source.txt");
        tokio::fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn passthrough_returns_file_handle() {
        let dir = TempDir::new().unwrap();
        let path = source_file(&dir, TEXT.as_bytes()).await;

        let options = TransformOptions::new(false, false, "utf-8").unwrap();
        let stream = StreamTransformer::transform(&path, &options).await.unwrap();
        assert!(matches!(stream, TransformedStream::File(_)));
        assert_eq!(stream.len().await.unwrap(), TEXT.len() as u64);
        assert_eq!(stream.into_bytes().await.unwrap(), TEXT.as_bytes());
    }

    #[tokio::test]
    async fn text_mode_reencodes_without_preamble() {
        let dir = TempDir::new().unwrap();
        let path = source_file(&dir, TEXT.as_bytes()).await;

        for label in ["utf-8", "unicode", "bigendianunicode", "utf-32"] {
            let options = TransformOptions::new(false, true, label).unwrap();
            let stream = StreamTransformer::transform(&path, &options).await.unwrap();
            let bytes = stream.into_bytes().await.unwrap();

            assert!(!bytes.starts_with(options.encoding.preamble()));
            assert_eq!(options.encoding.decode(&bytes), TEXT, "{label}");
        }
    }

    #[tokio::test]
    async fn text_mode_sniffs_source_bom() {
        let dir = TempDir::new().unwrap();
        let source = TextEncoding::Utf16Be.encode_with_preamble(TEXT);
        let path = source_file(&dir, &source).await;

        let options = TransformOptions::new(false, true, "utf-8").unwrap();
        let bytes = StreamTransformer::transform(&path, &options)
            .await
            .unwrap()
            .into_bytes()
            .await
            .unwrap();
        assert_eq!(bytes, TEXT.as_bytes());
    }

    #[tokio::test]
    async fn compressed_output_inflates_to_uncompressed_output() {
        let dir = TempDir::new().unwrap();
        let path = source_file(&dir, TEXT.as_bytes()).await;

        for treat_as_text in [false, true] {
            let plain = TransformOptions::new(false, treat_as_text, "unicode").unwrap();
            let packed = TransformOptions::new(true, treat_as_text, "unicode").unwrap();

            let expected = StreamTransformer::transform(&path, &plain)
                .await
                .unwrap()
                .into_bytes()
                .await
                .unwrap();
            let compressed = StreamTransformer::transform(&path, &packed)
                .await
                .unwrap()
                .into_bytes()
                .await
                .unwrap();

            assert_eq!(gunzip(&compressed).unwrap(), expected.as_ref());
        }
    }

    #[tokio::test]
    async fn unsupported_encoding_is_rejected() {
        let err = TransformOptions::new(false, true, "klingon").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Encoding);
        assert!(err.to_string().contains("klingon"));
    }

    #[tokio::test]
    async fn buffer_chunks_cover_all_bytes() {
        let body = TransformedStream::Buffer(Bytes::from_static(b"abcdefghij"));
        let chunks: Vec<Bytes> = body.into_chunks(4).try_collect().await.unwrap();
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }
}
