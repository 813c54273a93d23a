use crate::error::{Result, SplitterError};
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// A half-open byte range `[start, end)` into a document file.
///
/// Definitions are created once per document, are immutable, and are read
/// many times (once per extraction pass, once per analysis pass, once for
/// indexing). The text itself is never carried around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDefinition {
    /// Path of the source file the range points into
    pub source_path: PathBuf,

    /// First byte of the chunk
    pub start: usize,

    /// One past the last byte of the chunk
    pub end: usize,
}

impl ChunkDefinition {
    pub fn new(source_path: impl Into<PathBuf>, start: usize, end: usize) -> Self {
        Self {
            source_path: source_path.into(),
            start,
            end,
        }
    }

    /// Length of the range in bytes
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the range is empty
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Re-open the source file and decode this byte range.
    ///
    /// The overlap window may cut a multi-byte sequence even though chunk
    /// starts are aligned, so invalid sequences are dropped rather than
    /// reported as errors. A file shorter than `end` yields the available
    /// prefix of the range.
    pub async fn read_text(&self) -> Result<String> {
        if self.is_empty() {
            return Ok(String::new());
        }

        let mut file = tokio::fs::File::open(&self.source_path).await?;
        file.seek(SeekFrom::Start(self.start as u64)).await?;

        let mut bytes = Vec::with_capacity(self.len());
        file.take(self.len() as u64).read_to_end(&mut bytes).await?;

        Ok(decode_dropping_invalid(&bytes))
    }

    /// Validate that the range is well-formed against a known document length
    pub fn check_bounds(&self, document_len: usize) -> Result<()> {
        if self.start >= self.end || self.end > document_len {
            return Err(SplitterError::InvalidBoundaries {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Source path as a displayable reference
    pub fn source(&self) -> &Path {
        &self.source_path
    }
}

/// Decode UTF-8 bytes, dropping invalid sequences instead of replacing them.
pub fn decode_dropping_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                break;
            }
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                if let Ok(valid) = std::str::from_utf8(&rest[..valid_up_to]) {
                    out.push_str(valid);
                }
                let skip = match err.error_len() {
                    Some(len) => len,
                    // Truncated sequence at the end of the slice
                    None => rest.len() - valid_up_to,
                };
                rest = &rest[valid_up_to + skip..];
                if rest.is_empty() {
                    break;
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_valid_utf8() {
        assert_eq!(decode_dropping_invalid("hello".as_bytes()), "hello");
        assert_eq!(decode_dropping_invalid("привет".as_bytes()), "привет");
    }

    #[test]
    fn test_decode_drops_invalid_prefix_and_suffix() {
        // "п" is 0xD0 0xBF; a lone continuation byte must be dropped, not
        // replaced with U+FFFD.
        let mut bytes = vec![0xBF];
        bytes.extend_from_slice("abc".as_bytes());
        bytes.push(0xD0);
        assert_eq!(decode_dropping_invalid(&bytes), "abc");
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(decode_dropping_invalid(&[]), "");
    }

    #[tokio::test]
    async fn test_read_text_slices_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        tokio::fs::write(&path, "0123456789").await.unwrap();

        let chunk = ChunkDefinition::new(&path, 2, 6);
        assert_eq!(chunk.read_text().await.unwrap(), "2345");
    }

    #[tokio::test]
    async fn test_read_text_tolerates_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        tokio::fs::write(&path, "abc").await.unwrap();

        let chunk = ChunkDefinition::new(&path, 1, 100);
        assert_eq!(chunk.read_text().await.unwrap(), "bc");
    }

    #[test]
    fn test_check_bounds() {
        let chunk = ChunkDefinition::new("doc.md", 0, 10);
        assert!(chunk.check_bounds(10).is_ok());
        assert!(chunk.check_bounds(5).is_err());

        let empty = ChunkDefinition::new("doc.md", 4, 4);
        assert!(empty.check_bounds(10).is_err());
    }
}
