use crate::config::SplitterConfig;
use crate::types::ChunkDefinition;
use std::path::Path;

/// Splits a document's raw bytes into overlapping chunk definitions.
///
/// Ranges are monotonically increasing in `start`, overlap by at most the
/// configured window, and their union covers the whole document.
pub struct ChunkSplitter {
    config: SplitterConfig,
}

impl ChunkSplitter {
    /// Create a new splitter with configuration
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        config
            .validate()
            .expect("Invalid splitter configuration provided");
        Self { config }
    }

    /// Split a document file into chunk definitions.
    ///
    /// A missing or unreadable source is a soft failure signaled by an empty
    /// list; the orchestrator reacts with a "no content" run status.
    pub async fn split_file(&self, path: impl AsRef<Path>) -> Vec<ChunkDefinition> {
        let path = path.as_ref();
        match tokio::fs::read(path).await {
            Ok(content) => self.split_bytes(path, &content),
            Err(e) => {
                log::warn!("Source not readable for splitting: {}: {e}", path.display());
                Vec::new()
            }
        }
    }

    /// Split raw bytes into chunk definitions referencing `source`
    pub fn split_bytes(&self, source: impl AsRef<Path>, content: &[u8]) -> Vec<ChunkDefinition> {
        let source = source.as_ref();
        let len = content.len();
        if len == 0 {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < len {
            let mut end = (start + self.config.chunk_size).min(len);

            // Snap the boundary to just after the last newline in the
            // trailing window, keeping the hard cutoff when none is found.
            if end < len {
                let window_start = start.max(end.saturating_sub(self.config.newline_window));
                if let Some(pos) = content[window_start..end]
                    .iter()
                    .rposition(|&b| b == b'\n')
                {
                    end = window_start + pos + 1;
                }
            }

            chunks.push(ChunkDefinition::new(source, start, end));

            if end >= len {
                break;
            }

            let mut next = end.saturating_sub(self.config.overlap);

            // Continuation bytes carry the top two bits `10`; a chunk must
            // never begin in the middle of a multi-byte character.
            while next < len && (content[next] & 0xC0) == 0x80 {
                next += 1;
            }

            // Guard against a non-advancing start; validate() makes this
            // unreachable for accepted configurations.
            if next <= start {
                next = end;
            }

            start = next;
        }

        log::debug!(
            "Split {} ({} bytes) into {} chunks",
            source.display(),
            len,
            chunks.len()
        );

        chunks
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &SplitterConfig {
        &self.config
    }
}

impl Default for ChunkSplitter {
    fn default() -> Self {
        Self::new(SplitterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_config() -> SplitterConfig {
        SplitterConfig {
            chunk_size: 100,
            overlap: 20,
            newline_window: 30,
        }
    }

    fn assert_covers(chunks: &[ChunkDefinition], len: usize) {
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks.last().unwrap().end, len);
        for pair in chunks.windows(2) {
            assert!(
                pair[1].start <= pair[0].end,
                "gap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
            assert!(pair[1].start > pair[0].start, "starts must ascend");
        }
    }

    #[test]
    fn test_empty_document() {
        let splitter = ChunkSplitter::new(test_config());
        assert!(splitter.split_bytes("doc.md", b"").is_empty());
    }

    #[test]
    fn test_small_document_single_chunk() {
        let splitter = ChunkSplitter::new(test_config());
        let chunks = splitter.split_bytes("doc.md", b"short text");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].end, 10);
    }

    #[test]
    fn test_coverage_and_overlap() {
        let splitter = ChunkSplitter::new(test_config());
        let content: Vec<u8> = (0..550).map(|i| if i % 40 == 39 { b'\n' } else { b'x' }).collect();

        let chunks = splitter.split_bytes("doc.md", &content);
        assert!(chunks.len() > 1);
        assert_covers(&chunks, content.len());

        for pair in chunks.windows(2) {
            let overlap = pair[0].end - pair[1].start;
            assert!(overlap <= 20, "overlap {overlap} exceeds configured window");
        }
    }

    #[test]
    fn test_snaps_to_newline() {
        let splitter = ChunkSplitter::new(test_config());
        // A newline at byte 90 falls inside the 30-byte trailing window of
        // the tentative cut at 100.
        let mut content = vec![b'a'; 300];
        content[90] = b'\n';

        let chunks = splitter.split_bytes("doc.md", &content);
        assert_eq!(chunks[0].end, 91);
    }

    #[test]
    fn test_hard_cutoff_without_newline() {
        let splitter = ChunkSplitter::new(test_config());
        let content = vec![b'a'; 300];

        let chunks = splitter.split_bytes("doc.md", &content);
        assert_eq!(chunks[0].end, 100);
    }

    #[test]
    fn test_starts_avoid_continuation_bytes() {
        let splitter = ChunkSplitter::new(test_config());
        // Three-byte characters: the hard cutoffs at multiples of 100 and the
        // overlapped starts both land mid-character and must be corrected.
        let text = "€".repeat(300);
        let content = text.as_bytes();

        let chunks = splitter.split_bytes("doc.md", content);
        assert!(chunks.len() > 1);
        assert_covers(&chunks, content.len());

        for chunk in &chunks[1..] {
            assert_ne!(
                content[chunk.start] & 0xC0,
                0x80,
                "chunk start {} points at a continuation byte",
                chunk.start
            );
        }
    }

    #[test]
    fn test_split_idempotent() {
        let splitter = ChunkSplitter::new(test_config());
        let content: Vec<u8> = (0..1000)
            .map(|i| if i % 37 == 0 { b'\n' } else { b'y' })
            .collect();

        let first = splitter.split_bytes("doc.md", &content);
        let second = splitter.split_bytes("doc.md", &content);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_file_yields_empty_list() {
        let splitter = ChunkSplitter::new(test_config());
        let chunks = splitter.split_file("/nonexistent/never.md").await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_split_file_matches_split_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        let content: Vec<u8> = (0..400)
            .map(|i| if i % 25 == 24 { b'\n' } else { b'z' })
            .collect();
        tokio::fs::write(&path, &content).await.unwrap();

        let splitter = ChunkSplitter::new(test_config());
        let from_file = splitter.split_file(&path).await;
        let from_bytes = splitter.split_bytes(&path, &content);
        assert_eq!(from_file, from_bytes);
    }
}
