use serde::{Deserialize, Serialize};

/// Configuration for byte-range document splitting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Target chunk size in bytes (hard upper bound per chunk)
    pub chunk_size: usize,

    /// Number of bytes the next chunk reaches back into the previous one
    pub overlap: usize,

    /// Trailing window, in bytes, searched backward for a newline to snap
    /// the chunk end to a clean line break
    pub newline_window: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 12_000,
            overlap: 1_000,
            newline_window: 500,
        }
    }
}

impl SplitterConfig {
    /// Validate configuration
    ///
    /// The splitter only makes forward progress when a snapped chunk end is
    /// still ahead of the next start, i.e. `chunk_size` must exceed
    /// `overlap + newline_window`.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if self.overlap >= self.chunk_size {
            return Err(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            ));
        }

        if self.overlap + self.newline_window >= self.chunk_size {
            return Err(format!(
                "overlap + newline_window ({}) must be smaller than chunk_size ({})",
                self.overlap + self.newline_window,
                self.chunk_size
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SplitterConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SplitterConfig::default();

        // Invalid: zero chunk size
        config.chunk_size = 0;
        assert!(config.validate().is_err());

        // Invalid: overlap >= chunk_size
        config.chunk_size = 100;
        config.overlap = 100;
        assert!(config.validate().is_err());

        // Invalid: overlap + newline window leaves no room to progress
        config.overlap = 60;
        config.newline_window = 50;
        assert!(config.validate().is_err());

        // Valid configuration
        config.overlap = 10;
        config.newline_window = 20;
        assert!(config.validate().is_ok());
    }
}
