//! Audio Export
//!
//! Renders replayer output to audio files. WAV is the only target: the
//! chip already produces interleaved stereo PCM16 at the rate the player
//! was loaded with, so export is little more than a header and a copy.

mod wav;

pub use wav::{export_to_wav, export_to_wav_with_config};

/// Configuration for audio export.
#[derive(Debug, Clone, Copy)]
pub struct ExportConfig {
    /// Volume boost (0-4) applied at the chip's clip stage.
    pub volume_boost: u8,
    /// Extra seconds of release tail rendered after the last command.
    pub tail_seconds: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            volume_boost: 0,
            tail_seconds: 0.25,
        }
    }
}

impl ExportConfig {
    /// Set the volume boost level.
    pub fn volume_boost(mut self, level: u8) -> Self {
        self.volume_boost = level;
        self
    }

    /// Set the release tail length in seconds.
    pub fn tail_seconds(mut self, seconds: f32) -> Self {
        self.tail_seconds = seconds.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.volume_boost, 0);
        assert!(config.tail_seconds > 0.0);
    }

    #[test]
    fn test_config_builders() {
        let config = ExportConfig::default().volume_boost(2).tail_seconds(-1.0);
        assert_eq!(config.volume_boost, 2);
        assert_eq!(config.tail_seconds, 0.0, "negative tail clamps to zero");
    }
}
