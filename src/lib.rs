//! YMF262 (OPL3) FM Synthesis Emulator
//!
//! A cycle-accurate emulator of the Yamaha YMF262 (OPL3) FM synthesis chip
//! as found on Sound Blaster and AdLib cards. Feeding it a stream of timed
//! register writes produces the same digital sample sequence the real chip
//! puts on its serial DAC bus.
//!
//! # Features
//! - All 36 operators and 18 channels, including 4-operator pairing
//! - Hardware-exact envelope generator in log-attenuation space
//! - Rhythm mode (bass drum, snare, tom-tom, top cymbal, hi-hat)
//! - Time-stamped write buffer modeling hardware settle time
//! - Fixed-point resampling from the native 49716 Hz rate
//! - IMF command-stream playback and WAV export
//!
//! # Crate feature flags
//! - `emulator` (default): Core YMF262 cycle-accurate emulator
//! - `imf-format` (default): IMF command-stream parsing
//! - `replayer` (default): IMF playback driving the chip at a fixed tick rate
//! - `export` (default): WAV rendering of replayer output
//!
//! # Quick start
//! ## Core emulator only
//! ```no_run
//! use opl3::Opl3;
//! let mut chip = Opl3::new(44_100);
//! chip.write_register(0x20, 0x01); // Modulator: frequency multiplier 1
//! chip.write_register(0x40, 0x10); // Modulator: output level
//! chip.write_register(0x60, 0xF0); // Modulator: fast attack, no decay
//! chip.write_register(0xA0, 0x98); // Frequency number low byte
//! chip.write_register(0xB0, 0x31); // Octave 4, key on
//! let pcm = chip.generate(44_100); // One second of interleaved stereo
//! ```
//!
//! ## Render an IMF song to WAV
//! ```no_run
//! # #[cfg(feature = "export")]
//! # {
//! use opl3::export::export_to_wav;
//! use opl3::replayer::{ImfPlayer, IMF_RATE_WOLF3D};
//!
//! let data = std::fs::read("song.imf").unwrap();
//! let (mut player, info) = ImfPlayer::load(&data, 44_100, IMF_RATE_WOLF3D).unwrap();
//! export_to_wav(&mut player, &info, "song.wav").unwrap();
//! # }
//! ```

#![warn(missing_docs)]

pub mod opl3;

#[cfg(feature = "imf-format")]
pub mod imf;

#[cfg(feature = "replayer")]
pub mod replayer;

#[cfg(feature = "export")]
pub mod export;

/// Error types for OPL3 emulator operations
///
/// The chip core itself never fails: malformed register addresses are inert
/// no-ops and write-buffer overflow is absorbed by forced eviction. These
/// variants cover the surrounding file parsing and export layers.
#[derive(thiserror::Error, Debug)]
pub enum Opl3Error {
    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or truncated input data
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Opl3Error {
    /// Converts a String into `Opl3Error::Other`.
    ///
    /// Convenience conversion for generic string errors. Prefer the specific
    /// variant constructors (`ParseError`, `ConfigError`) where the failure
    /// class is known, so callers can still discriminate.
    fn from(msg: String) -> Self {
        Opl3Error::Other(msg)
    }
}

impl From<&str> for Opl3Error {
    /// Converts a string slice into `Opl3Error::Other`.
    fn from(msg: &str) -> Self {
        Opl3Error::Other(msg.to_string())
    }
}

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, Opl3Error>;

// Public API exports
pub use opl3::Opl3;

#[cfg(feature = "imf-format")]
pub use imf::ImfSong;

#[cfg(feature = "replayer")]
pub use replayer::{ImfPlayer, SongInfo};
