//! YMF262 (OPL3) Emulation Domain
//!
//! Core Yamaha YMF262 FM synthesis emulation: envelope and phase generation
//! per operator, channel algorithm routing, rhythm mode, the buffered
//! register-write scheduler, and output resampling.
//!
//! Implementation:
//! - `chip` - Chip aggregate, per-tick evaluation loop and resampler
//! - `slot` - Operator state: envelope generator and register fields
//! - `channel` - Channel state and algorithm (operator graph) routing
//! - `registers` - Register address decoding
//! - `waveform` - The eight OPL3 waveform transforms
//! - `tables` - Log-sine/exponential ROMs and rate tables

// Internal modules
pub mod channel;
pub mod chip;
pub mod registers;
pub mod slot;
pub mod tables;
pub mod waveform;

// Re-export public API
pub use chip::Opl3;
pub use registers::{decode, RegTarget, RhythmFlags};
