//! IMF Replayer
//!
//! Drives an [`Opl3`] chip from a parsed [`ImfSong`], applying each
//! register write through the chip's buffered path and generating audio in
//! whole song-clock ticks. The chip keeps ringing after the last command,
//! so requesting more audio than the song holds yields its natural decay
//! tail rather than a hard cut.

use crate::imf::ImfSong;
use crate::opl3::Opl3;
use crate::{Opl3Error, Result};

/// Song clock of Wolfenstein 3D era IMF files.
pub const IMF_RATE_WOLF3D: u32 = 700;

/// Song clock of earlier id titles (Commander Keen, Bio Menace).
pub const IMF_RATE_KEEN: u32 = 560;

/// Summary information returned after loading song data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SongInfo {
    /// Number of register-write commands in the song.
    pub command_count: usize,
    /// Song clock in Hz the delays are measured against.
    pub tick_rate: u32,
    /// Output frames generated per song-clock tick.
    pub samples_per_tick: u32,
    /// Total song-clock ticks covered by the command stream.
    pub total_ticks: u64,
}

impl SongInfo {
    /// Total output frames the command stream encodes.
    pub fn total_frames(&self) -> usize {
        (self.total_ticks as usize).saturating_mul(self.samples_per_tick as usize)
    }
}

/// Plays an IMF command stream through an OPL3 chip.
#[derive(Debug, Clone)]
pub struct ImfPlayer {
    chip: Opl3,
    song: ImfSong,
    samples_per_tick: u32,
    /// Next command to apply.
    position: usize,
    /// Song-clock ticks left before the next command is due.
    pending_ticks: u32,
    /// Frames generated toward the current tick.
    tick_fill: u32,
}

impl ImfPlayer {
    /// Parse `data` and set up playback at `sample_rate` Hz against a song
    /// clock of `tick_rate` Hz.
    pub fn load(data: &[u8], sample_rate: u32, tick_rate: u32) -> Result<(Self, SongInfo)> {
        if tick_rate == 0 || tick_rate > sample_rate {
            return Err(Opl3Error::ConfigError(format!(
                "tick rate {} must be nonzero and at most the sample rate {}",
                tick_rate, sample_rate
            )));
        }
        let song = ImfSong::parse(data)?;
        let samples_per_tick = sample_rate / tick_rate;
        let info = SongInfo {
            command_count: song.commands().len(),
            tick_rate,
            samples_per_tick,
            total_ticks: song.total_ticks(),
        };
        let player = ImfPlayer {
            chip: Opl3::new(sample_rate),
            song,
            samples_per_tick,
            position: 0,
            pending_ticks: 0,
            tick_fill: 0,
        };
        Ok((player, info))
    }

    /// Access the chip, e.g. to set a volume boost before rendering.
    pub fn chip_mut(&mut self) -> &mut Opl3 {
        &mut self.chip
    }

    /// Whether every command has been applied.
    pub fn is_finished(&self) -> bool {
        self.position >= self.song.commands().len() && self.pending_ticks == 0
    }

    /// Generate `frames` interleaved stereo frames, advancing the command
    /// stream as its delays come due.
    pub fn generate_samples(&mut self, frames: usize) -> Vec<i16> {
        let mut out = Vec::with_capacity(frames * 2);
        let mut frame = [0i16; 2];
        for _ in 0..frames {
            if self.tick_fill == 0 {
                self.apply_due_commands();
            }
            self.chip.generate_into(&mut frame);
            out.extend_from_slice(&frame);
            self.tick_fill += 1;
            if self.tick_fill >= self.samples_per_tick {
                self.tick_fill = 0;
                self.pending_ticks = self.pending_ticks.saturating_sub(1);
            }
        }
        out
    }

    /// Render the whole command stream plus a short release tail.
    pub fn render_all(&mut self, info: &SongInfo) -> Vec<i16> {
        let tail = self.chip.sample_rate() as usize / 4;
        self.generate_samples(info.total_frames() + tail)
    }

    /// Apply every command due at the current tick: the write itself, then
    /// any zero-delay writes packed behind it.
    fn apply_due_commands(&mut self) {
        while self.pending_ticks == 0 {
            let Some(command) = self.song.commands().get(self.position) else {
                return;
            };
            self.chip
                .write_register(command.register as u16, command.value);
            self.pending_ticks = command.delay as u32;
            self.position += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a playable IMF: one 2-op voice keyed on, held, then keyed off.
    fn test_song() -> Vec<u8> {
        let commands: &[(u8, u8, u16)] = &[
            (0x20, 0x01, 0),
            (0x40, 0x10, 0),
            (0x60, 0xf0, 0),
            (0x80, 0x77, 0),
            (0x23, 0x01, 0),
            (0x43, 0x00, 0),
            (0x63, 0xf0, 0),
            (0x83, 0x77, 0),
            (0xa0, 0x98, 0),
            (0xb0, 0x31, 350),
            (0xb0, 0x11, 350),
        ];
        let mut data = Vec::new();
        for &(reg, val, delay) in commands {
            data.extend_from_slice(&u16::from_le_bytes([reg, val]).to_le_bytes());
            data.extend_from_slice(&delay.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_load_reports_song_info() {
        let (_, info) = ImfPlayer::load(&test_song(), 44_100, IMF_RATE_WOLF3D).unwrap();
        assert_eq!(info.command_count, 11);
        assert_eq!(info.samples_per_tick, 63);
        assert_eq!(info.total_ticks, 700);
        assert_eq!(info.total_frames(), 700 * 63);
    }

    #[test]
    fn test_generates_requested_frame_count() {
        let (mut player, _) = ImfPlayer::load(&test_song(), 44_100, IMF_RATE_WOLF3D).unwrap();
        let out = player.generate_samples(1000);
        assert_eq!(out.len(), 2000, "interleaved stereo");
    }

    #[test]
    fn test_playback_is_audible_then_finishes() {
        let (mut player, info) = ImfPlayer::load(&test_song(), 44_100, IMF_RATE_WOLF3D).unwrap();
        let out = player.render_all(&info);
        assert!(out.iter().any(|&s| s != 0), "keyed-on song must sound");
        assert!(player.is_finished());
    }

    #[test]
    fn test_zero_delay_commands_apply_in_one_tick() {
        let (mut player, _) = ImfPlayer::load(&test_song(), 44_100, IMF_RATE_WOLF3D).unwrap();
        // First generated frame pulls in every command up to the first
        // nonzero delay, including the key-on
        player.generate_samples(1);
        assert_eq!(player.position, 10);
        assert_eq!(player.pending_ticks, 350);
    }

    #[test]
    fn test_delay_gates_following_commands() {
        let (mut player, info) = ImfPlayer::load(&test_song(), 44_100, IMF_RATE_WOLF3D).unwrap();
        // Render just under the first delay: key-off not yet applied
        player.generate_samples(349 * info.samples_per_tick as usize);
        assert_eq!(player.position, 10);
        // Crossing the delay boundary applies it
        player.generate_samples(2 * info.samples_per_tick as usize);
        assert_eq!(player.position, 11);
    }

    #[test]
    fn test_rejects_bad_tick_rate() {
        assert!(ImfPlayer::load(&test_song(), 44_100, 0).is_err());
        assert!(ImfPlayer::load(&test_song(), 44_100, 96_000).is_err());
    }

    #[test]
    fn test_playback_deterministic() {
        let (mut a, info) = ImfPlayer::load(&test_song(), 44_100, IMF_RATE_WOLF3D).unwrap();
        let (mut b, _) = ImfPlayer::load(&test_song(), 44_100, IMF_RATE_WOLF3D).unwrap();
        assert_eq!(a.render_all(&info), b.render_all(&info));
    }
}
