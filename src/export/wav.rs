//! WAV file export

use super::ExportConfig;
use crate::replayer::{ImfPlayer, SongInfo};
use crate::Result;
use std::path::Path;

/// Render the player's whole song to a 16-bit stereo WAV file.
///
/// # Examples
///
/// ```no_run
/// use opl3::export::export_to_wav;
/// use opl3::replayer::{ImfPlayer, IMF_RATE_WOLF3D};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let data = std::fs::read("song.imf")?;
/// let (mut player, info) = ImfPlayer::load(&data, 44_100, IMF_RATE_WOLF3D)?;
/// export_to_wav(&mut player, &info, "song.wav")?;
/// # Ok(())
/// # }
/// ```
pub fn export_to_wav<P: AsRef<Path>>(
    player: &mut ImfPlayer,
    info: &SongInfo,
    output_path: P,
) -> Result<()> {
    export_to_wav_with_config(player, info, output_path, ExportConfig::default())
}

/// Render the player's whole song to WAV with custom configuration.
pub fn export_to_wav_with_config<P: AsRef<Path>>(
    player: &mut ImfPlayer,
    info: &SongInfo,
    output_path: P,
    config: ExportConfig,
) -> Result<()> {
    let sample_rate = player.chip_mut().sample_rate();
    player.chip_mut().set_volume_boost(config.volume_boost);

    let tail_frames = (config.tail_seconds * sample_rate as f32) as usize;
    let samples = player.generate_samples(info.total_frames() + tail_frames);

    write_wav_file(output_path.as_ref(), &samples, sample_rate)
}

/// Write interleaved stereo PCM16 samples to a WAV file.
fn write_wav_file(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| format!("Failed to create WAV file: {}", e))?;

    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| format!("Failed to write sample: {}", e))?;
    }

    writer
        .finalize()
        .map_err(|e| format!("Failed to finalize WAV file: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_song() -> Vec<u8> {
        let commands: &[(u8, u8, u16)] = &[
            (0x20, 0x01, 0),
            (0x60, 0xf0, 0),
            (0x63, 0xf0, 0),
            (0xa0, 0x98, 0),
            (0xb0, 0x31, 70),
        ];
        let mut data = Vec::new();
        for &(reg, val, delay) in commands {
            data.extend_from_slice(&u16::from_le_bytes([reg, val]).to_le_bytes());
            data.extend_from_slice(&delay.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_export_writes_valid_pcm16_stereo() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("opl3_export_test_{}.wav", std::process::id()));

        let (mut player, info) =
            ImfPlayer::load(&minimal_song(), 44_100, crate::replayer::IMF_RATE_WOLF3D).unwrap();
        export_to_wav(&mut player, &info, &path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.bits_per_sample, 16);
        let expected = (info.total_frames() + 11_025) * 2;
        assert_eq!(reader.len() as usize, expected);

        std::fs::remove_file(&path).ok();
    }
}
