//! IMF Command-Stream Parsing
//!
//! The id Software "Interactive Music Format" is about as close to the
//! OPL register bus as a music format can get: a flat little-endian stream
//! of `(register, value, delay)` commands, where the delay counts ticks of
//! a fixed song clock (700 Hz for Wolfenstein 3D, 560 Hz for earlier id
//! titles) to wait *after* applying the write.
//!
//! Two container variants exist. "Type 1" files carry a leading 16-bit
//! byte-length header; "type 0" files start straight with command data.
//! Nothing in the file marks which is which, so detection uses the classic
//! checksum heuristic: headered files front-load register bytes (low sums)
//! against delay words, unheadered ones don't.

use crate::{Opl3Error, Result};

/// One register write plus the tick delay that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImfCommand {
    /// Target register (low-bank address).
    pub register: u8,
    /// Value to write.
    pub value: u8,
    /// Song-clock ticks to wait after the write.
    pub delay: u16,
}

/// A parsed IMF song.
#[derive(Debug, Clone)]
pub struct ImfSong {
    commands: Vec<ImfCommand>,
    has_length_header: bool,
}

impl ImfSong {
    /// Parse IMF data, auto-detecting the length-header variant.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Opl3Error::ParseError(format!(
                "IMF data too short: {} bytes",
                data.len()
            )));
        }

        let has_length_header = detect_length_header(data);
        let mut offset = 0usize;
        let command_limit = if has_length_header {
            let byte_len = read_le_u16(data, &mut offset).unwrap_or(0);
            (byte_len >> 2) as usize
        } else {
            usize::MAX
        };

        let mut commands = Vec::new();
        while commands.len() < command_limit {
            let Some(packed) = read_le_u16(data, &mut offset) else {
                break;
            };
            let Some(delay) = read_le_u16(data, &mut offset) else {
                break;
            };
            commands.push(ImfCommand {
                register: (packed & 0xff) as u8,
                value: (packed >> 8) as u8,
                delay,
            });
        }

        if commands.is_empty() {
            return Err(Opl3Error::ParseError(
                "IMF data contains no commands".to_string(),
            ));
        }

        Ok(ImfSong {
            commands,
            has_length_header,
        })
    }

    /// The command sequence in file order.
    pub fn commands(&self) -> &[ImfCommand] {
        &self.commands
    }

    /// Whether the file carried a type-1 length header.
    pub fn has_length_header(&self) -> bool {
        self.has_length_header
    }

    /// Total song-clock ticks spent in delays.
    pub fn total_ticks(&self) -> u64 {
        self.commands.iter().map(|c| c.delay as u64).sum()
    }
}

fn read_le_u16(data: &[u8], offset: &mut usize) -> Option<u16> {
    if *offset + 2 > data.len() {
        return None;
    }
    let value = u16::from_le_bytes([data[*offset], data[*offset + 1]]);
    *offset += 2;
    Some(value)
}

/// Heuristic from K1n9_Duk3's converter: sum the first 42 command words in
/// alternating pairs; a type-1 file's register/value words sum lower than
/// its delay words.
fn detect_length_header(data: &[u8]) -> bool {
    let mut offset = 0usize;
    if read_le_u16(data, &mut offset).is_none() {
        return false;
    }
    let mut sum1: u32 = 0;
    let mut sum2: u32 = 0;
    for _ in 0..42 {
        let Some(a) = read_le_u16(data, &mut offset) else {
            break;
        };
        sum1 += a as u32;
        let Some(b) = read_le_u16(data, &mut offset) else {
            break;
        };
        sum2 += b as u32;
    }
    sum1 > sum2
}
