//! Register Address Decoding
//!
//! The YMF262 exposes two 8-bit register banks selected by a ninth address
//! bit. [`decode`] maps a 9-bit address to the slot, channel, or chip-wide
//! target it controls; everything unmapped decodes to [`RegTarget::Ignored`]
//! and writing it is a silent no-op, exactly as on hardware.

use bitflags::bitflags;

use super::chip::Opl3;
use super::tables::AD_SLOT;

bitflags! {
    /// Rhythm control register (0xBD) bits 0-5.
    ///
    /// Bits 6-7 of the same register set vibrato/tremolo depth and are
    /// handled before the value reaches these flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RhythmFlags: u8 {
        /// Hi-hat key (channel 7, first slot).
        const HI_HAT = 0x01;
        /// Top cymbal key (channel 8, second slot).
        const TOP_CYMBAL = 0x02;
        /// Tom-tom key (channel 8, first slot).
        const TOM_TOM = 0x04;
        /// Snare drum key (channel 7, second slot).
        const SNARE_DRUM = 0x08;
        /// Bass drum key (channel 6, both slots).
        const BASS_DRUM = 0x10;
        /// Master rhythm-mode enable.
        const ENABLE = 0x20;
    }
}

/// Which slot register an address selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotReg {
    /// 0x20-0x35: tremolo/vibrato/sustain/KSR flags and multiplier.
    Control,
    /// 0x40-0x55: key-scale level and total level.
    Levels,
    /// 0x60-0x75: attack and decay rates.
    AttackDecay,
    /// 0x80-0x95: sustain level and release rate.
    SustainRelease,
    /// 0xE0-0xF5: waveform select.
    Waveform,
}

/// Which channel register an address selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelReg {
    /// 0xA0-0xA8: frequency number low byte.
    FreqLow,
    /// 0xB0-0xB8: frequency high bits, block, and the key-on bit.
    FreqHighKey,
    /// 0xC0-0xC8: feedback, connection, and output routing.
    FeedbackConnection,
}

/// Decoded target of a register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegTarget {
    /// Unmapped address; the write is discarded.
    Ignored,
    /// 0x104: 4-operator pairing enable mask.
    FourOpEnable,
    /// 0x105: OPL3 ("new") mode flag.
    Opl3Mode,
    /// 0x08: note-select bit for key-scale derivation.
    NoteSelect,
    /// 0xBD: rhythm control and LFO depths.
    RhythmControl,
    /// A slot register, with the global slot index (0-35).
    Slot(usize, SlotReg),
    /// A channel register, with the global channel index (0-17).
    Channel(usize, ChannelReg),
}

fn slot_target(bank: usize, offset: u8, reg: SlotReg) -> RegTarget {
    match AD_SLOT[(offset & 0x1f) as usize] {
        slot if slot >= 0 => RegTarget::Slot(18 * bank + slot as usize, reg),
        _ => RegTarget::Ignored,
    }
}

fn channel_target(bank: usize, offset: u8, reg: ChannelReg) -> RegTarget {
    match (offset & 0x0f) as usize {
        ch if ch < 9 => RegTarget::Channel(9 * bank + ch, reg),
        _ => RegTarget::Ignored,
    }
}

/// Decode a 9-bit register address into its write target.
pub fn decode(reg: u16) -> RegTarget {
    let bank = ((reg >> 8) & 0x01) as usize;
    let offset = (reg & 0xff) as u8;
    match offset & 0xf0 {
        0x00 => {
            if bank == 1 {
                match offset & 0x0f {
                    0x04 => RegTarget::FourOpEnable,
                    0x05 => RegTarget::Opl3Mode,
                    _ => RegTarget::Ignored,
                }
            } else if offset & 0x0f == 0x08 {
                RegTarget::NoteSelect
            } else {
                RegTarget::Ignored
            }
        }
        0x20 | 0x30 => slot_target(bank, offset, SlotReg::Control),
        0x40 | 0x50 => slot_target(bank, offset, SlotReg::Levels),
        0x60 | 0x70 => slot_target(bank, offset, SlotReg::AttackDecay),
        0x80 | 0x90 => slot_target(bank, offset, SlotReg::SustainRelease),
        0xe0 | 0xf0 => slot_target(bank, offset, SlotReg::Waveform),
        0xa0 => channel_target(bank, offset, ChannelReg::FreqLow),
        0xb0 => {
            if offset == 0xbd && bank == 0 {
                RegTarget::RhythmControl
            } else {
                channel_target(bank, offset, ChannelReg::FreqHighKey)
            }
        }
        0xc0 => channel_target(bank, offset, ChannelReg::FeedbackConnection),
        _ => RegTarget::Ignored,
    }
}

impl Opl3 {
    /// Apply a register write to chip state, immediately.
    ///
    /// This is the unbuffered path used by the write-buffer drain; external
    /// writes go through [`Opl3::write_register`] to get hardware-accurate
    /// settle-time spacing.
    pub(crate) fn apply_register_write(&mut self, reg: u16, value: u8) {
        match decode(reg & 0x1ff) {
            RegTarget::Ignored => {}
            RegTarget::FourOpEnable => self.channel_set_4op(value),
            RegTarget::Opl3Mode => self.new_mode = value & 0x01 != 0,
            RegTarget::NoteSelect => self.note_select = (value >> 6) & 0x01,
            RegTarget::RhythmControl => {
                self.tremolo_shift = (((value >> 7) ^ 1) << 1) + 2;
                self.vib_shift = ((value >> 6) & 0x01) ^ 1;
                self.channel_update_rhythm(value);
            }
            RegTarget::Slot(slot, kind) => match kind {
                SlotReg::Control => self.slots[slot].write_ctl(value),
                SlotReg::Levels => {
                    let channel = self.slots[slot].channel;
                    let (f_num, block) =
                        (self.channels[channel].f_num, self.channels[channel].block);
                    self.slots[slot].write_levels(value, f_num, block);
                }
                SlotReg::AttackDecay => self.slots[slot].write_attack_decay(value),
                SlotReg::SustainRelease => self.slots[slot].write_sustain_release(value),
                SlotReg::Waveform => self.slots[slot].write_waveform(value, self.new_mode),
            },
            RegTarget::Channel(ch, kind) => match kind {
                ChannelReg::FreqLow => self.channel_write_freq_low(ch, value),
                ChannelReg::FreqHighKey => {
                    self.channel_write_freq_high(ch, value);
                    if value & 0x20 != 0 {
                        self.channel_key_on(ch);
                    } else {
                        self.channel_key_off(ch);
                    }
                }
                ChannelReg::FeedbackConnection => self.channel_write_feedback(ch, value),
            },
        }
    }
}
