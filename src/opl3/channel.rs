//! Channel State and Algorithm Routing
//!
//! A channel pairs two slots and, in 4-operator mode, links to a sibling
//! channel to form one voice from four operators. The connection bits pick
//! which operators modulate which and which feed the output mix; this
//! module rewires those graphs whenever the relevant registers change.
//!
//! Routing is expressed as indexed handles: each slot's modulation source
//! and each channel's four output lanes name slot indices, resolved against
//! the chip's slot array when a tick is evaluated. That reproduces the
//! hardware's live-value aliasing (several readers observing one operator's
//! current output) without shared mutable cells.

use super::chip::Opl3;
use super::registers::RhythmFlags;
use super::slot::{ModSource, KEY_DRUM, KEY_NORMAL};

/// How a channel currently participates in voice allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Independent two-operator voice.
    TwoOp,
    /// Leading half of a 4-operator voice (receives register writes).
    FourOpPrimary,
    /// Trailing half of a 4-operator voice (frequency writes ignored).
    FourOpSecondary,
    /// Channels 6-8 while rhythm mode is active.
    Drum,
}

/// One of a channel's four output lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutLane {
    /// Lane unused by the current algorithm.
    Silent,
    /// Lane carries the live output of a slot.
    Slot(usize),
}

/// One of the 18 channels.
#[derive(Debug, Clone, Copy)]
pub struct Channel {
    /// Indices of the channel's two slots.
    pub(crate) slots: [usize; 2],
    /// Sibling channel for 4-operator pairing. Only the first six channels
    /// of each bank have one.
    pub(crate) pair: Option<usize>,
    /// Output lanes summed into the stereo mix.
    pub(crate) out: [OutLane; 4],
    /// Current voice-allocation role.
    pub(crate) kind: ChannelKind,
    /// Channel index (0-17).
    pub(crate) num: usize,
    /// 10-bit frequency number.
    pub(crate) f_num: u16,
    /// Octave/block, 3 bits.
    pub(crate) block: u8,
    /// Feedback amount for the first slot, 3 bits.
    pub(crate) fb: u8,
    /// Connection bit from register 0xC0.
    pub(crate) con: bool,
    /// Derived algorithm selector (combines both connection bits and the
    /// channel's 4-op role).
    pub(crate) alg: u8,
    /// Key-scale value derived from block and frequency.
    pub(crate) ksv: u8,
    /// Left output mask: 0xFFFF when routed left, 0 otherwise.
    pub(crate) cha: u16,
    /// Right output mask.
    pub(crate) chb: u16,
}

impl Channel {
    /// Create channel `num` with its fixed slot pair and sibling link.
    pub(crate) fn new(num: usize) -> Self {
        let first = super::tables::CH_SLOT[num] as usize;
        let bank_pos = num % 9;
        let pair = if bank_pos < 3 {
            Some(num + 3)
        } else if bank_pos < 6 {
            Some(num - 3)
        } else {
            None
        };
        Channel {
            slots: [first, first + 3],
            pair,
            out: [OutLane::Silent; 4],
            kind: ChannelKind::TwoOp,
            num,
            f_num: 0,
            block: 0,
            fb: 0,
            con: false,
            alg: 0,
            ksv: 0,
            cha: 0xffff,
            chb: 0xffff,
        }
    }
}

impl Opl3 {
    /// Rewire a channel's operator graph from its current algorithm nibble.
    pub(crate) fn channel_setup_alg(&mut self, ch: usize) {
        let channel = self.channels[ch];
        let [s0, s1] = channel.slots;
        if channel.kind == ChannelKind::Drum {
            if channel.num == 7 || channel.num == 8 {
                // Hi-hat/snare and tom/cymbal run without modulators
                self.slots[s0].mod_source = ModSource::Zero;
                self.slots[s1].mod_source = ModSource::Zero;
                return;
            }
            // Bass drum keeps its 2-op wiring
            match channel.alg & 0x01 {
                0x00 => {
                    self.slots[s0].mod_source = ModSource::OwnFeedback;
                    self.slots[s1].mod_source = ModSource::Slot(s0);
                }
                _ => {
                    self.slots[s0].mod_source = ModSource::OwnFeedback;
                    self.slots[s1].mod_source = ModSource::Zero;
                }
            }
            return;
        }
        if channel.alg & 0x08 != 0 {
            // Trailing half of a 4-op voice; the leading half owns the graph
            return;
        }
        if channel.alg & 0x04 != 0 {
            let pair = match channel.pair {
                Some(p) => p,
                None => return,
            };
            let [p0, p1] = self.channels[pair].slots;
            self.channels[pair].out = [OutLane::Silent; 4];
            match channel.alg & 0x03 {
                0x00 => {
                    self.slots[p0].mod_source = ModSource::OwnFeedback;
                    self.slots[p1].mod_source = ModSource::Slot(p0);
                    self.slots[s0].mod_source = ModSource::Slot(p1);
                    self.slots[s1].mod_source = ModSource::Slot(s0);
                    self.channels[ch].out =
                        [OutLane::Slot(s1), OutLane::Silent, OutLane::Silent, OutLane::Silent];
                }
                0x01 => {
                    self.slots[p0].mod_source = ModSource::OwnFeedback;
                    self.slots[p1].mod_source = ModSource::Slot(p0);
                    self.slots[s0].mod_source = ModSource::Zero;
                    self.slots[s1].mod_source = ModSource::Slot(s0);
                    self.channels[ch].out =
                        [OutLane::Slot(p1), OutLane::Slot(s1), OutLane::Silent, OutLane::Silent];
                }
                0x02 => {
                    self.slots[p0].mod_source = ModSource::OwnFeedback;
                    self.slots[p1].mod_source = ModSource::Zero;
                    self.slots[s0].mod_source = ModSource::Slot(p1);
                    self.slots[s1].mod_source = ModSource::Slot(s0);
                    self.channels[ch].out =
                        [OutLane::Slot(p0), OutLane::Slot(s1), OutLane::Silent, OutLane::Silent];
                }
                _ => {
                    self.slots[p0].mod_source = ModSource::OwnFeedback;
                    self.slots[p1].mod_source = ModSource::Zero;
                    self.slots[s0].mod_source = ModSource::Slot(p1);
                    self.slots[s1].mod_source = ModSource::Zero;
                    self.channels[ch].out =
                        [OutLane::Slot(p0), OutLane::Slot(s0), OutLane::Slot(s1), OutLane::Silent];
                }
            }
        } else {
            match channel.alg & 0x01 {
                0x00 => {
                    // FM chain: first slot modulates the second
                    self.slots[s0].mod_source = ModSource::OwnFeedback;
                    self.slots[s1].mod_source = ModSource::Slot(s0);
                    self.channels[ch].out =
                        [OutLane::Slot(s1), OutLane::Silent, OutLane::Silent, OutLane::Silent];
                }
                _ => {
                    // Additive: both slots feed the mix
                    self.slots[s0].mod_source = ModSource::OwnFeedback;
                    self.slots[s1].mod_source = ModSource::Zero;
                    self.channels[ch].out =
                        [OutLane::Slot(s0), OutLane::Slot(s1), OutLane::Silent, OutLane::Silent];
                }
            }
        }
    }

    /// Register 0xA0: frequency number low byte.
    pub(crate) fn channel_write_freq_low(&mut self, ch: usize, data: u8) {
        if self.new_mode && self.channels[ch].kind == ChannelKind::FourOpSecondary {
            return;
        }
        let channel = &mut self.channels[ch];
        channel.f_num = (channel.f_num & 0x300) | data as u16;
        channel.ksv = (channel.block << 1)
            | (((channel.f_num >> (0x09 - self.note_select)) & 0x01) as u8);
        self.channel_update_ksl(ch);
        if self.new_mode && self.channels[ch].kind == ChannelKind::FourOpPrimary {
            if let Some(pair) = self.channels[ch].pair {
                self.channels[pair].f_num = self.channels[ch].f_num;
                self.channels[pair].ksv = self.channels[ch].ksv;
                self.channel_update_ksl(pair);
            }
        }
    }

    /// Register 0xB0: frequency number high bits and block. The key-on bit
    /// is handled separately by the register dispatcher.
    pub(crate) fn channel_write_freq_high(&mut self, ch: usize, data: u8) {
        if self.new_mode && self.channels[ch].kind == ChannelKind::FourOpSecondary {
            return;
        }
        let channel = &mut self.channels[ch];
        channel.f_num = (channel.f_num & 0xff) | (((data & 0x03) as u16) << 8);
        channel.block = (data >> 2) & 0x07;
        channel.ksv = (channel.block << 1)
            | (((channel.f_num >> (0x09 - self.note_select)) & 0x01) as u8);
        self.channel_update_ksl(ch);
        if self.new_mode && self.channels[ch].kind == ChannelKind::FourOpPrimary {
            if let Some(pair) = self.channels[ch].pair {
                self.channels[pair].f_num = self.channels[ch].f_num;
                self.channels[pair].block = self.channels[ch].block;
                self.channels[pair].ksv = self.channels[ch].ksv;
                self.channel_update_ksl(pair);
            }
        }
    }

    /// Register 0xC0: feedback amount, connection bit and output masks.
    pub(crate) fn channel_write_feedback(&mut self, ch: usize, data: u8) {
        let con = data & 0x01 != 0;
        self.channels[ch].fb = (data & 0x0e) >> 1;
        self.channels[ch].con = con;
        self.channels[ch].alg = con as u8;
        let kind = self.channels[ch].kind;
        let pair = self.channels[ch].pair;
        if self.new_mode {
            match (kind, pair) {
                (ChannelKind::FourOpPrimary, Some(pair)) => {
                    let pair_con = self.channels[pair].con;
                    self.channels[pair].alg = 0x04 | ((con as u8) << 1) | pair_con as u8;
                    self.channels[ch].alg = 0x08;
                    self.channel_setup_alg(pair);
                }
                (ChannelKind::FourOpSecondary, Some(pair)) => {
                    let pair_con = self.channels[pair].con;
                    self.channels[ch].alg = 0x04 | ((pair_con as u8) << 1) | con as u8;
                    self.channels[pair].alg = 0x08;
                    self.channel_setup_alg(ch);
                }
                _ => self.channel_setup_alg(ch),
            }
            self.channels[ch].cha = if (data >> 4) & 0x01 != 0 { 0xffff } else { 0 };
            self.channels[ch].chb = if (data >> 5) & 0x01 != 0 { 0xffff } else { 0 };
        } else {
            self.channel_setup_alg(ch);
            self.channels[ch].cha = 0xffff;
            self.channels[ch].chb = 0xffff;
        }
    }

    /// Key a channel's voice on (all participating slots).
    pub(crate) fn channel_key_on(&mut self, ch: usize) {
        let channel = self.channels[ch];
        if self.new_mode {
            match channel.kind {
                ChannelKind::FourOpPrimary => {
                    self.slots[channel.slots[0]].key_on(KEY_NORMAL);
                    self.slots[channel.slots[1]].key_on(KEY_NORMAL);
                    if let Some(pair) = channel.pair {
                        let pair = self.channels[pair];
                        self.slots[pair.slots[0]].key_on(KEY_NORMAL);
                        self.slots[pair.slots[1]].key_on(KEY_NORMAL);
                    }
                }
                ChannelKind::TwoOp | ChannelKind::Drum => {
                    self.slots[channel.slots[0]].key_on(KEY_NORMAL);
                    self.slots[channel.slots[1]].key_on(KEY_NORMAL);
                }
                ChannelKind::FourOpSecondary => {}
            }
        } else {
            self.slots[channel.slots[0]].key_on(KEY_NORMAL);
            self.slots[channel.slots[1]].key_on(KEY_NORMAL);
        }
    }

    /// Key a channel's voice off.
    pub(crate) fn channel_key_off(&mut self, ch: usize) {
        let channel = self.channels[ch];
        if self.new_mode {
            match channel.kind {
                ChannelKind::FourOpPrimary => {
                    self.slots[channel.slots[0]].key_off(KEY_NORMAL);
                    self.slots[channel.slots[1]].key_off(KEY_NORMAL);
                    if let Some(pair) = channel.pair {
                        let pair = self.channels[pair];
                        self.slots[pair.slots[0]].key_off(KEY_NORMAL);
                        self.slots[pair.slots[1]].key_off(KEY_NORMAL);
                    }
                }
                ChannelKind::TwoOp | ChannelKind::Drum => {
                    self.slots[channel.slots[0]].key_off(KEY_NORMAL);
                    self.slots[channel.slots[1]].key_off(KEY_NORMAL);
                }
                ChannelKind::FourOpSecondary => {}
            }
        } else {
            self.slots[channel.slots[0]].key_off(KEY_NORMAL);
            self.slots[channel.slots[1]].key_off(KEY_NORMAL);
        }
    }

    /// Register 0x104: the six 4-operator pairing enable bits.
    pub(crate) fn channel_set_4op(&mut self, data: u8) {
        for bit in 0..6usize {
            let ch = if bit >= 3 { bit + 9 - 3 } else { bit };
            if (data >> bit) & 0x01 != 0 {
                self.channels[ch].kind = ChannelKind::FourOpPrimary;
                self.channels[ch + 3].kind = ChannelKind::FourOpSecondary;
            } else {
                self.channels[ch].kind = ChannelKind::TwoOp;
                self.channels[ch + 3].kind = ChannelKind::TwoOp;
            }
        }
    }

    /// Register 0xBD: rhythm mode control.
    ///
    /// Entering rhythm mode rewires channels 6-8 into the fixed percussion
    /// graph and keys the five drums from bits 0-4; leaving it restores
    /// normal 2-op wiring and drops all drum key-ons.
    pub(crate) fn channel_update_rhythm(&mut self, data: u8) {
        self.rhythm = RhythmFlags::from_bits_truncate(data & 0x3f);
        if self.rhythm.contains(RhythmFlags::ENABLE) {
            let [c6s0, c6s1] = self.channels[6].slots;
            let [c7s0, c7s1] = self.channels[7].slots;
            let [c8s0, c8s1] = self.channels[8].slots;
            self.channels[6].out =
                [OutLane::Slot(c6s1), OutLane::Slot(c6s1), OutLane::Silent, OutLane::Silent];
            self.channels[7].out =
                [OutLane::Slot(c7s0), OutLane::Slot(c7s0), OutLane::Slot(c7s1), OutLane::Slot(c7s1)];
            self.channels[8].out =
                [OutLane::Slot(c8s0), OutLane::Slot(c8s0), OutLane::Slot(c8s1), OutLane::Slot(c8s1)];
            for ch in 6..9 {
                self.channels[ch].kind = ChannelKind::Drum;
            }
            self.channel_setup_alg(6);
            self.channel_setup_alg(7);
            self.channel_setup_alg(8);
            let drums = [
                (RhythmFlags::HI_HAT, c7s0),
                (RhythmFlags::TOP_CYMBAL, c8s1),
                (RhythmFlags::TOM_TOM, c8s0),
                (RhythmFlags::SNARE_DRUM, c7s1),
            ];
            for (flag, slot) in drums {
                if self.rhythm.contains(flag) {
                    self.slots[slot].key_on(KEY_DRUM);
                } else {
                    self.slots[slot].key_off(KEY_DRUM);
                }
            }
            // Bass drum keys both of channel 6's slots
            if self.rhythm.contains(RhythmFlags::BASS_DRUM) {
                self.slots[c6s0].key_on(KEY_DRUM);
                self.slots[c6s1].key_on(KEY_DRUM);
            } else {
                self.slots[c6s0].key_off(KEY_DRUM);
                self.slots[c6s1].key_off(KEY_DRUM);
            }
        } else {
            for ch in 6..9 {
                self.channels[ch].kind = ChannelKind::TwoOp;
                self.channel_setup_alg(ch);
                let [s0, s1] = self.channels[ch].slots;
                self.slots[s0].key_off(KEY_DRUM);
                self.slots[s1].key_off(KEY_DRUM);
            }
        }
    }

    /// Refresh both slots' key-scale-level attenuation after a frequency
    /// change.
    fn channel_update_ksl(&mut self, ch: usize) {
        let Channel {
            slots,
            f_num,
            block,
            ..
        } = self.channels[ch];
        self.slots[slots[0]].update_ksl(f_num, block);
        self.slots[slots[1]].update_ksl(f_num, block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_pairing_links() {
        for num in 0..18 {
            let ch = Channel::new(num);
            match num % 9 {
                0..=2 => assert_eq!(ch.pair, Some(num + 3), "channel {}", num),
                3..=5 => assert_eq!(ch.pair, Some(num - 3), "channel {}", num),
                _ => assert_eq!(ch.pair, None, "channel {}", num),
            }
        }
    }

    #[test]
    fn test_channel_slot_spacing() {
        for num in 0..18 {
            let ch = Channel::new(num);
            assert_eq!(ch.slots[1], ch.slots[0] + 3, "channel {}", num);
        }
    }

    #[test]
    fn test_fm_chain_routing() {
        let mut chip = Opl3::new(44_100);
        chip.apply_register_write(0xc0, 0x00);
        let [s0, s1] = chip.channels[0].slots;
        assert_eq!(chip.slots[s0].mod_source, ModSource::OwnFeedback);
        assert_eq!(chip.slots[s1].mod_source, ModSource::Slot(s0));
        assert_eq!(chip.channels[0].out[0], OutLane::Slot(s1));
        assert_eq!(chip.channels[0].out[1], OutLane::Silent);
    }

    #[test]
    fn test_additive_routing() {
        let mut chip = Opl3::new(44_100);
        chip.apply_register_write(0xc0, 0x01);
        let [s0, s1] = chip.channels[0].slots;
        assert_eq!(chip.slots[s1].mod_source, ModSource::Zero);
        assert_eq!(chip.channels[0].out[0], OutLane::Slot(s0));
        assert_eq!(chip.channels[0].out[1], OutLane::Slot(s1));
    }

    #[test]
    fn test_legacy_mode_routes_both_sides() {
        let mut chip = Opl3::new(44_100);
        chip.apply_register_write(0xc0, 0x30); // left/right bits ignored without OPL3 mode
        assert_eq!(chip.channels[0].cha, 0xffff);
        assert_eq!(chip.channels[0].chb, 0xffff);
    }

    #[test]
    fn test_opl3_mode_output_masks() {
        let mut chip = Opl3::new(44_100);
        chip.apply_register_write(0x105, 0x01);
        chip.apply_register_write(0xc0, 0x10); // left only
        assert_eq!(chip.channels[0].cha, 0xffff);
        assert_eq!(chip.channels[0].chb, 0x0000);
        chip.apply_register_write(0xc0, 0x20); // right only
        assert_eq!(chip.channels[0].cha, 0x0000);
        assert_eq!(chip.channels[0].chb, 0xffff);
    }

    #[test]
    fn test_four_op_enable_pairs_channels() {
        let mut chip = Opl3::new(44_100);
        chip.apply_register_write(0x105, 0x01);
        chip.apply_register_write(0x104, 0x01);
        assert_eq!(chip.channels[0].kind, ChannelKind::FourOpPrimary);
        assert_eq!(chip.channels[3].kind, ChannelKind::FourOpSecondary);
        assert_eq!(chip.channels[1].kind, ChannelKind::TwoOp);
        chip.apply_register_write(0x104, 0x00);
        assert_eq!(chip.channels[0].kind, ChannelKind::TwoOp);
        assert_eq!(chip.channels[3].kind, ChannelKind::TwoOp);
    }

    #[test]
    fn test_four_op_algorithm_wires_across_pair() {
        let mut chip = Opl3::new(44_100);
        chip.apply_register_write(0x105, 0x01);
        chip.apply_register_write(0x104, 0x01);
        // con=0 on both halves: single FM chain through all four slots
        chip.apply_register_write(0xc0, 0x00);
        chip.apply_register_write(0xc3, 0x00);
        let [p0, p1] = chip.channels[0].slots;
        let [s0, s1] = chip.channels[3].slots;
        assert_eq!(chip.slots[p0].mod_source, ModSource::OwnFeedback);
        assert_eq!(chip.slots[p1].mod_source, ModSource::Slot(p0));
        assert_eq!(chip.slots[s0].mod_source, ModSource::Slot(p1));
        assert_eq!(chip.slots[s1].mod_source, ModSource::Slot(s0));
        assert_eq!(chip.channels[3].out[0], OutLane::Slot(s1));
        assert_eq!(chip.channels[0].out, [OutLane::Silent; 4]);
    }

    #[test]
    fn test_secondary_channel_ignores_frequency_writes() {
        let mut chip = Opl3::new(44_100);
        chip.apply_register_write(0x105, 0x01);
        chip.apply_register_write(0x104, 0x01);
        chip.apply_register_write(0xa0, 0x98); // primary
        chip.apply_register_write(0xa3, 0x42); // secondary: ignored
        assert_eq!(chip.channels[3].f_num, 0x98, "pair mirrors the primary");
    }

    #[test]
    fn test_rhythm_mode_rewires_and_restores() {
        let mut chip = Opl3::new(44_100);
        chip.apply_register_write(0xbd, 0x20);
        assert_eq!(chip.channels[6].kind, ChannelKind::Drum);
        let [c7s0, c7s1] = chip.channels[7].slots;
        assert_eq!(chip.slots[c7s0].mod_source, ModSource::Zero);
        assert_eq!(chip.slots[c7s1].mod_source, ModSource::Zero);
        assert_eq!(chip.channels[7].out[2], OutLane::Slot(c7s1));
        chip.apply_register_write(0xbd, 0x00);
        assert_eq!(chip.channels[6].kind, ChannelKind::TwoOp);
        assert_eq!(chip.channels[7].out[0], OutLane::Slot(c7s1));
    }

    #[test]
    fn test_drum_bits_key_slots() {
        let mut chip = Opl3::new(44_100);
        chip.apply_register_write(0xbd, 0x30); // rhythm + bass drum
        let [c6s0, c6s1] = chip.channels[6].slots;
        assert_ne!(chip.slots[c6s0].key, 0);
        assert_ne!(chip.slots[c6s1].key, 0);
        chip.apply_register_write(0xbd, 0x20);
        assert_eq!(chip.slots[c6s0].key, 0);
        assert_eq!(chip.slots[c6s1].key, 0);
    }
}
