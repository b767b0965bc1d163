//! B4B1 / PT-style 24 bit PWM remotes
//!
//! Classic garage/doorbell OOK remote: a short sync pulse followed by a
//! silence of 31 clock periods, then 24 PWM-coded bits. A zero is a single
//! clock pulse and three clocks of silence, a one is three clock pulses and
//! one of silence. The whole frame repeats several times per key press.

use crate::bitmap::Bitmap;
use crate::fields::FieldSet;
use crate::linecode::decode_line_code;
use crate::protocols::{render_pattern, MessageInfo, ProtocolDecoder, Synth};
use crate::samples::SampleStream;

/// Nominal symbol clock of these remotes.
pub const CLOCK_US: u32 = 334;

/// How many times a synthesized frame is repeated.
const TX_REPEATS: usize = 4;

/// Sync rendering at clock rate: one pulse, 31 clocks of silence.
const SYNC: &str = "10000000000000000000000000000000";

const SYMBOL_ZERO: &str = "1000";
const SYMBOL_ONE: &str = "1110";

pub struct B4b1;

impl ProtocolDecoder for B4b1 {
    fn name(&self) -> &'static str {
        "b4b1"
    }

    fn decode(&self, bits: &Bitmap, numbits: u32, info: &mut MessageInfo) -> bool {
        if numbits < SYNC.len() as u32 + 24 * 4 {
            return false;
        }
        let off = match bits.seek_bits(0, numbits, SYNC) {
            Some(off) => off,
            None => return false,
        };
        let data_off = off + SYNC.len() as u32;

        let mut raw = Bitmap::new(3);
        let decoded = decode_line_code(
            &mut raw,
            bits,
            data_off,
            numbits,
            SYMBOL_ZERO,
            SYMBOL_ONE,
        );
        if decoded < 24 {
            return false;
        }
        let b = raw.as_bytes();
        let code = (b[0] as u64) << 16 | (b[1] as u64) << 8 | b[2] as u64;

        info.start_off = off;
        info.pulses_count = SYNC.len() as u32 + 24 * 4;
        info.fields.add_hex("code", code, 24);
        true
    }

    fn synth(&self) -> Option<&dyn Synth> {
        Some(self)
    }
}

impl Synth for B4b1 {
    fn describe_fields(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        fields.add_hex("code", 0, 24);
        fields
    }

    fn build_message(&self, fields: &FieldSet, out: &SampleStream) -> bool {
        let code = match fields.get("code").and_then(|f| f.as_u64()) {
            Some(c) if c < 1 << 24 => c,
            _ => return false,
        };
        let mut frame = String::with_capacity(SYNC.len() + 24 * 4);
        frame.push_str(SYNC);
        for bit in (0..24).rev() {
            frame.push_str(if (code >> bit) & 1 != 0 {
                SYMBOL_ONE
            } else {
                SYMBOL_ZERO
            });
        }
        for _ in 0..TX_REPEATS {
            render_pattern(out, &frame, CLOCK_US);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_bits(code: u32) -> Bitmap {
        let mut b = Bitmap::new(64);
        // Some leading noise so the sync is not at offset 0.
        b.set_pattern(0, "0110");
        b.set_pattern(4, SYNC);
        let mut off = 4 + SYNC.len() as u32;
        for bit in (0..24).rev() {
            let sym = if (code >> bit) & 1 != 0 {
                SYMBOL_ONE
            } else {
                SYMBOL_ZERO
            };
            b.set_pattern(off, sym);
            off += 4;
        }
        b
    }

    #[test]
    fn test_decode_known_code() {
        let bits = frame_bits(0xA1B2C3);
        let mut info = MessageInfo::new(CLOCK_US);
        assert!(B4b1.decode(&bits, bits.capacity_bits(), &mut info));
        assert_eq!(info.start_off, 4);
        assert_eq!(info.pulses_count, 128);
        let code = info.fields.get("code").unwrap();
        assert_eq!(code.as_u64(), Some(0xA1B2C3));
        assert_eq!(code.render(), "A1B2C3");
    }

    #[test]
    fn test_rejects_truncated_frame() {
        let bits = frame_bits(0xA1B2C3);
        // Cut the window short of the last data symbol.
        let mut info = MessageInfo::new(CLOCK_US);
        assert!(!B4b1.decode(&bits, 4 + 32 + 23 * 4, &mut info));
    }

    #[test]
    fn test_build_message_round_trips() {
        let mut fields = B4b1.describe_fields();
        fields
            .get_mut("code")
            .unwrap()
            .set_from_str("4D5E6F")
            .unwrap();
        let out = SampleStream::new();
        assert!(B4b1.build_message(&fields, &out));

        // First sample is the sync pulse, then the long sync gap.
        let n = 2 + 24 * 2; // per frame after coalescing: sync + 24 symbols
        let total = n * TX_REPEATS;
        out.center((out.capacity() - total) % out.capacity());
        assert_eq!(out.get(0), (true, CLOCK_US));
        let (level, gap) = out.get(1);
        assert!(!level);
        assert_eq!(gap, CLOCK_US * 31);
    }

    #[test]
    fn test_build_rejects_out_of_range_code() {
        let mut fields = FieldSet::new();
        fields.add_hex("code", 1 << 24, 32);
        assert!(!B4b1.build_message(&fields, &SampleStream::new()));
    }
}
