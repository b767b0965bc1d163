//! Oregon-style v2 weather sensor
//!
//! Temperature/humidity sensor frames: an alternating preamble, a short
//! "1100" sync marker, then 40 logical bits in a doubled Manchester code
//! where a zero renders as "1010" and a one as "0101". The sync marker can
//! never occur inside well-formed data, which is what makes it a marker.
//!
//! Payload layout, MSB first:
//!   id:8  channel:4  temp:12 (signed, tenths of a degree)  humidity:8
//!   checksum:8 (sum of the four preceding bytes, mod 256)

use crate::bitmap::Bitmap;
use crate::linecode::decode_line_code;
use crate::protocols::{MessageInfo, ProtocolDecoder};

/// Preamble tail plus sync marker; data starts right after.
const SYNC: &str = "010101011100";

const SYMBOL_ZERO: &str = "1010";
const SYMBOL_ONE: &str = "0101";

/// Logical payload length in bits.
const PAYLOAD_BITS: u32 = 40;

pub struct Oregon2;

impl ProtocolDecoder for Oregon2 {
    fn name(&self) -> &'static str {
        "oregon2"
    }

    fn decode(&self, bits: &Bitmap, numbits: u32, info: &mut MessageInfo) -> bool {
        if numbits < SYNC.len() as u32 + PAYLOAD_BITS * 4 {
            return false;
        }
        let off = match bits.seek_bits(0, numbits, SYNC) {
            Some(off) => off,
            None => return false,
        };
        let data_off = off + SYNC.len() as u32;

        let mut raw = Bitmap::new((PAYLOAD_BITS / 8) as usize);
        let decoded =
            decode_line_code(&mut raw, bits, data_off, numbits, SYMBOL_ZERO, SYMBOL_ONE);
        if decoded < PAYLOAD_BITS {
            return false;
        }
        let b = raw.as_bytes();

        let sum = b[..4].iter().map(|&v| v as u32).sum::<u32>() & 0xff;
        if sum as u8 != b[4] {
            return false;
        }

        let id = b[0];
        let channel = b[1] >> 4;
        let mut temp = (((b[1] & 0x0f) as i32) << 8) | b[2] as i32;
        if temp & 0x800 != 0 {
            temp -= 4096; // 12-bit two's complement
        }
        let humidity = b[3];

        info.start_off = off;
        info.pulses_count = SYNC.len() as u32 + PAYLOAD_BITS * 4;
        info.fields.add_hex("id", id as u64, 8);
        info.fields.add_uint("channel", channel as u64, 4);
        info.fields
            .add_float("temperature_c", temp as f64 / 10.0, 1);
        info.fields.add_uint("humidity", humidity as u64, 8);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor_bits(id: u8, channel: u8, temp_tenths: i16, humidity: u8) -> Bitmap {
        let t = (temp_tenths as u16) & 0x0fff;
        let payload = [
            id,
            (channel << 4) | (t >> 8) as u8,
            (t & 0xff) as u8,
            humidity,
            0, // checksum, patched below
        ];
        let mut payload = payload;
        payload[4] = payload[..4]
            .iter()
            .fold(0u32, |acc, &v| acc + v as u32) as u8;

        let mut b = Bitmap::new(64);
        b.set_pattern(7, SYNC);
        let mut off = 7 + SYNC.len() as u32;
        for byte in payload {
            for bit in (0..8).rev() {
                let sym = if (byte >> bit) & 1 != 0 {
                    SYMBOL_ONE
                } else {
                    SYMBOL_ZERO
                };
                b.set_pattern(off, sym);
                off += 4;
            }
        }
        b
    }

    #[test]
    fn test_decode_positive_temperature() {
        let bits = sensor_bits(0x4A, 2, 235, 61);
        let mut info = MessageInfo::new(488);
        assert!(Oregon2.decode(&bits, bits.capacity_bits(), &mut info));
        assert_eq!(info.start_off, 7);
        assert_eq!(info.pulses_count, 12 + 160);
        assert_eq!(info.fields.get("id").unwrap().render(), "4A");
        assert_eq!(info.fields.get("channel").unwrap().as_u64(), Some(2));
        assert_eq!(
            info.fields.get("temperature_c").unwrap().render(),
            "23.5"
        );
        assert_eq!(info.fields.get("humidity").unwrap().as_u64(), Some(61));
    }

    #[test]
    fn test_decode_negative_temperature() {
        let bits = sensor_bits(0x10, 1, -82, 70);
        let mut info = MessageInfo::new(488);
        assert!(Oregon2.decode(&bits, bits.capacity_bits(), &mut info));
        assert_eq!(
            info.fields.get("temperature_c").unwrap().as_f64(),
            Some(-8.2)
        );
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let mut bits = sensor_bits(0x4A, 2, 235, 61);
        // Flip one logical bit of the humidity byte: invert its 4-bit symbol.
        let sym_off = 7 + 12 + 24 * 4;
        let flipped = if bits.get(sym_off) { SYMBOL_ONE } else { SYMBOL_ZERO };
        bits.set_pattern(sym_off, flipped);
        let mut info = MessageInfo::new(488);
        assert!(!Oregon2.decode(&bits, bits.capacity_bits(), &mut info));
    }

    #[test]
    fn test_sync_never_inside_data() {
        // "1100" cannot appear in any concatenation of "1010"/"0101".
        let bits = sensor_bits(0xff, 0xf, -1, 0xff);
        let data_off = 7 + SYNC.len() as u32;
        assert_eq!(bits.seek_bits(data_off, 160, "1100"), None);
    }
}
