//! Short datagram link ("chat")
//!
//! A toy point-to-point protocol for exchanging short payloads between two
//! transceivers: an alternating preamble, a "11110000" sync (three equal
//! bits in a row never occur in well-formed Manchester data, so the run of
//! four is unambiguous), then Manchester-coded bytes: a length byte, the
//! payload, and an additive checksum.

use crate::bitmap::Bitmap;
use crate::fields::FieldSet;
use crate::linecode::decode_line_code;
use crate::protocols::{render_pattern, MessageInfo, ProtocolDecoder, Synth};
use crate::samples::SampleStream;

/// Symbol clock; short on purpose, these links are local and chatty.
pub const CLOCK_US: u32 = 50;

/// Longest payload a frame can carry.
pub const MAX_PAYLOAD: usize = 64;

/// Preamble tail plus sync marker; data starts right after.
const SYNC: &str = "010111110000";

/// Full preamble rendered when transmitting.
const TX_PREAMBLE: &str = "0101010111110000";

const SYMBOL_ZERO: &str = "01";
const SYMBOL_ONE: &str = "10";

fn checksum(len: u8, payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold(len as u32, |acc, &b| acc + b as u32) as u8
}

pub struct Chat;

impl ProtocolDecoder for Chat {
    fn name(&self) -> &'static str {
        "chat"
    }

    fn decode(&self, bits: &Bitmap, numbits: u32, info: &mut MessageInfo) -> bool {
        // Smallest frame: sync, length byte, one payload byte, checksum.
        if numbits < SYNC.len() as u32 + 3 * 16 {
            return false;
        }
        let off = match bits.seek_bits(0, numbits, SYNC) {
            Some(off) => off,
            None => return false,
        };
        let data_off = off + SYNC.len() as u32;

        let mut raw = Bitmap::new(2 + MAX_PAYLOAD);
        let decoded =
            decode_line_code(&mut raw, bits, data_off, numbits, SYMBOL_ZERO, SYMBOL_ONE);
        let b = raw.as_bytes();

        let len = b[0] as usize;
        if len == 0 || len > MAX_PAYLOAD {
            return false;
        }
        if (decoded as usize) < (2 + len) * 8 {
            return false;
        }
        let payload = &b[1..1 + len];
        if checksum(b[0], payload) != b[1 + len] {
            return false;
        }

        info.start_off = off;
        info.pulses_count = SYNC.len() as u32 + (2 + len as u32) * 16;
        info.fields
            .add_bytes("payload", payload, len as u32 * 2);
        if payload.iter().all(|&c| (0x20..0x7f).contains(&c)) {
            let text: String = payload.iter().map(|&c| c as char).collect();
            info.fields.add_str("text", &text, MAX_PAYLOAD as u32);
        }
        true
    }

    fn synth(&self) -> Option<&dyn Synth> {
        Some(self)
    }
}

impl Synth for Chat {
    fn describe_fields(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        fields.add_bytes("payload", &[0], 2 * MAX_PAYLOAD as u32);
        fields.add_str("text", "", MAX_PAYLOAD as u32);
        fields
    }

    /// The payload comes from the "payload" bytes field when set, otherwise
    /// from the "text" field.
    fn build_message(&self, fields: &FieldSet, out: &SampleStream) -> bool {
        let text_bytes;
        let payload: &[u8] = match fields.get("payload").and_then(|f| f.as_bytes()) {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => match fields.get("text").and_then(|f| f.as_str()) {
                Some(text) if !text.is_empty() => {
                    text_bytes = text.as_bytes().to_vec();
                    &text_bytes
                }
                _ => return false,
            },
        };
        if payload.len() > MAX_PAYLOAD {
            return false;
        }

        let mut frame = String::from(TX_PREAMBLE);
        let mut push_byte = |frame: &mut String, byte: u8| {
            for bit in (0..8).rev() {
                frame.push_str(if (byte >> bit) & 1 != 0 {
                    SYMBOL_ONE
                } else {
                    SYMBOL_ZERO
                });
            }
        };
        push_byte(&mut frame, payload.len() as u8);
        for &byte in payload {
            push_byte(&mut frame, byte);
        }
        push_byte(&mut frame, checksum(payload.len() as u8, payload));
        render_pattern(out, &frame, CLOCK_US);
        true
    }
}
