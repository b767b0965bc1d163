//! Structural fallback
//!
//! When no registered protocol claims a signal, this decoder looks for the
//! structure almost every OOK transmission has anyway: either Manchester
//! pairs or a PWM code built from two fixed-width symbols. It reports the
//! inferred line code, the symbols, any alternating preamble found right
//! before the data, and the decoded payload bytes, so an unknown device can
//! be studied from a single capture.
//!
//! It must stay last in the registry: it matches almost anything that is
//! not noise.

use crate::bitmap::Bitmap;
use crate::linecode::decode_line_code;
use crate::protocols::{MessageInfo, ProtocolDecoder};

/// Structure shorter than this many symbols is indistinguishable from
/// noise and is not reported.
pub const MIN_DECODE_SYMBOLS: u32 = 16;

/// A preamble is only attributed to the data run when it ends at most this
/// many raw bits before it.
pub const PREAMBLE_MAX_GAP: u32 = 32;

/// Upper bound on decoded payload bytes.
const MAX_DECODED_BYTES: usize = 128;

pub struct Unknown;

#[derive(Clone)]
struct PwmRun {
    start: u32,
    symbols: u32,
    sym1: String,
    sym2: String,
}

/// Walk fixed-width windows from `start` and classify them against the
/// first two distinct patterns seen; stops at a third pattern or the end.
fn classify_run(
    bits: &Bitmap,
    start: u32,
    numbits: u32,
    symlen: u32,
) -> (u32, Option<String>, Option<String>, u32, u32) {
    let mut sym1: Option<String> = None;
    let mut sym2: Option<String> = None;
    let (mut c1, mut c2) = (0u32, 0u32);
    let mut j = start;
    while j + symlen <= numbits {
        let w = bits.to_bit_string(j, symlen);
        match (&sym1, &sym2) {
            (None, _) => {
                sym1 = Some(w);
                c1 = 1;
            }
            (Some(s1), _) if *s1 == w => c1 += 1,
            (_, None) => {
                sym2 = Some(w);
                c2 = 1;
            }
            (_, Some(s2)) if *s2 == w => c2 += 1,
            _ => break,
        }
        j += symlen;
    }
    (c1 + c2, sym1, sym2, c1, c2)
}

/// True when a run of `total` symbols split `c1`/`c2` between two patterns
/// looks like data: both symbols must carry at least 20% of the windows,
/// otherwise it is just a repeated idle pattern.
fn split_is_balanced(c1: u32, c2: u32, total: u32) -> bool {
    c1.min(c2) * 5 >= total
}

/// Find the longest two-symbol run of `symlen`-wide windows, trying every
/// window phase. The run start is then realigned, when possible, so both
/// symbols open with a pulse: PWM symbols in the wild start with the mark.
fn search_pwm(bits: &Bitmap, numbits: u32, symlen: u32) -> Option<PwmRun> {
    let mut best: Option<PwmRun> = None;

    for phase in 0..symlen {
        let mut j = phase;
        while j + symlen <= numbits {
            let (total, sym1, sym2, c1, c2) = classify_run(bits, j, numbits, symlen);
            if total == 0 {
                break;
            }
            if let (Some(s1), Some(s2)) = (sym1, sym2) {
                if split_is_balanced(c1, c2, total)
                    && best.as_ref().map_or(true, |b| total > b.symbols)
                {
                    best = Some(PwmRun {
                        start: j,
                        symbols: total,
                        sym1: s1,
                        sym2: s2,
                    });
                }
            }
            // Resume one window before the break: the last window of a
            // dying run is often the first symbol of the next one, as when
            // a repeated idle pattern runs straight into the data.
            j += total.saturating_sub(1).max(1) * symlen;
        }
    }

    let mut run = best?;
    if !(run.sym1.starts_with('1') && run.sym2.starts_with('1')) {
        for shift in 1..symlen {
            let (total, sym1, sym2, c1, c2) =
                classify_run(bits, run.start + shift, numbits, symlen);
            if let (Some(s1), Some(s2)) = (sym1, sym2) {
                if s1.starts_with('1')
                    && s2.starts_with('1')
                    && split_is_balanced(c1, c2, total)
                    && total >= MIN_DECODE_SYMBOLS
                {
                    run = PwmRun {
                        start: run.start + shift,
                        symbols: total,
                        sym1: s1,
                        sym2: s2,
                    };
                    break;
                }
            }
        }
    }
    Some(run)
}

/// Longest run of Manchester pairs (adjacent differing bits), trying both
/// pair phases. Returns (start, pair count).
fn search_manchester(bits: &Bitmap, numbits: u32) -> Option<(u32, u32)> {
    let mut best: Option<(u32, u32)> = None;
    for phase in 0..2u32 {
        let mut run_start = 0u32;
        let mut pairs = 0u32;
        let mut j = phase;
        while j + 2 <= numbits {
            let b0 = bits.get(j);
            let b1 = bits.get(j + 1);
            if b0 != b1 {
                if pairs == 0 {
                    run_start = j;
                }
                pairs += 1;
            } else {
                if pairs > 0 && best.map_or(true, |(_, p)| pairs > p) {
                    best = Some((run_start, pairs));
                }
                pairs = 0;
            }
            j += 2;
        }
        if pairs > 0 && best.map_or(true, |(_, p)| pairs > p) {
            best = Some((run_start, pairs));
        }
    }
    best
}

/// Longest low->high alternating run ending within [`PREAMBLE_MAX_GAP`] raw
/// bits of `data_start`. Returns (start, raw bit length).
fn find_preamble(bits: &Bitmap, data_start: u32) -> Option<(u32, u32)> {
    let mut best: Option<(u32, u32)> = None;
    for phase in 0..2u32 {
        let mut run_start = 0u32;
        let mut pairs = 0u32;
        let mut j = phase;
        let mut consider = |run_start: u32, pairs: u32, best: &mut Option<(u32, u32)>| {
            if pairs < 2 {
                return;
            }
            let end = run_start + pairs * 2;
            if end <= data_start && data_start - end <= PREAMBLE_MAX_GAP {
                if best.map_or(true, |(_, len)| pairs * 2 > len) {
                    *best = Some((run_start, pairs * 2));
                }
            }
        };
        while j + 2 <= data_start {
            let ok = !bits.get(j) && bits.get(j + 1);
            if ok {
                if pairs == 0 {
                    run_start = j;
                }
                pairs += 1;
            } else {
                consider(run_start, pairs, &mut best);
                pairs = 0;
            }
            j += 2;
        }
        consider(run_start, pairs, &mut best);
    }
    best
}

impl ProtocolDecoder for Unknown {
    fn name(&self) -> &'static str {
        "unknown"
    }

    fn fallback(&self) -> bool {
        true
    }

    fn decode(&self, bits: &Bitmap, numbits: u32, info: &mut MessageInfo) -> bool {
        let pwm3 = search_pwm(bits, numbits, 3);
        let pwm4 = search_pwm(bits, numbits, 4);
        let manchester = search_manchester(bits, numbits);

        let pwm_best = match (&pwm3, &pwm4) {
            (Some(a), Some(b)) => Some(if b.symbols > a.symbols { b } else { a }),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        let pwm_symbols = pwm_best.map_or(0, |r| r.symbols);
        let man_pairs = manchester.map_or(0, |(_, p)| p);

        // Manchester data also scores as a two-symbol code at widths 3 and
        // 4, so it only wins when it is strictly the longer reading.
        let (line_code, start, symlen, symbols, sym_zero, sym_one);
        if man_pairs > pwm_symbols {
            let (s, p) = match manchester {
                Some(v) => v,
                None => return false,
            };
            line_code = "manchester";
            start = s;
            symlen = 2;
            symbols = p;
            sym_zero = "01".to_string();
            sym_one = "10".to_string();
        } else {
            let run = match pwm_best {
                Some(r) => r,
                None => return false,
            };
            line_code = if run.sym1.len() == 3 { "pwm3" } else { "pwm4" };
            start = run.start;
            symlen = run.sym1.len() as u32;
            symbols = run.symbols;
            // The symbol with the shorter mark reads as 0.
            let ones = |s: &str| s.bytes().filter(|&b| b == b'1').count();
            if ones(&run.sym1) <= ones(&run.sym2) {
                sym_zero = run.sym1.clone();
                sym_one = run.sym2.clone();
            } else {
                sym_zero = run.sym2.clone();
                sym_one = run.sym1.clone();
            }
        }
        if symbols < MIN_DECODE_SYMBOLS {
            return false;
        }

        let mut payload = Bitmap::new(MAX_DECODED_BYTES);
        let decoded = decode_line_code(
            &mut payload,
            bits,
            start,
            start + symbols * symlen,
            &sym_zero,
            &sym_one,
        );
        if decoded == 0 {
            return false;
        }

        let preamble = find_preamble(bits, start);
        let msg_start = preamble.map_or(start, |(s, _)| s);

        info.start_off = msg_start;
        info.pulses_count = (start - msg_start) + symbols * symlen;
        info.fields.add_str("line_code", line_code, 10);
        info.fields.add_uint("decoded_bits", decoded as u64, 16);
        info.fields
            .add_uint("preamble_bits", preamble.map_or(0, |(_, l)| l) as u64, 16);
        info.fields.add_str("symbol_zero", &sym_zero, 4);
        info.fields.add_str("symbol_one", &sym_one, 4);
        let nbytes = (decoded as usize).div_ceil(8);
        info.fields
            .add_bytes("payload", &payload.as_bytes()[..nbytes], decoded.div_ceil(4));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pwm4_bits(data: &str, at: u32) -> Bitmap {
        let mut b = Bitmap::new(64);
        let mut off = at;
        for ch in data.bytes() {
            b.set_pattern(off, if ch == b'1' { "1110" } else { "1000" });
            off += 4;
        }
        b
    }

    #[test]
    fn test_pwm4_structure_detected() {
        let data = "10110010011101010010";
        let bits = pwm4_bits(data, 0);
        let mut info = MessageInfo::new(300);
        assert!(Unknown.decode(&bits, data.len() as u32 * 4, &mut info));
        assert_eq!(info.fields.get("line_code").unwrap().as_str(), Some("pwm4"));
        assert_eq!(info.fields.get("symbol_zero").unwrap().as_str(), Some("1000"));
        assert_eq!(info.fields.get("symbol_one").unwrap().as_str(), Some("1110"));
        assert_eq!(
            info.fields.get("decoded_bits").unwrap().as_u64(),
            Some(data.len() as u64)
        );
        // Payload bits equal the PWM data bits.
        let payload = info.fields.get("payload").unwrap().as_bytes().unwrap();
        let decoded = Bitmap::from_bytes(payload.to_vec());
        assert_eq!(decoded.to_bit_string(0, data.len() as u32), data);
    }

    #[test]
    fn test_pwm_realigned_to_pulse_start() {
        // Two leading bits push the natural phase off the symbol grid; the
        // phase-0 reading wins the length tie but starts mid-symbol, and
        // realignment must slide it to the mark.
        let data = "10110010011101010011";
        let mut bits = Bitmap::new(64);
        bits.set_pattern(0, "00");
        let mut off = 2;
        for ch in data.bytes() {
            bits.set_pattern(off, if ch == b'1' { "1110" } else { "1000" });
            off += 4;
        }
        let mut info = MessageInfo::new(300);
        assert!(Unknown.decode(&bits, off, &mut info));
        assert_eq!(info.fields.get("symbol_zero").unwrap().as_str(), Some("1000"));
        assert_eq!(info.fields.get("symbol_one").unwrap().as_str(), Some("1110"));
    }

    #[test]
    fn test_manchester_structure_detected() {
        let data = "110100101100111010";
        let mut bits = Bitmap::new(64);
        let mut off = 0;
        for ch in data.bytes() {
            bits.set_pattern(off, if ch == b'1' { "10" } else { "01" });
            off += 2;
        }
        let mut info = MessageInfo::new(200);
        assert!(Unknown.decode(&bits, off, &mut info));
        assert_eq!(
            info.fields.get("line_code").unwrap().as_str(),
            Some("manchester")
        );
        assert_eq!(
            info.fields.get("decoded_bits").unwrap().as_u64(),
            Some(data.len() as u64)
        );
    }

    #[test]
    fn test_preamble_attributed_to_run() {
        let preamble = "01010101";
        let data = "1011001001110101";
        let mut bits = Bitmap::new(64);
        bits.set_pattern(0, preamble);
        let mut off = preamble.len() as u32;
        for ch in data.bytes() {
            bits.set_pattern(off, if ch == b'1' { "1110" } else { "1000" });
            off += 4;
        }
        let mut info = MessageInfo::new(300);
        assert!(Unknown.decode(&bits, off, &mut info));
        assert_eq!(info.fields.get("preamble_bits").unwrap().as_u64(), Some(8));
        assert_eq!(info.start_off, 0);
        assert_eq!(info.pulses_count, 8 + data.len() as u32 * 4);
    }

    #[test]
    fn test_short_structure_rejected() {
        // 8 symbols: structured, but too short to trust.
        let bits = pwm4_bits("10110010", 0);
        let mut info = MessageInfo::new(300);
        assert!(!Unknown.decode(&bits, 32, &mut info));
    }

    #[test]
    fn test_idle_carrier_rejected() {
        // A constant carrier has no Manchester pairs and only a single
        // repeated window at any width, which the split guard rejects.
        let mut bits = Bitmap::new(64);
        for off in 0..120 {
            bits.set(off, true);
        }
        let mut info = MessageInfo::new(300);
        assert!(!Unknown.decode(&bits, 120, &mut info));
    }
}
