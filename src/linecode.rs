//! Line-code inversion
//!
//! Maps the sampled bit rendering of a signal back to the logical bits the
//! transmitter encoded. The generic decoder handles any two-pattern code
//! (Manchester, PWM symbol pairs, doubled-bit schemes); differential
//! Manchester needs its own routine because each symbol depends on the one
//! before it.

use crate::bitmap::Bitmap;

/// Decode a two-pattern line code from `src` into `dst`.
///
/// Starting at bit `off` and never reading past `len_bits`, each position
/// is matched against `zero_pattern` first, then `one_pattern`; a match
/// emits the corresponding bit and advances by the matched pattern length
/// (the two patterns may differ in length). Decoding stops at the first
/// position matching neither, or when `dst` is full. Returns the number of
/// bits decoded.
pub fn decode_line_code(
    dst: &mut Bitmap,
    src: &Bitmap,
    mut off: u32,
    len_bits: u32,
    zero_pattern: &str,
    one_pattern: &str,
) -> u32 {
    let mut decoded = 0u32;
    while off < len_bits {
        let bitval;
        if src.match_bits(off, zero_pattern) {
            bitval = false;
            off += zero_pattern.len() as u32;
        } else if src.match_bits(off, one_pattern) {
            bitval = true;
            off += one_pattern.len() as u32;
        } else {
            break;
        }
        dst.set(decoded, bitval);
        decoded += 1;
        if decoded == dst.capacity_bits() {
            break;
        }
    }
    decoded
}

/// Decode differential Manchester from `src` into `dst`.
///
/// `previous` is the value of the symbol immediately preceding the window:
/// differential codes carry state, and the caller supplies it explicitly.
/// Bits are processed in 2-bit groups; the first bit of each group must
/// differ from the previous group's second bit or decoding stops. The
/// output bit is the XOR of the group's two bits. Returns the number of
/// bits decoded.
pub fn decode_diff_manchester(
    dst: &mut Bitmap,
    src: &Bitmap,
    off: u32,
    len_bits: u32,
    mut previous: bool,
) -> u32 {
    let mut decoded = 0u32;
    let mut j = off;
    while j + 1 < len_bits {
        let b0 = src.get(j);
        let b1 = src.get(j + 1);
        if b0 == previous {
            break; // each new symbol must open with a transition
        }
        dst.set(decoded, b0 != b1);
        decoded += 1;
        previous = b1;
        if decoded == dst.capacity_bits() {
            break;
        }
        j += 2;
    }
    decoded
}
