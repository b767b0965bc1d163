//! Timed samples -> logical bits
//!
//! Once the scanner has estimated the symbol clock, each pulse/gap is
//! rounded to the nearest multiple of it and emitted as that many repeated
//! bits. The result is not yet data: it is a low-level rendering of the
//! line code, e.g. a ~600µs mark at a 320µs clock becomes two 1 bits.
//! Line-code inversion happens later, on the bitmap.

use crate::bitmap::Bitmap;
use crate::config::ScanConfig;
use crate::samples::SampleStream;

/// Sample the window `[start, start + count)` of `s` at `rate_us`
/// intervals into `dst`, returning the number of bits written.
///
/// A sample whose rounded bit count is 0 is treated as an interference
/// spike and dropped; it contributes no bits and does not shift the
/// following samples. A rate of 0 means no clock was estimated and no
/// conversion is possible.
pub fn signal_to_bitmap(
    dst: &mut Bitmap,
    s: &SampleStream,
    start: i64,
    count: u32,
    rate_us: u32,
    config: &ScanConfig,
) -> u32 {
    if rate_us == 0 {
        return 0;
    }
    let mut bitpos = 0u32;
    for j in 0..count {
        let (level, dur) = s.get(start + j as i64);

        let mut numbits = dur / rate_us;
        let rest = dur % rate_us;
        if rest > rate_us / 2 {
            numbits += 1;
        }

        // No protocol does pulses this long at a low rate; bound what a
        // single sample can expand to.
        if numbits > config.bit_clamp {
            numbits = config.bit_clamp;
        }
        if numbits == 0 {
            continue;
        }
        for _ in 0..numbits {
            dst.set(bitpos, level);
            bitpos += 1;
        }
    }
    bitpos
}
