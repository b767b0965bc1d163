//! Coherent-run detection
//!
//! A structured transmission shows up in the sample stream as a run of
//! pulses and gaps whose durations cluster into a small number of duration
//! classes, against a background of noise with essentially random timing.
//! The scanner walks the stream, grows up to [`SEARCH_CLASSES`] classes per
//! level, and stops at the first sample that fits none of them.
//!
//! High and low samples are classified independently: many devices use
//! different pulse lengths depending on the RF level. Oregon-style sensors
//! for instance send ~400µs marks against ~580µs spaces.

use crate::config::ScanConfig;
use crate::samples::SampleStream;
use tracing::trace;

/// Maximum number of duration classes tracked per level.
pub const SEARCH_CLASSES: usize = 3;

/// A class needs this many members before its average is trusted for the
/// clock estimate.
const RELIABLE_CLASS_COUNT: u32 = 3;

#[derive(Clone, Copy, Default)]
struct DurationClass {
    /// Running average duration, per level (0 = low, 1 = high).
    avg: [u32; 2],
    /// Number of samples folded into the average, per level.
    count: [u32; 2],
}

fn duration_delta(a: u32, b: u32) -> u32 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// Scan forward from `idx` for the longest run of samples whose durations
/// cluster into at most [`SEARCH_CLASSES`] classes per level. Returns the
/// run length and stores the estimated symbol clock into the stream's
/// `short_pulse_us` (0 when nothing reliable was found and no default is
/// configured).
///
/// A sample joins an existing class when its duration is within 20% of the
/// class average; the average is then refined with the new member, so early
/// off-center samples do not make us miss the rest of the run.
pub fn search_coherent_run(s: &SampleStream, idx: usize, config: &ScanConfig) -> u32 {
    let mut classes = [DurationClass::default(); SEARCH_CLASSES];

    let mut len = 0u32;
    s.set_short_pulse_us(0);

    for j in idx..idx + s.capacity() {
        let (level, dur) = s.get(j as i64);
        if dur < config.min_duration_us || dur > config.max_duration_us {
            break;
        }
        let li = level as usize;

        let mut accepted = false;
        for class in classes.iter_mut() {
            if class.count[li] == 0 {
                class.avg[li] = dur;
                class.count[li] = 1;
                accepted = true;
                break;
            }
            let avg = class.avg[li];
            let count = class.count[li];
            if duration_delta(dur, avg) < avg / 5 {
                // Refine the running average with the new member.
                class.avg[li] = (avg * count + dur) / (count + 1);
                class.count[li] = count + 1;
                accepted = true;
                break;
            }
        }
        if !accepted {
            break;
        }
        len += 1;
    }

    // Shortest reliable class average, per level.
    let mut short = [0u32; 2];
    for class in classes.iter() {
        for li in 0..2 {
            if class.avg[li] == 0 || class.count[li] < RELIABLE_CLASS_COUNT {
                continue;
            }
            if short[li] == 0 || short[li] > class.avg[li] {
                short[li] = class.avg[li];
            }
        }
    }

    // The high and low short pulses are often a bit different; averaging
    // the two is more robust when sampling at clock intervals later.
    if short[0] == 0 && short[1] == 0 {
        s.set_short_pulse_us(config.default_clock_us);
    } else {
        if short[0] == 0 {
            short[0] = short[1];
        }
        if short[1] == 0 {
            short[1] = short[0];
        }
        s.set_short_pulse_us((short[0] + short[1]) / 2);
    }

    if len > 0 {
        trace!(
            "coherent run at {}: {} samples, clock {}us",
            idx,
            len,
            s.short_pulse_us()
        );
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScanConfig {
        ScanConfig {
            min_duration_us: 100,
            ..ScanConfig::default()
        }
    }

    #[test]
    fn test_uniform_alternating_stream() {
        let s = SampleStream::new();
        let n = 50;
        for i in 0..n {
            s.push(i % 2 == 0, 400);
        }
        s.center((s.capacity() - n) % s.capacity());
        let len = search_coherent_run(&s, 0, &config());
        assert_eq!(len, n as u32);
        assert_eq!(s.short_pulse_us(), 400);
    }

    #[test]
    fn test_two_classes_converge_on_short() {
        let s = SampleStream::new();
        // Alternating short marks and long spaces, with jitter under 20%.
        let durs = [400, 810, 390, 790, 410, 800, 395, 805, 400, 795];
        for (i, d) in durs.iter().enumerate() {
            s.push(i % 2 == 0, *d);
        }
        s.center((s.capacity() - durs.len()) % s.capacity());
        let len = search_coherent_run(&s, 0, &config());
        assert_eq!(len, durs.len() as u32);
        // Clock averages the short high class and the (only) low class:
        // highs ~399, lows ~800.
        let clock = s.short_pulse_us();
        assert!((550..=650).contains(&clock), "clock {}", clock);
    }

    #[test]
    fn test_run_stops_at_out_of_range_duration() {
        let s = SampleStream::new();
        for i in 0..20 {
            s.push(i % 2 == 0, 300);
        }
        s.push(true, 9000); // over max_duration_us
        for i in 0..5 {
            s.push(i % 2 == 0, 300);
        }
        s.center((s.capacity() - 26) % s.capacity());
        assert_eq!(search_coherent_run(&s, 0, &config()), 20);
    }

    #[test]
    fn test_run_stops_when_no_class_matches() {
        let s = SampleStream::new();
        // Four distinct high durations: the fourth cannot fit any of the
        // three classes.
        let durs = [300, 600, 1200, 2400];
        for _ in 0..3 {
            for d in durs.iter() {
                s.push(true, *d);
                s.push(false, 300);
            }
        }
        s.center((s.capacity() - 24) % s.capacity());
        let len = search_coherent_run(&s, 0, &config());
        assert_eq!(len, 6); // stops on the first 2400us high sample
    }

    #[test]
    fn test_default_clock_when_nothing_reliable() {
        let s = SampleStream::new();
        s.push(true, 300);
        s.push(false, 600);
        s.center(s.capacity() - 2);
        let cfg = ScanConfig {
            default_clock_us: 250,
            ..config()
        };
        let len = search_coherent_run(&s, 0, &cfg);
        assert_eq!(len, 2);
        // Both classes have fewer than 3 members.
        assert_eq!(s.short_pulse_us(), 250);
    }
}
