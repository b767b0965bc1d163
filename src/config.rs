//! Scan pipeline configuration
//!
//! The thresholds here are empirically chosen and match known signal
//! fixtures; override them when you know your front-end, do not "improve"
//! the defaults.

/// Tunables for the scan -> sample -> decode pipeline.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Shortest pulse/gap accepted as part of a coherent run, in µs.
    /// Depends on the modulation preset and data rate of the front-end.
    pub min_duration_us: u32,

    /// Longest pulse/gap accepted as part of a coherent run, in µs.
    pub max_duration_us: u32,

    /// Runs shorter than this many samples are not worth decoding; with
    /// fewer it is very easy to mistake noise for signal.
    pub min_run_len: u32,

    /// Clock estimate to fall back on when no duration class was reliable.
    /// 0 means "give up": the bit sampler produces no bits without a clock.
    pub default_clock_us: u32,

    /// Ceiling on how many bits a single pulse/gap may expand to, bounding
    /// pathological long pulses.
    pub bit_clamp: u32,

    /// Samples included before the detected run when building the decode
    /// bitmap, so sync preambles broken off the run stay visible.
    pub before_samples: u32,

    /// Samples included past the end of the detected run.
    pub after_samples: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_duration_us: 100,
            max_duration_us: 4000,
            min_run_len: 18,
            default_clock_us: 0,
            bit_clamp: 1024,
            before_samples: 32,
            after_samples: 100,
        }
    }
}

impl ScanConfig {
    /// Load overrides from environment variables, keeping the defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            min_duration_us: env_u32("MIN_DURATION_US", d.min_duration_us),
            max_duration_us: env_u32("MAX_DURATION_US", d.max_duration_us),
            min_run_len: env_u32("MIN_RUN_LEN", d.min_run_len),
            default_clock_us: env_u32("DEFAULT_CLOCK_US", d.default_clock_us),
            bit_clamp: d.bit_clamp,
            before_samples: d.before_samples,
            after_samples: d.after_samples,
        }
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_known_fixtures() {
        let c = ScanConfig::default();
        assert_eq!(c.max_duration_us, 4000);
        assert_eq!(c.min_run_len, 18);
        assert_eq!(c.bit_clamp, 1024);
        assert_eq!(c.before_samples, 32);
    }
}
