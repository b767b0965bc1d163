//! Capture session: scan loop and message acceptance
//!
//! The [`Analyzer`] owns the raw sample ring the producer pushes into and
//! the scan state: the best signal seen so far and, when one decoded, its
//! message. Scanning works on a snapshot of the ring, so the producer is
//! never blocked for more than a single push.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ScanConfig;
use crate::protocols::{decode_signal, MessageInfo};
use crate::samples::{SampleStream, MAX_SAMPLE_DURATION};
use crate::scanner::search_coherent_run;

pub struct Analyzer {
    raw: Arc<SampleStream>,
    /// Snapshot of the samples around the currently accepted signal,
    /// centered on its start.
    detected: SampleStream,
    config: ScanConfig,
    /// Length in samples of the currently accepted signal, 0 when none.
    best_len: u32,
    /// True when `msg` holds a successfully decoded message.
    decoded: bool,
    msg: Option<MessageInfo>,
    /// Raw cursor at the time of the last scan, for the rescan throttle.
    last_scan_cursor: usize,
}

impl Analyzer {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            raw: Arc::new(SampleStream::new()),
            detected: SampleStream::new(),
            config,
            best_len: 0,
            decoded: false,
            msg: None,
            last_scan_cursor: 0,
        }
    }

    /// Handle to the raw ring for the capture side. Durations are clamped
    /// to the 15-bit range the front-end can represent.
    pub fn raw_stream(&self) -> Arc<SampleStream> {
        Arc::clone(&self.raw)
    }

    /// Append one pulse/gap interval from the capture side.
    pub fn push_sample(&self, level: bool, duration_us: u32) {
        self.raw.push(level, duration_us.min(MAX_SAMPLE_DURATION));
    }

    /// The currently accepted message, when the best signal decoded.
    pub fn message(&self) -> Option<&MessageInfo> {
        if self.decoded {
            self.msg.as_ref()
        } else {
            None
        }
    }

    /// Length in samples of the best signal seen so far (decoded or not).
    pub fn best_len(&self) -> u32 {
        self.best_len
    }

    /// Samples around the accepted signal, centered on its first sample.
    pub fn detected(&self) -> &SampleStream {
        &self.detected
    }

    /// Forget the accepted signal and start over.
    pub fn reset(&mut self) {
        self.detected.reset();
        self.best_len = 0;
        self.decoded = false;
        self.msg = None;
    }

    /// True when the raw ring accumulated enough new samples since the
    /// last scan to be worth scanning again: rescanning after every push
    /// would decode the same signal over and over.
    pub fn should_rescan(&mut self) -> bool {
        let cursor = self.raw.cursor();
        let cap = self.raw.capacity();
        let fresh = (cursor + cap - self.last_scan_cursor) % cap;
        if fresh < cap / 2 {
            return false;
        }
        self.last_scan_cursor = cursor;
        true
    }

    /// Scan the whole ring for coherent runs and try to decode each one,
    /// keeping the most interesting signal found so far.
    ///
    /// A new signal replaces the current one only while the current one is
    /// undecoded (or only structurally decoded), and only when the new one
    /// is longer or properly decoded. A fully decoded signal is sticky
    /// until [`reset`](Self::reset).
    ///
    /// `min_duration_us` overrides the configured minimum pulse width for
    /// this scan; it depends on the front-end's modulation and data rate.
    pub fn scan_and_decode(&mut self, min_duration_us: u32) -> Option<&MessageInfo> {
        let cfg = ScanConfig {
            min_duration_us,
            ..self.config.clone()
        };

        let copy = SampleStream::new();
        copy.copy_from(&self.raw);
        let total = copy.capacity();

        let mut i = 0usize;
        while i < total - 1 {
            let len = search_coherent_run(&copy, i, &cfg);

            if len > cfg.min_run_len {
                let saved = copy.cursor();
                copy.center(i);
                let decoded = decode_signal(&copy, len, &cfg);
                copy.set_cursor(saved);

                let current_specific = self.decoded && !self.msg.as_ref().is_some_and(|m| m.fallback);
                let new_specific = decoded.as_ref().is_some_and(|m| !m.fallback);
                if !current_specific && (len > self.best_len || new_specific) {
                    debug!(
                        "signal at {}: {} samples, decoded: {}",
                        i,
                        len,
                        decoded.is_some()
                    );
                    self.best_len = len;
                    self.decoded = decoded.is_some();
                    self.msg = decoded;
                    self.detected.copy_from(&copy);
                    self.detected.center(i);
                    if let Some(msg) = &self.msg {
                        info!(
                            "decoded {} ({} raw bits, clock {}us)",
                            msg.decoder_name, msg.pulses_count, msg.short_pulse_us
                        );
                    }
                }
            }
            i += (len as usize).max(1);
        }
        self.message()
    }
}
