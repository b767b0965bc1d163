//! Raw pulse/gap sample storage
//!
//! The radio front-end delivers alternating high/low intervals with
//! microsecond durations. We keep the last `STREAM_CAPACITY` of them in a
//! circular buffer shared between the capture side (producer) and the scan
//! loop (consumer). Every operation is a short critical section behind one
//! mutex; no decoding work ever happens inside the lock.

use std::sync::Mutex;

/// Number of samples the ring buffer holds (power of two).
pub const STREAM_CAPACITY: usize = 2048;

/// Durations above this value are clamped by the capture side before
/// reaching the stream (15-bit range).
pub const MAX_SAMPLE_DURATION: u32 = 15000;

/// One pulse (level = true, RF on) or gap (level = false, RF off) with its
/// duration in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sample {
    pub level: bool,
    pub duration_us: u32,
}

struct StreamInner {
    samples: Vec<Sample>,
    /// Write cursor; `get(0)` reads the oldest retained sample relative
    /// to this index.
    idx: usize,
    /// Estimated short-pulse (symbol clock) duration, 0 until computed.
    short_pulse_us: u32,
}

/// Fixed-capacity, overwrite-on-full circular log of (level, duration)
/// samples.
pub struct SampleStream {
    inner: Mutex<StreamInner>,
}

impl SampleStream {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StreamInner {
                samples: vec![Sample::default(); STREAM_CAPACITY],
                idx: 0,
                short_pulse_us: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        STREAM_CAPACITY
    }

    /// Append a sample, overwriting the oldest one when the buffer is full.
    pub fn push(&self, level: bool, duration_us: u32) {
        let mut s = self.inner.lock().unwrap();
        let idx = s.idx;
        s.samples[idx] = Sample { level, duration_us };
        s.idx = (idx + 1) % STREAM_CAPACITY;
    }

    /// Append a sample, extending the previous entry instead when it has
    /// the same level and a non-zero duration. Used when rendering a signal
    /// from decoded fields, never during capture: synthesized symbols often
    /// end with the level the next one starts with.
    pub fn push_or_coalesce(&self, level: bool, duration_us: u32) {
        {
            let mut s = self.inner.lock().unwrap();
            let prev = (s.idx + STREAM_CAPACITY - 1) % STREAM_CAPACITY;
            let p = s.samples[prev];
            if p.level == level && p.duration_us != 0 {
                s.samples[prev].duration_us = p.duration_us + duration_us;
                return;
            }
        }
        self.push(level, duration_us);
    }

    /// Read the sample at the given logical index. Any signed index is
    /// valid: it wraps around the ring in both directions, so decoders can
    /// look a few samples before the detected start of a signal.
    pub fn get(&self, index: i64) -> (bool, u32) {
        let s = self.inner.lock().unwrap();
        let pos = (s.idx as i64 + index).rem_euclid(STREAM_CAPACITY as i64) as usize;
        let sample = s.samples[pos];
        (sample.level, sample.duration_us)
    }

    /// Re-base the read cursor so that the sample currently at `offset`
    /// becomes logical index 0. Lets the decode stage treat an arbitrary
    /// window as if it started the buffer.
    pub fn center(&self, offset: usize) {
        let mut s = self.inner.lock().unwrap();
        s.idx = (s.idx + offset) % STREAM_CAPACITY;
    }

    /// Current write cursor position. The scan loop uses it to decide when
    /// the buffer accumulated enough new data to be worth rescanning.
    pub fn cursor(&self) -> usize {
        self.inner.lock().unwrap().idx
    }

    /// Restore a cursor previously obtained with [`cursor`](Self::cursor).
    /// The scan loop re-bases its snapshot around each candidate run and
    /// puts the cursor back before moving on.
    pub fn set_cursor(&self, idx: usize) {
        self.inner.lock().unwrap().idx = idx % STREAM_CAPACITY;
    }

    pub fn short_pulse_us(&self) -> u32 {
        self.inner.lock().unwrap().short_pulse_us
    }

    pub fn set_short_pulse_us(&self, us: u32) {
        self.inner.lock().unwrap().short_pulse_us = us;
    }

    /// Clear all samples, the cursor and the clock estimate.
    pub fn reset(&self) {
        let mut s = self.inner.lock().unwrap();
        s.samples.fill(Sample::default());
        s.idx = 0;
        s.short_pulse_us = 0;
    }

    /// Snapshot `src` into `self`, so the scan/decode pipeline can work on
    /// data immune to concurrent producer writes.
    pub fn copy_from(&self, src: &SampleStream) {
        let mut dst = self.inner.lock().unwrap();
        let src = src.inner.lock().unwrap();
        dst.samples.copy_from_slice(&src.samples);
        dst.idx = src.idx;
        dst.short_pulse_us = src.short_pulse_us;
    }
}

impl Default for SampleStream {
    fn default() -> Self {
        Self::new()
    }
}
