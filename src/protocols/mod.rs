//! Protocol decoder registry and dispatch
//!
//! Each supported protocol implements [`ProtocolDecoder`] over the sampled
//! bitmap of a detected signal. Decoders are tried in registry order; the
//! structural fallback sits last so a specific decoder always wins when one
//! matches. Protocols that can also render a transmission from field values
//! additionally implement [`Synth`].

pub mod b4b1;
pub mod chat;
pub mod oregon2;
pub mod tpms;
pub mod unknown;

use std::time::Instant;

use tracing::debug;

use crate::bitmap::Bitmap;
use crate::config::ScanConfig;
use crate::fields::FieldSet;
use crate::sampler::signal_to_bitmap;
use crate::samples::SampleStream;

/// Size of the scratch bitmap the sampled signal is rendered into. Large
/// enough for any run the scanner can produce after bit clamping.
const DECODE_BITMAP_BYTES: usize = 4096;

/// Everything known about one decoded (or structurally analyzed) signal.
#[derive(Debug, Clone)]
pub struct MessageInfo {
    /// Registry name of the decoder that claimed the signal.
    pub decoder_name: &'static str,
    /// True when the structural fallback produced this, i.e. no specific
    /// protocol matched.
    pub fallback: bool,
    /// Typed fields extracted from the payload.
    pub fields: FieldSet,
    /// Symbol clock the signal was sampled at, in µs.
    pub short_pulse_us: u32,
    /// Offset of the message start inside the sampled bitmap.
    pub start_off: u32,
    /// Raw (line-coded) bit length of the message, from `start_off`.
    pub pulses_count: u32,
    /// The raw message bits, copied out so they start at bit 0.
    pub bits: Bitmap,
    /// Number of bytes of `bits` actually populated.
    pub bits_bytes: usize,
}

impl MessageInfo {
    fn new(short_pulse_us: u32) -> Self {
        Self {
            decoder_name: "",
            fallback: false,
            fields: FieldSet::new(),
            short_pulse_us,
            start_off: 0,
            pulses_count: 0,
            bits: Bitmap::new(0),
            bits_bytes: 0,
        }
    }
}

/// A protocol able to recognize and parse its messages out of a sampled
/// bitmap.
pub trait ProtocolDecoder: Sync {
    /// Short registry name, also used to look the protocol up for message
    /// synthesis.
    fn name(&self) -> &'static str;

    /// Try to decode a message from `bits` (`numbits` valid bits). On
    /// success fill `info` with fields, the message start offset and its raw
    /// bit length, and return true.
    fn decode(&self, bits: &Bitmap, numbits: u32, info: &mut MessageInfo) -> bool;

    /// True for the structural fallback decoder.
    fn fallback(&self) -> bool {
        false
    }

    /// The synthesis half of the protocol, when it has one.
    fn synth(&self) -> Option<&dyn Synth> {
        None
    }
}

/// Message construction: the inverse direction, from field values to a
/// pulse/gap rendering ready for transmission.
pub trait Synth {
    /// A field set with one entry per settable field, carrying defaults.
    fn describe_fields(&self) -> FieldSet;

    /// Render a message carrying `fields` into `out` as pulse/gap samples.
    /// Returns false when the fields are missing or out of range.
    fn build_message(&self, fields: &FieldSet, out: &SampleStream) -> bool;
}

/// All registered decoders, in dispatch order. The fallback must stay last.
pub fn decoders() -> &'static [&'static dyn ProtocolDecoder] {
    static REGISTRY: [&(dyn ProtocolDecoder); 5] = [
        &b4b1::B4b1,
        &oregon2::Oregon2,
        &tpms::Tpms,
        &chat::Chat,
        &unknown::Unknown,
    ];
    &REGISTRY
}

/// Look a decoder up by registry name.
pub fn find_decoder(name: &str) -> Option<&'static dyn ProtocolDecoder> {
    decoders().iter().copied().find(|d| d.name() == name)
}

/// Sample the detected signal into a bitmap and offer it to each decoder in
/// turn, returning the first successful parse.
///
/// The stream must be centered on the start of the detected run and carry
/// the clock estimate from the scanner. The sampled window starts
/// `before_samples` earlier, because sync preambles often contain a gap long
/// enough to break the coherent run right before the data starts.
pub fn decode_signal(s: &SampleStream, len: u32, config: &ScanConfig) -> Option<MessageInfo> {
    let mut bits = Bitmap::new(DECODE_BITMAP_BYTES);
    let count = len + config.before_samples + config.after_samples;
    let numbits = signal_to_bitmap(
        &mut bits,
        s,
        -(config.before_samples as i64),
        count,
        s.short_pulse_us(),
        config,
    );
    if numbits == 0 {
        return None;
    }

    for decoder in decoders() {
        let mut info = MessageInfo::new(s.short_pulse_us());
        let start = Instant::now();
        let ok = decoder.decode(&bits, numbits, &mut info);
        debug!(
            "decoder {}: {} in {:?}",
            decoder.name(),
            if ok { "matched" } else { "no match" },
            start.elapsed()
        );
        if !ok {
            continue;
        }
        info.decoder_name = decoder.name();
        info.fallback = decoder.fallback();
        if info.pulses_count > 0 {
            info.bits_bytes = (info.pulses_count as usize).div_ceil(8);
            let mut payload = Bitmap::new(info.bits_bytes);
            payload.copy_from(0, &bits, info.start_off, info.pulses_count);
            info.bits = payload;
        }
        return Some(info);
    }
    debug!("no decoder matched a {} bit sampling", numbits);
    None
}

/// Field template for synthesizing a message of the named protocol, or None
/// when the protocol does not exist or cannot build messages.
pub fn describe_fields(name: &str) -> Option<FieldSet> {
    Some(find_decoder(name)?.synth()?.describe_fields())
}

/// Render a message of the named protocol into a fresh sample stream.
pub fn build_message(name: &str, fields: &FieldSet) -> Option<SampleStream> {
    let synth = find_decoder(name)?.synth()?;
    let out = SampleStream::new();
    if !synth.build_message(fields, &out) {
        return None;
    }
    Some(out)
}

/// Append the pulses/gaps of a literal "0110..." raw bit pattern to `out`,
/// one `clock_us` interval per bit. Adjacent equal bits coalesce into a
/// single longer sample, which is also how they would come off the air.
pub(crate) fn render_pattern(out: &SampleStream, pattern: &str, clock_us: u32) {
    for ch in pattern.bytes() {
        out.push_or_coalesce(ch == b'1', clock_us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_last() {
        let regs = decoders();
        for d in &regs[..regs.len() - 1] {
            assert!(!d.fallback(), "{} must not be a fallback", d.name());
        }
        assert!(regs[regs.len() - 1].fallback());
    }

    #[test]
    fn test_registry_names_unique() {
        let mut names: Vec<_> = decoders().iter().map(|d| d.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), decoders().len());
    }

    #[test]
    fn test_find_decoder() {
        assert!(find_decoder("b4b1").is_some());
        assert!(find_decoder("nope").is_none());
    }

    #[test]
    fn test_render_pattern_coalesces() {
        let out = SampleStream::new();
        render_pattern(&out, "110100", 100);
        assert_eq!(out.get(-4), (true, 200));
        assert_eq!(out.get(-3), (false, 100));
        assert_eq!(out.get(-2), (true, 100));
        assert_eq!(out.get(-1), (false, 200));
    }
}
