//! pulsescan - decode pulse trains from a capture feed
//!
//! Reads signed pulse/gap durations in microseconds from stdin (positive =
//! RF on, negative = RF off, whitespace separated), runs the scan/decode
//! pipeline over them and logs every decoded message with its fields.
//! Typical input comes from a front-end dump or a logic analyzer export.

use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pulse_decode::{Analyzer, MessageInfo, ScanConfig};

fn report(msg: &MessageInfo) {
    info!(
        "decoded {}{}: {} raw bits, clock {}us",
        msg.decoder_name,
        if msg.fallback { " (structural)" } else { "" },
        msg.pulses_count,
        msg.short_pulse_us
    );
    for field in msg.fields.iter() {
        info!("  {} = {}", field.name(), field.render());
    }
    info!("  bits: {}", msg.bits.to_bit_string(0, msg.pulses_count));
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ScanConfig::from_env();
    let min_duration = config.min_duration_us;
    let mut analyzer = Analyzer::new(config);

    // Reader thread feeding the sample channel; the scan loop must never
    // block on input while a signal is being analyzed.
    let (tx, rx) = bounded::<i32>(4096);
    let reader = thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };
            for token in line.split_whitespace() {
                if let Ok(v) = token.parse::<i32>() {
                    if v != 0 && tx.send(v).is_err() {
                        return;
                    }
                }
            }
        }
    });

    info!("pulsescan ready, feeding samples (min pulse {}us)", min_duration);

    let mut messages = 0u64;
    loop {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(v) => analyzer.push_sample(v > 0, v.unsigned_abs()),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if analyzer.should_rescan() {
            if let Some(msg) = analyzer.scan_and_decode(min_duration) {
                report(msg);
                messages += 1;
                analyzer.reset();
            }
        }
    }

    // The feed ended; scan whatever is left in the ring.
    if let Some(msg) = analyzer.scan_and_decode(min_duration) {
        report(msg);
        messages += 1;
    }

    let _ = reader.join();
    info!("feed closed, {} message(s) decoded", messages);
    Ok(())
}
