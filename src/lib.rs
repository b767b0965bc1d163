//! Sub-GHz pulse train decoding
//!
//! Turns the pulse/gap intervals an OOK/FSK front-end emits into decoded
//! protocol messages. The pipeline runs in stages: coherent-run detection
//! over the raw sample ring, symbol-clock estimation, bit sampling into a
//! bitmap, line-code inversion, and protocol dispatch with a structural
//! fallback for devices nobody wrote a decoder for yet.

pub mod bitmap;
pub mod config;
pub mod fields;
pub mod linecode;
pub mod protocols;
pub mod sampler;
pub mod samples;
pub mod scanner;
pub mod session;

pub use bitmap::Bitmap;
pub use config::ScanConfig;
pub use fields::{Field, FieldKind, FieldSet};
pub use protocols::{build_message, decode_signal, describe_fields, MessageInfo};
pub use samples::{Sample, SampleStream};
pub use session::Analyzer;
