//! Audio normalization and chunking.
//!
//! [`convert`] turns arbitrary voice-note formats into normalized PCM WAVs via
//! ffmpeg; [`chunk`] splits those WAVs into overlapping fixed windows sized
//! for the ASR providers.

pub mod chunk;
pub mod convert;

pub use chunk::{ChunkDescriptor, ChunkingError, chunk_wav, plan_windows, probe_duration};
pub use convert::{Conversion, ConversionError, convert_to_wav};
