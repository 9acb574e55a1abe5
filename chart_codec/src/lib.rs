//! Codec for rhythm-game charts: the section-based text form and the
//! timed-event (Standard MIDI File) container both decode into the same
//! [`chart_model::Song`], and a song encodes back out to either.
//!
//! Decoding is available in two modes: blocking, over a complete in-memory
//! input, and incremental, over an async line source with one concurrent
//! decode task per section and cooperative cancellation.

use std::path::Path;

use chart_model::Song;
use tokio::io::AsyncBufRead;

mod builder;
mod grammar;
mod handlers;
mod midi;
mod phrase;
mod reader;
mod sections;
mod write;

pub mod config;
pub mod error;

pub use config::{DecodeConfig, DuplicatePolicy, OverlapPolicy};
pub use error::{DecodeError, EntryError};
pub use tokio_util::sync::CancellationToken;

/// Decode a complete text chart held in memory.
pub fn decode_chart_str(src: &str, config: &DecodeConfig) -> Result<Song, DecodeError> {
    reader::decode_sections(src, config)
}

/// Decode a text chart incrementally from an async line source. Each
/// section decodes on its own task while reading continues.
pub async fn decode_chart_stream<R>(reader: R, config: &DecodeConfig) -> Result<Song, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    reader::decode_stream(reader, config, CancellationToken::new()).await
}

/// Like [`decode_chart_stream`], but stoppable: cancelling the token stops
/// the read loop and every in-flight section task promptly. The partial
/// result contains only sections that had already finalized.
pub async fn decode_chart_stream_with_cancel<R>(
    reader: R,
    config: &DecodeConfig,
    cancel: CancellationToken,
) -> Result<Song, DecodeError>
where
    R: AsyncBufRead + Unpin,
{
    reader::decode_stream(reader, config, cancel).await
}

/// Decode a chart from the timed-event container format.
pub fn decode_midi_bytes(bytes: &[u8], config: &DecodeConfig) -> Result<Song, DecodeError> {
    midi::decode_midi(bytes, config)
}

/// Serialize a song to the text format.
pub fn encode_chart(song: &Song) -> String {
    write::encode_chart(song)
}

/// Rewrite an existing text chart in place: sections the song carries are
/// re-serialized, everything else is preserved byte-for-byte.
pub fn splice_chart(existing: &str, song: &Song) -> String {
    write::splice_chart(existing, song)
}

/// Serialize a song to the timed-event container format.
pub fn encode_midi(song: &Song) -> Result<Vec<u8>, DecodeError> {
    midi::encode_midi(song)
}

/// Decode a chart file, dispatching on its extension: `.mid`/`.midi` is
/// read as the timed-event container, anything else as text.
pub fn decode_file(path: impl AsRef<Path>, config: &DecodeConfig) -> Result<Song, DecodeError> {
    let path = path.as_ref();
    let is_midi = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mid") || e.eq_ignore_ascii_case("midi"));
    if is_midi {
        let bytes = std::fs::read(path)?;
        decode_midi_bytes(&bytes, config)
    } else {
        let text = std::fs::read_to_string(path)?;
        decode_chart_str(&text, config)
    }
}

#[cfg(test)]
mod tests;
