//! Text serialization: whole-song encoding and the splicing writer that
//! rewrites only the sections a song carries, leaving everything else in
//! an existing file byte-for-byte intact.

use std::fmt::Write as _;

use chart_model::{Difficulty, Instrument, InstrumentKind, Song, Track};

use crate::{
    builder::NoteHandler,
    grammar,
    handlers::{DrumsHandler, FiveFretHandler, SixFretHandler},
    sections::{self, EVENTS_SECTION, SONG_SECTION, SYNC_TRACK_SECTION},
};

const CHART_INDENT: &str = "  ";

// Intra-position ordering of track entry kinds.
const ORDER_NOTE: u8 = 0;
const ORDER_SPECIAL: u8 = 1;
const ORDER_EVENT: u8 = 2;

fn metadata_lines(song: &Song) -> Vec<String> {
    let metadata = &song.metadata;
    if !metadata.raw.is_empty() {
        // Round-tripping a decoded file: re-emit the pairs verbatim so
        // keys this codec does not model survive.
        return metadata
            .raw
            .iter()
            .map(|(key, value)| format!("{key} = {value}"))
            .collect();
    }
    let mut lines = vec![format!("Resolution = {}", metadata.resolution)];
    if let Some(name) = &metadata.name {
        lines.push(format!("Name = \"{name}\""));
    }
    if let Some(artist) = &metadata.artist {
        lines.push(format!("Artist = \"{artist}\""));
    }
    if let Some(charter) = &metadata.charter {
        lines.push(format!("Charter = \"{charter}\""));
    }
    if let Some(offset) = metadata.offset {
        lines.push(format!("Offset = {offset}"));
    }
    lines
}

fn sync_track_lines(song: &Song) -> Vec<String> {
    // Anchor precedes its tempo at the same position.
    let mut entries: Vec<(u32, u8, String)> = Vec::new();
    for ts in &song.sync_track.time_signatures {
        let line = if ts.denominator == 4 {
            format!("{} = TS {}", ts.position, ts.numerator)
        } else {
            format!(
                "{} = TS {} {}",
                ts.position,
                ts.numerator,
                grammar::reduce_denominator(ts.denominator)
            )
        };
        entries.push((ts.position, 0, line));
    }
    for tempo in &song.sync_track.tempos {
        if let Some(anchor) = tempo.anchor {
            entries.push((
                tempo.position,
                1,
                format!("{} = A {}", tempo.position, grammar::encode_scaled(anchor)),
            ));
        }
        entries.push((
            tempo.position,
            2,
            format!("{} = B {}", tempo.position, grammar::encode_scaled(tempo.bpm)),
        ));
    }
    entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    entries.into_iter().map(|(_, _, line)| line).collect()
}

fn global_event_lines(song: &Song) -> Vec<String> {
    song.global_events
        .iter()
        .map(|event| format!("{} = E \"{}\"", event.position, event.text))
        .collect()
}

fn track_lines<H: NoteHandler>(track: &Track<H::Note>) -> Vec<String> {
    let mut entries: Vec<(u32, u8, String)> = Vec::new();
    for chord in &track.chords {
        for (index, sustain) in H::emit(chord) {
            entries.push((
                chord.position,
                ORDER_NOTE,
                format!("{} = N {index} {sustain}", chord.position),
            ));
        }
    }
    for phrase in &track.special_phrases {
        entries.push((
            phrase.position,
            ORDER_SPECIAL,
            format!(
                "{} = S {} {}",
                phrase.position,
                phrase.kind.code(),
                phrase.length
            ),
        ));
    }
    for event in &track.local_events {
        entries.push((
            event.position,
            ORDER_EVENT,
            format!("{} = E {}", event.position, event.text),
        ));
    }
    entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    entries.into_iter().map(|(_, _, line)| line).collect()
}

fn render_block(header: &str, lines: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[{header}]");
    out.push_str("{\n");
    for line in lines {
        let _ = writeln!(out, "{CHART_INDENT}{line}");
    }
    out.push('}');
    out
}

fn instrument_blocks<H: NoteHandler>(
    instrument: &Instrument<H::Note>,
    kind: InstrumentKind,
    blocks: &mut Vec<(String, String)>,
) {
    for difficulty in Difficulty::ALL {
        if let Some(track) = instrument.difficulty(difficulty) {
            let header = sections::section_name(kind, difficulty);
            let block = render_block(&header, &track_lines::<H>(track));
            blocks.push((header, block));
        }
    }
}

/// Every section this song serializes to, in canonical order, as
/// `(header, rendered block)` pairs.
fn section_blocks(song: &Song) -> Vec<(String, String)> {
    let mut blocks = vec![(
        SONG_SECTION.to_string(),
        render_block(SONG_SECTION, &metadata_lines(song)),
    )];
    if !song.sync_track.is_empty() {
        blocks.push((
            SYNC_TRACK_SECTION.to_string(),
            render_block(SYNC_TRACK_SECTION, &sync_track_lines(song)),
        ));
    }
    if !song.global_events.is_empty() {
        blocks.push((
            EVENTS_SECTION.to_string(),
            render_block(EVENTS_SECTION, &global_event_lines(song)),
        ));
    }
    for kind in InstrumentKind::FIVE_FRET {
        if let Some(instrument) = song.five_fret(kind) {
            instrument_blocks::<FiveFretHandler>(instrument, kind, &mut blocks);
        }
    }
    for kind in InstrumentKind::SIX_FRET {
        if let Some(instrument) = song.six_fret(kind) {
            instrument_blocks::<SixFretHandler>(instrument, kind, &mut blocks);
        }
    }
    if let Some(instrument) = &song.drums {
        instrument_blocks::<DrumsHandler>(instrument, InstrumentKind::Drums, &mut blocks);
    }
    blocks
}

/// Serialize the whole song to text form.
pub(crate) fn encode_chart(song: &Song) -> String {
    let blocks = section_blocks(song);
    let mut out = String::new();
    for (_, block) in blocks {
        out.push_str(&block);
        out.push('\n');
    }
    out
}

/// Rewrite `existing` so that every section this song carries is replaced
/// with its freshly serialized form. Sections the song does not carry, and
/// any content between sections, pass through untouched. Sections the song
/// carries that the file lacks are appended at the end.
pub(crate) fn splice_chart(existing: &str, song: &Song) -> String {
    let mut blocks = section_blocks(song);
    let mut out: Vec<String> = Vec::new();
    let mut lines = existing.split('\n').peekable();

    while let Some(raw) = lines.next() {
        let line = raw.trim();
        let header = line
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'));
        let replacement = header.and_then(|h| {
            blocks
                .iter()
                .position(|(name, _)| name == h)
                .map(|i| blocks.remove(i).1)
        });
        let Some(block) = replacement else {
            out.push(raw.to_string());
            continue;
        };
        // Consume the old body through its closing marker, then emit the
        // new block in its place.
        let mut opened = false;
        for old in lines.by_ref() {
            let old = old.trim();
            if !opened {
                if old == "{" {
                    opened = true;
                }
                continue;
            }
            if old == "}" {
                break;
            }
        }
        out.extend(block.split('\n').map(str::to_string));
    }

    // Whatever was not matched in place goes at the end.
    if !blocks.is_empty() {
        while out.last().is_some_and(|l| l.trim().is_empty()) {
            out.pop();
        }
        for (_, block) in blocks {
            out.extend(block.split('\n').map(str::to_string));
        }
        out.push(String::new());
    }

    out.join("\n")
}
