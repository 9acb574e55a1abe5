//! Per-section decoders and the header table that routes a section name to
//! the decoder responsible for it.

use chart_model::{
    Difficulty, GlobalEvent, Instrument, InstrumentKind, Metadata, Song, SyncTrack, Tempo,
    TimeSignature, Ticks,
};
use tracing::{debug, warn};

use crate::{
    builder::TrackBuilder,
    config::DecodeConfig,
    error::DecodeError,
    grammar::{self, EntryKind},
    handlers::{DrumsHandler, FiveFretHandler, SixFretHandler},
};

pub const SONG_SECTION: &str = "Song";
pub const SYNC_TRACK_SECTION: &str = "SyncTrack";
pub const EVENTS_SECTION: &str = "Events";

/// One section's decoder: fed the lines strictly between the section's
/// opening and closing markers, finalized once the stream ends, then
/// applied into the song during assembly.
pub trait SectionDecoder: Send {
    fn feed(&mut self, line: &str) -> Result<(), DecodeError>;
    fn finalize(&mut self) -> Result<(), DecodeError>;
    fn apply(self: Box<Self>, song: &mut Song) -> Result<(), DecodeError>;
}

/// Look up the decoder for a section header. `None` means the section is
/// unrecognized and its content should be consumed and skipped.
pub fn decoder_for(header: &str, config: &DecodeConfig) -> Option<Box<dyn SectionDecoder>> {
    match header {
        SONG_SECTION => return Some(Box::new(MetadataDecoder::default())),
        SYNC_TRACK_SECTION => return Some(Box::new(SyncTrackDecoder::new(header))),
        EVENTS_SECTION => return Some(Box::new(GlobalEventsDecoder::default())),
        _ => {}
    }

    let (difficulty, rest) = split_difficulty(header)?;
    let kind = instrument_for_suffix(rest)?;
    let section = header.to_string();
    let config = config.clone();
    Some(match kind {
        InstrumentKind::Drums => Box::new(DrumsSection {
            kind,
            builder: TrackBuilder::new(section, difficulty),
            config,
        }),
        InstrumentKind::GhlGuitar | InstrumentKind::GhlBass => Box::new(SixFretSection {
            kind,
            builder: TrackBuilder::new(section, difficulty),
            config,
        }),
        _ => Box::new(FiveFretSection {
            kind,
            builder: TrackBuilder::new(section, difficulty),
            config,
        }),
    })
}

fn split_difficulty(header: &str) -> Option<(Difficulty, &str)> {
    for (prefix, difficulty) in [
        ("Easy", Difficulty::Easy),
        ("Medium", Difficulty::Medium),
        ("Hard", Difficulty::Hard),
        ("Expert", Difficulty::Expert),
    ] {
        if let Some(rest) = header.strip_prefix(prefix) {
            return Some((difficulty, rest));
        }
    }
    None
}

fn instrument_for_suffix(suffix: &str) -> Option<InstrumentKind> {
    match suffix {
        "Single" => Some(InstrumentKind::Guitar),
        "DoubleGuitar" => Some(InstrumentKind::CoopGuitar),
        "DoubleBass" => Some(InstrumentKind::Bass),
        "DoubleRhythm" => Some(InstrumentKind::Rhythm),
        "Keyboard" => Some(InstrumentKind::Keys),
        "GHLGuitar" => Some(InstrumentKind::GhlGuitar),
        "GHLBass" => Some(InstrumentKind::GhlBass),
        "Drums" => Some(InstrumentKind::Drums),
        _ => None,
    }
}

/// Inverse of the header table, used on the encode path.
pub fn section_name(kind: InstrumentKind, difficulty: Difficulty) -> String {
    let prefix = match difficulty {
        Difficulty::Easy => "Easy",
        Difficulty::Medium => "Medium",
        Difficulty::Hard => "Hard",
        Difficulty::Expert => "Expert",
    };
    let suffix = match kind {
        InstrumentKind::Guitar => "Single",
        InstrumentKind::CoopGuitar => "DoubleGuitar",
        InstrumentKind::Bass => "DoubleBass",
        InstrumentKind::Rhythm => "DoubleRhythm",
        InstrumentKind::Keys => "Keyboard",
        InstrumentKind::GhlGuitar => "GHLGuitar",
        InstrumentKind::GhlBass => "GHLBass",
        InstrumentKind::Drums => "Drums",
    };
    format!("{prefix}{suffix}")
}

#[derive(Default)]
struct MetadataDecoder {
    pairs: Vec<(String, String)>,
    done: bool,
}

impl SectionDecoder for MetadataDecoder {
    fn feed(&mut self, line: &str) -> Result<(), DecodeError> {
        match grammar::parse_key_value(line) {
            Some((key, value)) => self.pairs.push((key.to_string(), value.to_string())),
            None => debug!(line, "skipping metadata line without separator"),
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), DecodeError> {
        self.done = true;
        Ok(())
    }

    fn apply(self: Box<Self>, song: &mut Song) -> Result<(), DecodeError> {
        if !self.done {
            return Err(DecodeError::ResultNotReady);
        }
        let mut metadata = Metadata {
            raw: self.pairs,
            ..Metadata::default()
        };
        for (key, value) in &metadata.raw {
            let bare = grammar::strip_quotes(value);
            match key.as_str() {
                "Resolution" => match bare.parse::<Ticks>() {
                    Ok(resolution) => metadata.resolution = resolution,
                    Err(_) => warn!(value = %bare, "unparseable resolution; keeping default"),
                },
                "Name" => metadata.name = Some(bare.to_string()),
                "Artist" => metadata.artist = Some(bare.to_string()),
                "Charter" => metadata.charter = Some(bare.to_string()),
                "Offset" => metadata.offset = bare.parse().ok(),
                _ => {}
            }
        }
        song.metadata = metadata;
        Ok(())
    }
}

struct SyncTrackDecoder {
    section: String,
    tempos: Vec<Tempo>,
    time_signatures: Vec<TimeSignature>,
    anchors: Vec<(Ticks, f64)>,
    done: bool,
}

impl SyncTrackDecoder {
    fn new(section: &str) -> Self {
        Self {
            section: section.to_string(),
            tempos: Vec::new(),
            time_signatures: Vec::new(),
            anchors: Vec::new(),
            done: false,
        }
    }
}

impl SectionDecoder for SyncTrackDecoder {
    fn feed(&mut self, line: &str) -> Result<(), DecodeError> {
        let entry = grammar::parse_entry(line)
            .map_err(|cause| DecodeError::malformed(&self.section, line, cause))?;
        match entry.kind {
            EntryKind::Tempo => {
                let raw = grammar::parse_u64(entry.data, "tempo")
                    .map_err(|cause| DecodeError::malformed(&self.section, line, cause))?;
                self.tempos.push(Tempo {
                    position: entry.position,
                    bpm: grammar::decode_scaled(raw),
                    anchor: None,
                });
            }
            EntryKind::Anchor => {
                let raw = grammar::parse_u64(entry.data, "anchor")
                    .map_err(|cause| DecodeError::malformed(&self.section, line, cause))?;
                self.anchors
                    .push((entry.position, grammar::decode_scaled(raw)));
            }
            EntryKind::TimeSignature => {
                let mut parts = entry.data.splitn(2, char::is_whitespace);
                let numerator = grammar::parse_int(parts.next().unwrap_or(""), "numerator")
                    .map_err(|cause| DecodeError::malformed(&self.section, line, cause))?;
                let exponent = match parts.next() {
                    Some(raw) => grammar::parse_int(raw.trim(), "denominator")
                        .map_err(|cause| DecodeError::malformed(&self.section, line, cause))?,
                    None => 2,
                };
                let denominator = grammar::expand_denominator(exponent)
                    .map_err(|cause| DecodeError::malformed(&self.section, line, cause))?;
                self.time_signatures.push(TimeSignature {
                    position: entry.position,
                    numerator: numerator as u8,
                    denominator,
                });
            }
            _ => debug!(section = %self.section, ?entry, "skipping entry kind foreign to the sync track"),
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), DecodeError> {
        self.tempos.sort_by_key(|t| t.position);
        self.time_signatures.sort_by_key(|t| t.position);
        for (position, anchor) in self.anchors.drain(..) {
            match self.tempos.iter_mut().find(|t| t.position == position) {
                Some(tempo) => tempo.anchor = Some(anchor),
                None => warn!(position, "anchor without a tempo at its position"),
            }
        }
        self.done = true;
        Ok(())
    }

    fn apply(self: Box<Self>, song: &mut Song) -> Result<(), DecodeError> {
        if !self.done {
            return Err(DecodeError::ResultNotReady);
        }
        song.sync_track = SyncTrack {
            tempos: self.tempos,
            time_signatures: self.time_signatures,
        };
        Ok(())
    }
}

#[derive(Default)]
struct GlobalEventsDecoder {
    events: Vec<GlobalEvent>,
    done: bool,
}

impl SectionDecoder for GlobalEventsDecoder {
    fn feed(&mut self, line: &str) -> Result<(), DecodeError> {
        let entry = grammar::parse_entry(line)
            .map_err(|cause| DecodeError::malformed(EVENTS_SECTION, line, cause))?;
        if entry.kind == EntryKind::Event {
            self.events.push(GlobalEvent {
                position: entry.position,
                text: grammar::strip_quotes(entry.data).to_string(),
            });
        } else {
            debug!(?entry, "skipping non-event entry in global events");
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), DecodeError> {
        self.events.sort_by_key(|e| e.position);
        self.done = true;
        Ok(())
    }

    fn apply(self: Box<Self>, song: &mut Song) -> Result<(), DecodeError> {
        if !self.done {
            return Err(DecodeError::ResultNotReady);
        }
        song.global_events = self.events;
        Ok(())
    }
}

struct FiveFretSection {
    kind: InstrumentKind,
    builder: TrackBuilder<FiveFretHandler>,
    config: DecodeConfig,
}

impl SectionDecoder for FiveFretSection {
    fn feed(&mut self, line: &str) -> Result<(), DecodeError> {
        self.builder.feed(line, &self.config)
    }

    fn finalize(&mut self) -> Result<(), DecodeError> {
        self.builder.finalize(&self.config)
    }

    fn apply(self: Box<Self>, song: &mut Song) -> Result<(), DecodeError> {
        let kind = self.kind;
        if let Some(track) = self.builder.into_track()? {
            if let Some(slot) = song.five_fret_mut(kind) {
                let instrument = slot.get_or_insert_with(|| Instrument::new(kind));
                instrument.set_difficulty(track.difficulty, Some(track));
            }
        }
        Ok(())
    }
}

struct SixFretSection {
    kind: InstrumentKind,
    builder: TrackBuilder<SixFretHandler>,
    config: DecodeConfig,
}

impl SectionDecoder for SixFretSection {
    fn feed(&mut self, line: &str) -> Result<(), DecodeError> {
        self.builder.feed(line, &self.config)
    }

    fn finalize(&mut self) -> Result<(), DecodeError> {
        self.builder.finalize(&self.config)
    }

    fn apply(self: Box<Self>, song: &mut Song) -> Result<(), DecodeError> {
        let kind = self.kind;
        if let Some(track) = self.builder.into_track()? {
            if let Some(slot) = song.six_fret_mut(kind) {
                let instrument = slot.get_or_insert_with(|| Instrument::new(kind));
                instrument.set_difficulty(track.difficulty, Some(track));
            }
        }
        Ok(())
    }
}

struct DrumsSection {
    kind: InstrumentKind,
    builder: TrackBuilder<DrumsHandler>,
    config: DecodeConfig,
}

impl SectionDecoder for DrumsSection {
    fn feed(&mut self, line: &str) -> Result<(), DecodeError> {
        self.builder.feed(line, &self.config)
    }

    fn finalize(&mut self) -> Result<(), DecodeError> {
        self.builder.finalize(&self.config)
    }

    fn apply(self: Box<Self>, song: &mut Song) -> Result<(), DecodeError> {
        let kind = self.kind;
        if let Some(track) = self.builder.into_track()? {
            let instrument = song.drums.get_or_insert_with(|| Instrument::new(kind));
            instrument.set_difficulty(track.difficulty, Some(track));
        }
        Ok(())
    }
}
