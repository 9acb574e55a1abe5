//! Timed-event (Standard MIDI File) encoding.
//!
//! The container multiplexes all four difficulties of one instrument onto
//! disjoint note-number ranges of a single event stream, so the lane
//! mapper works across difficulties simultaneously. Note on/off pairs
//! become sustains; phrase markers follow the same open/close discipline,
//! per difficulty or shared across all of them.

use std::collections::HashMap;

use chart_model::{
    Difficulty, GlobalEvent, Instrument, InstrumentKind, LocalEvent, NoteFlags, Song,
    SpecialPhrase, SpecialPhraseKind, Tempo, Ticks, TimeSignature, Track,
};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use tracing::{debug, warn};

use crate::{
    builder::{NoteHandler, TrackBuilder},
    config::DecodeConfig,
    error::DecodeError,
    handlers::{DrumsHandler, FiveFretHandler, SixFretHandler},
};

const DIFFICULTY_BASES: [(Difficulty, u8); 4] = [
    (Difficulty::Easy, 60),
    (Difficulty::Medium, 72),
    (Difficulty::Hard, 84),
    (Difficulty::Expert, 96),
];

const SOLO_KEY: u8 = 103;
const STAR_POWER_KEY: u8 = 116;
const BRE_KEY: u8 = 120;
const DOUBLE_KICK_KEY: u8 = 95;
const CYMBAL_KEYS: [u8; 3] = [110, 111, 112];
const TREMOLO_KEY: u8 = 126;
const TRILL_KEY: u8 = 127;

const FIVE_FRET_FORCED_OFFSET: u8 = 5;
const FIVE_FRET_TAP_OFFSET: u8 = 6;
const SIX_FRET_FORCED_OFFSET: u8 = 9;
const SIX_FRET_TAP_OFFSET: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    FiveFret,
    SixFret,
    Drums,
}

/// Phrase state key: some markers are written once per difficulty, others
/// once for the whole instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PhraseKey {
    Shared(SpecialPhraseKind),
    PerDifficulty(Difficulty, SpecialPhraseKind),
}

#[derive(Debug, Clone, Copy)]
enum MidiAction {
    Note { difficulty: Difficulty, index: u32 },
    Modifier { difficulty: Difficulty, flags: NoteFlags },
    Phrase(PhraseKey),
    Solo,
    CymbalToggle(usize),
    Ignore,
}

fn map_key(family: Family, key: u8) -> MidiAction {
    match key {
        STAR_POWER_KEY => return MidiAction::Phrase(PhraseKey::Shared(SpecialPhraseKind::StarPower)),
        SOLO_KEY => return MidiAction::Solo,
        BRE_KEY => {
            return MidiAction::Phrase(PhraseKey::Shared(SpecialPhraseKind::BigRockEnding))
        }
        121..=124 => return MidiAction::Ignore,
        TREMOLO_KEY => {
            return MidiAction::Phrase(PhraseKey::PerDifficulty(
                Difficulty::Expert,
                SpecialPhraseKind::Tremolo,
            ))
        }
        TRILL_KEY => {
            return MidiAction::Phrase(PhraseKey::PerDifficulty(
                Difficulty::Expert,
                SpecialPhraseKind::Trill,
            ))
        }
        _ => {}
    }

    if family == Family::Drums {
        if key == DOUBLE_KICK_KEY {
            return MidiAction::Note {
                difficulty: Difficulty::Expert,
                index: 32,
            };
        }
        if let Some(i) = CYMBAL_KEYS.iter().position(|&k| k == key) {
            return MidiAction::CymbalToggle(i);
        }
    }

    for (difficulty, base) in DIFFICULTY_BASES {
        if key < base {
            continue;
        }
        let offset = key - base;
        match family {
            Family::FiveFret => match offset {
                0..=4 => {
                    return MidiAction::Note {
                        difficulty,
                        index: offset as u32,
                    }
                }
                FIVE_FRET_FORCED_OFFSET => {
                    return MidiAction::Modifier {
                        difficulty,
                        flags: NoteFlags::FORCED,
                    }
                }
                FIVE_FRET_TAP_OFFSET => {
                    return MidiAction::Modifier {
                        difficulty,
                        flags: NoteFlags::TAP,
                    }
                }
                _ => {}
            },
            Family::SixFret => match offset {
                // 0 open, 1-3 white, 4-6 black
                0 => {
                    return MidiAction::Note {
                        difficulty,
                        index: 7,
                    }
                }
                1..=5 => {
                    return MidiAction::Note {
                        difficulty,
                        index: (offset - 1) as u32,
                    }
                }
                6 => {
                    return MidiAction::Note {
                        difficulty,
                        index: 8,
                    }
                }
                SIX_FRET_FORCED_OFFSET => {
                    return MidiAction::Modifier {
                        difficulty,
                        flags: NoteFlags::FORCED,
                    }
                }
                SIX_FRET_TAP_OFFSET => {
                    return MidiAction::Modifier {
                        difficulty,
                        flags: NoteFlags::TAP,
                    }
                }
                _ => {}
            },
            Family::Drums => {
                if offset <= 5 {
                    return MidiAction::Note {
                        difficulty,
                        index: offset as u32,
                    };
                }
            }
        }
    }
    MidiAction::Ignore
}

/// Inverse of [`map_key`], used on the encode path. `None` means the
/// entry has no representation in the timed-event encoding.
fn key_for(family: Family, difficulty: Difficulty, index: u32) -> Option<u8> {
    let base = DIFFICULTY_BASES
        .iter()
        .find(|(d, _)| *d == difficulty)
        .map(|(_, b)| *b)?;
    match family {
        Family::FiveFret => match index {
            0..=4 => Some(base + index as u8),
            5 => Some(base + FIVE_FRET_FORCED_OFFSET),
            6 => Some(base + FIVE_FRET_TAP_OFFSET),
            _ => None,
        },
        Family::SixFret => match index {
            7 => Some(base),
            0..=4 => Some(base + 1 + index as u8),
            8 => Some(base + 6),
            5 => Some(base + SIX_FRET_FORCED_OFFSET),
            6 => Some(base + SIX_FRET_TAP_OFFSET),
            _ => None,
        },
        Family::Drums => match index {
            0..=5 => Some(base + index as u8),
            32 => Some(DOUBLE_KICK_KEY),
            66..=68 => Some(CYMBAL_KEYS[index as usize - 66]),
            _ => None,
        },
    }
}

fn clamp_sustain(delta: Ticks, cutoff: Ticks) -> Ticks {
    if delta < cutoff {
        0
    } else {
        delta
    }
}

struct LaneMapper<H: NoteHandler> {
    family: Family,
    config: DecodeConfig,
    builders: [TrackBuilder<H>; 4],
    open_notes: HashMap<(Difficulty, u32), Ticks>,
    open_phrases: HashMap<PhraseKey, Ticks>,
    open_solo: Option<Ticks>,
    cymbal_active: [bool; 3],
}

impl<H: NoteHandler> LaneMapper<H> {
    fn new(name: &str, family: Family, config: DecodeConfig) -> Self {
        let builders = std::array::from_fn(|i| {
            let difficulty = Difficulty::ALL[i];
            TrackBuilder::new(format!("{name} ({difficulty:?})"), difficulty)
        });
        Self {
            family,
            config,
            builders,
            open_notes: HashMap::new(),
            open_phrases: HashMap::new(),
            open_solo: None,
            cymbal_active: [false; 3],
        }
    }

    fn builder(&mut self, difficulty: Difficulty) -> &mut TrackBuilder<H> {
        &mut self.builders[difficulty as usize]
    }

    fn emit_note(
        &mut self,
        difficulty: Difficulty,
        index: u32,
        start: Ticks,
        end: Ticks,
    ) -> Result<(), DecodeError> {
        let sustain = clamp_sustain(end.saturating_sub(start), self.config.sustain_cutoff);
        let config = self.config.clone();
        self.builder(difficulty)
            .note_entry(start, index, sustain, &config)
    }

    /// Cymbal toggles are sampled when the pad opens; the marker note is
    /// fed right away and the pad's own entry merges into it on close.
    fn feed_cymbal(&mut self, difficulty: Difficulty, index: u32, position: Ticks) -> Result<(), DecodeError> {
        if self.family == Family::Drums && (2..=4).contains(&index) {
            let pad = index as usize - 2;
            if self.cymbal_active[pad] {
                let config = self.config.clone();
                self.builder(difficulty)
                    .note_entry(position, index + 64, 0, &config)?;
            }
        }
        Ok(())
    }

    fn close_phrase(&mut self, key: PhraseKey, start: Ticks, end: Ticks) {
        let phrase = |kind: SpecialPhraseKind| SpecialPhrase {
            position: start,
            kind,
            length: end.saturating_sub(start),
        };
        match key {
            PhraseKey::Shared(kind) => {
                for builder in &mut self.builders {
                    builder.add_phrase(phrase(kind));
                }
            }
            PhraseKey::PerDifficulty(difficulty, kind) => {
                self.builder(difficulty).add_phrase(phrase(kind));
            }
        }
    }

    fn close_solo(&mut self, start: Ticks, end: Ticks) {
        for builder in &mut self.builders {
            builder.add_event(LocalEvent {
                position: start,
                text: LocalEvent::SOLO.to_string(),
            });
            builder.add_event(LocalEvent {
                position: end,
                text: LocalEvent::SOLO_END.to_string(),
            });
        }
    }

    fn note_on(&mut self, position: Ticks, key: u8) -> Result<(), DecodeError> {
        match map_key(self.family, key) {
            MidiAction::Note { difficulty, index } => {
                if let Some(stale) = self.open_notes.insert((difficulty, index), position) {
                    // Unclosed note: close it at the new event's position
                    // instead of losing it.
                    debug!(?difficulty, index, stale, position, "unclosed note recovered");
                    self.emit_note(difficulty, index, stale, position)?;
                }
                self.feed_cymbal(difficulty, index, position)
            }
            MidiAction::Modifier { difficulty, flags } => {
                let config = self.config.clone();
                self.builder(difficulty).apply_flags(position, flags, &config)
            }
            MidiAction::Phrase(phrase_key) => {
                if let Some(stale) = self.open_phrases.insert(phrase_key, position) {
                    debug!(?phrase_key, stale, position, "unclosed phrase recovered");
                    self.close_phrase(phrase_key, stale, position);
                }
                Ok(())
            }
            MidiAction::Solo => {
                if let Some(stale) = self.open_solo.replace(position) {
                    debug!(stale, position, "unclosed solo marker recovered");
                    self.close_solo(stale, position);
                }
                Ok(())
            }
            MidiAction::CymbalToggle(pad) => {
                self.cymbal_active[pad] = true;
                Ok(())
            }
            MidiAction::Ignore => Ok(()),
        }
    }

    fn note_off(&mut self, position: Ticks, key: u8) -> Result<(), DecodeError> {
        match map_key(self.family, key) {
            MidiAction::Note { difficulty, index } => {
                match self.open_notes.remove(&(difficulty, index)) {
                    Some(start) => self.emit_note(difficulty, index, start, position),
                    None => {
                        // Unopened note: recover as a zero-length note at
                        // the off-event's own position.
                        debug!(?difficulty, index, position, "unopened note recovered");
                        self.feed_cymbal(difficulty, index, position)?;
                        self.emit_note(difficulty, index, position, position)
                    }
                }
            }
            MidiAction::Phrase(phrase_key) => {
                match self.open_phrases.remove(&phrase_key) {
                    Some(start) => self.close_phrase(phrase_key, start, position),
                    None => {
                        debug!(?phrase_key, position, "unopened phrase recovered");
                        self.close_phrase(phrase_key, position, position);
                    }
                }
                Ok(())
            }
            MidiAction::Solo => {
                match self.open_solo.take() {
                    Some(start) => self.close_solo(start, position),
                    None => {
                        debug!(position, "unopened solo marker recovered");
                        self.close_solo(position, position);
                    }
                }
                Ok(())
            }
            MidiAction::CymbalToggle(pad) => {
                self.cymbal_active[pad] = false;
                Ok(())
            }
            MidiAction::Modifier { .. } | MidiAction::Ignore => Ok(()),
        }
    }

    /// Free text carries no difficulty in this encoding; broadcast it to
    /// all four tracks.
    fn text_event(&mut self, position: Ticks, text: &str) {
        let text = text
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .unwrap_or(text);
        for builder in &mut self.builders {
            builder.add_event(LocalEvent {
                position,
                text: text.to_string(),
            });
        }
    }

    fn finish(
        mut self,
        kind: InstrumentKind,
        end: Ticks,
    ) -> Result<Option<Instrument<H::Note>>, DecodeError> {
        let open_notes: Vec<_> = self.open_notes.drain().collect();
        for ((difficulty, index), start) in open_notes {
            debug!(?difficulty, index, start, "note left open at end of track");
            self.emit_note(difficulty, index, start, end)?;
        }
        let open_phrases: Vec<_> = self.open_phrases.drain().collect();
        for (phrase_key, start) in open_phrases {
            debug!(?phrase_key, start, "phrase left open at end of track");
            self.close_phrase(phrase_key, start, end);
        }
        if let Some(start) = self.open_solo.take() {
            debug!(start, "solo marker left open at end of track");
            self.close_solo(start, end);
        }

        let mut instrument = Instrument::new(kind);
        let config = self.config.clone();
        for mut builder in self.builders {
            builder.finalize(&config)?;
            let difficulty = builder.difficulty();
            instrument.set_difficulty(difficulty, builder.into_track()?);
        }
        Ok(if instrument.is_empty() {
            None
        } else {
            Some(instrument)
        })
    }
}

fn track_name(track: &[TrackEvent]) -> Option<String> {
    track.iter().find_map(|event| match &event.kind {
        TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
            Some(String::from_utf8_lossy(name).into_owned())
        }
        _ => None,
    })
}

fn instrument_for_track(name: &str) -> Option<(InstrumentKind, Family)> {
    match name {
        "PART GUITAR" => Some((InstrumentKind::Guitar, Family::FiveFret)),
        "PART GUITAR COOP" => Some((InstrumentKind::CoopGuitar, Family::FiveFret)),
        "PART BASS" => Some((InstrumentKind::Bass, Family::FiveFret)),
        "PART RHYTHM" => Some((InstrumentKind::Rhythm, Family::FiveFret)),
        "PART KEYS" => Some((InstrumentKind::Keys, Family::FiveFret)),
        "PART GUITAR GHL" => Some((InstrumentKind::GhlGuitar, Family::SixFret)),
        "PART BASS GHL" => Some((InstrumentKind::GhlBass, Family::SixFret)),
        "PART DRUMS" => Some((InstrumentKind::Drums, Family::Drums)),
        _ => None,
    }
}

const EVENTS_TRACK: &str = "EVENTS";

fn decode_part<H: NoteHandler>(
    track: &[TrackEvent],
    name: &str,
    kind: InstrumentKind,
    family: Family,
    config: &DecodeConfig,
) -> Result<Option<Instrument<H::Note>>, DecodeError> {
    let mut mapper = LaneMapper::<H>::new(name, family, config.clone());
    let mut position: Ticks = 0;
    for event in track {
        position += event.delta.as_int() as Ticks;
        match &event.kind {
            TrackEventKind::Midi { message, .. } => match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                    mapper.note_on(position, key.as_int())?;
                }
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    mapper.note_off(position, key.as_int())?;
                }
                _ => {}
            },
            TrackEventKind::Meta(MetaMessage::Text(text))
            | TrackEventKind::Meta(MetaMessage::Lyric(text)) => {
                mapper.text_event(position, &String::from_utf8_lossy(text));
            }
            _ => {}
        }
    }
    mapper.finish(kind, position)
}

fn decode_global_events(track: &[TrackEvent]) -> Vec<GlobalEvent> {
    let mut events = Vec::new();
    let mut position: Ticks = 0;
    for event in track {
        position += event.delta.as_int() as Ticks;
        if let TrackEventKind::Meta(MetaMessage::Text(text))
        | TrackEventKind::Meta(MetaMessage::Lyric(text)) = &event.kind
        {
            let text = String::from_utf8_lossy(text);
            let text = text
                .strip_prefix('[')
                .and_then(|t| t.strip_suffix(']'))
                .unwrap_or(&text);
            events.push(GlobalEvent {
                position,
                text: text.to_string(),
            });
        }
    }
    events.sort_by_key(|e| e.position);
    events
}

pub(crate) fn decode_midi(bytes: &[u8], config: &DecodeConfig) -> Result<Song, DecodeError> {
    let smf = Smf::parse(bytes)?;
    let mut song = Song::default();
    song.metadata.resolution = match smf.header.timing {
        Timing::Metrical(tpq) => tpq.as_int() as Ticks,
        Timing::Timecode(..) => {
            warn!("timecode timing not meaningful for charts; using configured resolution");
            config.resolution
        }
    };

    for track in &smf.tracks {
        // Tempo and time-signature metas feed the sync track wherever
        // they appear; conventionally that is the first sub-stream.
        let mut position: Ticks = 0;
        for event in track.iter() {
            position += event.delta.as_int() as Ticks;
            match &event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(us_per_beat)) => {
                    song.sync_track.tempos.push(Tempo {
                        position,
                        bpm: 60_000_000.0 / us_per_beat.as_int() as f64,
                        anchor: None,
                    });
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, pow, _, _)) => {
                    if *pow > 7 {
                        warn!(position, pow = *pow, "time signature denominator out of range; skipped");
                    } else {
                        song.sync_track.time_signatures.push(TimeSignature {
                            position,
                            numerator: *num,
                            denominator: 1 << pow,
                        });
                    }
                }
                _ => {}
            }
        }

        let Some(name) = track_name(track) else {
            continue;
        };
        if name == EVENTS_TRACK {
            song.global_events = decode_global_events(track);
            continue;
        }
        let Some((kind, family)) = instrument_for_track(&name) else {
            debug!(name, "skipping unrecognized sub-stream");
            continue;
        };
        match family {
            Family::FiveFret => {
                if let Some(instrument) =
                    decode_part::<FiveFretHandler>(track, &name, kind, family, config)?
                {
                    if let Some(slot) = song.five_fret_mut(kind) {
                        *slot = Some(instrument);
                    }
                }
            }
            Family::SixFret => {
                if let Some(instrument) =
                    decode_part::<SixFretHandler>(track, &name, kind, family, config)?
                {
                    if let Some(slot) = song.six_fret_mut(kind) {
                        *slot = Some(instrument);
                    }
                }
            }
            Family::Drums => {
                song.drums = decode_part::<DrumsHandler>(track, &name, kind, family, config)?;
            }
        }
    }

    song.sync_track.tempos.sort_by_key(|t| t.position);
    song.sync_track.time_signatures.sort_by_key(|t| t.position);
    Ok(song)
}

// --- encode path -------------------------------------------------------

/// Event with an absolute tick, an intra-tick ordering class, and owned
/// payloads; converted to delta-encoded borrowed events just before the
/// container is written.
enum Ev {
    Tempo(f64),
    TimeSig(u8, u8),
    Name(String),
    Text(String),
    On(u8),
    Off(u8),
}

const ORDER_META: u8 = 0;
const ORDER_TOGGLE_ON: u8 = 1;
const ORDER_NOTE_OFF: u8 = 2;
const ORDER_TOGGLE_OFF: u8 = 3;
const ORDER_NOTE_ON: u8 = 4;

type AbsEvent = (Ticks, u8, Ev);

fn build_track(events: &[AbsEvent]) -> Vec<TrackEvent<'_>> {
    let mut out = Vec::with_capacity(events.len() + 1);
    let mut last: Ticks = 0;
    for (tick, _, ev) in events {
        let delta = tick - last;
        last = *tick;
        let kind = match ev {
            Ev::Tempo(bpm) => {
                TrackEventKind::Meta(MetaMessage::Tempo(((60_000_000.0 / bpm) as u32).into()))
            }
            Ev::TimeSig(num, pow) => {
                TrackEventKind::Meta(MetaMessage::TimeSignature(*num, *pow, 24, 8))
            }
            Ev::Name(name) => TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
            Ev::Text(text) => TrackEventKind::Meta(MetaMessage::Text(text.as_bytes())),
            Ev::On(key) => TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn {
                    key: (*key).into(),
                    vel: 100.into(),
                },
            },
            Ev::Off(key) => TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn {
                    key: (*key).into(),
                    vel: 0.into(),
                },
            },
        };
        out.push(TrackEvent {
            delta: delta.into(),
            kind,
        });
    }
    out.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    out
}

fn push_note_pair(events: &mut Vec<AbsEvent>, position: Ticks, key: u8, length: Ticks) {
    events.push((position, ORDER_NOTE_ON, Ev::On(key)));
    events.push((position + length, ORDER_NOTE_OFF, Ev::Off(key)));
}

fn part_events<H: NoteHandler>(
    instrument: &Instrument<H::Note>,
    family: Family,
    name: &str,
    resolution: Ticks,
) -> Vec<AbsEvent> {
    let mut events: Vec<AbsEvent> = vec![(0, ORDER_META, Ev::Name(name.to_string()))];
    let tick_length = (resolution / 4).max(1);

    for difficulty in Difficulty::ALL {
        let Some(track) = instrument.difficulty(difficulty) else {
            continue;
        };
        for chord in &track.chords {
            for (index, sustain) in H::emit(chord) {
                let Some(key) = key_for(family, difficulty, index) else {
                    debug!(index, "note entry has no timed-event representation; skipped");
                    continue;
                };
                if family == Family::Drums && (66..=68).contains(&index) {
                    // Cymbal toggles bracket the pad note so the pad's
                    // close still sees the toggle active.
                    events.push((chord.position, ORDER_TOGGLE_ON, Ev::On(key)));
                    events.push((
                        chord.position + tick_length,
                        ORDER_TOGGLE_OFF,
                        Ev::Off(key),
                    ));
                    continue;
                }
                let length = if sustain == 0 { tick_length } else { sustain };
                push_note_pair(&mut events, chord.position, key, length);
            }
        }
    }

    // Shared markers are written once, from the densest difficulty that
    // carries them.
    if let Some(track) = shared_source(instrument) {
        for phrase in &track.special_phrases {
            let key = match phrase.kind {
                SpecialPhraseKind::StarPower => STAR_POWER_KEY,
                SpecialPhraseKind::BigRockEnding => BRE_KEY,
                SpecialPhraseKind::Tremolo => TREMOLO_KEY,
                SpecialPhraseKind::Trill => TRILL_KEY,
                _ => {
                    debug!(kind = ?phrase.kind, "phrase kind has no timed-event representation");
                    continue;
                }
            };
            push_note_pair(&mut events, phrase.position, key, phrase.length.max(1));
        }
        let mut solo_open: Option<Ticks> = None;
        for event in &track.local_events {
            match event.text.as_str() {
                LocalEvent::SOLO if solo_open.is_none() => solo_open = Some(event.position),
                LocalEvent::SOLO_END => {
                    if let Some(start) = solo_open.take() {
                        push_note_pair(
                            &mut events,
                            start,
                            SOLO_KEY,
                            event.position.saturating_sub(start).max(1),
                        );
                    }
                }
                _ => {
                    events.push((event.position, ORDER_META, Ev::Text(event.text.clone())));
                }
            }
        }
    }

    events
}

fn shared_source<N: chart_model::ChordNote>(instrument: &Instrument<N>) -> Option<&Track<N>> {
    instrument
        .expert
        .as_ref()
        .or(instrument.hard.as_ref())
        .or(instrument.medium.as_ref())
        .or(instrument.easy.as_ref())
}

pub(crate) fn encode_midi(song: &Song) -> Result<Vec<u8>, DecodeError> {
    let resolution = song.metadata.resolution;
    let mut abs_tracks: Vec<Vec<AbsEvent>> = Vec::new();

    let mut tempo_track: Vec<AbsEvent> = Vec::new();
    if let Some(name) = &song.metadata.name {
        tempo_track.push((0, ORDER_META, Ev::Name(name.clone())));
    }
    for tempo in &song.sync_track.tempos {
        tempo_track.push((tempo.position, ORDER_META, Ev::Tempo(tempo.bpm)));
    }
    for ts in &song.sync_track.time_signatures {
        tempo_track.push((
            ts.position,
            ORDER_META,
            Ev::TimeSig(ts.numerator, crate::grammar::reduce_denominator(ts.denominator) as u8),
        ));
    }
    abs_tracks.push(tempo_track);

    if !song.global_events.is_empty() {
        let mut events: Vec<AbsEvent> = vec![(0, ORDER_META, Ev::Name(EVENTS_TRACK.to_string()))];
        for event in &song.global_events {
            events.push((event.position, ORDER_META, Ev::Text(format!("[{}]", event.text))));
        }
        abs_tracks.push(events);
    }

    for kind in InstrumentKind::FIVE_FRET {
        if let Some(instrument) = song.five_fret(kind) {
            abs_tracks.push(part_events::<FiveFretHandler>(
                instrument,
                Family::FiveFret,
                part_name(kind),
                resolution,
            ));
        }
    }
    for kind in InstrumentKind::SIX_FRET {
        if let Some(instrument) = song.six_fret(kind) {
            abs_tracks.push(part_events::<SixFretHandler>(
                instrument,
                Family::SixFret,
                part_name(kind),
                resolution,
            ));
        }
    }
    if let Some(instrument) = &song.drums {
        abs_tracks.push(part_events::<DrumsHandler>(
            instrument,
            Family::Drums,
            part_name(InstrumentKind::Drums),
            resolution,
        ));
    }

    for track in &mut abs_tracks {
        track.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    }
    let tracks: Vec<Vec<TrackEvent>> = abs_tracks.iter().map(|t| build_track(t)).collect();
    let smf = Smf {
        header: Header::new(Format::Parallel, Timing::Metrical((resolution as u16).into())),
        tracks,
    };
    let mut out = Vec::new();
    smf.write_std(&mut out)?;
    Ok(out)
}

fn part_name(kind: InstrumentKind) -> &'static str {
    match kind {
        InstrumentKind::Guitar => "PART GUITAR",
        InstrumentKind::CoopGuitar => "PART GUITAR COOP",
        InstrumentKind::Bass => "PART BASS",
        InstrumentKind::Rhythm => "PART RHYTHM",
        InstrumentKind::Keys => "PART KEYS",
        InstrumentKind::GhlGuitar => "PART GUITAR GHL",
        InstrumentKind::GhlBass => "PART BASS GHL",
        InstrumentKind::Drums => "PART DRUMS",
    }
}
