//! Track-building state machine.
//!
//! Folds an ordered entry stream into a chord list while enforcing the
//! one-note-per-lane invariant and the caller's duplicate policy. Entries
//! may arrive out of strict time order; positions already built are found
//! by binary search and merged into, never duplicated.

use chart_model::{
    Chord, ChordNote, Difficulty, LocalEvent, NoteFlags, SpecialPhrase, SpecialPhraseKind, Ticks,
    Track,
};
use tracing::{debug, warn};

use crate::{
    config::{DecodeConfig, DuplicatePolicy},
    error::{DecodeError, EntryError},
    grammar::{self, EntryKind},
    phrase,
};

/// Duplicate detection result: a human-readable description of what
/// collided, used when the policy rejects.
pub struct Duplicate(pub String);

/// Instrument-specific strategy deciding how a raw note entry maps onto
/// lanes, modifiers, or retrofitted note state. Handlers may carry state
/// across entries (the drums handler remembers which pads it has seen so a
/// cymbal merge is not mistaken for a fresh pad).
pub trait NoteHandler: Default {
    type Note: ChordNote;

    /// Apply one note entry to the chord. `Ok(true)` means applied,
    /// `Ok(false)` means the index is not meaningful for this instrument.
    fn apply(
        &mut self,
        chord: &mut Chord<Self::Note>,
        index: u32,
        sustain: Ticks,
        policy: DuplicatePolicy,
    ) -> Result<bool, Duplicate>;

    /// Inverse of `apply`: the note entries that reproduce this chord.
    fn emit(chord: &Chord<Self::Note>) -> Vec<(u32, Ticks)>;
}

/// Add a note to a chord, consulting the duplicate policy when the lane is
/// already occupied. Detection is logged regardless of the outcome.
pub(crate) fn add_note<N: ChordNote>(
    chord: &mut Chord<N>,
    note: N,
    policy: DuplicatePolicy,
) -> Result<(), Duplicate> {
    let position = chord.position;
    if let Some(existing) = chord.note_mut(note.lane()) {
        warn!(
            position,
            lane = ?note.lane(),
            ?policy,
            "duplicate note in chord"
        );
        return match policy {
            DuplicatePolicy::Ignore => Ok(()),
            DuplicatePolicy::Overwrite => {
                *existing = note;
                Ok(())
            }
            DuplicatePolicy::Reject => Err(Duplicate(format!("note on lane {:?}", note.lane()))),
        };
    }
    chord.notes.push(note);
    Ok(())
}

/// OR a modifier flag into a chord, consulting the duplicate policy when
/// the flag is already set.
pub(crate) fn add_flag<N: ChordNote>(
    chord: &mut Chord<N>,
    flag: NoteFlags,
    policy: DuplicatePolicy,
) -> Result<(), Duplicate> {
    if chord.modifiers.contains(flag) {
        warn!(
            position = chord.position,
            flag = flag.0,
            ?policy,
            "duplicate modifier flag on chord"
        );
        if policy == DuplicatePolicy::Reject {
            return Err(Duplicate(format!("modifier flag {:#04b}", flag.0)));
        }
        return Ok(());
    }
    chord.modifiers.insert(flag);
    Ok(())
}

pub struct TrackBuilder<H: NoteHandler> {
    section: String,
    difficulty: Difficulty,
    handler: H,
    chords: Vec<Chord<H::Note>>,
    local_events: Vec<LocalEvent>,
    special_phrases: Vec<SpecialPhrase>,
    /// Index of the chord most entries are currently landing on.
    current: Option<usize>,
    finalized: bool,
}

impl<H: NoteHandler> TrackBuilder<H> {
    pub fn new(section: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            section: section.into(),
            difficulty,
            handler: H::default(),
            chords: Vec::new(),
            local_events: Vec::new(),
            special_phrases: Vec::new(),
            current: None,
            finalized: false,
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Locate (or create) the chord at `position` and return its index.
    /// The index is returned rather than a reference so every handling
    /// step re-borrows explicitly; nothing aliases across steps.
    fn chord_index(&mut self, position: Ticks) -> usize {
        if let Some(i) = self.current {
            if self.chords[i].position == position {
                return i;
            }
        }
        let i = match self
            .chords
            .binary_search_by_key(&position, |c| c.position)
        {
            Ok(i) => i,
            Err(i) => {
                self.chords.insert(i, Chord::new(position));
                i
            }
        };
        self.current = Some(i);
        i
    }

    /// Feed one raw text line.
    pub fn feed(&mut self, line: &str, config: &DecodeConfig) -> Result<(), DecodeError> {
        let entry = grammar::parse_entry(line)
            .map_err(|cause| DecodeError::malformed(&self.section, line, cause))?;
        match entry.kind {
            EntryKind::Note => {
                let (index, sustain) = split_pair(entry.data, "note index", "sustain")
                    .map_err(|cause| DecodeError::malformed(&self.section, line, cause))?;
                self.note_entry(entry.position, index, sustain, config)
            }
            EntryKind::Special => {
                let (code, length) = split_pair(entry.data, "phrase type", "phrase length")
                    .map_err(|cause| DecodeError::malformed(&self.section, line, cause))?;
                let code = u8::try_from(code).map_err(|_| {
                    DecodeError::malformed(
                        &self.section,
                        line,
                        EntryError::BadInteger {
                            field: "phrase type",
                        },
                    )
                })?;
                self.add_phrase(SpecialPhrase {
                    position: entry.position,
                    kind: SpecialPhraseKind::from_code(code),
                    length,
                });
                Ok(())
            }
            EntryKind::Event => {
                self.add_event(LocalEvent {
                    position: entry.position,
                    text: grammar::strip_quotes(entry.data).to_string(),
                });
                Ok(())
            }
            _ => {
                debug!(section = %self.section, ?entry, "skipping entry kind foreign to track sections");
                Ok(())
            }
        }
    }

    /// Apply one note entry (text index form) at a position.
    pub fn note_entry(
        &mut self,
        position: Ticks,
        index: u32,
        sustain: Ticks,
        config: &DecodeConfig,
    ) -> Result<(), DecodeError> {
        let i = self.chord_index(position);
        match self
            .handler
            .apply(&mut self.chords[i], index, sustain, config.duplicate_policy)
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(section = %self.section, index, "unrecognized note index; skipped");
                Ok(())
            }
            Err(Duplicate(detail)) => Err(DecodeError::DuplicateObject {
                section: self.section.clone(),
                position,
                detail,
            }),
        }
    }

    /// Apply modifier flags at a position (timed-event path, where
    /// modifiers arrive as their own markers).
    pub fn apply_flags(
        &mut self,
        position: Ticks,
        flags: NoteFlags,
        config: &DecodeConfig,
    ) -> Result<(), DecodeError> {
        let i = self.chord_index(position);
        add_flag(&mut self.chords[i], flags, config.duplicate_policy).map_err(|Duplicate(detail)| {
            DecodeError::DuplicateObject {
                section: self.section.clone(),
                position,
                detail,
            }
        })
    }

    /// Append a local event. Events never merge.
    pub fn add_event(&mut self, event: LocalEvent) {
        self.local_events.push(event);
    }

    /// Append a raw special phrase; resolution happens at finalization.
    pub fn add_phrase(&mut self, phrase: SpecialPhrase) {
        self.special_phrases.push(phrase);
    }

    /// Exhausted the entry stream: resolve phrases and mark ready. Chord
    /// notes are normalized to lane order so the same song compares equal
    /// no matter which source format (or entry order) produced it.
    pub fn finalize(&mut self, config: &DecodeConfig) -> Result<(), DecodeError> {
        for chord in &mut self.chords {
            chord.notes.sort_by_key(|n| n.lane());
        }
        self.local_events.sort_by_key(|e| e.position);
        phrase::resolve(
            &mut self.special_phrases,
            &mut self.local_events,
            config,
            &self.section,
        )?;
        self.finalized = true;
        Ok(())
    }

    /// Consume the builder. A track with no content decodes to `None`,
    /// matching the convention that omitted sections mean "no data".
    pub fn into_track(self) -> Result<Option<Track<H::Note>>, DecodeError> {
        if !self.finalized {
            return Err(DecodeError::ResultNotReady);
        }
        let track = Track {
            difficulty: self.difficulty,
            chords: self.chords,
            local_events: self.local_events,
            special_phrases: self.special_phrases,
        };
        Ok(if track.is_empty() { None } else { Some(track) })
    }
}

fn split_pair(
    data: &str,
    first: &'static str,
    second: &'static str,
) -> Result<(u32, u32), EntryError> {
    let mut parts = data.splitn(2, char::is_whitespace);
    let a = grammar::parse_int(parts.next().unwrap_or(""), first)?;
    let b = grammar::parse_int(parts.next().unwrap_or("").trim(), second)?;
    Ok((a, b))
}
