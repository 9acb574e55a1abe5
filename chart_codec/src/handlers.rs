//! Per-instrument note handlers: how a raw note index maps onto lanes,
//! modifier flags, or retrofitted cymbal state.

use std::collections::HashSet;

use chart_model::{
    Chord, DrumsLane, DrumsNote, FiveFretLane, FiveFretNote, NoteFlags, SixFretLane, SixFretNote,
    Ticks,
};

use crate::{
    builder::{add_flag, add_note, Duplicate, NoteHandler},
    config::DuplicatePolicy,
};

const FORCED_INDEX: u32 = 5;
const TAP_INDEX: u32 = 6;
const OPEN_INDEX: u32 = 7;
/// Six-fret charts put the third black fret past the open index.
const BLACK3_INDEX: u32 = 8;
const DOUBLE_KICK_INDEX: u32 = 32;
/// Cymbal markers target a pad note by `pad index + CYMBAL_BASE`.
const CYMBAL_BASE: u32 = 64;

#[derive(Default)]
pub struct FiveFretHandler;

impl NoteHandler for FiveFretHandler {
    type Note = FiveFretNote;

    fn apply(
        &mut self,
        chord: &mut Chord<FiveFretNote>,
        index: u32,
        sustain: Ticks,
        policy: DuplicatePolicy,
    ) -> Result<bool, Duplicate> {
        let lane = match index {
            0 => FiveFretLane::Green,
            1 => FiveFretLane::Red,
            2 => FiveFretLane::Yellow,
            3 => FiveFretLane::Blue,
            4 => FiveFretLane::Orange,
            OPEN_INDEX => FiveFretLane::Open,
            FORCED_INDEX => return add_flag(chord, NoteFlags::FORCED, policy).map(|_| true),
            TAP_INDEX => return add_flag(chord, NoteFlags::TAP, policy).map(|_| true),
            _ => return Ok(false),
        };
        add_note(chord, FiveFretNote { lane, sustain }, policy).map(|_| true)
    }

    fn emit(chord: &Chord<FiveFretNote>) -> Vec<(u32, Ticks)> {
        let mut out: Vec<(u32, Ticks)> = chord
            .notes
            .iter()
            .map(|n| {
                let index = match n.lane {
                    FiveFretLane::Green => 0,
                    FiveFretLane::Red => 1,
                    FiveFretLane::Yellow => 2,
                    FiveFretLane::Blue => 3,
                    FiveFretLane::Orange => 4,
                    FiveFretLane::Open => OPEN_INDEX,
                };
                (index, n.sustain)
            })
            .collect();
        out.sort_by_key(|(i, _)| *i);
        if chord.modifiers.contains(NoteFlags::FORCED) {
            out.push((FORCED_INDEX, 0));
        }
        if chord.modifiers.contains(NoteFlags::TAP) {
            out.push((TAP_INDEX, 0));
        }
        out
    }
}

#[derive(Default)]
pub struct SixFretHandler;

impl NoteHandler for SixFretHandler {
    type Note = SixFretNote;

    fn apply(
        &mut self,
        chord: &mut Chord<SixFretNote>,
        index: u32,
        sustain: Ticks,
        policy: DuplicatePolicy,
    ) -> Result<bool, Duplicate> {
        let lane = match index {
            0 => SixFretLane::White1,
            1 => SixFretLane::White2,
            2 => SixFretLane::White3,
            3 => SixFretLane::Black1,
            4 => SixFretLane::Black2,
            BLACK3_INDEX => SixFretLane::Black3,
            OPEN_INDEX => SixFretLane::Open,
            FORCED_INDEX => return add_flag(chord, NoteFlags::FORCED, policy).map(|_| true),
            TAP_INDEX => return add_flag(chord, NoteFlags::TAP, policy).map(|_| true),
            _ => return Ok(false),
        };
        add_note(chord, SixFretNote { lane, sustain }, policy).map(|_| true)
    }

    fn emit(chord: &Chord<SixFretNote>) -> Vec<(u32, Ticks)> {
        let mut out: Vec<(u32, Ticks)> = chord
            .notes
            .iter()
            .map(|n| {
                let index = match n.lane {
                    SixFretLane::White1 => 0,
                    SixFretLane::White2 => 1,
                    SixFretLane::White3 => 2,
                    SixFretLane::Black1 => 3,
                    SixFretLane::Black2 => 4,
                    SixFretLane::Black3 => BLACK3_INDEX,
                    SixFretLane::Open => OPEN_INDEX,
                };
                (index, n.sustain)
            })
            .collect();
        out.sort_by_key(|(i, _)| *i);
        if chord.modifiers.contains(NoteFlags::FORCED) {
            out.push((FORCED_INDEX, 0));
        }
        if chord.modifiers.contains(NoteFlags::TAP) {
            out.push((TAP_INDEX, 0));
        }
        out
    }
}

/// Drums carry extra state: a cymbal marker arriving before its pad
/// creates the note, so the note's mere presence cannot tell a later pad
/// entry apart from a duplicate. `pads_seen` records which pad entries
/// have actually arrived.
#[derive(Default)]
pub struct DrumsHandler {
    pads_seen: HashSet<(Ticks, DrumsLane)>,
}

fn drums_pad(index: u32) -> Option<DrumsLane> {
    match index {
        0 => Some(DrumsLane::Kick),
        1 => Some(DrumsLane::Red),
        2 => Some(DrumsLane::Yellow),
        3 => Some(DrumsLane::Blue),
        4 => Some(DrumsLane::Green),
        5 => Some(DrumsLane::Orange),
        DOUBLE_KICK_INDEX => Some(DrumsLane::DoubleKick),
        _ => None,
    }
}

fn drums_pad_index(lane: DrumsLane) -> u32 {
    match lane {
        DrumsLane::Kick => 0,
        DrumsLane::Red => 1,
        DrumsLane::Yellow => 2,
        DrumsLane::Blue => 3,
        DrumsLane::Green => 4,
        DrumsLane::Orange => 5,
        DrumsLane::DoubleKick => DOUBLE_KICK_INDEX,
    }
}

impl NoteHandler for DrumsHandler {
    type Note = DrumsNote;

    fn apply(
        &mut self,
        chord: &mut Chord<DrumsNote>,
        index: u32,
        sustain: Ticks,
        policy: DuplicatePolicy,
    ) -> Result<bool, Duplicate> {
        let position = chord.position;
        // Cymbal markers retrofit an already-added pad note. When the pad
        // has not arrived yet, a fresh cymbal note is created instead of
        // mutating a missing one; a later pad entry then merges into it.
        if (CYMBAL_BASE + 2..=CYMBAL_BASE + 4).contains(&index) {
            let pad = match index - CYMBAL_BASE {
                2 => DrumsLane::Yellow,
                3 => DrumsLane::Blue,
                _ => DrumsLane::Green,
            };
            match chord.note_mut(pad) {
                Some(note) => {
                    if note.is_cymbal {
                        tracing::warn!(
                            position,
                            lane = ?pad,
                            "duplicate cymbal marker"
                        );
                        if policy == DuplicatePolicy::Reject {
                            return Err(Duplicate(format!("cymbal marker on lane {pad:?}")));
                        }
                    } else {
                        note.is_cymbal = true;
                    }
                }
                None => chord.notes.push(DrumsNote {
                    lane: pad,
                    sustain,
                    is_cymbal: true,
                }),
            }
            return Ok(true);
        }

        let Some(lane) = drums_pad(index) else {
            return Ok(false);
        };
        // A pad entry landing on a note the cymbal marker created first is
        // a merge: the pad contributes its sustain, the cymbal flag stays.
        // Only the first pad entry at a position merges; the next one is a
        // duplicate and goes through the policy like any other note.
        if self.pads_seen.insert((position, lane)) {
            if let Some(note) = chord.note_mut(lane) {
                if note.is_cymbal {
                    note.sustain = note.sustain.max(sustain);
                    return Ok(true);
                }
            }
        }
        add_note(
            chord,
            DrumsNote {
                lane,
                sustain,
                is_cymbal: false,
            },
            policy,
        )
        .map(|_| true)
    }

    fn emit(chord: &Chord<DrumsNote>) -> Vec<(u32, Ticks)> {
        let mut out: Vec<(u32, Ticks)> = chord
            .notes
            .iter()
            .map(|n| (drums_pad_index(n.lane), n.sustain))
            .collect();
        out.sort_by_key(|(i, _)| *i);
        for n in &chord.notes {
            if n.is_cymbal {
                out.push((drums_pad_index(n.lane) + CYMBAL_BASE, 0));
            }
        }
        out
    }
}
