use serde::{Deserialize, Serialize};

use crate::{LocalEvent, SpecialPhrase, Ticks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FiveFretLane {
    Open,
    Green,
    Red,
    Yellow,
    Blue,
    Orange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SixFretLane {
    Open,
    White1,
    White2,
    White3,
    Black1,
    Black2,
    Black3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DrumsLane {
    Kick,
    DoubleKick,
    Red,
    Yellow,
    Blue,
    Green,
    /// Fifth pad on five-lane kits.
    Orange,
}

/// Chord-level modifier flags. Stored as a bit set so a chord can carry
/// several at once (for example forced and tap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NoteFlags(pub u8);

impl NoteFlags {
    pub const NONE: NoteFlags = NoteFlags(0);
    /// Forced HOPO inversion.
    pub const FORCED: NoteFlags = NoteFlags(1 << 0);
    pub const TAP: NoteFlags = NoteFlags(1 << 1);
    /// "Big" drums hit (accent).
    pub const BIG: NoteFlags = NoteFlags(1 << 2);

    pub fn contains(self, other: NoteFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: NoteFlags) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// A note owned by a chord: one lane, one sustain, plus whatever extra
/// state the instrument family carries.
pub trait ChordNote: Clone + std::fmt::Debug + PartialEq {
    type Lane: Copy + Ord + std::fmt::Debug;

    fn lane(&self) -> Self::Lane;
    fn sustain(&self) -> Ticks;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiveFretNote {
    pub lane: FiveFretLane,
    pub sustain: Ticks,
}

impl ChordNote for FiveFretNote {
    type Lane = FiveFretLane;

    fn lane(&self) -> FiveFretLane {
        self.lane
    }

    fn sustain(&self) -> Ticks {
        self.sustain
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SixFretNote {
    pub lane: SixFretLane,
    pub sustain: Ticks,
}

impl ChordNote for SixFretNote {
    type Lane = SixFretLane;

    fn lane(&self) -> SixFretLane {
        self.lane
    }

    fn sustain(&self) -> Ticks {
        self.sustain
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrumsNote {
    pub lane: DrumsLane,
    pub sustain: Ticks,
    pub is_cymbal: bool,
}

impl ChordNote for DrumsNote {
    type Lane = DrumsLane;

    fn lane(&self) -> DrumsLane {
        self.lane
    }

    fn sustain(&self) -> Ticks {
        self.sustain
    }
}

/// Simultaneous notes sharing one position, plus chord-wide modifiers.
/// Invariant: at most one note per lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord<N> {
    pub position: Ticks,
    pub notes: Vec<N>,
    pub modifiers: NoteFlags,
}

impl<N: ChordNote> Chord<N> {
    pub fn new(position: Ticks) -> Self {
        Self {
            position,
            notes: Vec::new(),
            modifiers: NoteFlags::NONE,
        }
    }

    pub fn note(&self, lane: N::Lane) -> Option<&N> {
        self.notes.iter().find(|n| n.lane() == lane)
    }

    pub fn note_mut(&mut self, lane: N::Lane) -> Option<&mut N> {
        self.notes.iter_mut().find(|n| n.lane() == lane)
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.modifiers.is_empty()
    }
}

/// One difficulty of one instrument: chords ordered by position (unique
/// positions), plus local events and special phrases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track<N> {
    pub difficulty: Difficulty,
    pub chords: Vec<Chord<N>>,
    pub local_events: Vec<LocalEvent>,
    pub special_phrases: Vec<SpecialPhrase>,
}

impl<N: ChordNote> Track<N> {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            chords: Vec::new(),
            local_events: Vec::new(),
            special_phrases: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty() && self.local_events.is_empty() && self.special_phrases.is_empty()
    }
}

/// Up to four difficulty tracks sharing one instrument identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument<N> {
    pub kind: crate::InstrumentKind,
    pub easy: Option<Track<N>>,
    pub medium: Option<Track<N>>,
    pub hard: Option<Track<N>>,
    pub expert: Option<Track<N>>,
}

impl<N: ChordNote> Instrument<N> {
    pub fn new(kind: crate::InstrumentKind) -> Self {
        Self {
            kind,
            easy: None,
            medium: None,
            hard: None,
            expert: None,
        }
    }

    pub fn difficulty(&self, difficulty: Difficulty) -> Option<&Track<N>> {
        match difficulty {
            Difficulty::Easy => self.easy.as_ref(),
            Difficulty::Medium => self.medium.as_ref(),
            Difficulty::Hard => self.hard.as_ref(),
            Difficulty::Expert => self.expert.as_ref(),
        }
    }

    pub fn difficulty_mut(&mut self, difficulty: Difficulty) -> Option<&mut Track<N>> {
        match difficulty {
            Difficulty::Easy => self.easy.as_mut(),
            Difficulty::Medium => self.medium.as_mut(),
            Difficulty::Hard => self.hard.as_mut(),
            Difficulty::Expert => self.expert.as_mut(),
        }
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty, track: Option<Track<N>>) {
        match difficulty {
            Difficulty::Easy => self.easy = track,
            Difficulty::Medium => self.medium = track,
            Difficulty::Hard => self.hard = track,
            Difficulty::Expert => self.expert = track,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.easy.is_none() && self.medium.is_none() && self.hard.is_none() && self.expert.is_none()
    }
}
