pub mod event;
pub mod metadata;
pub mod phrase;
pub mod song;
pub mod sync;
pub mod track;

pub use event::{GlobalEvent, GlobalEventKind, LocalEvent};
pub use metadata::Metadata;
pub use phrase::{SpecialPhrase, SpecialPhraseKind};
pub use song::{InstrumentKind, Song};
pub use sync::{SyncTrack, Tempo, TimeSignature};
pub use track::{
    Chord, ChordNote, Difficulty, DrumsLane, DrumsNote, FiveFretLane, FiveFretNote, Instrument,
    NoteFlags, SixFretLane, SixFretNote, Track,
};

/// Chart positions and lengths are expressed in ticks of the song's
/// resolution (ticks per beat).
pub type Ticks = u32;
