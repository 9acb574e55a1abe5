use serde::{Deserialize, Serialize};

use crate::{
    DrumsNote, FiveFretNote, GlobalEvent, Instrument, Metadata, SixFretNote, SyncTrack,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentKind {
    Guitar,
    CoopGuitar,
    Bass,
    Rhythm,
    Keys,
    GhlGuitar,
    GhlBass,
    Drums,
}

impl InstrumentKind {
    pub const FIVE_FRET: [InstrumentKind; 5] = [
        InstrumentKind::Guitar,
        InstrumentKind::CoopGuitar,
        InstrumentKind::Bass,
        InstrumentKind::Rhythm,
        InstrumentKind::Keys,
    ];

    pub const SIX_FRET: [InstrumentKind; 2] = [InstrumentKind::GhlGuitar, InstrumentKind::GhlBass];
}

/// The assembled song: one sync track, one global event list, one metadata
/// record, and every decoded instrument. Ownership is strictly tree-shaped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Song {
    pub metadata: Metadata,
    pub sync_track: SyncTrack,
    pub global_events: Vec<GlobalEvent>,
    pub guitar: Option<Instrument<FiveFretNote>>,
    pub coop_guitar: Option<Instrument<FiveFretNote>>,
    pub bass: Option<Instrument<FiveFretNote>>,
    pub rhythm: Option<Instrument<FiveFretNote>>,
    pub keys: Option<Instrument<FiveFretNote>>,
    pub ghl_guitar: Option<Instrument<SixFretNote>>,
    pub ghl_bass: Option<Instrument<SixFretNote>>,
    pub drums: Option<Instrument<DrumsNote>>,
}

impl Song {
    pub fn five_fret(&self, kind: InstrumentKind) -> Option<&Instrument<FiveFretNote>> {
        match kind {
            InstrumentKind::Guitar => self.guitar.as_ref(),
            InstrumentKind::CoopGuitar => self.coop_guitar.as_ref(),
            InstrumentKind::Bass => self.bass.as_ref(),
            InstrumentKind::Rhythm => self.rhythm.as_ref(),
            InstrumentKind::Keys => self.keys.as_ref(),
            _ => None,
        }
    }

    pub fn five_fret_mut(
        &mut self,
        kind: InstrumentKind,
    ) -> Option<&mut Option<Instrument<FiveFretNote>>> {
        match kind {
            InstrumentKind::Guitar => Some(&mut self.guitar),
            InstrumentKind::CoopGuitar => Some(&mut self.coop_guitar),
            InstrumentKind::Bass => Some(&mut self.bass),
            InstrumentKind::Rhythm => Some(&mut self.rhythm),
            InstrumentKind::Keys => Some(&mut self.keys),
            _ => None,
        }
    }

    pub fn six_fret(&self, kind: InstrumentKind) -> Option<&Instrument<SixFretNote>> {
        match kind {
            InstrumentKind::GhlGuitar => self.ghl_guitar.as_ref(),
            InstrumentKind::GhlBass => self.ghl_bass.as_ref(),
            _ => None,
        }
    }

    pub fn six_fret_mut(
        &mut self,
        kind: InstrumentKind,
    ) -> Option<&mut Option<Instrument<SixFretNote>>> {
        match kind {
            InstrumentKind::GhlGuitar => Some(&mut self.ghl_guitar),
            InstrumentKind::GhlBass => Some(&mut self.ghl_bass),
            _ => None,
        }
    }
}
