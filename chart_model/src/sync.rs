use serde::{Deserialize, Serialize};

use crate::Ticks;

/// Tempo change. `anchor` pins the change to an absolute time offset in
/// seconds, resolving position/time ambiguity when the tempo map is
/// edited upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    pub position: Ticks,
    pub bpm: f64,
    pub anchor: Option<f64>,
}

/// Time signature. The denominator is kept expanded in memory (4, not the
/// on-disk power-of-two exponent 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub position: Ticks,
    pub numerator: u8,
    pub denominator: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncTrack {
    pub tempos: Vec<Tempo>,
    pub time_signatures: Vec<TimeSignature>,
}

impl SyncTrack {
    pub fn is_empty(&self) -> bool {
        self.tempos.is_empty() && self.time_signatures.is_empty()
    }
}
