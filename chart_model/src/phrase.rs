use serde::{Deserialize, Serialize};

use crate::Ticks;

/// A timed marker spanning `[position, position + length)`, most commonly
/// star power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialPhrase {
    pub position: Ticks,
    pub kind: SpecialPhraseKind,
    pub length: Ticks,
}

impl SpecialPhrase {
    /// Exclusive end of the phrase interval, saturating at the tick
    /// ceiling so hostile lengths cannot overflow.
    pub fn end(&self) -> Ticks {
        self.position.saturating_add(self.length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialPhraseKind {
    VersusPlayer1,
    VersusPlayer2,
    StarPower,
    BigRockEnding,
    DrumsActivation,
    Trill,
    Tremolo,
    Unknown(u8),
}

impl SpecialPhraseKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::VersusPlayer1,
            1 => Self::VersusPlayer2,
            2 => Self::StarPower,
            5 => Self::BigRockEnding,
            64 => Self::DrumsActivation,
            65 => Self::Trill,
            66 => Self::Tremolo,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::VersusPlayer1 => 0,
            Self::VersusPlayer2 => 1,
            Self::StarPower => 2,
            Self::BigRockEnding => 5,
            Self::DrumsActivation => 64,
            Self::Trill => 65,
            Self::Tremolo => 66,
            Self::Unknown(code) => *code,
        }
    }
}
