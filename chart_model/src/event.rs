use serde::{Deserialize, Serialize};

use crate::Ticks;

/// Free-text event scoped to one difficulty track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEvent {
    pub position: Ticks,
    pub text: String,
}

impl LocalEvent {
    pub const SOLO: &'static str = "solo";
    pub const SOLO_END: &'static str = "soloend";
}

/// Free-text event scoped to the whole song ([Events] section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalEvent {
    pub position: Ticks,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalEventKind {
    PhraseStart,
    PhraseEnd,
    Lyric,
    Section,
    Other,
}

impl GlobalEvent {
    /// Classification used for lyric reconstruction.
    pub fn kind(&self) -> GlobalEventKind {
        let text = self.text.trim();
        if text == "phrase_start" {
            GlobalEventKind::PhraseStart
        } else if text == "phrase_end" {
            GlobalEventKind::PhraseEnd
        } else if text.starts_with("lyric ") || text == "lyric" {
            GlobalEventKind::Lyric
        } else if text.starts_with("section ") {
            GlobalEventKind::Section
        } else {
            GlobalEventKind::Other
        }
    }
}
