use serde::{Deserialize, Serialize};

use crate::Ticks;

pub const DEFAULT_RESOLUTION: Ticks = 192;

/// Song metadata populated from the simple key/value section. Only the
/// fields the decode pipeline depends on are typed; every raw pair is
/// retained for lossless re-encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub resolution: Ticks,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub charter: Option<String>,
    pub offset: Option<f64>,
    /// All key/value pairs in source order, values verbatim.
    pub raw: Vec<(String, String)>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            name: None,
            artist: None,
            charter: None,
            offset: None,
            raw: Vec::new(),
        }
    }
}

impl Metadata {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
