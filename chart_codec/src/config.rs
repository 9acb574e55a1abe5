use chart_model::{metadata::DEFAULT_RESOLUTION, Ticks};

/// What to do when an entry would add a note to an occupied lane or re-set
/// an already-set modifier flag. Detection always happens and is logged;
/// the policy only decides whether the add proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    Ignore,
    Overwrite,
    Reject,
}

/// What to do with special phrases whose intervals overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Shrink the earlier phrase so it ends where the next one starts.
    #[default]
    Cut,
    Reject,
}

#[derive(Debug, Clone)]
pub struct DecodeConfig {
    pub duplicate_policy: DuplicatePolicy,
    pub overlap_policy: OverlapPolicy,
    /// Synthesize a star-power phrase from legacy solo/soloend marker
    /// events on tracks that have no native star power.
    pub solo_to_star_power: bool,
    /// On/off deltas shorter than this decode as non-sustained notes.
    pub sustain_cutoff: Ticks,
    /// Ticks per beat used when the input carries no resolution of its own.
    pub resolution: Ticks,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::default(),
            overlap_policy: OverlapPolicy::default(),
            solo_to_star_power: true,
            sustain_cutoff: 64,
            resolution: DEFAULT_RESOLUTION,
        }
    }
}
