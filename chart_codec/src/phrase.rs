//! Special-phrase resolution: overlap reconciliation and legacy solo
//! marker conversion. Runs once per track, after its entry stream is
//! exhausted.

use chart_model::{LocalEvent, SpecialPhrase, SpecialPhraseKind};
use tracing::debug;

use crate::{
    config::{DecodeConfig, OverlapPolicy},
    error::DecodeError,
};

pub(crate) fn resolve(
    phrases: &mut Vec<SpecialPhrase>,
    events: &mut Vec<LocalEvent>,
    config: &DecodeConfig,
    section: &str,
) -> Result<(), DecodeError> {
    convert_legacy_solos(phrases, events, config);
    phrases.sort_by_key(|p| p.position);
    resolve_overlaps(phrases, config, section)
}

/// For each consecutive pair of same-kind phrases whose half-open intervals
/// overlap, either shrink the earlier phrase or reject the track.
fn resolve_overlaps(
    phrases: &mut [SpecialPhrase],
    config: &DecodeConfig,
    section: &str,
) -> Result<(), DecodeError> {
    for i in 1..phrases.len() {
        let current_position = phrases[i].position;
        let current_kind = phrases[i].kind;
        let Some(previous) = phrases[..i]
            .iter_mut()
            .rev()
            .find(|p| p.kind == current_kind)
        else {
            continue;
        };
        if previous.end() > current_position {
            match config.overlap_policy {
                OverlapPolicy::Cut => {
                    debug!(
                        section,
                        position = current_position,
                        "cutting overlapping phrase"
                    );
                    previous.length = current_position - previous.position;
                }
                OverlapPolicy::Reject => {
                    return Err(DecodeError::OverlappingPhrase {
                        section: section.to_string(),
                        position: current_position,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Old charts mark star power with paired "solo"/"soloend" events. When the
/// track carries no native star power, each matched pair becomes one
/// star-power phrase and the marker events are consumed. Unmatched markers
/// stay behind as plain local events. Charts that already have star power
/// are left alone so phrases are not double-counted.
fn convert_legacy_solos(
    phrases: &mut Vec<SpecialPhrase>,
    events: &mut Vec<LocalEvent>,
    config: &DecodeConfig,
) {
    if !config.solo_to_star_power {
        return;
    }
    if phrases
        .iter()
        .any(|p| p.kind == SpecialPhraseKind::StarPower)
    {
        return;
    }

    let mut consumed = vec![false; events.len()];
    let mut open: Option<usize> = None;
    for (i, event) in events.iter().enumerate() {
        match event.text.as_str() {
            LocalEvent::SOLO if open.is_none() => open = Some(i),
            LocalEvent::SOLO_END => {
                if let Some(start) = open.take() {
                    phrases.push(SpecialPhrase {
                        position: events[start].position,
                        kind: SpecialPhraseKind::StarPower,
                        length: event.position.saturating_sub(events[start].position),
                    });
                    consumed[start] = true;
                    consumed[i] = true;
                }
            }
            _ => {}
        }
    }

    let mut keep = consumed.iter().map(|c| !c);
    events.retain(|_| keep.next().unwrap_or(true));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chart_model::Ticks;

    fn star(position: Ticks, length: Ticks) -> SpecialPhrase {
        SpecialPhrase {
            position,
            kind: SpecialPhraseKind::StarPower,
            length,
        }
    }

    fn event(position: Ticks, text: &str) -> LocalEvent {
        LocalEvent {
            position,
            text: text.to_string(),
        }
    }

    #[test]
    fn overlapping_phrases_are_cut_under_cut_policy() {
        let mut phrases = vec![star(0, 10), star(5, 10)];
        let mut events = Vec::new();
        let config = DecodeConfig::default();
        resolve(&mut phrases, &mut events, &config, "ExpertSingle").unwrap();
        assert_eq!(phrases[0].length, 5);
        assert_eq!(phrases[1].length, 10);
    }

    #[test]
    fn overlapping_phrases_reject_under_reject_policy() {
        let mut phrases = vec![star(0, 10), star(5, 10)];
        let mut events = Vec::new();
        let config = DecodeConfig {
            overlap_policy: OverlapPolicy::Reject,
            ..DecodeConfig::default()
        };
        let err = resolve(&mut phrases, &mut events, &config, "ExpertSingle").unwrap_err();
        match err {
            DecodeError::OverlappingPhrase { position, .. } => assert_eq!(position, 5),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn phrase_length_past_tick_ceiling_does_not_overflow() {
        let mut phrases = vec![star(4_000_000_000, 600_000_000), star(4_100_000_000, u32::MAX)];
        let mut events = Vec::new();
        let config = DecodeConfig::default();
        resolve(&mut phrases, &mut events, &config, "ExpertSingle").unwrap();
        assert_eq!(phrases[0].length, 100_000_000);
        assert_eq!(phrases[1].end(), u32::MAX);
    }

    #[test]
    fn phrases_of_different_kinds_may_interleave() {
        let mut phrases = vec![
            SpecialPhrase {
                position: 0,
                kind: SpecialPhraseKind::VersusPlayer1,
                length: 100,
            },
            SpecialPhrase {
                position: 50,
                kind: SpecialPhraseKind::VersusPlayer2,
                length: 100,
            },
        ];
        let mut events = Vec::new();
        let config = DecodeConfig {
            overlap_policy: OverlapPolicy::Reject,
            ..DecodeConfig::default()
        };
        resolve(&mut phrases, &mut events, &config, "ExpertSingle").unwrap();
        assert_eq!(phrases[0].length, 100);
    }

    #[test]
    fn solo_pair_becomes_star_power() {
        let mut phrases = Vec::new();
        let mut events = vec![event(100, "solo"), event(200, "soloend")];
        let config = DecodeConfig::default();
        resolve(&mut phrases, &mut events, &config, "ExpertSingle").unwrap();
        assert_eq!(phrases, vec![star(100, 100)]);
        assert!(events.is_empty());
    }

    #[test]
    fn unmatched_solo_marker_stays_as_event() {
        let mut phrases = Vec::new();
        let mut events = vec![
            event(100, "solo"),
            event(200, "soloend"),
            event(300, "solo"),
        ];
        let config = DecodeConfig::default();
        resolve(&mut phrases, &mut events, &config, "ExpertSingle").unwrap();
        assert_eq!(phrases, vec![star(100, 100)]);
        assert_eq!(events, vec![event(300, "solo")]);
    }

    #[test]
    fn native_star_power_disables_legacy_conversion() {
        let mut phrases = vec![star(0, 50)];
        let mut events = vec![event(100, "solo"), event(200, "soloend")];
        let config = DecodeConfig::default();
        resolve(&mut phrases, &mut events, &config, "ExpertSingle").unwrap();
        assert_eq!(phrases.len(), 1);
        assert_eq!(events.len(), 2);
    }
}
