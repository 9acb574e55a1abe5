use chart_model::{
    Chord, Difficulty, DrumsLane, DrumsNote, FiveFretLane, FiveFretNote, Instrument,
    InstrumentKind, NoteFlags, Song, SpecialPhrase, SpecialPhraseKind, Tempo, TimeSignature,
    Track,
};

use crate::{
    config::{DecodeConfig, DuplicatePolicy, OverlapPolicy},
    decode_chart_str, decode_chart_stream, decode_chart_stream_with_cancel, decode_midi_bytes,
    encode_chart, encode_midi,
    error::DecodeError,
    CancellationToken,
};

const BASIC_CHART: &str = r#"[Song]
{
  Resolution = 192
  Name = "Unit Test Song"
  Artist = "Nobody"
  Offset = 0
}
[SyncTrack]
{
  0 = TS 4
  0 = B 120000
  384 = TS 7 3
  768 = A 1500
  768 = B 146666
}
[Events]
{
  0 = E "section Intro"
}
[ExpertSingle]
{
  768 = N 0 96
  768 = N 1 0
  768 = N 6 0
  960 = N 7 0
  1152 = S 2 192
}
"#;

#[test]
fn basic_chart_decodes_metadata_sync_and_events() {
    let song = decode_chart_str(BASIC_CHART, &DecodeConfig::default()).unwrap();

    assert_eq!(song.metadata.resolution, 192);
    assert_eq!(song.metadata.name.as_deref(), Some("Unit Test Song"));
    assert_eq!(song.metadata.artist.as_deref(), Some("Nobody"));

    let tempos = &song.sync_track.tempos;
    assert_eq!(tempos.len(), 2);
    assert_eq!(tempos[0].bpm, 120.0);
    assert_eq!(tempos[1].anchor, Some(1.5));
    assert!((tempos[1].bpm - 146.666).abs() < 1e-9);

    let signatures = &song.sync_track.time_signatures;
    assert_eq!(signatures[0].denominator, 4);
    assert_eq!(signatures[1].numerator, 7);
    assert_eq!(signatures[1].denominator, 8);

    assert_eq!(song.global_events.len(), 1);
    assert_eq!(song.global_events[0].text, "section Intro");
}

#[test]
fn note_entries_at_one_position_merge_into_a_chord() {
    let song = decode_chart_str(BASIC_CHART, &DecodeConfig::default()).unwrap();
    let track = song.guitar.as_ref().unwrap().expert.as_ref().unwrap();

    assert_eq!(track.chords.len(), 2);
    let chord = &track.chords[0];
    assert_eq!(chord.position, 768);
    assert_eq!(chord.notes.len(), 2);
    assert!(chord.modifiers.contains(NoteFlags::TAP));
    assert_eq!(
        chord.note(FiveFretLane::Green).map(|n| n.sustain),
        Some(96)
    );
    assert_eq!(
        track.chords[1].note(FiveFretLane::Open).map(|n| n.sustain),
        Some(0)
    );
}

#[test]
fn out_of_order_entries_find_their_existing_chord() {
    let src = "[ExpertSingle]\n{\n  200 = N 0 0\n  100 = N 1 0\n  200 = N 2 0\n}\n";
    let song = decode_chart_str(src, &DecodeConfig::default()).unwrap();
    let track = song.guitar.as_ref().unwrap().expert.as_ref().unwrap();

    assert_eq!(track.chords.len(), 2);
    assert_eq!(track.chords[0].position, 100);
    assert_eq!(track.chords[1].position, 200);
    assert_eq!(track.chords[1].notes.len(), 2);
}

#[test]
fn duplicate_note_follows_the_configured_policy() {
    let src = "[ExpertSingle]\n{\n  0 = N 0 96\n  0 = N 0 48\n}\n";

    let song = decode_chart_str(src, &DecodeConfig::default()).unwrap();
    let track = song.guitar.as_ref().unwrap().expert.as_ref().unwrap();
    assert_eq!(
        track.chords[0].note(FiveFretLane::Green).map(|n| n.sustain),
        Some(96),
        "ignore keeps the first note"
    );

    let overwrite = DecodeConfig {
        duplicate_policy: DuplicatePolicy::Overwrite,
        ..DecodeConfig::default()
    };
    let song = decode_chart_str(src, &overwrite).unwrap();
    let track = song.guitar.as_ref().unwrap().expert.as_ref().unwrap();
    assert_eq!(
        track.chords[0].note(FiveFretLane::Green).map(|n| n.sustain),
        Some(48)
    );

    let reject = DecodeConfig {
        duplicate_policy: DuplicatePolicy::Reject,
        ..DecodeConfig::default()
    };
    let err = decode_chart_str(src, &reject).unwrap_err();
    match err {
        DecodeError::DuplicateObject {
            section, position, ..
        } => {
            assert_eq!(section, "ExpertSingle");
            assert_eq!(position, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unterminated_section_error_names_the_offender() {
    let src = "[Song]\n{\n  Resolution = 192\n}\n[ExpertSingle]\n{\n  0 = N 0 0\n";
    let err = decode_chart_str(src, &DecodeConfig::default()).unwrap_err();
    match err {
        DecodeError::UnterminatedSection { section } => assert_eq!(section, "ExpertSingle"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_entry_error_carries_section_and_line() {
    let src = "[SyncTrack]\n{\n  0 = B notanumber\n}\n";
    let err = decode_chart_str(src, &DecodeConfig::default()).unwrap_err();
    match err {
        DecodeError::MalformedEntry { section, line, .. } => {
            assert_eq!(section, "SyncTrack");
            assert!(line.contains("notanumber"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unrecognized_sections_are_skipped_not_fatal() {
    let src = "[Garbage]\n{\n  whatever this is\n}\n[ExpertSingle]\n{\n  0 = N 0 0\n}\n";
    let song = decode_chart_str(src, &DecodeConfig::default()).unwrap();
    assert!(song.guitar.is_some());
}

#[test]
fn text_round_trip_reproduces_the_song() {
    let config = DecodeConfig::default();
    let first = decode_chart_str(BASIC_CHART, &config).unwrap();
    let encoded = encode_chart(&first);
    let second = decode_chart_str(&encoded, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn drums_cymbal_marker_applies_in_either_entry_order() {
    let marker_first = "[ExpertDrums]\n{\n  0 = N 66 0\n  0 = N 2 0\n}\n";
    let pad_first = "[ExpertDrums]\n{\n  0 = N 2 0\n  0 = N 66 0\n}\n";
    let config = DecodeConfig::default();
    for src in [marker_first, pad_first] {
        let song = decode_chart_str(src, &config).unwrap();
        let track = song.drums.as_ref().unwrap().expert.as_ref().unwrap();
        let note = track.chords[0].note(DrumsLane::Yellow).unwrap();
        assert!(note.is_cymbal, "cymbal lost for input:\n{src}");
    }
}

#[test]
fn drums_pad_repeated_after_cymbal_merge_is_a_duplicate() {
    let src = "[ExpertDrums]\n{\n  0 = N 66 0\n  0 = N 2 0\n  0 = N 2 0\n}\n";

    let reject = DecodeConfig {
        duplicate_policy: DuplicatePolicy::Reject,
        ..DecodeConfig::default()
    };
    let err = decode_chart_str(src, &reject).unwrap_err();
    match err {
        DecodeError::DuplicateObject {
            section, position, ..
        } => {
            assert_eq!(section, "ExpertDrums");
            assert_eq!(position, 0);
        }
        other => panic!("unexpected error: {other}"),
    }

    let song = decode_chart_str(src, &DecodeConfig::default()).unwrap();
    let track = song.drums.as_ref().unwrap().expert.as_ref().unwrap();
    assert_eq!(track.chords[0].notes.len(), 1);
    assert!(track.chords[0].note(DrumsLane::Yellow).unwrap().is_cymbal);
}

#[test]
fn phrase_type_outside_byte_range_is_malformed() {
    let src = "[ExpertSingle]\n{\n  0 = S 300 100\n}\n";
    let err = decode_chart_str(src, &DecodeConfig::default()).unwrap_err();
    match err {
        DecodeError::MalformedEntry { section, line, .. } => {
            assert_eq!(section, "ExpertSingle");
            assert!(line.contains("S 300"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn drums_double_kick_decodes_to_its_own_lane() {
    let src = "[ExpertDrums]\n{\n  0 = N 0 0\n  0 = N 32 0\n}\n";
    let song = decode_chart_str(src, &DecodeConfig::default()).unwrap();
    let track = song.drums.as_ref().unwrap().expert.as_ref().unwrap();
    assert!(track.chords[0].note(DrumsLane::Kick).is_some());
    assert!(track.chords[0].note(DrumsLane::DoubleKick).is_some());
}

#[test]
fn phrase_overlap_rejection_is_reachable_from_the_top_level() {
    let src = "[ExpertSingle]\n{\n  0 = S 2 100\n  50 = S 2 100\n}\n";
    let config = DecodeConfig {
        overlap_policy: OverlapPolicy::Reject,
        ..DecodeConfig::default()
    };
    let err = decode_chart_str(src, &config).unwrap_err();
    assert!(matches!(err, DecodeError::OverlappingPhrase { position: 50, .. }));
}

// --- timed-event container -------------------------------------------------

fn five_fret_song() -> Song {
    let mut song = Song::default();
    song.metadata.resolution = 192;
    song.sync_track.tempos.push(Tempo {
        position: 0,
        bpm: 120.0,
        anchor: None,
    });
    song.sync_track.time_signatures.push(TimeSignature {
        position: 0,
        numerator: 4,
        denominator: 4,
    });

    let mut track = Track::new(Difficulty::Expert);
    let mut chord = Chord::new(768);
    chord.notes.push(FiveFretNote {
        lane: FiveFretLane::Green,
        sustain: 96,
    });
    chord.notes.push(FiveFretNote {
        lane: FiveFretLane::Red,
        sustain: 0,
    });
    chord.modifiers.insert(NoteFlags::TAP);
    track.chords.push(chord);

    let mut single = Chord::new(1152);
    single.notes.push(FiveFretNote {
        lane: FiveFretLane::Orange,
        sustain: 0,
    });
    single.modifiers.insert(NoteFlags::FORCED);
    track.chords.push(single);

    let mut instrument = Instrument::new(InstrumentKind::Guitar);
    instrument.expert = Some(track);
    song.guitar = Some(instrument);
    song
}

#[test]
fn midi_round_trip_preserves_notes_flags_and_sync() {
    let song = five_fret_song();
    let bytes = encode_midi(&song).unwrap();
    let decoded = decode_midi_bytes(&bytes, &DecodeConfig::default()).unwrap();

    assert_eq!(decoded.metadata.resolution, 192);
    assert_eq!(decoded.sync_track.tempos.len(), 1);
    assert_eq!(decoded.sync_track.tempos[0].bpm, 120.0);
    assert_eq!(
        decoded.sync_track.time_signatures,
        song.sync_track.time_signatures
    );

    let original = song.guitar.as_ref().unwrap().expert.as_ref().unwrap();
    let round_tripped = decoded.guitar.as_ref().unwrap().expert.as_ref().unwrap();
    assert_eq!(round_tripped.chords, original.chords);
}

#[test]
fn midi_sustain_below_cutoff_decodes_as_unsustained() {
    // A note written without sustain gets a short placeholder duration in
    // the container; decoding must clamp it back to zero.
    let song = five_fret_song();
    let bytes = encode_midi(&song).unwrap();
    let decoded = decode_midi_bytes(&bytes, &DecodeConfig::default()).unwrap();
    let track = decoded.guitar.as_ref().unwrap().expert.as_ref().unwrap();
    assert_eq!(
        track.chords[0].note(FiveFretLane::Red).map(|n| n.sustain),
        Some(0)
    );

    // With a cutoff below the placeholder the short duration survives.
    let keep_short = DecodeConfig {
        sustain_cutoff: 8,
        ..DecodeConfig::default()
    };
    let decoded = decode_midi_bytes(&bytes, &keep_short).unwrap();
    let track = decoded.guitar.as_ref().unwrap().expert.as_ref().unwrap();
    assert_eq!(
        track.chords[0].note(FiveFretLane::Red).map(|n| n.sustain),
        Some(48)
    );
}

#[test]
fn midi_star_power_is_shared_across_difficulties() {
    let mut song = five_fret_song();
    {
        let instrument = song.guitar.as_mut().unwrap();
        instrument
            .expert
            .as_mut()
            .unwrap()
            .special_phrases
            .push(SpecialPhrase {
                position: 768,
                kind: SpecialPhraseKind::StarPower,
                length: 192,
            });
        let mut easy = Track::new(Difficulty::Easy);
        let mut chord = Chord::new(768);
        chord.notes.push(FiveFretNote {
            lane: FiveFretLane::Green,
            sustain: 0,
        });
        easy.chords.push(chord);
        instrument.easy = Some(easy);
    }

    let bytes = encode_midi(&song).unwrap();
    let decoded = decode_midi_bytes(&bytes, &DecodeConfig::default()).unwrap();
    let instrument = decoded.guitar.as_ref().unwrap();
    let expected = vec![SpecialPhrase {
        position: 768,
        kind: SpecialPhraseKind::StarPower,
        length: 192,
    }];
    assert_eq!(
        instrument.expert.as_ref().unwrap().special_phrases,
        expected
    );
    assert_eq!(instrument.easy.as_ref().unwrap().special_phrases, expected);
}

#[test]
fn midi_drums_cymbal_toggle_round_trips() {
    let mut song = Song::default();
    song.metadata.resolution = 192;
    let mut track = Track::new(Difficulty::Expert);
    let mut chord = Chord::new(0);
    chord.notes.push(DrumsNote {
        lane: DrumsLane::Kick,
        sustain: 0,
        is_cymbal: false,
    });
    chord.notes.push(DrumsNote {
        lane: DrumsLane::Yellow,
        sustain: 0,
        is_cymbal: true,
    });
    track.chords.push(chord);
    let mut instrument = Instrument::new(InstrumentKind::Drums);
    instrument.expert = Some(track);
    song.drums = Some(instrument);

    let bytes = encode_midi(&song).unwrap();
    let decoded = decode_midi_bytes(&bytes, &DecodeConfig::default()).unwrap();
    let track = decoded.drums.as_ref().unwrap().expert.as_ref().unwrap();
    let yellow = track.chords[0].note(DrumsLane::Yellow).unwrap();
    assert!(yellow.is_cymbal);
    let kick = track.chords[0].note(DrumsLane::Kick).unwrap();
    assert!(!kick.is_cymbal);
}

#[test]
fn midi_global_events_keep_their_text() {
    let mut song = five_fret_song();
    song.global_events.push(chart_model::GlobalEvent {
        position: 0,
        text: "section Intro".to_string(),
    });
    let bytes = encode_midi(&song).unwrap();
    let decoded = decode_midi_bytes(&bytes, &DecodeConfig::default()).unwrap();
    assert_eq!(decoded.global_events, song.global_events);
}

fn raw_guitar_smf(events: Vec<(u32, midly::TrackEventKind<'static>)>) -> Vec<u8> {
    use midly::{Format, Header, MetaMessage, Smf, Timing, TrackEvent, TrackEventKind};

    let mut track = vec![TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(b"PART GUITAR")),
    }];
    let mut last = 0u32;
    for (tick, kind) in events {
        track.push(TrackEvent {
            delta: (tick - last).into(),
            kind,
        });
        last = tick;
    }
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header::new(Format::Parallel, Timing::Metrical(192.into())),
        tracks: vec![track],
    };
    let mut out = Vec::new();
    smf.write_std(&mut out).unwrap();
    out
}

fn raw_on(key: u8) -> midly::TrackEventKind<'static> {
    midly::TrackEventKind::Midi {
        channel: 0.into(),
        message: midly::MidiMessage::NoteOn {
            key: key.into(),
            vel: 100.into(),
        },
    }
}

fn raw_off(key: u8) -> midly::TrackEventKind<'static> {
    midly::TrackEventKind::Midi {
        channel: 0.into(),
        message: midly::MidiMessage::NoteOff {
            key: key.into(),
            vel: 0.into(),
        },
    }
}

#[test]
fn midi_chord_notes_come_out_in_lane_order() {
    // Red closes before green, so the off events arrive out of lane
    // order; the decoded chord must not depend on that.
    let bytes = raw_guitar_smf(vec![
        (0, raw_on(96)),
        (0, raw_on(97)),
        (96, raw_off(97)),
        (192, raw_off(96)),
    ]);
    let song = decode_midi_bytes(&bytes, &DecodeConfig::default()).unwrap();
    let track = song.guitar.as_ref().unwrap().expert.as_ref().unwrap();
    let lanes: Vec<_> = track.chords[0].notes.iter().map(|n| n.lane).collect();
    assert_eq!(lanes, vec![FiveFretLane::Green, FiveFretLane::Red]);
}

#[test]
fn midi_unclosed_note_is_closed_at_the_next_on() {
    // Expert green opens at 0, opens again at 96 without an off, and
    // finally closes at 192: two notes of 96 ticks each.
    let bytes = raw_guitar_smf(vec![(0, raw_on(96)), (96, raw_on(96)), (192, raw_off(96))]);
    let song = decode_midi_bytes(&bytes, &DecodeConfig::default()).unwrap();
    let track = song.guitar.as_ref().unwrap().expert.as_ref().unwrap();
    assert_eq!(track.chords.len(), 2);
    assert_eq!(
        track.chords[0].note(FiveFretLane::Green).map(|n| n.sustain),
        Some(96)
    );
    assert_eq!(
        track.chords[1].note(FiveFretLane::Green).map(|n| n.sustain),
        Some(96)
    );
}

#[test]
fn midi_unopened_off_recovers_as_zero_length_note() {
    let bytes = raw_guitar_smf(vec![(100, raw_off(97))]);
    let song = decode_midi_bytes(&bytes, &DecodeConfig::default()).unwrap();
    let track = song.guitar.as_ref().unwrap().expert.as_ref().unwrap();
    assert_eq!(track.chords.len(), 1);
    assert_eq!(track.chords[0].position, 100);
    assert_eq!(
        track.chords[0].note(FiveFretLane::Red).map(|n| n.sustain),
        Some(0)
    );
}

#[test]
fn midi_text_events_broadcast_to_every_difficulty() {
    let bytes = raw_guitar_smf(vec![
        (0, midly::TrackEventKind::Meta(midly::MetaMessage::Text(b"[custom marker]"))),
        (0, raw_on(96)),
        (96, raw_off(96)),
    ]);
    let song = decode_midi_bytes(&bytes, &DecodeConfig::default()).unwrap();
    let instrument = song.guitar.as_ref().unwrap();
    for difficulty in Difficulty::ALL {
        let track = instrument.difficulty(difficulty).unwrap();
        assert_eq!(track.local_events.len(), 1);
        assert_eq!(track.local_events[0].text, "custom marker");
    }
}

#[test]
fn song_survives_a_json_round_trip() {
    let song = decode_chart_str(BASIC_CHART, &DecodeConfig::default()).unwrap();
    let json = serde_json::to_string(&song).unwrap();
    let back: Song = serde_json::from_str(&json).unwrap();
    assert_eq!(song, back);
}

// --- incremental decoding --------------------------------------------------

#[tokio::test]
async fn streaming_decode_matches_blocking_decode() {
    let config = DecodeConfig::default();
    let blocking = decode_chart_str(BASIC_CHART, &config).unwrap();
    let streamed = decode_chart_stream(BASIC_CHART.as_bytes(), &config)
        .await
        .unwrap();
    assert_eq!(blocking, streamed);
}

#[tokio::test]
async fn cancelled_stream_stops_and_yields_no_sections() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let song = decode_chart_stream_with_cancel(
        BASIC_CHART.as_bytes(),
        &DecodeConfig::default(),
        cancel,
    )
    .await
    .unwrap();
    assert_eq!(song, Song::default());
}

#[tokio::test]
async fn streaming_decode_surfaces_section_errors_after_joining_all() {
    let src = "[ExpertSingle]\n{\n  0 = N 0 96\n  0 = N 0 48\n}\n[EasySingle]\n{\n  0 = N 0 0\n}\n";
    let config = DecodeConfig {
        duplicate_policy: DuplicatePolicy::Reject,
        ..DecodeConfig::default()
    };
    let err = decode_chart_stream(src.as_bytes(), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, DecodeError::DuplicateObject { .. }));
}
