use std::time::Duration;

use crate::{
    cancel::CancellationToken,
    events::{Event, MIDIEvent},
    io::{Division, MIDIDocument, MIDIHeader, MIDITrack, PartialDocument},
};

/// Tempo assumed until the first tempo event: 500 000 µs per quarter note (120 BPM).
pub const DEFAULT_TEMPO: u32 = 500_000;

/// A tempo change at an absolute tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoChange {
    pub ticks: u64,
    /// Microseconds per quarter note.
    pub tempo: u32,
}

/// A summary of a decoded MIDI file.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    total_tracks: u64,
    total_events: u64,
    note_on_count: u64,
    note_off_count: u64,
    tempo_change_count: u64,
    channel_mask: u16,
    total_ticks: u64,
    total_duration: Duration,
    file_type: u16,
    time_format: Division,
}

impl Statistics {
    /// The number of tracks these statistics were built from
    pub fn total_tracks(&self) -> u64 {
        self.total_tracks
    }

    /// The total number of events across all tracks
    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    /// The number of note on events with a non-zero velocity
    pub fn total_notes(&self) -> u64 {
        self.note_on_count
    }

    /// The number of note off events, including zero velocity note ons
    pub fn note_off_count(&self) -> u64 {
        self.note_off_count
    }

    pub fn tempo_change_count(&self) -> u64 {
        self.tempo_change_count
    }

    /// The number of distinct channels that carry at least one channel event
    pub fn used_channels(&self) -> u32 {
        self.channel_mask.count_ones()
    }

    /// The number of events that are neither note ons nor note offs.
    pub fn other_event_count(&self) -> u64 {
        self.total_events - self.note_on_count - self.note_off_count
    }

    /// The tick of the last event of the longest track
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// The length of the file in seconds, following its tempo events
    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    pub fn file_type(&self) -> u16 {
        self.file_type
    }

    pub fn time_format(&self) -> Division {
        self.time_format
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateOutcome {
    Complete(Statistics),
    /// Statistics of the tracks processed before cancellation was observed.
    Cancelled(Statistics),
}

/// Converts a tick count into wall time by walking the tempo map.
///
/// `tempos` must be sorted by tick. Tempo based divisions assume [`DEFAULT_TEMPO`]
/// before the first change; SMPTE divisions ignore tempo entirely.
pub fn tempo_sequence_get_duration(
    tempos: &[TempoChange],
    division: Division,
    ticks: u64,
) -> Duration {
    let ppq = match division {
        Division::TicksPerQuarterNote(ppq) => ppq as f64,
        Division::SMPTE { .. } => {
            let ticks_per_second = division.smpte_ticks_per_second().unwrap_or(1.0);
            return secs_to_duration(ticks as f64 / ticks_per_second);
        }
    };

    let mut time = 0.0;
    let mut last_tick = 0;
    let mut multiplier = (DEFAULT_TEMPO as f64 / ppq) / 1000000.0;
    for t in tempos {
        if t.ticks > ticks {
            break;
        }
        time += multiplier * (t.ticks - last_tick) as f64;
        last_tick = t.ticks;
        multiplier = (t.tempo as f64 / ppq) / 1000000.0;
    }
    time += multiplier * (ticks - last_tick) as f64;
    secs_to_duration(time)
}

/// Saturates at [`Duration::MAX`] for lengths a `Duration` cannot hold.
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[derive(Default)]
struct StatisticsBuilder {
    total_tracks: u64,
    total_events: u64,
    note_on_count: u64,
    note_off_count: u64,
    channel_mask: u16,
    total_ticks: u64,
    tempo_events: Vec<TempoChange>,
}

impl StatisticsBuilder {
    fn add_track(&mut self, track: &MIDITrack) {
        self.total_tracks += 1;
        self.total_events += track.len() as u64;
        self.total_ticks = self.total_ticks.max(track.end_ticks());

        for event in track.events() {
            if let Some(channel) = event.channel() {
                self.channel_mask |= 1 << (channel & 0x0F);
            }
            match &event.event {
                Event::NoteOn(e) if e.is_note_off() => self.note_off_count += 1,
                Event::NoteOn(_) => self.note_on_count += 1,
                Event::NoteOff(_) => self.note_off_count += 1,
                Event::Meta(meta) => {
                    if let Some(tempo) = meta.tempo() {
                        self.tempo_events.push(TempoChange {
                            ticks: event.absolute_ticks,
                            tempo,
                        });
                    }
                }
                _ => (),
            }
        }
    }

    fn finish(mut self, header: &MIDIHeader) -> Statistics {
        // Tracks are walked one after the other, so the merged tempo map needs ordering.
        self.tempo_events.sort_by_key(|t| t.ticks);

        Statistics {
            total_tracks: self.total_tracks,
            total_events: self.total_events,
            note_on_count: self.note_on_count,
            note_off_count: self.note_off_count,
            tempo_change_count: self.tempo_events.len() as u64,
            channel_mask: self.channel_mask,
            total_ticks: self.total_ticks,
            total_duration: tempo_sequence_get_duration(
                &self.tempo_events,
                header.division,
                self.total_ticks,
            ),
            file_type: header.format,
            time_format: header.division,
        }
    }
}

fn aggregate_tracks(
    header: &MIDIHeader,
    tracks: &[MIDITrack],
    cancel: &CancellationToken,
) -> AggregateOutcome {
    let mut builder = StatisticsBuilder::default();
    for track in tracks {
        if cancel.is_requested() {
            return AggregateOutcome::Cancelled(builder.finish(header));
        }
        builder.add_track(track);
    }
    AggregateOutcome::Complete(builder.finish(header))
}

/// Walks every track of `document` and summarizes it.
///
/// `cancel` is checked before each track; a cancelled aggregation returns the
/// statistics of the tracks that were fully processed.
pub fn aggregate(document: &MIDIDocument, cancel: &CancellationToken) -> AggregateOutcome {
    aggregate_tracks(document.header(), document.tracks(), cancel)
}

impl PartialDocument {
    /// Statistics of the tracks that were parsed before the decode was cancelled.
    pub fn statistics(&self) -> Statistics {
        let mut builder = StatisticsBuilder::default();
        for track in &self.tracks {
            builder.add_track(track);
        }
        builder.finish(&self.header)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{
        cancel::CancellationToken,
        events::Event,
        io::{Division, MIDIDocument, MIDIHeader, MIDITrack, PartialDocument},
    };

    use super::*;

    fn note_pair(channel: u8) -> MIDITrack {
        MIDITrack::from_deltas(vec![
            Event::new_delta_note_on_event(0, channel, 60, 64),
            Event::new_delta_note_off_event(96, channel, 60, 64),
        ])
    }

    fn tempo_event(delta: u64, tempo: u32) -> crate::events::Delta<Event> {
        let bytes = tempo.to_be_bytes();
        Event::new_delta_meta_event(delta, 0x51, bytes[1..].to_vec())
    }

    fn complete(outcome: AggregateOutcome) -> Statistics {
        match outcome {
            AggregateOutcome::Complete(stats) => stats,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    fn assert_secs(duration: Duration, secs: f64) {
        assert!(
            (duration.as_secs_f64() - secs).abs() < 1e-9,
            "{duration:?} != {secs}s"
        );
    }

    #[test]
    fn two_note_pair_tracks() {
        let document = MIDIDocument::new(
            1,
            Division::TicksPerQuarterNote(96),
            vec![note_pair(0), note_pair(1)],
        )
        .unwrap();
        let stats = complete(aggregate(&document, &CancellationToken::new()));

        assert_eq!(stats.total_tracks(), 2);
        assert_eq!(stats.total_events(), 4);
        assert_eq!(stats.total_notes(), 2);
        assert_eq!(stats.note_off_count(), 2);
        assert_eq!(stats.other_event_count(), 0);
        assert_eq!(stats.file_type(), 1);
        assert_eq!(stats.time_format(), Division::TicksPerQuarterNote(96));
        assert_eq!(stats.time_format().raw(), 96);
        assert_eq!(stats.total_ticks(), 96);
        assert_eq!(stats.used_channels(), 2);
    }

    #[test]
    fn zero_velocity_note_on_is_not_a_note() {
        let track = MIDITrack::from_deltas(vec![
            Event::new_delta_note_on_event(0, 0, 60, 64),
            Event::new_delta_note_on_event(10, 0, 60, 0),
        ]);
        let document =
            MIDIDocument::new(0, Division::TicksPerQuarterNote(96), vec![track]).unwrap();
        let stats = complete(aggregate(&document, &CancellationToken::new()));

        assert_eq!(stats.total_events(), 2);
        assert_eq!(stats.total_notes(), 1);
        assert_eq!(stats.note_off_count(), 1);
    }

    #[test]
    fn notes_never_exceed_events() {
        let busy = MIDITrack::from_deltas(vec![
            Event::new_delta_program_change_event(0, 0, 12),
            Event::new_delta_note_on_event(0, 0, 60, 64),
            Event::new_delta_control_change_event(5, 0, 7, 100),
            Event::new_delta_note_on_event(5, 0, 60, 0),
            Event::new_delta_system_exclusive_event(0, 0xF0, vec![0x7E, 0xF7]),
        ]);
        let tracks = vec![busy, note_pair(3), MIDITrack::default()];
        let expected_events: u64 = tracks.iter().map(|t| t.len() as u64).sum();
        let document = MIDIDocument::new(1, Division::TicksPerQuarterNote(480), tracks).unwrap();
        let stats = complete(aggregate(&document, &CancellationToken::new()));

        assert_eq!(stats.total_events(), expected_events);
        assert!(stats.total_notes() <= stats.total_events());
        assert_eq!(stats.other_event_count(), 3);
    }

    #[test]
    fn default_tempo_is_120_bpm() {
        let track = MIDITrack::from_deltas(vec![
            Event::new_delta_note_on_event(0, 0, 60, 64),
            Event::new_delta_note_off_event(192, 0, 60, 0),
        ]);
        let document =
            MIDIDocument::new(0, Division::TicksPerQuarterNote(96), vec![track]).unwrap();
        let stats = complete(aggregate(&document, &CancellationToken::new()));

        assert_eq!(stats.tempo_change_count(), 0);
        assert_secs(stats.total_duration(), 1.0);
    }

    #[test]
    fn duration_follows_tempo_map_across_tracks() {
        let tempo_track = MIDITrack::from_deltas(vec![
            tempo_event(0, 500_000),
            tempo_event(100, 1_000_000),
        ]);
        let notes = MIDITrack::from_deltas(vec![
            Event::new_delta_note_on_event(0, 0, 60, 64),
            Event::new_delta_note_off_event(300, 0, 60, 0),
        ]);
        let document = MIDIDocument::new(
            1,
            Division::TicksPerQuarterNote(100),
            vec![tempo_track, notes],
        )
        .unwrap();
        let stats = complete(aggregate(&document, &CancellationToken::new()));

        assert_eq!(stats.tempo_change_count(), 2);
        assert_eq!(stats.total_ticks(), 300);
        // 100 ticks at 0.5s per quarter, then 200 ticks at 1s per quarter
        assert_secs(stats.total_duration(), 2.5);
    }

    #[test]
    fn tempo_changes_after_the_end_are_ignored() {
        let tempos = [
            TempoChange {
                ticks: 50,
                tempo: 250_000,
            },
            TempoChange {
                ticks: 1000,
                tempo: 2_000_000,
            },
        ];
        let duration =
            tempo_sequence_get_duration(&tempos, Division::TicksPerQuarterNote(100), 150);
        // 50 ticks at 0.5s per quarter, then 100 ticks at 0.25s per quarter
        assert_secs(duration, 0.5);
    }

    #[test]
    fn huge_durations_saturate() {
        let tempos = [TempoChange {
            ticks: 0,
            tempo: 0xFFFFFF,
        }];
        let duration =
            tempo_sequence_get_duration(&tempos, Division::TicksPerQuarterNote(1), u64::MAX);
        assert_eq!(duration, Duration::MAX);

        let track = MIDITrack::from_deltas(vec![
            tempo_event(0, 0xFFFFFF),
            Event::new_delta_note_on_event(u64::MAX, 0, 60, 64),
        ]);
        let document =
            MIDIDocument::new(0, Division::TicksPerQuarterNote(1), vec![track]).unwrap();
        let stats = complete(aggregate(&document, &CancellationToken::new()));
        assert_eq!(stats.total_ticks(), u64::MAX);
        assert_eq!(stats.total_duration(), Duration::MAX);
    }

    #[test]
    fn smpte_duration_ignores_tempo() {
        let track = MIDITrack::from_deltas(vec![
            tempo_event(0, 1_000_000),
            Event::new_delta_note_on_event(2500, 0, 60, 64),
        ]);
        let division = Division::SMPTE {
            fps: 25,
            ticks_per_frame: 40,
        };
        let document = MIDIDocument::new(0, division, vec![track]).unwrap();
        let stats = complete(aggregate(&document, &CancellationToken::new()));

        assert_secs(stats.total_duration(), 2.5);
    }

    #[test]
    fn cancelled_aggregation_reports_no_tracks() {
        let document = MIDIDocument::new(
            1,
            Division::TicksPerQuarterNote(96),
            vec![note_pair(0), note_pair(1)],
        )
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.request();

        match aggregate(&document, &cancel) {
            AggregateOutcome::Cancelled(stats) => {
                assert_eq!(stats.total_tracks(), 0);
                assert_eq!(stats.total_events(), 0);
                assert_eq!(stats.file_type(), 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn partial_document_statistics() {
        let partial = PartialDocument {
            header: MIDIHeader {
                format: 1,
                track_count: 3,
                division: Division::TicksPerQuarterNote(96),
            },
            tracks: vec![note_pair(0)],
        };
        let stats = partial.statistics();

        assert_eq!(stats.total_tracks(), 1);
        assert_eq!(stats.total_events(), 2);
        assert_eq!(stats.total_notes(), 1);
    }
}
