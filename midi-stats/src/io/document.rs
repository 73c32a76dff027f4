use std::ops::Deref;

use crate::events::{Delta, Event, MIDIDelta};

use super::TooManyTracks;

/// The time basis of a MIDI file, as declared in its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Division {
    /// Delta times are counted in ticks per quarter note.
    TicksPerQuarterNote(u16),
    /// Delta times are counted in subdivisions of an SMPTE frame.
    ///
    /// `fps` is one of 24, 25, 29 (29.97 drop frame) or 30.
    SMPTE { fps: u8, ticks_per_frame: u8 },
}

impl Division {
    /// Interprets the signed 16 bit division field of a header chunk.
    pub fn from_raw(bytes: [u8; 2]) -> Result<Self, &'static str> {
        if bytes[0] & 0x80 == 0 {
            match u16::from_be_bytes(bytes) {
                0 => Err("division must be positive"),
                ticks => Ok(Division::TicksPerQuarterNote(ticks)),
            }
        } else {
            let fps = match bytes[0] as i8 {
                -24 => 24,
                -25 => 25,
                -29 => 29,
                -30 => 30,
                _ => return Err("invalid SMPTE frame rate"),
            };
            if bytes[1] == 0 {
                return Err("SMPTE ticks per frame must be positive");
            }
            Ok(Division::SMPTE {
                fps,
                ticks_per_frame: bytes[1],
            })
        }
    }

    /// The header value: positive ticks per quarter note, or the negative SMPTE encoding.
    pub fn raw(&self) -> i16 {
        match *self {
            Division::TicksPerQuarterNote(ticks) => ticks as i16,
            Division::SMPTE {
                fps,
                ticks_per_frame,
            } => i16::from_be_bytes([(-(fps as i8)) as u8, ticks_per_frame]),
        }
    }

    pub fn ticks_per_quarter_note(&self) -> Option<u16> {
        match *self {
            Division::TicksPerQuarterNote(ticks) => Some(ticks),
            Division::SMPTE { .. } => None,
        }
    }

    /// Ticks per second for SMPTE timing. `None` for tempo based timing.
    pub fn smpte_ticks_per_second(&self) -> Option<f64> {
        match *self {
            Division::TicksPerQuarterNote(_) => None,
            Division::SMPTE {
                fps,
                ticks_per_frame,
            } => {
                let fps = if fps == 29 { 29.97 } else { fps as f64 };
                Some(fps * ticks_per_frame as f64)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MIDIHeader {
    pub format: u16,
    pub track_count: u16,
    pub division: Division,
}

/// An event with its position in the track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub absolute_ticks: u64,
    pub delta: u64,
    pub event: Event,
}

impl Deref for TimedEvent {
    type Target = Event;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MIDITrack {
    events: Vec<TimedEvent>,
}

impl MIDITrack {
    /// Builds a track from delta timed events, accumulating absolute ticks.
    pub fn from_deltas(events: impl IntoIterator<Item = Delta<Event>>) -> Self {
        let mut builder = TrackBuilder::default();
        for event in events {
            builder.push(event);
        }
        builder.finish()
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The absolute tick of the last event, or 0 for an empty track.
    pub fn end_ticks(&self) -> u64 {
        self.events.last().map_or(0, |e| e.absolute_ticks)
    }
}

#[derive(Default)]
pub(crate) struct TrackBuilder {
    ticks: u64,
    events: Vec<TimedEvent>,
}

impl TrackBuilder {
    pub fn push(&mut self, event: Delta<Event>) {
        self.ticks = self.ticks.saturating_add(event.delta());
        self.events.push(TimedEvent {
            absolute_ticks: self.ticks,
            delta: event.delta,
            event: event.event,
        });
    }

    pub fn finish(mut self) -> MIDITrack {
        self.events.shrink_to_fit();
        MIDITrack {
            events: self.events,
        }
    }
}

/// A fully decoded MIDI file. Holds exactly as many tracks as its header declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MIDIDocument {
    header: MIDIHeader,
    tracks: Vec<MIDITrack>,
}

impl MIDIDocument {
    pub fn new(
        format: u16,
        division: Division,
        tracks: Vec<MIDITrack>,
    ) -> Result<Self, TooManyTracks> {
        let track_count = u16::try_from(tracks.len()).map_err(|_| TooManyTracks(tracks.len()))?;
        let header = MIDIHeader {
            format,
            track_count,
            division,
        };
        Ok(Self { header, tracks })
    }

    pub(crate) fn from_decoded(header: MIDIHeader, tracks: Vec<MIDITrack>) -> Self {
        debug_assert_eq!(tracks.len(), header.track_count as usize);
        Self { header, tracks }
    }

    pub fn header(&self) -> &MIDIHeader {
        &self.header
    }

    pub fn format(&self) -> u16 {
        self.header.format
    }

    pub fn division(&self) -> Division {
        self.header.division
    }

    pub fn tracks(&self) -> &[MIDITrack] {
        &self.tracks
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

/// The header and the fully parsed tracks of a decode that was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDocument {
    pub header: MIDIHeader,
    pub tracks: Vec<MIDITrack>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_from_raw() {
        assert_eq!(
            Division::from_raw([0x00, 0x60]),
            Ok(Division::TicksPerQuarterNote(96))
        );
        assert_eq!(
            Division::from_raw([0xE7, 0x28]),
            Ok(Division::SMPTE {
                fps: 25,
                ticks_per_frame: 40
            })
        );
        assert!(Division::from_raw([0x00, 0x00]).is_err());
        assert!(Division::from_raw([0xE6, 0x28]).is_err());
        assert!(Division::from_raw([0xE8, 0x00]).is_err());
    }

    #[test]
    fn division_raw_value() {
        assert_eq!(Division::TicksPerQuarterNote(480).raw(), 480);
        let smpte = Division::SMPTE {
            fps: 30,
            ticks_per_frame: 80,
        };
        assert_eq!(smpte.raw(), i16::from_be_bytes([0xE2, 0x50]));
        assert_eq!(smpte.smpte_ticks_per_second(), Some(2400.0));
    }

    #[test]
    fn track_accumulates_absolute_ticks() {
        let track = MIDITrack::from_deltas(vec![
            Event::new_delta_note_on_event(10, 0, 60, 100),
            Event::new_delta_note_off_event(0, 0, 60, 0),
            Event::new_delta_note_on_event(25, 0, 62, 100),
        ]);
        let ticks: Vec<u64> = track.events().iter().map(|e| e.absolute_ticks).collect();
        assert_eq!(ticks, vec![10, 10, 35]);
        assert_eq!(track.end_ticks(), 35);
    }

    #[test]
    fn document_track_count_follows_tracks() {
        let track = MIDITrack::from_deltas(vec![]);
        let tracks = vec![track.clone(); 3];
        let document = MIDIDocument::new(1, Division::TicksPerQuarterNote(96), tracks).unwrap();
        assert_eq!(document.header().track_count, 3);
        assert_eq!(document.track_count(), 3);

        let max = vec![track.clone(); u16::MAX as usize];
        let document = MIDIDocument::new(1, Division::TicksPerQuarterNote(96), max).unwrap();
        assert_eq!(document.header().track_count, u16::MAX);

        let too_many = vec![track; u16::MAX as usize + 1];
        assert_eq!(
            MIDIDocument::new(1, Division::TicksPerQuarterNote(96), too_many),
            Err(TooManyTracks(65536))
        );
    }
}
