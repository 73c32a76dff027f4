use super::{Delta, Event, MIDIEvent};
use derive::{MIDIEvent, NewEvent};

/// Meta event type of a tempo change (`FF 51 03 tt tt tt`).
pub const META_TEMPO: u8 = 0x51;
/// Meta event type marking the end of a track (`FF 2F 00`).
pub const META_END_OF_TRACK: u8 = 0x2F;

#[derive(Debug, MIDIEvent, Clone, NewEvent, PartialEq, Eq)]
pub struct NoteOnEvent {
    #[channel]
    pub channel: u8,
    #[key]
    pub key: u8,
    pub velocity: u8,
}

impl NoteOnEvent {
    /// A note on with zero velocity is a note off.
    #[inline(always)]
    pub fn is_note_off(&self) -> bool {
        self.velocity == 0
    }
}

#[derive(Debug, MIDIEvent, Clone, NewEvent, PartialEq, Eq)]
pub struct NoteOffEvent {
    #[channel]
    pub channel: u8,
    #[key]
    pub key: u8,
    pub velocity: u8,
}

#[derive(Debug, MIDIEvent, Clone, NewEvent, PartialEq, Eq)]
pub struct ControlChangeEvent {
    #[channel]
    pub channel: u8,
    pub controller: u8,
    pub value: u8,
}

#[derive(Debug, MIDIEvent, Clone, NewEvent, PartialEq, Eq)]
pub struct ProgramChangeEvent {
    #[channel]
    pub channel: u8,
    pub program: u8,
}

/// Polyphonic key pressure (`0xA0`), channel pressure (`0xD0`) and pitch wheel (`0xE0`),
/// kept as their raw data bytes.
#[derive(Debug, MIDIEvent, Clone, NewEvent, PartialEq, Eq)]
pub struct OtherChannelEvent {
    #[channel]
    pub channel: u8,
    /// The upper nibble of the status byte.
    pub command: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, MIDIEvent, Clone, NewEvent, PartialEq, Eq)]
pub struct MetaEvent {
    pub kind: u8,
    pub data: Vec<u8>,
}

impl MetaEvent {
    /// Microseconds per quarter note, if this is a well formed tempo event.
    pub fn tempo(&self) -> Option<u32> {
        match (self.kind, self.data.as_slice()) {
            (META_TEMPO, [a, b, c]) => Some(u32::from_be_bytes([0, *a, *b, *c])),
            _ => None,
        }
    }

    pub fn is_end_of_track(&self) -> bool {
        self.kind == META_END_OF_TRACK
    }
}

#[derive(Debug, MIDIEvent, Clone, NewEvent, PartialEq, Eq)]
pub struct SystemExclusiveEvent {
    /// Either `0xF0` or the `0xF7` escape.
    pub status: u8,
    pub data: Vec<u8>,
}
