use super::events::*;
use super::MIDIEvent;

use derive::EventImpl;

#[derive(EventImpl, Debug, PartialEq, Eq)]
pub enum Event {
    #[key]
    #[channel]
    NoteOn(NoteOnEvent),
    #[key]
    #[channel]
    NoteOff(NoteOffEvent),
    #[channel]
    ControlChange(Box<ControlChangeEvent>),
    #[channel]
    ProgramChange(Box<ProgramChangeEvent>),
    #[channel]
    OtherChannel(Box<OtherChannelEvent>),
    Meta(Box<MetaEvent>),
    SystemExclusive(Box<SystemExclusiveEvent>),
}

impl Event {
    /// True for a note on with a non-zero velocity.
    pub fn is_note_on(&self) -> bool {
        matches!(self, Event::NoteOn(e) if !e.is_note_off())
    }

    /// True for note offs, including note ons with zero velocity.
    pub fn is_note_off(&self) -> bool {
        match self {
            Event::NoteOff(_) => true,
            Event::NoteOn(e) => e.is_note_off(),
            _ => false,
        }
    }

    /// Microseconds per quarter note if this is a tempo change.
    pub fn tempo(&self) -> Option<u32> {
        match self {
            Event::Meta(e) => e.tempo(),
            _ => None,
        }
    }

    pub fn meta_payload(&self) -> Option<(u8, &[u8])> {
        match self {
            Event::Meta(e) => Some((e.kind, &e.data)),
            _ => None,
        }
    }

    pub fn sysex_payload(&self) -> Option<&[u8]> {
        match self {
            Event::SystemExclusive(e) => Some(&e.data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::events::{ControlChangeEvent, Event, MIDIEvent, MetaEvent, NoteOnEvent};

    #[test]
    fn zero_velocity_note_on_is_note_off() {
        let on = Event::new_note_on_event(3, 60, 64);
        let silent = Event::new_note_on_event(3, 60, 0);
        let off = Event::new_note_off_event(3, 60, 64);

        assert!(on.is_note_on());
        assert!(!on.is_note_off());
        assert!(!silent.is_note_on());
        assert!(silent.is_note_off());
        assert!(off.is_note_off());
    }

    #[test]
    fn channel_and_key_extraction() {
        assert_eq!(Event::new_note_on_event(9, 36, 100).channel(), Some(9));
        assert_eq!(Event::new_note_on_event(9, 36, 100).key(), Some(36));
        assert_eq!(Event::new_control_change_event(2, 7, 100).channel(), Some(2));
        assert_eq!(Event::new_control_change_event(2, 7, 100).key(), None);
        assert_eq!(Event::new_meta_event(0x03, b"Piano".to_vec()).channel(), None);
        assert_eq!(Event::new_system_exclusive_event(0xF0, vec![0x7E]).channel(), None);
    }

    #[test]
    fn struct_getters() {
        let note = NoteOnEvent::new(9, 36, 100);
        assert_eq!(note.channel(), 9);
        assert_eq!(note.key(), 36);
        assert_eq!(MIDIEvent::key(&note), Some(36));

        let cc = ControlChangeEvent::new(2, 7, 100);
        assert_eq!(cc.channel(), 2);
        assert_eq!(MIDIEvent::key(&cc), None);

        let meta = MetaEvent::new(0x03, b"Piano".to_vec());
        assert_eq!(MIDIEvent::channel(&meta), None);
    }

    #[test]
    fn tempo_and_payload_access() {
        let tempo = Event::new_meta_event(0x51, vec![0x07, 0xA1, 0x20]);
        assert_eq!(tempo.tempo(), Some(500_000));
        assert_eq!(tempo.meta_payload(), Some((0x51, &[0x07, 0xA1, 0x20][..])));

        let short_tempo = Event::new_meta_event(0x51, vec![0x07, 0xA1]);
        assert_eq!(short_tempo.tempo(), None);

        let sysex = Event::new_system_exclusive_event(0xF0, vec![0x43, 0x10, 0xF7]);
        assert_eq!(sysex.sysex_payload(), Some(&[0x43, 0x10, 0xF7][..]));
        assert_eq!(sysex.meta_payload(), None);
    }
}
