use std::ops::Deref;

use crate::events::{MIDIDelta, MIDIEvent};

/// An event preceded by the number of ticks since the previous event in its track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta<E> {
    pub delta: u64,
    pub event: E,
}

impl<E> MIDIDelta for Delta<E> {
    #[inline(always)]
    fn delta(&self) -> u64 {
        self.delta
    }
}

impl<E> Delta<E> {
    #[inline(always)]
    pub fn new(delta: u64, event: E) -> Self {
        Self { delta, event }
    }
}

impl<E> Deref for Delta<E> {
    type Target = E;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

impl<E: MIDIEvent> MIDIEvent for Delta<E> {
    fn key(&self) -> Option<u8> {
        self.event.key()
    }

    fn channel(&self) -> Option<u8> {
        self.event.channel()
    }
}
