pub use delta::Delta;
pub use event::Event;
pub use events::*;

mod delta;
mod event;
mod events;

/// Encodes a value as a MIDI variable-length quantity, most significant group first.
pub fn encode_var_length_value(mut val: u64) -> Vec<u8> {
    let mut vec = Vec::new();
    let mut added = 0x00u8;
    loop {
        let v = (val & 0x7F) as u8 | added;
        vec.push(v);
        val >>= 7;
        added = 0x80;
        if val == 0 {
            break;
        }
    }
    vec.reverse();
    vec
}

pub trait MIDIEvent: std::fmt::Debug {
    fn key(&self) -> Option<u8>;

    fn channel(&self) -> Option<u8>;
}

pub trait MIDIDelta {
    fn delta(&self) -> u64;
}
