use crate::events::{Delta, Event, META_END_OF_TRACK};

use super::{
    errors::{TrackErrorReason, TrackParseError},
    readers::TrackReader,
};

/// The longest variable-length quantity allowed in a file, in bytes.
pub const MAX_VAR_LENGTH_BYTES: usize = 4;

/// Reads a variable-length quantity of at most [`MAX_VAR_LENGTH_BYTES`] bytes.
pub fn read_var_length<T: TrackReader>(reader: &mut T) -> Result<u64, TrackParseError> {
    let mut n: u64 = 0;
    for _ in 0..MAX_VAR_LENGTH_BYTES {
        let byte = reader.read()?;
        n = (n << 7) | (byte & 0x7F) as u64;
        if (byte & 0x80) == 0 {
            return Ok(n);
        }
    }
    Err(TrackParseError::new(
        TrackErrorReason::VLQOverflow,
        reader.pos() - 1,
    ))
}

/// Iterates over the `(delta, event)` pairs of one track chunk.
///
/// Parsing stops at the end-of-track meta event or when the chunk runs out of
/// bytes, whichever comes first. The end-of-track event itself is not yielded.
pub struct TrackParser<T: TrackReader> {
    reader: T,
    pushback: Option<u8>,
    running_status: Option<u8>,
    ended: bool,
}

impl<T: TrackReader> TrackParser<T> {
    pub fn new(reader: T) -> Self {
        Self {
            reader,
            pushback: None,
            running_status: None,
            ended: false,
        }
    }

    /// Absolute position of the next unread byte.
    pub fn pos(&self) -> u64 {
        self.reader.pos()
    }

    fn read(&mut self) -> Result<u8, TrackParseError> {
        match self.pushback.take() {
            Some(p) => Ok(p),
            None => self.reader.read(),
        }
    }

    // Running status pushback is always consumed by the data bytes of the same
    // event, so length prefixes can be read straight from the reader.
    fn read_var_length(&mut self) -> Result<u64, TrackParseError> {
        read_var_length(&mut self.reader)
    }

    fn read_data(&mut self, len: u64) -> Result<Vec<u8>, TrackParseError> {
        let mut data = Vec::new();
        for _ in 0..len {
            data.push(self.reader.read()?);
        }
        data.shrink_to_fit();
        Ok(data)
    }
}

impl<T: TrackReader> Iterator for TrackParser<T> {
    type Item = Result<Delta<Event>, TrackParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        macro_rules! check {
            ($val:expr) => {
                match $val {
                    Ok(v) => v,
                    Err(e) => {
                        self.ended = true;
                        return Some(Err(e));
                    }
                }
            };
        }

        macro_rules! err {
            ($reason:expr, $pos:expr) => {{
                self.ended = true;
                return Some(Err(TrackParseError::new($reason, $pos)));
            }};
        }

        macro_rules! ret {
            ($val:expr) => {
                Some(Ok($val))
            };
        }

        if self.ended {
            return None;
        }
        if self.reader.is_finished() {
            self.ended = true;
            return None;
        }

        let delta = check!(self.read_var_length());
        let status_pos = self.reader.pos();
        let mut command = check!(self.read());
        if command < 0x80 {
            match self.running_status {
                Some(status) => {
                    self.pushback = Some(command);
                    command = status;
                }
                None => err!(TrackErrorReason::MissingStatus, status_pos),
            }
        }

        let channel = command & 0x0F;
        match command & 0xF0 {
            0x80 => {
                self.running_status = Some(command);
                let key = check!(self.read());
                let velocity = check!(self.read());
                ret!(Event::new_delta_note_off_event(delta, channel, key, velocity))
            }
            0x90 => {
                self.running_status = Some(command);
                let key = check!(self.read());
                let velocity = check!(self.read());
                ret!(Event::new_delta_note_on_event(delta, channel, key, velocity))
            }
            0xB0 => {
                self.running_status = Some(command);
                let controller = check!(self.read());
                let value = check!(self.read());
                ret!(Event::new_delta_control_change_event(
                    delta, channel, controller, value
                ))
            }
            0xC0 => {
                self.running_status = Some(command);
                let program = check!(self.read());
                ret!(Event::new_delta_program_change_event(
                    delta, channel, program
                ))
            }
            comm @ (0xA0 | 0xE0) => {
                self.running_status = Some(command);
                let var1 = check!(self.read());
                let var2 = check!(self.read());
                ret!(Event::new_delta_other_channel_event(
                    delta,
                    channel,
                    comm,
                    vec![var1, var2]
                ))
            }
            0xD0 => {
                self.running_status = Some(command);
                let pressure = check!(self.read());
                ret!(Event::new_delta_other_channel_event(
                    delta,
                    channel,
                    0xD0,
                    vec![pressure]
                ))
            }
            _ => match command {
                0xF0 | 0xF7 => {
                    let len = check!(self.read_var_length());
                    let data = check!(self.read_data(len));
                    ret!(Event::new_delta_system_exclusive_event(
                        delta, command, data
                    ))
                }
                0xFF => {
                    let kind = check!(self.read());
                    let len = check!(self.read_var_length());
                    let data = check!(self.read_data(len));
                    if kind == META_END_OF_TRACK {
                        self.ended = true;
                        return None;
                    }
                    ret!(Event::new_delta_meta_event(delta, kind, data))
                }
                _ => err!(TrackErrorReason::UnrecognizedStatus(command), status_pos),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        events::{encode_var_length_value, Delta, Event},
        io::{
            errors::{TrackErrorReason, TrackParseError},
            readers::FullRamTrackReader,
        },
    };

    use super::{read_var_length, TrackParser};

    fn parse(bytes: Vec<u8>) -> Result<Vec<Delta<Event>>, TrackParseError> {
        TrackParser::new(FullRamTrackReader::new_from_vec(bytes)).collect()
    }

    #[test]
    fn var_length_round_trip() {
        let values = [
            0u64, 1, 0x3F, 0x7F, 0x80, 0x2000, 0x3FFF, 0x4000, 0x1FFFFF, 0x200000, 0x8000000,
            0x0FFFFFFF,
        ];
        for value in values {
            let encoded = encode_var_length_value(value);
            assert!(encoded.len() <= 4);
            let mut reader = FullRamTrackReader::new_from_vec(encoded);
            assert_eq!(read_var_length(&mut reader).unwrap(), value);
        }
    }

    #[test]
    fn var_length_rejects_fifth_byte() {
        let mut reader = FullRamTrackReader::new_from_vec(vec![0x81, 0x80, 0x80, 0x80, 0x00]);
        assert_eq!(
            read_var_length(&mut reader),
            Err(TrackParseError::new(TrackErrorReason::VLQOverflow, 3))
        );
    }

    #[test]
    fn running_status() {
        let events = parse(vec![
            0x00, 0x90, 0x3C, 0x40, // note on
            0x10, 0x3E, 0x40, // running status note on
            0x10, 0x3C, 0x00, // running status note on, velocity 0
            0x00, 0xFF, 0x2F, 0x00,
        ])
        .unwrap();

        assert_eq!(
            events,
            vec![
                Event::new_delta_note_on_event(0, 0, 0x3C, 0x40),
                Event::new_delta_note_on_event(0x10, 0, 0x3E, 0x40),
                Event::new_delta_note_on_event(0x10, 0, 0x3C, 0x00),
            ]
        );
        assert!(events[2].is_note_off());
    }

    #[test]
    fn running_status_survives_meta_events() {
        let events = parse(vec![
            0x00, 0xB1, 0x07, 0x64, // control change
            0x00, 0xFF, 0x01, 0x02, b'h', b'i', // text meta
            0x05, 0x0A, 0x40, // running status control change
        ])
        .unwrap();

        assert_eq!(
            events,
            vec![
                Event::new_delta_control_change_event(0, 1, 0x07, 0x64),
                Event::new_delta_meta_event(0, 0x01, b"hi".to_vec()),
                Event::new_delta_control_change_event(5, 1, 0x0A, 0x40),
            ]
        );
    }

    #[test]
    fn meta_and_sysex_payloads() {
        let events = parse(vec![
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // tempo
            0x00, 0xF0, 0x03, 0x43, 0x12, 0xF7, // sysex
            0x00, 0xF7, 0x01, 0x7F, // escaped sysex
            0x00, 0xC2, 0x05, // program change
            0x00, 0xE2, 0x00, 0x40, // pitch wheel
        ])
        .unwrap();

        assert_eq!(events.len(), 5);
        assert_eq!(events[0].tempo(), Some(500_000));
        assert_eq!(events[1].sysex_payload(), Some(&[0x43, 0x12, 0xF7][..]));
        assert_eq!(
            events[2].event,
            Event::new_system_exclusive_event(0xF7, vec![0x7F])
        );
        assert_eq!(events[3].event, Event::new_program_change_event(2, 5));
        assert_eq!(
            events[4].event,
            Event::new_other_channel_event(2, 0xE0, vec![0x00, 0x40])
        );
    }

    #[test]
    fn end_of_track_stops_parsing() {
        let events = parse(vec![
            0x00, 0x90, 0x3C, 0x40, //
            0x00, 0xFF, 0x2F, 0x00, //
            0x00, 0x90, 0x3E, 0x40, // after the end of the track
        ])
        .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn missing_initial_status() {
        assert_eq!(
            parse(vec![0x00, 0x3C, 0x40]),
            Err(TrackParseError::new(TrackErrorReason::MissingStatus, 1))
        );
    }

    #[test]
    fn unrecognized_status() {
        assert_eq!(
            parse(vec![0x00, 0x90, 0x3C, 0x40, 0x00, 0xF2, 0x00, 0x00]),
            Err(TrackParseError::new(
                TrackErrorReason::UnrecognizedStatus(0xF2),
                5
            ))
        );
    }

    #[test]
    fn truncated_event() {
        assert_eq!(
            parse(vec![0x00, 0x90, 0x3C]),
            Err(TrackParseError::new(TrackErrorReason::Truncated, 3))
        );
        assert_eq!(
            parse(vec![0x00, 0xFF, 0x03, 0x05, b'a']),
            Err(TrackParseError::new(TrackErrorReason::Truncated, 5))
        );
        assert_eq!(
            parse(vec![0x00, 0x90, 0x3C, 0x40, 0x81]),
            Err(TrackParseError::new(TrackErrorReason::Truncated, 5))
        );
    }

    #[test]
    fn stops_after_error() {
        let mut parser = TrackParser::new(FullRamTrackReader::new_from_vec(vec![0x00, 0xF4]));
        assert!(parser.next().unwrap().is_err());
        assert!(parser.next().is_none());
    }
}
