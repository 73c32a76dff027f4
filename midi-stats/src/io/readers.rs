use std::{
    fmt::Debug,
    io::{Read, Seek, SeekFrom},
    sync::Arc,
};

use super::errors::{MIDILoadError, TrackErrorReason, TrackParseError};

/// Default upper bound on the size of a file held in memory (2 GiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2147483648;

#[derive(Debug)]
pub struct RAMReader {
    bytes: Arc<Vec<u8>>,
}

fn get_reader_len<T: Seek>(reader: &mut T) -> Result<u64, MIDILoadError> {
    let pos = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(pos)
}

impl RAMReader {
    /// Reads the whole stream into memory, refusing streams longer than `max_size` bytes.
    pub fn new<T: Read + Seek>(mut reader: T, max_size: u64) -> Result<RAMReader, MIDILoadError> {
        let length = get_reader_len(&mut reader)?;
        if length > max_size {
            return Err(MIDILoadError::FileTooBig {
                size: length,
                max: max_size,
            });
        }

        let mut bytes = Vec::with_capacity(length as usize);
        reader.read_to_end(&mut bytes)?;
        Ok(RAMReader {
            bytes: Arc::new(bytes),
        })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> RAMReader {
        RAMReader {
            bytes: Arc::new(bytes),
        }
    }
}

/// A random access byte source that a MIDI file is decoded from.
pub trait MIDIReader: Debug {
    type ByteReader: TrackReader;

    fn read_bytes_to(&self, pos: u64, bytes: Vec<u8>) -> Result<Vec<u8>, MIDILoadError>;

    fn read_bytes(&self, pos: u64, count: usize) -> Result<Vec<u8>, MIDILoadError> {
        let bytes = vec![0u8; count];

        self.read_bytes_to(pos, bytes)
    }

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn open_reader(&self, start: u64, len: u64) -> Self::ByteReader;
}

impl MIDIReader for RAMReader {
    type ByteReader = FullRamTrackReader;

    fn open_reader(&self, start: u64, len: u64) -> FullRamTrackReader {
        FullRamTrackReader::new(self.bytes.clone(), start as usize, (start + len) as usize)
    }

    fn read_bytes_to(&self, pos: u64, mut bytes: Vec<u8>) -> Result<Vec<u8>, MIDILoadError> {
        let count = bytes.len();
        if pos + count as u64 > self.len() {
            return Err(MIDILoadError::CorruptChunks);
        }

        let start = pos as usize;
        bytes.copy_from_slice(&self.bytes[start..start + count]);

        Ok(bytes)
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Sequential access to the bytes of a single track chunk.
pub trait TrackReader {
    fn read(&mut self) -> Result<u8, TrackParseError>;

    /// Absolute position of the next byte.
    fn pos(&self) -> u64;

    /// True once every byte of the chunk was read.
    fn is_finished(&self) -> bool;
}

pub struct FullRamTrackReader {
    bytes: Arc<Vec<u8>>,
    pos: usize,
    end: usize,
}

impl FullRamTrackReader {
    pub fn new(bytes: Arc<Vec<u8>>, pos: usize, end: usize) -> FullRamTrackReader {
        let end = end.min(bytes.len());
        FullRamTrackReader { bytes, pos, end }
    }

    pub fn new_from_vec(bytes: Vec<u8>) -> FullRamTrackReader {
        let len = bytes.len();
        FullRamTrackReader {
            bytes: Arc::new(bytes),
            pos: 0,
            end: len,
        }
    }
}

impl TrackReader for FullRamTrackReader {
    #[inline(always)]
    fn read(&mut self) -> Result<u8, TrackParseError> {
        if self.pos >= self.end {
            return Err(TrackParseError::new(
                TrackErrorReason::Truncated,
                self.pos as u64,
            ));
        }
        let b = self.bytes[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn pos(&self) -> u64 {
        self.pos as u64
    }

    fn is_finished(&self) -> bool {
        self.pos >= self.end
    }
}
