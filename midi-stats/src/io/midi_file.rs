use std::{fs::File, path::Path};

use tracing::{debug, warn};

use crate::{cancel::CancellationToken, progress::ProgressSink};

use super::{
    document::{Division, MIDIDocument, MIDIHeader, MIDITrack, PartialDocument, TrackBuilder},
    errors::{DecodeError, MIDILoadError, TrackErrorReason, TrackParseError},
    readers::{MIDIReader, RAMReader},
    track_parser::TrackParser,
};

const HEADER_TAG: &[u8; 4] = b"MThd";
const TRACK_TAG: &[u8; 4] = b"MTrk";
const HEADER_LEN: u32 = 6;
const CHUNK_HEADER_SIZE: u64 = 8;

/// What a decode produced: either the whole file, or whatever was fully
/// parsed before cancellation was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Complete(MIDIDocument),
    Cancelled(PartialDocument),
}

fn bytes_to_val(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |num, b| (num << 8) | *b as u32)
}

fn percent_of(consumed: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (consumed.saturating_mul(100) / total).min(100) as u8
}

fn read_header<R: MIDIReader>(reader: &R) -> Result<MIDIHeader, DecodeError> {
    let truncated = |_| DecodeError::header("truncated header");

    let tag = reader.read_bytes(0, 4).map_err(truncated)?;
    if tag != HEADER_TAG {
        return Err(DecodeError::header("invalid header tag"));
    }

    let len = bytes_to_val(&reader.read_bytes(4, 4).map_err(truncated)?);
    if len != HEADER_LEN {
        return Err(DecodeError::header(format!(
            "header length must be {HEADER_LEN}, found {len}"
        )));
    }

    let data = reader
        .read_bytes(CHUNK_HEADER_SIZE, HEADER_LEN as usize)
        .map_err(truncated)?;
    let format = bytes_to_val(&data[0..2]) as u16;
    if format > 2 {
        return Err(DecodeError::header(format!("unsupported format {format}")));
    }
    let track_count = bytes_to_val(&data[2..4]) as u16;
    let division = Division::from_raw([data[4], data[5]]).map_err(DecodeError::header)?;

    Ok(MIDIHeader {
        format,
        track_count,
        division,
    })
}

/// Reads a track chunk header at `pos`, returning the chunk body's start and length.
fn read_track_chunk<R: MIDIReader>(reader: &R, pos: u64) -> Result<(u64, u64), TrackParseError> {
    let bytes = reader
        .read_bytes(pos, CHUNK_HEADER_SIZE as usize)
        .map_err(|_| TrackParseError::new(TrackErrorReason::Truncated, reader.len()))?;
    let (tag, len) = bytes.split_at(4);
    if tag != TRACK_TAG {
        return Err(TrackParseError::new(TrackErrorReason::InvalidChunkTag, pos));
    }

    let start = pos + CHUNK_HEADER_SIZE;
    let len = bytes_to_val(len) as u64;
    if start + len > reader.len() {
        return Err(TrackParseError::new(
            TrackErrorReason::Truncated,
            reader.len(),
        ));
    }
    Ok((start, len))
}

fn parse_track<R: MIDIReader>(
    reader: &R,
    start: u64,
    len: u64,
) -> Result<MIDITrack, TrackParseError> {
    let mut track = TrackBuilder::default();
    for event in TrackParser::new(reader.open_reader(start, len)) {
        track.push(event?);
    }
    Ok(track.finish())
}

/// Decodes a Standard MIDI File held by `reader`.
///
/// Reports progress after the header and after every track, and checks `cancel`
/// at the same points. Every malformed input is reported as a [`DecodeError`].
pub fn decode<R: MIDIReader>(
    reader: &R,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<DecodeOutcome, DecodeError> {
    let total = reader.len();
    let header = read_header(reader)?;
    debug!(
        format = header.format,
        track_count = header.track_count,
        division = header.division.raw(),
        "parsed MIDI header"
    );
    if header.format == 0 && header.track_count != 1 {
        warn!(
            track_count = header.track_count,
            "format 0 file declares more or less than one track"
        );
    }

    let mut pos = CHUNK_HEADER_SIZE + HEADER_LEN as u64;
    progress.report(
        percent_of(pos, total),
        &format!(
            "Parsed MIDI header: format {}, {} tracks",
            header.format, header.track_count
        ),
    );

    let mut tracks = Vec::with_capacity(header.track_count as usize);
    if cancel.is_requested() {
        return Ok(DecodeOutcome::Cancelled(PartialDocument { header, tracks }));
    }

    for index in 0..header.track_count as u32 {
        let track = read_track_chunk(reader, pos)
            .and_then(|(start, len)| {
                pos = start + len;
                parse_track(reader, start, len)
            })
            .map_err(|e| DecodeError::track(index, e))?;

        debug!(track = index, events = track.len(), "parsed track");
        tracks.push(track);

        progress.report(
            percent_of(pos, total),
            &format!("Parsed track {}/{}", index + 1, header.track_count),
        );
        if cancel.is_requested() {
            return Ok(DecodeOutcome::Cancelled(PartialDocument { header, tracks }));
        }
    }

    if pos < total {
        debug!(bytes = total - pos, "ignoring data after the last track");
    }

    Ok(DecodeOutcome::Complete(MIDIDocument::from_decoded(header, tracks)))
}

/// Reads a file into memory so it can be decoded.
pub fn open_in_ram(filename: impl AsRef<Path>, max_size: u64) -> Result<RAMReader, MIDILoadError> {
    let file = File::open(filename)?;
    RAMReader::new(file, max_size)
}
