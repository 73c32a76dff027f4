use thiserror::Error;

/// Errors raised while bringing a byte source into memory.
#[derive(Debug, Error)]
pub enum MIDILoadError {
    #[error("Corrupt chunks")]
    CorruptChunks,
    #[error("Filesystem error: {0}")]
    FilesystemError(#[from] std::io::Error),
    #[error("File too big ({size} bytes, maximum is {max} bytes)")]
    FileTooBig { size: u64, max: u64 },
}

/// Why a track chunk could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TrackErrorReason {
    #[error("VLQ overflow")]
    VLQOverflow,
    #[error("unrecognized status")]
    UnrecognizedStatus(u8),
    #[error("truncated")]
    Truncated,
    #[error("missing status")]
    MissingStatus,
    #[error("invalid chunk tag")]
    InvalidChunkTag,
}

/// An error produced by the track parser, positioned at an absolute byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{reason} (position: {position:#06x})")]
pub struct TrackParseError {
    pub reason: TrackErrorReason,
    pub position: u64,
}

impl TrackParseError {
    pub fn new(reason: TrackErrorReason, position: u64) -> Self {
        Self { reason, position }
    }
}

/// A document was given more tracks than an SMF header can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Too many tracks ({0}, maximum is 65535)")]
pub struct TooManyTracks(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Malformed header: {0}")]
    MalformedHeader(String),
    #[error("Malformed track (track {track}, position: {offset:#06x}): {reason}")]
    MalformedTrack {
        track: u32,
        offset: u64,
        reason: TrackErrorReason,
    },
}

impl DecodeError {
    pub(crate) fn header(reason: impl Into<String>) -> Self {
        DecodeError::MalformedHeader(reason.into())
    }

    pub(crate) fn track(track: u32, err: TrackParseError) -> Self {
        DecodeError::MalformedTrack {
            track,
            offset: err.position,
            reason: err.reason,
        }
    }
}
