//! Decodes Standard MIDI Files and summarizes them.
//!
//! The usual entry point is [`MIDILoader`], which opens a file, decodes it
//! with [`io::decode`], aggregates [`Statistics`] and reports progress along
//! the way, either on the calling thread or on a worker thread.

pub mod cancel;
pub mod config;
pub mod events;
pub mod io;
pub mod loader;
pub mod progress;
pub mod stats;

pub use cancel::CancellationToken;
pub use config::LoaderConfig;
pub use loader::{ErrorKind, LoadHandle, LoadResult, LoadState, MIDILoader};
pub use progress::{NoProgress, ProgressSink};
pub use stats::Statistics;
