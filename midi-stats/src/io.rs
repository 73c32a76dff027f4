mod document;
mod errors;
pub(crate) mod midi_file;
mod readers;
mod track_parser;

pub use document::*;
pub use errors::*;
pub use midi_file::{decode, open_in_ram, DecodeOutcome};
pub use readers::*;
pub use track_parser::*;
