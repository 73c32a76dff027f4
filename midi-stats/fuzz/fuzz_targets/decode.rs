#![no_main]

use libfuzzer_sys::fuzz_target;

use midi_stats::{
    io::{decode, DecodeOutcome, RAMReader},
    stats::aggregate,
    CancellationToken, NoProgress,
};

fuzz_target!(|data: &[u8]| {
    let reader = RAMReader::from_bytes(data.to_vec());
    let cancel = CancellationToken::new();
    if let Ok(DecodeOutcome::Complete(document)) = decode(&reader, &mut NoProgress, &cancel) {
        aggregate(&document, &cancel);
    }
});
