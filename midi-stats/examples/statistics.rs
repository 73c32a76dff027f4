use std::{env, process, time::Duration};

use midi_stats::{progress, CancellationToken, LoadResult, MIDILoader};

fn duration_to_minutes_seconds(duration: Duration) -> String {
    format!(
        "{:02}:{:02}",
        duration.as_secs() / 60,
        duration.as_secs() % 60
    )
}

fn main() {
    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: statistics <file.mid>");
        process::exit(2);
    };

    let loader = MIDILoader::default();
    let (sink, updates) = progress::channel();
    let handle = loader.load_async(&path, sink, CancellationToken::new());

    for update in updates.iter() {
        println!("[{:>3}%] {}", update.percent, update.message);
    }

    match handle.wait() {
        LoadResult::Success {
            statistics,
            elapsed,
        } => {
            println!("Loaded in {elapsed:?}");
            println!(
                "MIDI length: {}",
                duration_to_minutes_seconds(statistics.total_duration())
            );
            println!("Stats: {statistics:#?}");
        }
        LoadResult::Cancelled { statistics, .. } => {
            println!("Cancelled, partial stats: {statistics:#?}");
        }
        LoadResult::Failure { kind, message, .. } => {
            eprintln!("{kind}: {message}");
            process::exit(1);
        }
    }
}
