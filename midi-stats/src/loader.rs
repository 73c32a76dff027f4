use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, Receiver};
use tracing::{debug, info, warn};

use crate::{
    cancel::CancellationToken,
    config::LoaderConfig,
    io::{decode, open_in_ram, DecodeError, DecodeOutcome, MIDILoadError, MIDIReader},
    progress::{ProgressSequencer, ProgressSink},
    stats::{aggregate, AggregateOutcome, Statistics},
};

/// Why a load failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FileNotFound,
    FileUnreadable,
    MalformedHeader,
    MalformedTrack { track: u32, offset: u64 },
    /// Another load was already running on the same loader.
    Busy,
    /// An unexpected fault (a panic) was caught while loading.
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::FileNotFound => write!(f, "file not found"),
            ErrorKind::FileUnreadable => write!(f, "file unreadable"),
            ErrorKind::MalformedHeader => write!(f, "malformed header"),
            ErrorKind::MalformedTrack { track, offset } => {
                write!(f, "malformed track {track} at {offset:#06x}")
            }
            ErrorKind::Busy => write!(f, "busy"),
            ErrorKind::InternalError => write!(f, "internal error"),
        }
    }
}

impl From<&MIDILoadError> for ErrorKind {
    fn from(e: &MIDILoadError) -> Self {
        match e {
            MIDILoadError::FilesystemError(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::FileNotFound
            }
            _ => ErrorKind::FileUnreadable,
        }
    }
}

impl From<&DecodeError> for ErrorKind {
    fn from(e: &DecodeError) -> Self {
        match *e {
            DecodeError::MalformedHeader(_) => ErrorKind::MalformedHeader,
            DecodeError::MalformedTrack { track, offset, .. } => {
                ErrorKind::MalformedTrack { track, offset }
            }
        }
    }
}

/// The terminal outcome of a load. This is the only thing a load hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult {
    Success {
        statistics: Statistics,
        elapsed: Duration,
    },
    Failure {
        kind: ErrorKind,
        message: String,
        elapsed: Duration,
    },
    /// Statistics cover only the tracks fully processed before cancellation.
    Cancelled {
        statistics: Statistics,
        elapsed: Duration,
    },
}

impl LoadResult {
    pub fn elapsed(&self) -> Duration {
        match self {
            LoadResult::Success { elapsed, .. }
            | LoadResult::Failure { elapsed, .. }
            | LoadResult::Cancelled { elapsed, .. } => *elapsed,
        }
    }

    pub fn statistics(&self) -> Option<&Statistics> {
        match self {
            LoadResult::Success { statistics, .. } | LoadResult::Cancelled { statistics, .. } => {
                Some(statistics)
            }
            LoadResult::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            LoadResult::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LoadResult::Success { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadResult::Cancelled { .. })
    }

    fn busy(elapsed: Duration) -> Self {
        LoadResult::Failure {
            kind: ErrorKind::Busy,
            message: "Already loading a file. Please wait.".to_string(),
            elapsed,
        }
    }

    fn internal(message: String, elapsed: Duration) -> Self {
        LoadResult::Failure {
            kind: ErrorKind::InternalError,
            message,
            elapsed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadState {
    Idle = 0,
    Opening,
    Decoding,
    Aggregating,
    Succeeded,
    Failed,
    Cancelled,
}

impl LoadState {
    fn from_u8(val: u8) -> LoadState {
        match val {
            1 => LoadState::Opening,
            2 => LoadState::Decoding,
            3 => LoadState::Aggregating,
            4 => LoadState::Succeeded,
            5 => LoadState::Failed,
            6 => LoadState::Cancelled,
            _ => LoadState::Idle,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    busy: AtomicBool,
    state: AtomicU8,
}

impl Shared {
    fn try_acquire(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn set_state(&self, state: LoadState) {
        debug!(?state, "load state changed");
        self.state.store(state as u8, Ordering::Release);
    }

    fn state(&self) -> LoadState {
        LoadState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Called once the caller holds the result of the load.
    fn release(&self) {
        self.set_state(LoadState::Idle);
        self.busy.store(false, Ordering::Release);
    }
}

enum Outcome {
    Success(Statistics),
    Failure(ErrorKind, String),
    Cancelled(Statistics),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("Exception occurred: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("Exception occurred: {s}")
    } else {
        "Unknown exception occurred".to_string()
    }
}

fn load_stages(
    shared: &Shared,
    config: &LoaderConfig,
    path: &Path,
    progress: &mut ProgressSequencer<'_>,
    cancel: &CancellationToken,
) -> Outcome {
    shared.set_state(LoadState::Opening);
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    progress.report(0, &format!("Opening file: {name}"));

    let reader = match open_in_ram(path, config.max_file_size) {
        Ok(reader) => reader,
        Err(e) => {
            return Outcome::Failure(
                ErrorKind::from(&e),
                format!("Cannot open file {}: {e}", path.display()),
            )
        }
    };
    progress.report(
        0,
        &format!("File opened successfully, size: {} bytes", reader.len()),
    );

    shared.set_state(LoadState::Decoding);
    let document = match decode(&reader, progress, cancel) {
        Ok(DecodeOutcome::Complete(document)) => document,
        Ok(DecodeOutcome::Cancelled(partial)) => {
            return Outcome::Cancelled(partial.statistics());
        }
        Err(e) => return Outcome::Failure(ErrorKind::from(&e), e.to_string()),
    };
    drop(reader);

    shared.set_state(LoadState::Aggregating);
    progress.report(progress.last(), "Computing statistics");
    match aggregate(&document, cancel) {
        AggregateOutcome::Complete(statistics) => {
            progress.report(100, "MIDI file loaded successfully");
            Outcome::Success(statistics)
        }
        AggregateOutcome::Cancelled(statistics) => Outcome::Cancelled(statistics),
    }
}

/// Runs one whole load attempt. Nothing but a `LoadResult` leaves this function.
fn run_load(
    shared: &Shared,
    config: &LoaderConfig,
    path: &Path,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
    started: Instant,
) -> LoadResult {
    info!(path = %path.display(), "loading MIDI file");
    let mut progress = ProgressSequencer::new(progress);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        load_stages(shared, config, path, &mut progress, cancel)
    }));
    let elapsed = started.elapsed();

    let (state, result) = match outcome {
        Ok(Outcome::Success(statistics)) => {
            info!(
                ?elapsed,
                tracks = statistics.total_tracks(),
                events = statistics.total_events(),
                notes = statistics.total_notes(),
                "MIDI file loaded"
            );
            (
                LoadState::Succeeded,
                LoadResult::Success {
                    statistics,
                    elapsed,
                },
            )
        }
        Ok(Outcome::Failure(kind, message)) => {
            info!(?elapsed, %kind, %message, "MIDI file failed to load");
            (
                LoadState::Failed,
                LoadResult::Failure {
                    kind,
                    message,
                    elapsed,
                },
            )
        }
        Ok(Outcome::Cancelled(statistics)) => {
            info!(
                ?elapsed,
                tracks = statistics.total_tracks(),
                "MIDI file load cancelled"
            );
            (
                LoadState::Cancelled,
                LoadResult::Cancelled {
                    statistics,
                    elapsed,
                },
            )
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(?elapsed, %message, "panic while loading MIDI file");
            (LoadState::Failed, LoadResult::internal(message, elapsed))
        }
    };
    shared.set_state(state);
    result
}

/// Loads MIDI files one at a time and summarizes them.
///
/// A loader runs at most one load at once; any load requested while another
/// is in flight fails immediately with [`ErrorKind::Busy`].
#[derive(Debug, Default)]
pub struct MIDILoader {
    config: LoaderConfig,
    shared: Arc<Shared>,
}

impl MIDILoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn state(&self) -> LoadState {
        self.shared.state()
    }

    /// Loads `path` on the calling thread, blocking until the load is over.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> LoadResult {
        let started = Instant::now();
        if !self.shared.try_acquire() {
            warn!(path = %path.as_ref().display(), "rejected load, another load is in flight");
            return LoadResult::busy(started.elapsed());
        }

        let result = run_load(
            &self.shared,
            &self.config,
            path.as_ref(),
            progress,
            cancel,
            started,
        );
        self.shared.release();
        result
    }

    /// Loads `path` on a dedicated worker thread.
    ///
    /// `progress` is invoked on the worker. The returned handle resolves to the
    /// result; dropping it cancels the load and joins the worker.
    pub fn load_async<P>(
        &self,
        path: impl AsRef<Path>,
        mut progress: P,
        cancel: CancellationToken,
    ) -> LoadHandle
    where
        P: ProgressSink + Send + 'static,
    {
        let started = Instant::now();
        if !self.shared.try_acquire() {
            warn!(path = %path.as_ref().display(), "rejected load, another load is in flight");
            return LoadHandle::resolved(LoadResult::busy(started.elapsed()), cancel, started);
        }

        let (sender, receiver) = bounded(1);
        let shared = self.shared.clone();
        let config = self.config.clone();
        let path: PathBuf = path.as_ref().to_path_buf();
        let token = cancel.clone();

        let spawned = thread::Builder::new()
            .name(self.config.worker_name.clone())
            .spawn(move || {
                let result = run_load(&shared, &config, &path, &mut progress, &token, started);
                // The handle may have been leaked without being waited on.
                sender.send(result).ok();
            });

        match spawned {
            Ok(thread) => LoadHandle {
                worker: Some(Worker {
                    thread,
                    receiver,
                    shared: self.shared.clone(),
                }),
                result: None,
                cancel,
                started,
            },
            Err(e) => {
                warn!(error = %e, "failed to spawn the loader thread");
                self.shared.release();
                let result = LoadResult::internal(
                    format!("Cannot start loader thread: {e}"),
                    started.elapsed(),
                );
                LoadHandle::resolved(result, cancel, started)
            }
        }
    }
}

struct Worker {
    thread: JoinHandle<()>,
    receiver: Receiver<LoadResult>,
    shared: Arc<Shared>,
}

impl Worker {
    fn is_finished(&self) -> bool {
        !self.receiver.is_empty() || self.thread.is_finished()
    }

    fn join(self, started: Instant) -> LoadResult {
        let received = self.receiver.recv();
        let joined = self.thread.join();
        self.shared.release();

        match (received, joined) {
            (Ok(result), _) => result,
            (Err(_), Err(payload)) => {
                LoadResult::internal(panic_message(payload.as_ref()), started.elapsed())
            }
            (Err(_), Ok(())) => LoadResult::internal(
                "Loader thread exited without a result".to_string(),
                started.elapsed(),
            ),
        }
    }
}

/// A load running on a worker thread.
///
/// The worker is always joined: by [`wait`](LoadHandle::wait),
/// [`cancel_and_wait`](LoadHandle::cancel_and_wait), [`poll`](LoadHandle::poll)
/// once it has finished, or on drop (after requesting cancellation).
pub struct LoadHandle {
    worker: Option<Worker>,
    result: Option<LoadResult>,
    cancel: CancellationToken,
    started: Instant,
}

impl LoadHandle {
    fn resolved(result: LoadResult, cancel: CancellationToken, started: Instant) -> Self {
        Self {
            worker: None,
            result: Some(result),
            cancel,
            started,
        }
    }

    /// Asks the load to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.request();
    }

    pub fn is_finished(&self) -> bool {
        match &self.worker {
            Some(worker) => worker.is_finished(),
            None => true,
        }
    }

    /// Returns the result without blocking if the load is over.
    pub fn poll(&mut self) -> Option<&LoadResult> {
        if self.is_finished() {
            if let Some(worker) = self.worker.take() {
                self.result = Some(worker.join(self.started));
            }
        }
        self.result.as_ref()
    }

    /// Blocks until the load is over.
    pub fn wait(mut self) -> LoadResult {
        if let Some(worker) = self.worker.take() {
            return worker.join(self.started);
        }
        match self.result.take() {
            Some(result) => result,
            None => LoadResult::internal(
                "Load result was already taken".to_string(),
                self.started.elapsed(),
            ),
        }
    }

    /// Requests cancellation, then blocks until the worker has stopped.
    pub fn cancel_and_wait(self) -> LoadResult {
        self.cancel();
        self.wait()
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            debug!("load handle dropped before completion, cancelling");
            self.cancel.request();
            worker.join(self.started);
        }
    }
}
