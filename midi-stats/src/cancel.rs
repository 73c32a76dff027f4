use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A shared flag that asks a load to stop at its next checkpoint.
///
/// Clones share the same flag, so a token can be handed to a worker and
/// requested from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    requested: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
