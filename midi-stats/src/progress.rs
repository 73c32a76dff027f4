use crossbeam_channel::{unbounded, Receiver, Sender};

/// Receives `(percent, message)` milestones while a file loads.
pub trait ProgressSink {
    fn report(&mut self, percent: u8, message: &str);
}

impl<F: FnMut(u8, &str)> ProgressSink for F {
    fn report(&mut self, percent: u8, message: &str) {
        self(percent, message)
    }
}

/// A sink that ignores every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _percent: u8, _message: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub message: String,
}

/// A sink that forwards every report into a channel, so another thread
/// (a UI event loop, for example) can drain them in order.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: Sender<ProgressUpdate>,
}

impl ProgressSink for ChannelProgress {
    fn report(&mut self, percent: u8, message: &str) {
        // The receiving side may have gone away; loading carries on regardless.
        self.sender
            .send(ProgressUpdate {
                percent,
                message: message.to_string(),
            })
            .ok();
    }
}

/// Creates a [`ChannelProgress`] sink and the receiver its reports arrive on.
pub fn channel() -> (ChannelProgress, Receiver<ProgressUpdate>) {
    let (sender, receiver) = unbounded();
    (ChannelProgress { sender }, receiver)
}

/// Wraps the caller's sink for the duration of one load, clamping reported
/// percentages so they never go down and never exceed 100.
pub(crate) struct ProgressSequencer<'a> {
    sink: &'a mut dyn ProgressSink,
    last: u8,
}

impl<'a> ProgressSequencer<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self { sink, last: 0 }
    }

    pub fn last(&self) -> u8 {
        self.last
    }
}

impl ProgressSink for ProgressSequencer<'_> {
    fn report(&mut self, percent: u8, message: &str) {
        self.last = percent.clamp(self.last, 100);
        self.sink.report(self.last, message);
    }
}
