//! Progress notification.

/// Receives completion percentages in `0..=100`.
///
/// Values arrive in non-decreasing order and a successful run always
/// ends with 100. Any `FnMut(u8) + Send` is a sink. Sinks must be `Send`
/// because a run configured with its own thread pool executes on a
/// worker of that pool.
pub trait ProgressSink: Send {
    /// Called synchronously from the pipeline thread.
    fn report(&mut self, percent: u8);
}

impl<F: FnMut(u8) + Send> ProgressSink for F {
    fn report(&mut self, percent: u8) {
        self(percent);
    }
}

/// Sink that discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _percent: u8) {}
}

/// Forwards milestones to a sink, dropping any that would go backwards
/// or repeat.
pub(crate) struct ProgressTracker<'a> {
    sink: &'a mut dyn ProgressSink,
    last: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self { sink, last: None }
    }

    pub(crate) fn advance(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        tracing::trace!(percent, "progress");
        self.sink.report(percent);
    }

    pub(crate) fn complete(&mut self) {
        self.advance(100);
    }
}
