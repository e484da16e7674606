use tokio::sync::mpsc;

/// Progress update emitted after each file a generator handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Name of the file just processed.
    pub current_file: String,
    /// Number of files processed so far (1-based).
    pub current: usize,
    /// Total number of files in the run.
    pub total: usize,
}

impl ProgressUpdate {
    /// Completion in whole percent.
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            100
        } else {
            self.current * 100 / self.total
        }
    }
}

/// Build a progress callback that forwards updates over a channel.
///
/// Send errors (receiver gone) are ignored; progress is best effort.
pub fn channel_reporter(
    tx: mpsc::UnboundedSender<ProgressUpdate>,
) -> impl FnMut(&ProgressUpdate) {
    move |update| {
        let _ = tx.send(update.clone());
    }
}
