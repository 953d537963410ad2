//! Upload queue status controller
//!
//! Follows the lifecycle events of a drag-and-drop upload widget and
//! toggles the browser panel: hidden while a queue run is in progress,
//! shown again once the queue completes. Files that uploaded successfully
//! during the run are removed from the widget's list at completion.

use super::config::UploadConfig;
use super::element::ElementHandle;
use tracing::{debug, info};

/// The upload widget side of the contract
pub trait UploadQueue {
    type File;

    /// Remove `file` from the widget's visible list
    fn remove_file(&self, file: &Self::File);
}

/// Lifecycle events emitted by the upload widget
#[derive(Clone, Debug, PartialEq)]
pub enum UploadEvent<F> {
    FileAdded,
    UploadSucceeded(F),
    QueueComplete,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UploadPhase {
    #[default]
    Idle,
    InProgress,
    Finished,
}

impl UploadPhase {
    pub fn label(&self) -> &'static str {
        match self {
            UploadPhase::Idle => "idle",
            UploadPhase::InProgress => "in-progress",
            UploadPhase::Finished => "finished",
        }
    }
}

/// Files that succeeded during one queue run
#[derive(Clone, Debug)]
pub struct UploadSession<F> {
    succeeded: Vec<F>,
}

impl<F> Default for UploadSession<F> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
        }
    }
}

impl<F: PartialEq> UploadSession<F> {
    /// Record a successful upload. Returns false if already recorded.
    pub fn record(&mut self, file: F) -> bool {
        if self.succeeded.contains(&file) {
            return false;
        }
        self.succeeded.push(file);
        true
    }

    pub fn len(&self) -> usize {
        self.succeeded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty()
    }

    /// Remove every recorded file from the widget, emptying the session
    pub fn drain_into<Q: UploadQueue<File = F>>(&mut self, queue: &Q) -> usize {
        let files = std::mem::take(&mut self.succeeded);
        for file in &files {
            queue.remove_file(file);
        }
        files.len()
    }
}

/// Drives the browser panel from upload widget events
pub struct UploadStatus<E, F> {
    panel: E,
    config: UploadConfig,
    phase: UploadPhase,
    session: UploadSession<F>,
}

impl<E: ElementHandle, F: PartialEq> UploadStatus<E, F> {
    pub fn new(panel: E, config: UploadConfig) -> Self {
        Self {
            panel,
            config,
            phase: UploadPhase::Idle,
            session: UploadSession::default(),
        }
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    /// True once the last queue run has completed (or none has started)
    pub fn is_finished(&self) -> bool {
        self.phase != UploadPhase::InProgress
    }

    pub fn session(&self) -> &UploadSession<F> {
        &self.session
    }

    pub fn panel(&self) -> &E {
        &self.panel
    }

    pub fn handle<Q: UploadQueue<File = F>>(&mut self, event: UploadEvent<F>, queue: &Q) {
        match event {
            UploadEvent::FileAdded => self.on_file_added(),
            UploadEvent::UploadSucceeded(file) => self.on_upload_succeeded(file),
            UploadEvent::QueueComplete => {
                self.on_queue_complete(queue);
            }
        }
    }

    pub fn on_file_added(&mut self) {
        if self.phase != UploadPhase::InProgress {
            debug!("Upload run started");
        }
        self.phase = UploadPhase::InProgress;
        self.panel.add_class(&self.config.hidden_class);
    }

    pub fn on_upload_succeeded(&mut self, file: F) {
        if !self.session.record(file) {
            debug!("Duplicate success event ignored");
        }
    }

    /// Drain the session into the widget and show the panel again.
    ///
    /// Returns the number of files removed from the widget.
    pub fn on_queue_complete<Q: UploadQueue<File = F>>(&mut self, queue: &Q) -> usize {
        let removed = self.session.drain_into(queue);
        self.phase = UploadPhase::Finished;
        self.panel.remove_class(&self.config.hidden_class);
        info!(removed, "Upload queue complete");
        removed
    }
}
