//! Outbound notification bus and one-shot result listeners.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, oneshot};

use super::messages::Message;
use crate::state::{ExtractionTask, TaskEvent};

type Waiters = HashMap<String, Vec<oneshot::Sender<ExtractionTask>>>;

/// Listeners waiting for the terminal task of a given extraction id.
///
/// Each listener fires at most once and is dropped with its entry, so
/// sequential tasks never accumulate stale listeners.
#[derive(Default, Clone)]
pub struct ResultListeners {
    inner: Arc<Mutex<Waiters>>,
}

impl ResultListeners {
    fn lock(&self) -> MutexGuard<'_, Waiters> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, extraction_id: &str) -> oneshot::Receiver<ExtractionTask> {
        let (tx, rx) = oneshot::channel();
        self.lock()
            .entry(extraction_id.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Delivers `task` to every listener registered for its id. Returns how many were notified.
    pub fn fire(&self, task: &ExtractionTask) -> usize {
        let Some(waiters) = self.lock().remove(&task.id) else {
            return 0;
        };
        waiters
            .into_iter()
            .map(|tx| tx.send(task.clone()).is_ok())
            .filter(|delivered| *delivered)
            .count()
    }

    /// Drops listeners for `extraction_id` whose receiver is gone.
    pub fn prune(&self, extraction_id: &str) {
        let mut waiters = self.lock();
        if let Some(senders) = waiters.get_mut(extraction_id) {
            senders.retain(|tx| !tx.is_closed());
            if senders.is_empty() {
                waiters.remove(extraction_id);
            }
        }
    }

    /// Number of extraction ids with at least one listener.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }
}

#[derive(Clone)]
pub struct MessageBus {
    tx: broadcast::Sender<Message>,
    listeners: ResultListeners,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000);
        Self {
            tx,
            listeners: ResultListeners::default(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    pub fn listeners(&self) -> &ResultListeners {
        &self.listeners
    }

    pub fn publish(&self, msg: Message) {
        // No subscribers is normal: the UI may be closed.
        let _ = self.tx.send(msg);
    }

    /// Maps a persisted task event onto the wire.
    pub fn forward(&self, event: TaskEvent) {
        match event {
            TaskEvent::Progress { id, kind, progress } => self.publish(Message::Progress {
                extraction_id: id,
                kind,
                progress,
            }),
            TaskEvent::Finished { task } => {
                let notified = self.listeners.fire(&task);
                tracing::debug!(task_id = %task.id, notified, "result forwarded");
                self.publish(Message::Result {
                    extraction_id: task.id.clone(),
                    task,
                });
            }
            TaskEvent::Created { .. } | TaskEvent::StatusChanged { .. } => {}
        }
    }
}
