//! Background coordinator.
//!
//! Accepts `start`/`cancel` requests, owns one cancellation token per active
//! task kind, runs the kind's flow on the runtime and writes the outcome to
//! the task. Persisted task events are pumped onto the [`MessageBus`].

pub mod flows;
mod observer;
pub mod target;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use self::flows::{FlowContext, FlowEnd, FlowSettings};
use self::observer::TaskObserver;
use crate::config::AppConfig;
use crate::error::{ErrorKind, TaskError};
use crate::protocol::{Message, MessageBus, Reply, ResultListeners};
use crate::state::{ExtractionTask, TaskFailure, TaskKind, TaskManager};
use crate::tab::{BrowserHost, TabController};

type Running = HashMap<TaskKind, (String, CancellationToken)>;

#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    manager: TaskManager,
    tabs: TabController,
    bus: MessageBus,
    settings: FlowSettings,
    running: Mutex<Running>,
    shutdown: CancellationToken,
}

impl Coordinator {
    /// Must be called from within a tokio runtime: the event pump is spawned here.
    pub fn new(manager: TaskManager, host: Arc<dyn BrowserHost>, cfg: &AppConfig) -> Self {
        let inner = Arc::new(CoordinatorInner {
            manager,
            tabs: TabController::new(host),
            bus: MessageBus::new(),
            settings: FlowSettings {
                retry: cfg.retry.clone(),
                tabs: cfg.tabs.clone(),
                sites: cfg.sites.clone(),
            },
            running: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        });
        spawn_pump(&inner);
        Self { inner }
    }

    pub fn manager(&self) -> &TaskManager {
        &self.inner.manager
    }

    pub fn bus(&self) -> &MessageBus {
        &self.inner.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.inner.bus.subscribe()
    }

    fn running(&self) -> MutexGuard<'_, Running> {
        self.inner
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates the task and returns as soon as it is persisted. The flow runs
    /// in the background; its outcome arrives as a `result` message.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self, kind: TaskKind, target: &str) -> Result<ExtractionTask, TaskError> {
        let task = self.inner.manager.begin(kind, target).await?;
        let cancel = self.inner.shutdown.child_token();
        self.running()
            .insert(kind, (task.id.clone(), cancel.clone()));

        let this = self.clone();
        let spawned = task.clone();
        let flow = tokio::spawn(async move {
            this.run(spawned, cancel).await;
        });

        let this = self.clone();
        let watched = task.clone();
        tokio::spawn(async move {
            if let Err(e) = flow.await {
                this.abandon(&watched, e).await;
            }
        });
        Ok(task)
    }

    /// Requests cancellation of the active task of `kind`. Idempotent.
    ///
    /// A task left active by a previous process has no running flow; it is
    /// cancelled directly in the store.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, kind: TaskKind) -> Result<Option<String>, TaskError> {
        let entry = self.running().get(&kind).cloned();
        if let Some((id, token)) = entry {
            tracing::info!(task_id = %id, "cancellation requested");
            token.cancel();
            return Ok(Some(id));
        }

        let Some(orphan) = self.inner.manager.active_of_kind(kind).await? else {
            tracing::debug!("nothing to cancel");
            return Ok(None);
        };
        match self.inner.manager.cancel(&orphan.id).await {
            Ok(_) | Err(TaskError::Terminal { .. }) => {}
            Err(e) => return Err(e),
        }
        tracing::info!(task_id = %orphan.id, "cancelled task without a running flow");
        Ok(Some(orphan.id))
    }

    /// Answers one inbound message.
    pub async fn handle(&self, msg: Message) -> Reply {
        match msg {
            Message::Start { kind, target } => match self.start(kind, &target).await {
                Ok(task) => Reply::Ack {
                    extraction_id: task.id,
                },
                Err(TaskError::Busy { kind, active_id }) => Reply::Busy { kind, active_id },
                Err(e) => Reply::Rejected {
                    reason: e.to_string(),
                },
            },
            Message::Cancel { kind } => match self.cancel(kind).await {
                Ok(extraction_id) => Reply::Cancelling {
                    kind,
                    extraction_id,
                },
                Err(e) => Reply::Rejected {
                    reason: e.to_string(),
                },
            },
            Message::Ping => Reply::Pong,
            Message::Progress { .. } | Message::Result { .. } => Reply::Rejected {
                reason: "progress and result messages are outbound only".to_string(),
            },
        }
    }

    /// Resolves with the task once it is terminal.
    ///
    /// Safe to call at any time: a task that finished before the listener was
    /// registered is read back from the store.
    pub async fn await_result(&self, id: &str) -> Result<ExtractionTask, TaskError> {
        let listeners = self.inner.bus.listeners();
        // Declared before `rx` so it runs after `rx` is dropped.
        let _prune = PruneOnDrop { listeners, id };
        let rx = listeners.register(id);

        let current = self.inner.manager.get(id).await?;
        if current.status.is_terminal() {
            listeners.fire(&current);
            return Ok(current);
        }

        match rx.await {
            Ok(task) => Ok(task),
            Err(_) => self.inner.manager.get(id).await,
        }
    }

    /// Cancels every running flow.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    async fn run(&self, task: ExtractionTask, cancel: CancellationToken) {
        let observer = TaskObserver::new(self.inner.manager.clone(), &task.id, cancel.clone());
        let cx = FlowContext {
            tabs: &self.inner.tabs,
            settings: &self.inner.settings,
            task: &task,
            cancel: &cancel,
            observer: &observer,
        };

        let end = match task.kind {
            TaskKind::Assignments => flows::assignments(&cx).await,
            TaskKind::Recordings => flows::recordings(&cx).await,
            TaskKind::Transcript => flows::transcript(&cx).await,
        };
        self.finish(&task, &observer, end).await;
        self.release(&task);
    }

    /// Drops the cancel token unless a newer task of the same kind already replaced it.
    fn release(&self, task: &ExtractionTask) {
        let mut running = self.running();
        if running.get(&task.kind).map(|(id, _)| id == &task.id).unwrap_or(false) {
            running.remove(&task.kind);
        }
    }

    async fn finish(&self, task: &ExtractionTask, observer: &TaskObserver, end: FlowEnd) {
        let manager = &self.inner.manager;
        let res = match end {
            FlowEnd::Completed { payload, partial } => {
                observer.advance_to_extracting().await;
                manager.complete(&task.id, payload, partial).await
            }
            FlowEnd::Failed(f) => match f.kind {
                ErrorKind::Cancelled => manager.cancel(&task.id).await,
                ErrorKind::Timeout => manager.time_out(&task.id, f.into_task_failure()).await,
                kind => {
                    tracing::error!(task_id = %task.id, kind = %kind, error = %f.message, "task failed");
                    manager.fail(&task.id, f.into_task_failure()).await
                }
            },
        };

        self.settled(task, res);
    }

    /// The flow panicked or was aborted before it could record an outcome.
    async fn abandon(&self, task: &ExtractionTask, err: tokio::task::JoinError) {
        tracing::error!(task_id = %task.id, kind = %task.kind, error = %err, "extraction flow aborted");
        let res = if err.is_panic() {
            let mut failure =
                TaskFailure::new(ErrorKind::ContentNotFound, "The page could not be read");
            failure.recoverable = false;
            self.inner.manager.fail(&task.id, failure).await
        } else {
            self.inner.manager.cancel(&task.id).await
        };
        self.settled(task, res);
        self.release(task);
    }

    fn settled(&self, task: &ExtractionTask, res: Result<ExtractionTask, TaskError>) {
        match res {
            Ok(done) => {
                tracing::info!(task_id = %done.id, status = ?done.status, attempt = done.attempt, "task finished");
                // The pump fires these too; whichever runs second finds nothing to deliver.
                self.inner.bus.listeners().fire(&done);
            }
            Err(TaskError::Terminal { status, .. }) => {
                tracing::debug!(task_id = %task.id, status = ?status, "task already finalized")
            }
            Err(e) => tracing::error!(task_id = %task.id, error = %e, "failed to record task outcome"),
        }
    }
}

struct PruneOnDrop<'a> {
    listeners: &'a ResultListeners,
    id: &'a str,
}

impl Drop for PruneOnDrop<'_> {
    fn drop(&mut self) {
        self.listeners.prune(self.id);
    }
}

/// Runs until the manager's sender is gone.
fn spawn_pump(inner: &Arc<CoordinatorInner>) {
    let mut events = inner.manager.subscribe();
    let bus = inner.bus.clone();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => bus.forward(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event pump lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("event pump stopped");
    });
}
