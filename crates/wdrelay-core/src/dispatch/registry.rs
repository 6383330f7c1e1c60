use crate::models::RouteKey;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Unit of work queued on an adapter worker.
pub type AdapterJob = BoxFuture<'static, ()>;

#[derive(Debug, Error, PartialEq)]
pub enum ContextError {
    #[error("Test context does not exist: ScriptId={0}")]
    UnknownScript(String),

    #[error("adapter context does not exist: ScriptId={script_id} AdapterId={adapter_id}")]
    UnknownAdapter {
        script_id: String,
        adapter_id: String,
    },

    #[error("adapter worker stopped: ScriptId={script_id} AdapterId={adapter_id}")]
    WorkerStopped {
        script_id: String,
        adapter_id: String,
    },
}

struct AdapterWorker {
    id: Uuid,
    sender: mpsc::UnboundedSender<AdapterJob>,
    task: JoinHandle<()>,
}

/// Table of automation contexts, `script id -> adapter id -> worker`.
///
/// Every adapter owns one worker task that runs its jobs strictly in
/// enqueue order. Different adapters run concurrently. The table lock is
/// never held across an await.
#[derive(Default)]
pub struct ContextRegistry {
    contexts: Mutex<HashMap<String, HashMap<String, AdapterWorker>>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the worker for an adapter. Returns `false` if it already exists.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register_adapter(&self, script_id: &str, adapter_id: &str) -> bool {
        let mut contexts = self.contexts.lock();
        let adapters = contexts.entry(script_id.to_string()).or_default();
        if adapters.contains_key(adapter_id) {
            debug!(script_id, adapter_id, "Adapter context already registered");
            return false;
        }

        let worker = spawn_worker(script_id, adapter_id);
        info!(script_id, adapter_id, worker_id = %worker.id, "Adapter context registered");
        adapters.insert(adapter_id.to_string(), worker);
        true
    }

    /// Remove an adapter. Jobs already queued still run before its worker exits.
    pub fn unregister_adapter(&self, script_id: &str, adapter_id: &str) -> bool {
        let mut contexts = self.contexts.lock();
        let Some(adapters) = contexts.get_mut(script_id) else {
            return false;
        };
        let removed = adapters.remove(adapter_id);
        if adapters.is_empty() {
            contexts.remove(script_id);
        }
        match removed {
            Some(worker) => {
                info!(script_id, adapter_id, worker_id = %worker.id, "Adapter context unregistered");
                true
            }
            None => false,
        }
    }

    /// Remove a script and all of its adapters. Returns how many adapters went away.
    pub fn remove_script(&self, script_id: &str) -> usize {
        let removed = self.contexts.lock().remove(script_id);
        let count = removed.map(|adapters| adapters.len()).unwrap_or(0);
        if count > 0 {
            info!(script_id, adapters = count, "Test context removed");
        }
        count
    }

    pub fn adapter_count(&self) -> usize {
        self.contexts.lock().values().map(HashMap::len).sum()
    }

    pub fn contains(&self, route: &RouteKey) -> bool {
        self.contexts
            .lock()
            .get(&route.script_id)
            .is_some_and(|adapters| adapters.contains_key(&route.adapter_id))
    }

    /// Resolve the route and queue `job` on its worker.
    pub fn enqueue(&self, route: &RouteKey, job: AdapterJob) -> Result<(), ContextError> {
        let contexts = self.contexts.lock();
        let adapters = contexts
            .get(&route.script_id)
            .ok_or_else(|| ContextError::UnknownScript(route.script_id.clone()))?;
        let worker = adapters
            .get(&route.adapter_id)
            .ok_or_else(|| ContextError::UnknownAdapter {
                script_id: route.script_id.clone(),
                adapter_id: route.adapter_id.clone(),
            })?;

        worker
            .sender
            .send(job)
            .map_err(|_| ContextError::WorkerStopped {
                script_id: route.script_id.clone(),
                adapter_id: route.adapter_id.clone(),
            })
    }

    /// Close every adapter queue and wait for the queued jobs to finish.
    pub async fn drain(&self) {
        let workers: Vec<AdapterWorker> = {
            let mut contexts = self.contexts.lock();
            contexts
                .drain()
                .flat_map(|(_, adapters)| adapters.into_values())
                .collect()
        };

        for worker in workers {
            let AdapterWorker { id, sender, task } = worker;
            drop(sender);
            if let Err(err) = task.await {
                error!(worker_id = %id, error = %err, "Adapter worker ended abnormally");
            }
        }
    }
}

fn spawn_worker(script_id: &str, adapter_id: &str) -> AdapterWorker {
    let id = Uuid::new_v4();
    let (sender, mut receiver) = mpsc::unbounded_channel::<AdapterJob>();
    let script_id = script_id.to_string();
    let adapter_id = adapter_id.to_string();

    let task = tokio::spawn(async move {
        debug!(%script_id, %adapter_id, worker_id = %id, "Adapter worker started");
        while let Some(job) = receiver.recv().await {
            // A panicking job must not take the worker down with it.
            if let Err(err) = tokio::spawn(job).await {
                error!(%script_id, %adapter_id, worker_id = %id, error = %err, "Adapter job failed");
            }
        }
        debug!(%script_id, %adapter_id, worker_id = %id, "Adapter worker stopped");
    });

    AdapterWorker { id, sender, task }
}
