//! Background brick prefetching

use std::collections::HashSet;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::cache::DataCache;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::volume::NodeId;

/// Outcome of one prefetch
#[derive(Debug)]
pub enum PrefetchResult {
    /// Brick resident in the data cache, with its payload size
    Loaded(NodeId, usize),
    /// Loading failed; the brick stays unloaded
    Failed(NodeId, String),
}

impl PrefetchResult {
    pub fn id(&self) -> NodeId {
        match self {
            PrefetchResult::Loaded(id, _) | PrefetchResult::Failed(id, _) => *id,
        }
    }
}

/// Loads bricks into a [`DataCache`] ahead of need
///
/// Requests are served coarse levels first with at most `max_concurrent`
/// loads in flight. Loads run on the blocking pool of a dedicated tokio
/// runtime; results are collected with [`poll_results`](Self::poll_results).
pub struct BrickPrefetcher {
    request_tx: mpsc::UnboundedSender<NodeId>,
    result_rx: mpsc::UnboundedReceiver<PrefetchResult>,
    pending: HashSet<NodeId>,
    _runtime: Runtime,
}

impl BrickPrefetcher {
    pub fn new(cache: Arc<DataCache>, max_concurrent: usize) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::unbounded_channel::<NodeId>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<PrefetchResult>();

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("prefetch")
            .enable_all()
            .build()?;

        runtime.spawn(Self::worker_loop(cache, max_concurrent.max(1), request_rx, result_tx));

        Ok(Self {
            request_tx,
            result_rx,
            pending: HashSet::new(),
            _runtime: runtime,
        })
    }

    async fn worker_loop(
        cache: Arc<DataCache>,
        max_concurrent: usize,
        mut request_rx: mpsc::UnboundedReceiver<NodeId>,
        result_tx: mpsc::UnboundedSender<PrefetchResult>,
    ) {
        let mut active = JoinSet::new();
        let mut queued: Vec<NodeId> = Vec::new();
        let mut open = true;

        loop {
            tokio::select! {
                request = request_rx.recv(), if open => match request {
                    Some(id) => queued.push(id),
                    None => open = false,
                },

                Some(joined) = active.join_next(), if !active.is_empty() => match joined {
                    Ok(result) => {
                        let _ = result_tx.send(result);
                    }
                    Err(e) => log::error!("Prefetch task panicked: {}", e),
                },

                else => break,
            }

            // Coarsest last in the vector so pop() serves it first
            queued.sort_by(|a, b| b.level().cmp(&a.level()));
            while active.len() < max_concurrent {
                let Some(id) = queued.pop() else { break };
                let cache = cache.clone();
                active.spawn_blocking(move || match cache.load(id) {
                    Ok(handle) => PrefetchResult::Loaded(id, handle.size()),
                    Err(e) => PrefetchResult::Failed(id, e.to_string()),
                });
            }

            if !open && queued.is_empty() && active.is_empty() {
                break;
            }
        }
    }

    /// Queue `id`; false if it is already pending
    ///
    /// # Errors
    /// [`Error::Pipeline`] if the worker has stopped.
    pub fn request(&mut self, id: NodeId) -> Result<bool> {
        if self.pending.contains(&id) {
            return Ok(false);
        }
        self.request_tx
            .send(id)
            .map_err(|_| Error::Pipeline("prefetch worker stopped".to_string()))?;
        self.pending.insert(id);
        Ok(true)
    }

    /// Completed prefetches since the last call (non-blocking)
    pub fn poll_results(&mut self) -> Vec<PrefetchResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            self.pending.remove(&result.id());
            results.push(result);
        }
        results
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: NodeId) -> bool {
        self.pending.contains(&id)
    }
}
