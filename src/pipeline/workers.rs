//! Fixed-size worker thread pool

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, unbounded};

use crate::core::error::Error;
use crate::core::types::Result;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Threads pulling jobs from a shared channel
///
/// Workers exit once the pool is dropped and the queue is drained.
pub struct Workers {
    sender: Option<Sender<Job>>,
    threads: Vec<JoinHandle<()>>,
}

impl Workers {
    /// Spawn `count` threads (at least one) named `<name>-<index>`
    ///
    /// # Arguments
    /// * `name` - Thread name prefix
    /// * `count` - Requested thread count
    pub fn new(name: &str, count: usize) -> Result<Self> {
        let (sender, receiver) = unbounded::<Job>();

        let threads = (0..count.max(1))
            .map(|index| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("{name}-{index}"))
                    .spawn(move || {
                        for job in receiver {
                            job();
                        }
                    })
                    .map_err(Error::from)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            sender: Some(sender),
            threads,
        })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.threads.len()
    }

    /// Queue `job` for the next free worker
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(sender) = &self.sender {
            if sender.send(Box::new(job)).is_err() {
                log::error!("Worker pool has no running threads");
            }
        }
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        // Closing the channel ends every worker's receive loop
        self.sender.take();
        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
    }
}
