//! Precondition-aware scheduler over a worker pool

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};

use crate::core::error::Error;
use crate::core::types::Result;
use super::future::{Future, Notifier};
use super::pipeline::Executable;
use super::workers::Workers;

/// Runs submitted executables on a [`Workers`] pool once their inputs are ready
///
/// A dedicated scheduler thread holds the pending executables, sleeps on a
/// [`Notifier`] subscribed to their preconditions and dispatches whatever
/// became ready. On shutdown, work already dispatched finishes; pending
/// work whose inputs never arrived is reset so nobody waits on it.
pub struct Executor {
    name: String,
    sender: Option<Sender<Arc<dyn Executable>>>,
    wake: Notifier,
    scheduler: Option<JoinHandle<()>>,
}

impl Executor {
    /// Start a scheduler with `threads` workers
    ///
    /// # Arguments
    /// * `name` - Label for logs and worker thread names
    /// * `threads` - Worker count, at least one is spawned
    ///
    /// # Errors
    /// [`Error::Io`] if a thread cannot be spawned.
    pub fn new(name: impl Into<String>, threads: usize) -> Result<Self> {
        let name = name.into();
        let workers = Workers::new(&name, threads)?;
        let (sender, receiver) = unbounded();
        let wake = Notifier::new();

        let scheduler = {
            let wake = wake.clone();
            let label = name.clone();
            thread::Builder::new()
                .name(format!("{name}-scheduler"))
                .spawn(move || schedule_loop(&label, receiver, wake, workers))?
        };

        log::debug!("Executor '{}' started with {} threads", name, threads.max(1));
        Ok(Self {
            name,
            sender: Some(sender),
            wake,
            scheduler: Some(scheduler),
        })
    }

    /// Name given at construction, also the prefix of its thread names
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `executable`; returns its postconditions
    ///
    /// # Errors
    /// [`Error::Pipeline`] after [`shutdown`](Self::shutdown).
    pub fn submit(&self, executable: Arc<dyn Executable>) -> Result<Vec<Future>> {
        let postconditions = executable.postconditions();
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| Error::Pipeline(format!("executor '{}' is shut down", self.name)))?;

        sender
            .send(executable)
            .map_err(|_| Error::Pipeline(format!("executor '{}' scheduler stopped", self.name)))?;
        self.wake.notify();
        Ok(postconditions)
    }

    /// Stop accepting work and join the scheduler and workers
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        self.wake.notify();
        if let Some(scheduler) = self.scheduler.take() {
            if scheduler.join().is_err() {
                log::error!("Executor '{}' scheduler panicked", self.name);
            }
        }
        log::debug!("Executor '{}' stopped", self.name);
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn is_ready(executable: &Arc<dyn Executable>) -> bool {
    executable.preconditions().iter().all(Future::is_ready)
}

fn schedule_loop(name: &str, receiver: Receiver<Arc<dyn Executable>>, wake: Notifier, workers: Workers) {
    let mut pending: Vec<Arc<dyn Executable>> = Vec::new();
    let mut open = true;

    loop {
        let generation = wake.generation();

        loop {
            match receiver.try_recv() {
                Ok(executable) => pending.push(executable),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    open = false;
                    break;
                }
            }
        }

        let (ready, waiting): (Vec<_>, Vec<_>) = pending.drain(..).partition(is_ready);
        pending = waiting;
        for executable in ready {
            workers.execute(move || {
                if let Err(e) = executable.execute() {
                    log::warn!("'{}' failed: {}", executable.name(), e);
                }
            });
        }

        if !open {
            for executable in pending.drain(..) {
                log::debug!("Executor '{}' dropping '{}' with unmet inputs", name, executable.name());
                executable.reset();
            }
            break;
        }

        if pending.is_empty() {
            match receiver.recv() {
                Ok(executable) => pending.push(executable),
                Err(_) => break,
            }
            continue;
        }

        for executable in &pending {
            for future in executable.preconditions() {
                future.subscribe(&wake);
            }
        }
        wake.wait_past(generation);
    }
    // Dropping the pool drains queued jobs and joins the workers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::filter::FunctionFilter;
    use crate::pipeline::future::{Promise, wait_all};
    use crate::pipeline::pipe_filter::PipeFilter;
    use crate::pipeline::pipeline::Pipeline;
    use crate::pipeline::port::port;
    use std::time::Duration;

    fn incrementer() -> FunctionFilter {
        FunctionFilter::new(vec![port::<u32>("in")], vec![port::<u32>("out")], |input, output| {
            output.set("out", *input.get::<u32>("in")? + 1)
        })
    }

    #[test]
    fn test_runs_submitted_filter() {
        let executor = Executor::new("test", 2).unwrap();
        let filter = Arc::new(PipeFilter::new(
            "constant",
            FunctionFilter::new(vec![], vec![port::<u32>("value")], |_, output| output.set("value", 9u32)),
        ));

        let post = executor.submit(filter.clone()).unwrap();
        wait_all(&post);
        assert_eq!(*filter.promise("value").unwrap().future().get::<u32>().unwrap(), 9);
    }

    #[test]
    fn test_waits_for_preconditions() {
        let executor = Executor::new("test", 2).unwrap();
        let mut pipeline = Pipeline::new("chain");
        let first = pipeline.add_filter("first", incrementer(), false);
        let second = pipeline.add_filter("second", incrementer(), true);
        first.connect("out", &second, "in").unwrap();

        let input = Promise::new(port::<u32>("in"));
        first.connect_future("in", input.future()).unwrap();

        let post = pipeline.schedule(&executor).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(!post.iter().any(Future::is_ready));

        input.set(1u32).unwrap();
        pipeline.wait_all();
        assert_eq!(*second.promise("out").unwrap().future().get::<u32>().unwrap(), 3);
    }

    #[test]
    fn test_shutdown_resets_pending() {
        let mut executor = Executor::new("test", 1).unwrap();
        let filter = Arc::new(PipeFilter::new("blocked", incrementer()));
        let input = Promise::new(port::<u32>("in"));
        filter.connect_future("in", input.future()).unwrap();

        executor.submit(filter.clone()).unwrap();
        executor.shutdown();

        // Never ran; reset left fresh unset outputs behind
        assert!(executor.submit(filter.clone()).is_err());
        assert!(!filter.promise("out").unwrap().future().is_ready());
        drop(input);
    }

    #[test]
    fn test_many_submissions() {
        let executor = Executor::new("test", 4).unwrap();
        let filters: Vec<Arc<PipeFilter>> = (0..32)
            .map(|i| {
                Arc::new(PipeFilter::new(
                    format!("f{i}"),
                    FunctionFilter::new(vec![], vec![port::<u32>("value")], move |_, output| output.set("value", i as u32)),
                ))
            })
            .collect();

        let mut post = Vec::new();
        for filter in &filters {
            post.extend(executor.submit(filter.clone()).unwrap());
        }
        wait_all(&post);

        for (i, filter) in filters.iter().enumerate() {
            assert_eq!(*filter.promise("value").unwrap().future().get::<u32>().unwrap(), i as u32);
        }
    }
}
