//! Named graphs of executables

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::types::Result;
use super::executor::Executor;
use super::filter::Filter;
use super::future::{Future, wait_all, wait_any};
use super::pipe_filter::PipeFilter;

/// Anything an [`Executor`] can run
pub trait Executable: Send + Sync {
    fn name(&self) -> &str;

    /// Run to completion on the calling thread
    fn execute(&self) -> Result<()>;

    /// Futures that must be ready before [`execute`](Self::execute) can proceed
    fn preconditions(&self) -> Vec<Future>;

    /// Futures set or flushed once [`execute`](Self::execute) returns
    fn postconditions(&self) -> Vec<Future>;

    /// Prepare for another run
    fn reset(&self);
}

struct Stage {
    executable: Arc<dyn Executable>,
    wait: bool,
}

/// Dataflow graph of filters and nested pipelines
///
/// Edges are the connections between the members' ports; the pipeline
/// itself only keeps the members. Members added with `wait` contribute
/// their outputs to the pipeline's postconditions.
pub struct Pipeline {
    name: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Empty pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Add a member
    ///
    /// # Arguments
    /// * `executable` - Filter or nested pipeline
    /// * `wait` - Whether its outputs count as the pipeline's postconditions
    pub fn add(&mut self, executable: Arc<dyn Executable>, wait: bool) {
        self.stages.push(Stage { executable, wait });
    }

    /// Wrap `filter` in a [`PipeFilter`] and add it
    pub fn add_filter(&mut self, name: impl Into<String>, filter: impl Filter + 'static, wait: bool) -> Arc<PipeFilter> {
        let pipe_filter = Arc::new(PipeFilter::new(name, filter));
        self.add(pipe_filter.clone(), wait);
        pipe_filter
    }

    /// Member named `name`
    pub fn executable(&self, name: &str) -> Option<Arc<dyn Executable>> {
        self.stages
            .iter()
            .find(|stage| stage.executable.name() == name)
            .map(|stage| stage.executable.clone())
    }

    /// Members in insertion order
    pub fn executables(&self) -> Vec<Arc<dyn Executable>> {
        self.stages.iter().map(|stage| stage.executable.clone()).collect()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Submit every member to `executor`; returns the pipeline's postconditions
    pub fn schedule(&self, executor: &Executor) -> Result<Vec<Future>> {
        for stage in &self.stages {
            executor.submit(stage.executable.clone())?;
        }
        Ok(self.postconditions())
    }

    /// Block until every waited-on output is ready
    pub fn wait_all(&self) {
        wait_all(&self.postconditions());
    }

    /// Block until any waited-on output is ready; false if there are none
    pub fn wait_any(&self) -> bool {
        wait_any(&self.postconditions())
    }
}

impl Executable for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }

    /// Run members on the calling thread, each once its inputs are ready
    ///
    /// Members whose inputs come from outside the pipeline block until
    /// those are set. A failing member does not stop the others; its
    /// flushed outputs surface as empty data downstream. The first error
    /// is returned.
    fn execute(&self) -> Result<()> {
        let mut pending: Vec<&Arc<dyn Executable>> = self.stages.iter().map(|stage| &stage.executable).collect();
        let mut first_error = None;

        while !pending.is_empty() {
            let ready = pending
                .iter()
                .position(|executable| executable.preconditions().iter().all(Future::is_ready));

            match ready {
                Some(index) => {
                    let executable = pending.remove(index);
                    if let Err(e) = executable.execute() {
                        first_error.get_or_insert(e);
                    }
                }
                None => {
                    let waiting: Vec<Future> = pending
                        .iter()
                        .flat_map(|executable| executable.preconditions())
                        .filter(|future| !future.is_ready())
                        .collect();
                    log::trace!("Pipeline '{}' waiting on {} inputs", self.name, waiting.len());
                    wait_any(&waiting);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Inputs of members that no member produces
    fn preconditions(&self) -> Vec<Future> {
        let produced: HashSet<_> = self
            .stages
            .iter()
            .flat_map(|stage| stage.executable.postconditions())
            .map(|future| future.id())
            .collect();

        let mut seen = HashSet::new();
        self.stages
            .iter()
            .flat_map(|stage| stage.executable.preconditions())
            .filter(|future| !produced.contains(&future.id()) && seen.insert(future.id()))
            .collect()
    }

    fn postconditions(&self) -> Vec<Future> {
        self.stages
            .iter()
            .filter(|stage| stage.wait)
            .flat_map(|stage| stage.executable.postconditions())
            .collect()
    }

    fn reset(&self) {
        for stage in &self.stages {
            stage.executable.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::filter::FunctionFilter;
    use crate::pipeline::future::Promise;
    use crate::pipeline::port::port;
    use std::sync::Mutex;

    fn doubler() -> FunctionFilter {
        FunctionFilter::new(vec![port::<u32>("in")], vec![port::<u32>("out")], |input, output| {
            output.set("out", *input.get::<u32>("in")? * 2)
        })
    }

    #[test]
    fn test_execute_in_dependency_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new("chain");

        let record = |name: &'static str, order: Arc<Mutex<Vec<&'static str>>>| {
            FunctionFilter::new(vec![port::<u32>("in")], vec![port::<u32>("out")], move |input, output| {
                order.lock().unwrap().push(name);
                output.set("out", *input.get::<u32>("in")? + 1)
            })
        };

        // Added in reverse so ordering must come from the connections
        let last = pipeline.add_filter("last", record("last", order.clone()), true);
        let first = pipeline.add_filter("first", record("first", order.clone()), false);
        first.connect("out", &last, "in").unwrap();

        let input = Promise::new(port::<u32>("in"));
        first.connect_future("in", input.future()).unwrap();
        input.set(1u32).unwrap();

        pipeline.execute().unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "last"]);
        assert_eq!(*last.promise("out").unwrap().future().get::<u32>().unwrap(), 3);
    }

    #[test]
    fn test_conditions() {
        let mut pipeline = Pipeline::new("p");
        let a = pipeline.add_filter("a", doubler(), false);
        let b = pipeline.add_filter("b", doubler(), true);
        a.connect("out", &b, "in").unwrap();

        let input = Promise::new(port::<u32>("in"));
        a.connect_future("in", input.future()).unwrap();

        // Only the external input remains a precondition
        let pre = pipeline.preconditions();
        assert_eq!(pre.len(), 1);
        assert_eq!(pre[0].id(), input.id());

        // Only wait-marked members report postconditions (output + notify)
        assert_eq!(pipeline.postconditions().len(), 2);
        assert!(pipeline.executable("a").is_some());
        assert!(pipeline.executable("c").is_none());

        input.set(5u32).unwrap();
        pipeline.execute().unwrap();
        pipeline.wait_all();
        assert!(pipeline.wait_any());
        assert_eq!(*b.promise("out").unwrap().future().get::<u32>().unwrap(), 20);
    }

    #[test]
    fn test_nested_pipeline() {
        let mut inner = Pipeline::new("inner");
        let a = inner.add_filter("a", doubler(), true);

        let mut outer = Pipeline::new("outer");
        let inner = Arc::new(inner);
        outer.add(inner.clone(), true);
        let b = outer.add_filter("b", doubler(), true);
        a.connect("out", &b, "in").unwrap();

        let input = Promise::new(port::<u32>("in"));
        a.connect_future("in", input.future()).unwrap();
        input.set(1u32).unwrap();

        outer.execute().unwrap();
        assert_eq!(*b.promise("out").unwrap().future().get::<u32>().unwrap(), 4);
        assert_eq!(outer.postconditions().len(), 4);

        outer.reset();
        assert!(outer.postconditions().iter().all(|f| !f.is_ready()));
    }

    #[test]
    fn test_error_propagates_as_empty_data() {
        let mut pipeline = Pipeline::new("p");
        let a = pipeline.add_filter("a", doubler(), false);
        let b = pipeline.add_filter("b", doubler(), true);
        a.connect("out", &b, "in").unwrap();

        let input = Promise::new(port::<u32>("in"));
        a.connect_future("in", input.future()).unwrap();
        input.flush();

        assert!(pipeline.execute().is_err());
        assert!(b.promise("out").unwrap().future().get::<u32>().is_err());
    }
}
