//! Filter wrapper owning ports and connections

use std::sync::{Mutex, PoisonError};

use uuid::Uuid;

use crate::core::error::Error;
use crate::core::types::Result;
use super::filter::{Filter, FutureMap, PromiseMap};
use super::future::{Future, Promise};
use super::pipeline::Executable;
use super::port::PortInfo;

/// A [`Filter`] placed in a pipeline
///
/// Owns one promise per output port and records which futures feed each
/// input port. Besides the filter's own ports every pipe filter has a
/// notify port, named after its uuid, used by [`connect_after`](Self::connect_after)
/// for ordering edges that carry no data.
pub struct PipeFilter {
    name: String,
    id: Uuid,
    filter: Box<dyn Filter>,
    inputs: Vec<PortInfo>,
    outputs: Vec<Promise>,
    connections: Mutex<Vec<(String, Future)>>,
}

impl PipeFilter {
    /// Wrap `filter`, creating its output promises and the notify port
    ///
    /// # Arguments
    /// * `name` - Name used by [`Pipeline::executable`](super::Pipeline::executable) and in logs
    /// * `filter` - Computation to run
    pub fn new(name: impl Into<String>, filter: impl Filter + 'static) -> Self {
        let id = Uuid::new_v4();
        let notify = PortInfo::notify(id.to_string());

        let mut inputs = filter.inputs();
        inputs.push(notify.clone());
        let mut outputs: Vec<Promise> = filter.outputs().into_iter().map(Promise::new).collect();
        outputs.push(Promise::new(notify));

        Self {
            name: name.into(),
            id,
            filter: Box::new(filter),
            inputs,
            outputs,
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Unique id; also the notify port's name
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Declare an extra input port beyond the filter's own
    ///
    /// Ports are added before the filter is shared with a pipeline; the
    /// filter reads them from its [`FutureMap`] by name.
    ///
    /// # Errors
    /// [`Error::Pipeline`] if an input with the same name exists.
    pub fn add_input_port(&mut self, info: PortInfo) -> Result<()> {
        if self.has_input_port(&info.name) {
            return Err(Error::Pipeline(format!("'{}' already has input port '{}'", self.name, info.name)));
        }
        self.inputs.push(info);
        Ok(())
    }

    /// Declare an extra output port beyond the filter's own
    ///
    /// # Errors
    /// [`Error::Pipeline`] if an output with the same name exists.
    pub fn add_output_port(&mut self, info: PortInfo) -> Result<()> {
        if self.has_output_port(&info.name) {
            return Err(Error::Pipeline(format!("'{}' already has output port '{}'", self.name, info.name)));
        }
        self.outputs.push(Promise::new(info));
        Ok(())
    }

    /// Name of the notify port
    pub fn notify_port(&self) -> String {
        self.id.to_string()
    }

    /// Whether `port` is a declared input
    pub fn has_input_port(&self, port: &str) -> bool {
        self.input_info(port).is_some()
    }

    /// Whether `port` is a declared output
    pub fn has_output_port(&self, port: &str) -> bool {
        self.outputs.iter().any(|promise| promise.name() == port)
    }

    /// Promise of output `port`; also used to feed values from outside
    pub fn promise(&self, port: &str) -> Result<&Promise> {
        self.outputs
            .iter()
            .find(|promise| promise.name() == port)
            .ok_or_else(|| Error::Pipeline(format!("'{}' has no output port '{port}'", self.name)))
    }

    /// Connect output `src_port` of this filter to input `dst_port` of `dst`
    ///
    /// An input may receive several connections.
    ///
    /// # Errors
    /// [`Error::Pipeline`] for unknown ports, [`Error::TypeMismatch`] when
    /// the port types differ.
    pub fn connect(&self, src_port: &str, dst: &PipeFilter, dst_port: &str) -> Result<()> {
        let future = self.promise(src_port)?.future();
        dst.connect_future(dst_port, future)
    }

    /// Make `dst` wait for this filter to finish
    pub fn connect_after(&self, dst: &PipeFilter) -> Result<()> {
        self.connect(&self.notify_port(), dst, &dst.notify_port())
    }

    /// Feed input `port` from a future produced outside the pipeline
    pub fn connect_future(&self, port: &str, future: Future) -> Result<()> {
        let info = self
            .input_info(port)
            .ok_or_else(|| Error::Pipeline(format!("'{}' has no input port '{port}'", self.name)))?;

        if !info.accepts(future.info()) {
            return Err(Error::TypeMismatch {
                expected: info.type_name,
                found: future.info().type_name,
            });
        }

        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((port.to_string(), future));
        Ok(())
    }

    /// Whether every connected input is set or flushed
    pub fn is_input_ready(&self) -> bool {
        self.preconditions().iter().all(Future::is_ready)
    }

    fn input_info(&self, port: &str) -> Option<&PortInfo> {
        self.inputs.iter().find(|info| info.name == port)
    }
}

impl Executable for PipeFilter {
    fn name(&self) -> &str {
        &self.name
    }

    /// Wait for all inputs, run the filter, then flush unset outputs
    fn execute(&self) -> Result<()> {
        let inputs = self.connections.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for (_, future) in &inputs {
            future.wait();
        }

        let output = PromiseMap::new(&self.outputs);
        let result = self.filter.execute(&FutureMap::new(inputs), &output);
        output.flush();

        if let Err(e) = &result {
            log::warn!("Filter '{}' failed: {}", self.name, e);
        }
        result
    }

    fn preconditions(&self) -> Vec<Future> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, future)| future.clone())
            .collect()
    }

    fn postconditions(&self) -> Vec<Future> {
        self.outputs.iter().map(Promise::future).collect()
    }

    /// Fresh unset outputs; connections are kept
    fn reset(&self) {
        for promise in &self.outputs {
            promise.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::filter::FunctionFilter;
    use crate::pipeline::port::port;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    fn constant(value: u32) -> FunctionFilter {
        FunctionFilter::new(vec![], vec![port::<u32>("value")], move |_, output| output.set("value", value))
    }

    #[test]
    fn test_added_ports() {
        let source = PipeFilter::new("source", constant(20));
        let mut doubler = PipeFilter::new(
            "doubler",
            FunctionFilter::new(vec![], vec![], |input, output| {
                let value = input.get::<u32>("in")?;
                output.set("out", *value * 2)
            }),
        );
        doubler.add_input_port(port::<u32>("in")).unwrap();
        doubler.add_output_port(port::<u32>("out")).unwrap();
        assert!(matches!(doubler.add_input_port(port::<u32>("in")), Err(Error::Pipeline(_))));
        assert!(matches!(doubler.add_output_port(port::<u8>("out")), Err(Error::Pipeline(_))));

        source.connect("value", &doubler, "in").unwrap();
        assert!(matches!(
            source.connect("value", &doubler, "missing"),
            Err(Error::Pipeline(_))
        ));

        source.execute().unwrap();
        doubler.execute().unwrap();
        assert_eq!(*doubler.promise("out").unwrap().future().get::<u32>().unwrap(), 40);
    }

    fn adder(ran: Arc<AtomicBool>) -> FunctionFilter {
        FunctionFilter::new(
            vec![port::<u32>("a"), port::<u32>("b")],
            vec![port::<u32>("sum")],
            move |input, output| {
                ran.store(true, Ordering::SeqCst);
                let sum = *input.get::<u32>("a")? + *input.get::<u32>("b")?;
                output.set("sum", sum)
            },
        )
    }

    #[test]
    fn test_connect_and_execute() {
        let a = PipeFilter::new("a", constant(2));
        let b = PipeFilter::new("b", constant(3));
        let sum = PipeFilter::new("sum", adder(Arc::new(AtomicBool::new(false))));

        a.connect("value", &sum, "a").unwrap();
        b.connect("value", &sum, "b").unwrap();

        a.execute().unwrap();
        b.execute().unwrap();
        sum.execute().unwrap();

        assert_eq!(*sum.promise("sum").unwrap().future().get::<u32>().unwrap(), 5);
    }

    #[test]
    fn test_runs_only_after_all_inputs() {
        let ran = Arc::new(AtomicBool::new(false));
        let sum = Arc::new(PipeFilter::new("sum", adder(ran.clone())));

        let a = Promise::new(port::<u32>("a"));
        let b = Promise::new(port::<u32>("b"));
        sum.connect_future("a", a.future()).unwrap();
        sum.connect_future("b", b.future()).unwrap();

        let runner = {
            let sum = sum.clone();
            thread::spawn(move || sum.execute())
        };

        a.set(1u32).unwrap();
        thread::sleep(Duration::from_millis(30));
        assert!(!ran.load(Ordering::SeqCst));
        assert!(!sum.is_input_ready());

        b.set(2u32).unwrap();
        runner.join().unwrap().unwrap();
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(*sum.promise("sum").unwrap().future().get::<u32>().unwrap(), 3);
    }

    #[test]
    fn test_connection_errors() {
        let a = PipeFilter::new("a", constant(1));
        let sink = PipeFilter::new(
            "sink",
            FunctionFilter::new(vec![port::<f32>("x")], vec![], |_, _| Ok(())),
        );

        assert!(matches!(a.connect("nope", &sink, "x"), Err(Error::Pipeline(_))));
        assert!(matches!(a.connect("value", &sink, "nope"), Err(Error::Pipeline(_))));
        assert!(matches!(a.connect("value", &sink, "x"), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_failure_flushes_outputs() {
        let failing = PipeFilter::new(
            "failing",
            FunctionFilter::new(vec![], vec![port::<u32>("value")], |_, _| {
                Err(Error::LoadFailure("disk".into()))
            }),
        );

        assert!(failing.execute().is_err());
        let future = failing.promise("value").unwrap().future();
        assert!(matches!(future.get::<u32>(), Err(Error::EmptyData(_))));
    }

    #[test]
    fn test_connect_after() {
        let first = PipeFilter::new("first", constant(1));
        let second = PipeFilter::new("second", constant(2));
        first.connect_after(&second).unwrap();

        assert!(!second.is_input_ready());
        first.execute().unwrap();
        assert!(second.is_input_ready());
        assert_eq!(second.preconditions().len(), 1);
        assert_eq!(first.postconditions().len(), 2);
    }

    #[test]
    fn test_reset() {
        let a = PipeFilter::new("a", constant(4));
        a.execute().unwrap();
        assert!(a.postconditions().iter().all(Future::is_ready));

        a.reset();
        assert!(a.postconditions().iter().all(|f| !f.is_ready()));
        a.execute().unwrap();
        assert_eq!(*a.promise("value").unwrap().future().get::<u32>().unwrap(), 4);
    }
}
