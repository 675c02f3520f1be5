//! Filter trait and the input/output maps handed to it

use std::any::Any;
use std::sync::Arc;

use crate::core::error::Error;
use crate::core::types::Result;
use super::future::{Future, Promise};
use super::port::PortInfo;

/// Futures connected to a filter's input ports
pub struct FutureMap {
    futures: Vec<(String, Future)>,
}

impl FutureMap {
    /// `futures` pairs each future with the input port it is connected to
    pub fn new(futures: Vec<(String, Future)>) -> Self {
        Self { futures }
    }

    /// Value of the first future connected to `port`
    pub fn get<T: Any + Send + Sync>(&self, port: &str) -> Result<Arc<T>> {
        self.futures
            .iter()
            .find(|(name, _)| name == port)
            .ok_or_else(|| Error::Pipeline(format!("no future connected to '{port}'")))?
            .1
            .get::<T>()
    }

    /// Values of every future connected to `port`, skipping flushed ones
    pub fn get_all<T: Any + Send + Sync>(&self, port: &str) -> Result<Vec<Arc<T>>> {
        let mut values = Vec::new();
        for (_, future) in self.futures.iter().filter(|(name, _)| name == port) {
            match future.get::<T>() {
                Ok(value) => values.push(value),
                Err(Error::EmptyData(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(values)
    }

    /// Number of futures connected to `port`
    pub fn count(&self, port: &str) -> usize {
        self.futures.iter().filter(|(name, _)| name == port).count()
    }

    /// Every connected future, in connection order
    pub fn futures(&self) -> impl Iterator<Item = &Future> {
        self.futures.iter().map(|(_, future)| future)
    }

    /// Whether every connected future is set or flushed
    pub fn is_ready(&self) -> bool {
        self.futures().all(Future::is_ready)
    }
}

/// Promises of a filter's output ports
pub struct PromiseMap<'a> {
    promises: &'a [Promise],
}

impl<'a> PromiseMap<'a> {
    /// View over a filter's output promises
    pub fn new(promises: &'a [Promise]) -> Self {
        Self { promises }
    }

    /// Promise of output `port`
    ///
    /// # Errors
    /// [`Error::Pipeline`] if the filter has no such output.
    pub fn promise(&self, port: &str) -> Result<&'a Promise> {
        self.promises
            .iter()
            .find(|promise| promise.name() == port)
            .ok_or_else(|| Error::Pipeline(format!("no output port '{port}'")))
    }

    /// Set output `port` to `value`
    ///
    /// # Errors
    /// Unknown port, wrong type, or a port that is already set.
    pub fn set<T: Any + Send + Sync>(&self, port: &str, value: T) -> Result<()> {
        self.promise(port)?.set(value)
    }

    /// Flush every output that has not been set
    pub fn flush(&self) {
        for promise in self.promises {
            promise.flush();
        }
    }
}

/// Unit of work in a pipeline
///
/// Declares its typed input and output ports and computes outputs from
/// inputs. Execution only starts once every connected input is ready;
/// outputs left unset are flushed afterwards.
pub trait Filter: Send + Sync {
    fn inputs(&self) -> Vec<PortInfo> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<PortInfo> {
        Vec::new()
    }

    fn execute(&self, input: &FutureMap, output: &PromiseMap) -> Result<()>;
}

type FilterFn = dyn Fn(&FutureMap, &PromiseMap) -> Result<()> + Send + Sync;

/// Filter built from a closure
pub struct FunctionFilter {
    inputs: Vec<PortInfo>,
    outputs: Vec<PortInfo>,
    func: Box<FilterFn>,
}

impl FunctionFilter {
    /// Filter running `func` on each execution
    ///
    /// # Arguments
    /// * `inputs` - Input ports the closure reads
    /// * `outputs` - Output ports the closure sets; unset ones are flushed afterwards
    /// * `func` - Body of the filter
    pub fn new(
        inputs: Vec<PortInfo>,
        outputs: Vec<PortInfo>,
        func: impl Fn(&FutureMap, &PromiseMap) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inputs,
            outputs,
            func: Box::new(func),
        }
    }
}

impl Filter for FunctionFilter {
    fn inputs(&self) -> Vec<PortInfo> {
        self.inputs.clone()
    }

    fn outputs(&self) -> Vec<PortInfo> {
        self.outputs.clone()
    }

    fn execute(&self, input: &FutureMap, output: &PromiseMap) -> Result<()> {
        (self.func)(input, output)
    }
}
