//! Asynchronous dataflow pipeline
//!
//! Filters exchange typed values through single-assignment
//! [`Promise`]/[`Future`] pairs. A [`Pipeline`] groups filters (and other
//! pipelines); an [`Executor`] runs them on a worker pool as soon as their
//! inputs are ready.

pub mod future;
pub mod port;
pub mod filter;
pub mod pipe_filter;
pub mod pipeline;
pub mod executor;
pub mod workers;

pub use future::{Future, Notifier, Promise, wait_all, wait_any};
pub use port::{PortInfo, port};
pub use filter::{Filter, FunctionFilter, FutureMap, PromiseMap};
pub use pipe_filter::PipeFilter;
pub use pipeline::{Executable, Pipeline};
pub use executor::Executor;
pub use workers::Workers;
