//! Single-assignment values passed between pipeline stages
//!
//! A [`Promise`] is written once by the producing filter; any number of
//! [`Future`]s read it, blocking until the value or an empty marker
//! (flush) arrives. [`Notifier`]s let a scheduler sleep on many futures
//! at once.

use std::any::{Any, TypeId};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use uuid::Uuid;

use crate::core::error::Error;
use crate::core::types::Result;
use super::port::PortInfo;

#[derive(Clone)]
enum Slot {
    Value {
        data: Arc<dyn Any + Send + Sync>,
        type_name: &'static str,
    },
    /// Flushed without a value
    Empty,
}

#[derive(Default)]
struct CellState {
    slot: Option<Slot>,
    notifiers: Vec<Weak<NotifierInner>>,
}

/// One generation of a promise's value
#[derive(Default)]
struct Cell {
    state: Mutex<CellState>,
    ready: Condvar,
}

impl Cell {
    /// Store `slot` unless already set; wakes waiters and notifiers
    fn fill(&self, slot: Slot) -> bool {
        let notifiers = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.slot.is_some() {
                return false;
            }
            state.slot = Some(slot);
            std::mem::take(&mut state.notifiers)
        };

        self.ready.notify_all();
        for notifier in notifiers.iter().filter_map(Weak::upgrade) {
            notifier.notify();
        }
        true
    }

    fn is_ready(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).slot.is_some()
    }

    fn wait(&self) -> Slot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = self
            .ready
            .wait_while(state, |s| s.slot.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        state.slot.clone().unwrap_or(Slot::Empty)
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (state, _) = self
            .ready
            .wait_timeout_while(state, timeout, |s| s.slot.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        state.slot.is_some()
    }

    fn subscribe(&self, notifier: &Notifier) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.slot.is_some() {
            drop(state);
            notifier.notify();
            return;
        }
        state.notifiers.retain(|weak| weak.strong_count() > 0);
        let weak = Arc::downgrade(&notifier.inner);
        if !state.notifiers.iter().any(|existing| existing.ptr_eq(&weak)) {
            state.notifiers.push(weak);
        }
    }
}

/// State shared by a promise and all of its futures
struct Shared {
    id: Uuid,
    info: PortInfo,
    cell: RwLock<Arc<Cell>>,
}

impl Shared {
    fn cell(&self) -> Arc<Cell> {
        self.cell.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[derive(Default)]
struct NotifierInner {
    generation: Mutex<u64>,
    changed: Condvar,
}

impl NotifierInner {
    fn notify(&self) {
        *self.generation.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        self.changed.notify_all();
    }
}

/// Wake-up channel for "some future became ready"
///
/// Read [`generation`](Self::generation) before checking readiness, then
/// [`wait_past`](Self::wait_past) it; no readiness change is missed.
#[derive(Clone, Default)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

impl Notifier {
    /// Notifier at generation zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of notifications so far
    pub fn generation(&self) -> u64 {
        *self.inner.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bump the generation and wake all waiters
    pub fn notify(&self) {
        self.inner.notify();
    }

    /// Block until the generation moves past `generation`
    pub fn wait_past(&self, generation: u64) {
        let current = self.inner.generation.lock().unwrap_or_else(PoisonError::into_inner);
        let _current = self
            .inner
            .changed
            .wait_while(current, |g| *g <= generation)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Like [`wait_past`](Self::wait_past) with a timeout; true if woken
    pub fn wait_past_timeout(&self, generation: u64, timeout: Duration) -> bool {
        let current = self.inner.generation.lock().unwrap_or_else(PoisonError::into_inner);
        let (current, _) = self
            .inner
            .changed
            .wait_timeout_while(current, timeout, |g| *g <= generation)
            .unwrap_or_else(PoisonError::into_inner);
        *current > generation
    }
}

/// Read side of a [`Promise`]
///
/// Futures follow their promise across [`Promise::reset`].
#[derive(Clone)]
pub struct Future {
    shared: Arc<Shared>,
}

impl Future {
    /// Port name of the producing promise
    pub fn name(&self) -> &str {
        &self.shared.info.name
    }

    /// Identity of the producing promise
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Port name and type of the value
    pub fn info(&self) -> &PortInfo {
        &self.shared.info
    }

    /// Whether the promise was set or flushed; never blocks
    pub fn is_ready(&self) -> bool {
        self.shared.cell().is_ready()
    }

    /// Block until the promise is set or flushed
    pub fn wait(&self) {
        self.shared.cell().wait();
    }

    /// Returns false if the promise was still unset after `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.shared.cell().wait_timeout(timeout)
    }

    /// Block for the value
    ///
    /// # Errors
    /// [`Error::EmptyData`] if the promise was flushed without a value,
    /// [`Error::TypeMismatch`] if it holds something other than `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        match self.shared.cell().wait() {
            Slot::Empty => Err(Error::EmptyData(self.name().to_string())),
            Slot::Value { data, type_name } => data.downcast::<T>().map_err(|_| Error::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: type_name,
            }),
        }
    }

    /// Have `notifier` woken once this future becomes ready
    pub fn subscribe(&self, notifier: &Notifier) {
        self.shared.cell().subscribe(notifier);
    }
}

impl std::fmt::Debug for Future {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Future")
            .field("name", &self.name())
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Write side of a single-assignment value
///
/// Dropping a promise that was never set flushes it, so readers never
/// block on a producer that has gone away.
pub struct Promise {
    shared: Arc<Shared>,
}

impl Promise {
    /// Unset promise for values of the port's type
    ///
    /// # Arguments
    /// * `info` - Port name and type; [`set`](Self::set) rejects other types
    pub fn new(info: PortInfo) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                info,
                cell: RwLock::new(Arc::new(Cell::default())),
            }),
        }
    }

    /// Output port this promise fills
    pub fn name(&self) -> &str {
        &self.shared.info.name
    }

    pub fn info(&self) -> &PortInfo {
        &self.shared.info
    }

    /// Stable across [`reset`](Self::reset)
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Whether a value or a flush has been stored
    pub fn is_set(&self) -> bool {
        self.shared.cell().is_ready()
    }

    /// Store `value` and wake every reader
    ///
    /// # Errors
    /// As [`set_arc`](Self::set_arc).
    pub fn set<T: Any + Send + Sync>(&self, value: T) -> Result<()> {
        self.set_arc(Arc::new(value))
    }

    /// Set from an already shared value
    ///
    /// # Errors
    /// [`Error::TypeMismatch`] if `T` is not the port's type,
    /// [`Error::PromiseAlreadySet`] on a second assignment.
    pub fn set_arc<T: Any + Send + Sync>(&self, value: Arc<T>) -> Result<()> {
        if TypeId::of::<T>() != self.shared.info.type_id {
            return Err(Error::TypeMismatch {
                expected: self.shared.info.type_name,
                found: std::any::type_name::<T>(),
            });
        }

        let slot = Slot::Value {
            data: value,
            type_name: std::any::type_name::<T>(),
        };
        if self.shared.cell().fill(slot) {
            Ok(())
        } else {
            Err(Error::PromiseAlreadySet(self.name().to_string()))
        }
    }

    /// Mark as done without a value; no-op once set
    pub fn flush(&self) {
        self.shared.cell().fill(Slot::Empty);
    }

    /// Flush the current value, then start a fresh unset one
    pub fn reset(&self) {
        self.flush();
        *self.shared.cell.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Cell::default());
    }

    /// Read side; any number may exist
    pub fn future(&self) -> Future {
        Future { shared: self.shared.clone() }
    }
}

impl Drop for Promise {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Block until at least one of `futures` is ready
///
/// Returns false without blocking when `futures` is empty.
pub fn wait_any(futures: &[Future]) -> bool {
    if futures.is_empty() {
        return false;
    }

    let notifier = Notifier::new();
    loop {
        let generation = notifier.generation();
        for future in futures {
            future.subscribe(&notifier);
        }
        if futures.iter().any(Future::is_ready) {
            return true;
        }
        notifier.wait_past(generation);
    }
}

/// Block until every future is ready
pub fn wait_all(futures: &[Future]) {
    for future in futures {
        future.wait();
    }
}
