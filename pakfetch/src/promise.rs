//! Single-assignment, multi-observer promise.
//!
//! A [`BroadcastPromise`] is the primitive that lets an unbounded number of
//! callers await one asynchronous result. Observers attach with
//! [`BroadcastPromise::make_future`] at any time, before or after the value
//! is set, and every observer receives the value exactly once.
//!
//! # Architecture
//!
//! ```text
//!                 ┌────────────────────────────┐
//!  make_future ──►│  value: Option<T>          │──► PromiseFuture (ready)
//!                 │  waiters: Vec<oneshot::Tx> │──► PromiseFuture (pending)
//!                 └─────────────┬──────────────┘
//!                               │ set(value)
//!                               ▼
//!                  value stored, every waiter sent a clone
//! ```
//!
//! The no-payload form is `BroadcastPromise<()>`, where the stored
//! `Option<()>` is exactly a "completed" flag.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

/// The promise was dropped before a value was set.
///
/// Only happens when the state owning the promise is torn down (for example
/// at coordinator shutdown). It is not a failure channel for the operation
/// the promise represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("promise was dropped before a value was set")]
pub struct PromiseAbandoned;

/// A write-once slot broadcasting its value to every observer.
pub struct BroadcastPromise<T> {
    state: Mutex<PromiseState<T>>,
}

struct PromiseState<T> {
    value: Option<T>,
    waiters: Vec<oneshot::Sender<T>>,
}

/// A broadcast promise without payload.
pub type CompletionPromise = BroadcastPromise<()>;

impl<T: Clone> Default for BroadcastPromise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> BroadcastPromise<T> {
    /// Create an unset promise with no observers.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PromiseState {
                value: None,
                waiters: Vec::new(),
            }),
        }
    }

    /// Register a new observer.
    ///
    /// If the value is already set the returned future is immediately
    /// ready; otherwise it resolves when [`set`](Self::set) is called.
    pub fn make_future(&self) -> PromiseFuture<T> {
        let mut state = self.state.lock();

        if let Some(value) = &state.value {
            return PromiseFuture::ready(value.clone());
        }

        let (tx, rx) = oneshot::channel();
        state.waiters.push(tx);
        PromiseFuture::waiting(rx)
    }

    /// Set the value, notifying every registered observer.
    ///
    /// Returns the value back as `Err` if the promise was already set; the
    /// stored value is never overwritten.
    pub fn try_set(&self, value: T) -> Result<(), T> {
        let waiters = {
            let mut state = self.state.lock();
            if state.value.is_some() {
                return Err(value);
            }
            state.value = Some(value.clone());
            std::mem::take(&mut state.waiters)
        };

        // Observers that stopped waiting have dropped their receivers
        for waiter in waiters {
            let _ = waiter.send(value.clone());
        }

        Ok(())
    }

    /// Set the value, notifying every registered observer.
    ///
    /// # Panics
    ///
    /// Panics if the value was already set. Setting a promise twice is a
    /// programming error.
    pub fn set(&self, value: T) {
        if self.try_set(value).is_err() {
            panic!("broadcast promise value set twice");
        }
    }

    /// Check whether the value has been set.
    pub fn is_set(&self) -> bool {
        self.state.lock().value.is_some()
    }

    /// Number of observers still waiting for the value.
    pub fn pending_observers(&self) -> usize {
        self.state.lock().waiters.len()
    }
}

impl BroadcastPromise<()> {
    /// Mark the promise as completed.
    ///
    /// # Panics
    ///
    /// Panics if the promise was already completed.
    pub fn complete(&self) {
        self.set(());
    }
}

/// An observer handle on a [`BroadcastPromise`].
///
/// Resolves to the promise's value, or to [`PromiseAbandoned`] if the
/// promise is dropped unset.
pub struct PromiseFuture<T> {
    state: ObserverState<T>,
}

enum ObserverState<T> {
    Ready(Option<T>),
    Waiting(oneshot::Receiver<T>),
}

impl<T> PromiseFuture<T> {
    /// A future that is already resolved with `value`.
    pub fn ready(value: T) -> Self {
        Self {
            state: ObserverState::Ready(Some(value)),
        }
    }

    fn waiting(rx: oneshot::Receiver<T>) -> Self {
        Self {
            state: ObserverState::Waiting(rx),
        }
    }

    /// Whether the value was already available when the observer attached.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, ObserverState::Ready(Some(_)))
    }
}

// The value is never pinned structurally, it is only moved out.
impl<T> Unpin for PromiseFuture<T> {}

impl<T> Future for PromiseFuture<T> {
    type Output = Result<T, PromiseAbandoned>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            ObserverState::Ready(value) => Poll::Ready(value.take().ok_or(PromiseAbandoned)),
            ObserverState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|result| result.map_err(|_| PromiseAbandoned)),
        }
    }
}
