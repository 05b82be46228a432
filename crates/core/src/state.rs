//! Settlement state shared between a future and its settlers.

use std::any::Any;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tracing::{debug, trace, warn};

use crate::handler::Listener;

/// Lifecycle of a progress future.
enum State<T, E> {
    /// Not settled yet
    Pending,
    /// Settled; outcome not yet taken by the awaiting task
    Settled(Result<T, E>),
    /// The work driving the future panicked; the payload is re-raised by `poll`
    Panicked(Box<dyn Any + Send>),
    /// Outcome handed out by `poll`
    Consumed,
}

struct Inner<T, E> {
    state: State<T, E>,
    waker: Option<Waker>,
}

/// State shared by a [`ProgressFuture`](crate::ProgressFuture) and every
/// clone of its [`Settler`](crate::Settler).
pub(crate) struct Shared<T, E, P> {
    inner: Mutex<Inner<T, E>>,
    listeners: Mutex<Vec<Listener<P, E>>>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T, E, P> Shared<T, E, P> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Pending,
                waker: None,
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        !matches!(lock(&self.inner).state, State::Pending)
    }

    pub(crate) fn is_consumed(&self) -> bool {
        matches!(lock(&self.inner).state, State::Consumed)
    }

    pub(crate) fn state_name(&self) -> &'static str {
        match lock(&self.inner).state {
            State::Pending => "pending",
            State::Settled(Ok(_)) => "fulfilled",
            State::Settled(Err(_)) => "rejected",
            State::Panicked(_) => "panicked",
            State::Consumed => "consumed",
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Settle once. Returns `false` if the future had already settled.
    pub(crate) fn settle(&self, outcome: Result<T, E>) -> bool {
        let fulfilled = outcome.is_ok();
        if !self.transition(State::Settled(outcome)) {
            trace!(fulfilled, "settlement ignored, future already settled");
            return false;
        }
        debug!(
            outcome = if fulfilled { "fulfilled" } else { "rejected" },
            "future settled"
        );
        true
    }

    /// Record that the work panicked. The awaiting task resumes the panic.
    pub(crate) fn settle_panic(&self, payload: Box<dyn Any + Send>) -> bool {
        if !self.transition(State::Panicked(payload)) {
            trace!("panic ignored, future already settled");
            return false;
        }
        warn!("work driving the future panicked");
        true
    }

    fn transition(&self, settled: State<T, E>) -> bool {
        let waker = {
            let mut inner = lock(&self.inner);
            if !matches!(inner.state, State::Pending) {
                return false;
            }
            inner.state = settled;
            inner.waker.take()
        };

        // Nothing is signalled after settlement; release captured state early.
        let released = std::mem::take(&mut *lock(&self.listeners));
        drop(released);

        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// Append a listener. Listeners arriving after settlement are dropped.
    pub(crate) fn register(&self, listener: Listener<P, E>) {
        let inner = lock(&self.inner);
        if !matches!(inner.state, State::Pending) {
            trace!("listener registered after settlement, dropping it");
            return;
        }
        lock(&self.listeners).push(listener);
    }

    /// Deliver `value` to every listener in registration order.
    ///
    /// Returns `false` when nothing was delivered because the future had
    /// settled, or when a listener failed and rejected the future.
    pub(crate) fn signal(&self, value: &P) -> bool {
        // Snapshot under the state lock so a concurrent settlement cannot
        // slip between the check and the copy.
        let listeners: Vec<Listener<P, E>> = {
            let inner = lock(&self.inner);
            if !matches!(inner.state, State::Pending) {
                trace!("progress signal after settlement ignored");
                return false;
            }
            lock(&self.listeners).clone()
        };
        trace!(listeners = listeners.len(), "signalling progress");

        // Invoke outside the locks so listeners may register or settle.
        for (index, listener) in listeners.iter().enumerate() {
            if self.is_settled() {
                trace!(listener = index, "future settled mid-signal, stopping delivery");
                return false;
            }
            if let Err(err) = listener(value) {
                warn!(listener = index, "progress listener failed, rejecting future");
                self.settle(Err(err));
                return false;
            }
        }
        true
    }

    pub(crate) fn poll_outcome(&self, cx: &mut Context<'_>) -> Poll<Result<T, E>> {
        let mut inner = lock(&self.inner);
        match std::mem::replace(&mut inner.state, State::Consumed) {
            State::Settled(outcome) => Poll::Ready(outcome),
            State::Panicked(payload) => {
                drop(inner);
                std::panic::resume_unwind(payload)
            }
            State::Pending => {
                inner.state = State::Pending;
                let stale = inner
                    .waker
                    .as_ref()
                    .map_or(true, |waker| !waker.will_wake(cx.waker()));
                if stale {
                    inner.waker = Some(cx.waker().clone());
                }
                Poll::Pending
            }
            State::Consumed => panic!("`ProgressFuture` polled after completion"),
        }
    }
}
