//! The capability handed to a progress future's setup routine.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::state::Shared;

/// Settles a [`ProgressFuture`](crate::ProgressFuture) and signals its
/// progress.
///
/// Cloning is cheap; every clone drives the same future, so a settler can
/// be moved into as many tasks as the work needs. Settlement happens at most
/// once: whichever clone resolves or rejects first wins and every later
/// call returns `false`.
///
/// If every clone is dropped while the future is still pending, the future
/// never settles, unless the drop happens while the thread is unwinding from
/// a panic: the awaiting task then panics too.
pub struct Settler<T, E, P> {
    handle: Arc<Handle<T, E, P>>,
}

struct Handle<T, E, P> {
    shared: Arc<Shared<T, E, P>>,
}

impl<T, E, P> Drop for Handle<T, E, P> {
    fn drop(&mut self) {
        if self.shared.is_settled() {
            return;
        }
        if std::thread::panicking() {
            self.shared
                .settle_panic(Box::new("work driving the future panicked"));
        } else {
            warn!("every settler dropped while the future is pending; it will never settle");
        }
    }
}

impl<T, E, P> Settler<T, E, P> {
    pub(crate) fn new(shared: Arc<Shared<T, E, P>>) -> Self {
        Self {
            handle: Arc::new(Handle { shared }),
        }
    }

    /// Fulfill the future with `value`.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Reject the future with `reason`.
    pub fn reject(&self, reason: E) -> bool {
        self.settle(Err(reason))
    }

    /// Settle the future with an already-tagged outcome.
    pub fn settle(&self, outcome: Result<T, E>) -> bool {
        self.handle.shared.settle(outcome)
    }

    /// Settle the future with a caught panic.
    ///
    /// The task awaiting the future resumes the panic with `payload`, the
    /// way `futures::FutureExt::catch_unwind` hands it over.
    pub fn settle_panic(&self, payload: Box<dyn Any + Send>) -> bool {
        self.handle.shared.settle_panic(payload)
    }

    /// Signal progress to every registered listener.
    ///
    /// See [`signal_ref`](Self::signal_ref).
    pub fn signal(&self, value: P) -> bool {
        self.signal_ref(&value)
    }

    /// Signal progress by reference, letting the caller keep mutating the
    /// value between signals.
    ///
    /// Listeners run synchronously, in registration order, before this
    /// returns. Returns `false` if the future had already settled or a
    /// listener failed and rejected it.
    pub fn signal_ref(&self, value: &P) -> bool {
        self.handle.shared.signal(value)
    }

    /// Whether the future has settled, by this settler or any clone.
    pub fn is_settled(&self) -> bool {
        self.handle.shared.is_settled()
    }
}

impl<T, E, P> Clone for Settler<T, E, P> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T, E, P> fmt::Debug for Settler<T, E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settler")
            .field("state", &self.handle.shared.state_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settler() -> Settler<&'static str, String, f64> {
        Settler::new(Arc::new(Shared::new()))
    }

    #[test]
    fn test_first_settlement_wins_across_clones() {
        let first = settler();
        let second = first.clone();

        assert!(second.reject("x".to_string()));
        assert!(!first.resolve("late"));
        assert!(first.is_settled());
        assert!(second.is_settled());
    }

    #[test]
    fn test_signal_without_listeners() {
        let settler = settler();
        assert!(settler.signal(0.5));
        assert!(settler.resolve("done"));
        assert!(!settler.signal(1.0));
    }

    #[test]
    fn test_debug_shows_state() {
        let settler = settler();
        assert_eq!(format!("{:?}", settler), "Settler { state: \"pending\" }");
        settler.resolve("done");
        assert_eq!(format!("{:?}", settler), "Settler { state: \"fulfilled\" }");
    }

    #[test]
    fn test_unwinding_drop_records_panic() {
        let shared: Arc<Shared<&'static str, String, f64>> = Arc::new(Shared::new());
        let settler = Settler::new(shared.clone());

        let joined = std::thread::spawn(move || {
            let _settler = settler;
            panic!("work exploded");
        })
        .join();

        assert!(joined.is_err());
        assert_eq!(shared.state_name(), "panicked");
    }

    #[test]
    fn test_settle_panic_after_resolve_is_ignored() {
        let settler = settler();
        assert!(settler.resolve("done"));
        assert!(!settler.settle_panic(Box::new("late")));
        assert_eq!(format!("{:?}", settler), "Settler { state: \"fulfilled\" }");
    }
}
