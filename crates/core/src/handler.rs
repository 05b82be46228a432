//! Progress listeners.

use std::fmt;
use std::sync::Arc;

/// Shared listener callable. Returning `Err` rejects the owning future.
pub(crate) type Listener<P, E> = Arc<dyn Fn(&P) -> Result<(), E> + Send + Sync>;

/// A progress handler waiting to be registered on a
/// [`ProgressFuture`](crate::ProgressFuture).
///
/// Handlers are usually built from closures, which are always invocable.
/// Handlers coming from optional or dynamically assembled sources may be
/// empty; registering one fails with
/// [`ProgressError::InvalidHandler`](crate::ProgressError::InvalidHandler).
pub struct ProgressHandler<P, E> {
    listener: Option<Listener<P, E>>,
}

impl<P, E> ProgressHandler<P, E> {
    /// Create a handler from an infallible listener.
    pub fn new<F>(listener: F) -> Self
    where
        F: Fn(&P) + Send + Sync + 'static,
        P: 'static,
        E: 'static,
    {
        Self {
            listener: Some(Arc::new(move |value: &P| -> Result<(), E> {
                listener(value);
                Ok(())
            })),
        }
    }

    /// Create a handler from a listener that may fail.
    ///
    /// An `Err` returned by the listener rejects the future it is
    /// registered on.
    pub fn fallible<F>(listener: F) -> Self
    where
        F: Fn(&P) -> Result<(), E> + Send + Sync + 'static,
        P: 'static,
        E: 'static,
    {
        Self {
            listener: Some(Arc::new(listener)),
        }
    }

    /// Create a handler from an optional listener.
    pub fn optional<F>(listener: Option<F>) -> Self
    where
        F: Fn(&P) + Send + Sync + 'static,
        P: 'static,
        E: 'static,
    {
        match listener {
            Some(listener) => Self::new(listener),
            None => Self::empty(),
        }
    }

    /// A handler with nothing to invoke.
    pub fn empty() -> Self {
        Self { listener: None }
    }

    /// Whether registering this handler would succeed.
    pub fn is_invocable(&self) -> bool {
        self.listener.is_some()
    }

    pub(crate) fn into_listener(self) -> Option<Listener<P, E>> {
        self.listener
    }
}

impl<P, E> Default for ProgressHandler<P, E> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<P, E> fmt::Debug for ProgressHandler<P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressHandler")
            .field("invocable", &self.is_invocable())
            .finish()
    }
}
