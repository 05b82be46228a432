//! The progress-aware future.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::future::FusedFuture;
use tokio::sync::mpsc;

use crate::error::{ProgressError, Result};
use crate::handler::ProgressHandler;
use crate::settler::Settler;
use crate::state::Shared;

/// A future that settles once with `Result<T, E>` and may signal progress
/// values of type `P` any number of times before it does.
///
/// Awaiting the future yields the settlement; progress is observed through
/// listeners registered with [`register_progress`](Self::register_progress),
/// [`on_progress`](Self::on_progress) or
/// [`progress_updates`](Self::progress_updates).
///
/// ```
/// use promissory_core::ProgressFuture;
///
/// # async fn demo() {
/// let upload: ProgressFuture<usize, String> = ProgressFuture::lazy(|settler| {
///     tokio::spawn(async move {
///         for chunk in 1..=4 {
///             settler.signal(chunk as f64 / 4.0);
///         }
///         settler.resolve(4);
///     });
/// });
///
/// let chunks = upload
///     .on_progress(|fraction| println!("{:.0}%", fraction * 100.0))
///     .await;
/// assert_eq!(chunks, Ok(4));
/// # }
/// ```
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct ProgressFuture<T, E, P = f64> {
    shared: Arc<Shared<T, E, P>>,
    start: Mutex<Option<Start<T, E, P>>>,
}

type Start<T, E, P> = Box<dyn FnOnce(Settler<T, E, P>) + Send>;

impl<T, E, P> ProgressFuture<T, E, P> {
    /// Create a future, running `setup` once, synchronously, with the
    /// settler that drives it.
    ///
    /// Listeners can only be registered once `new` has returned, so signals
    /// sent from inside `setup` itself reach nobody. Work spawned from
    /// `setup` onto a multi-threaded runtime can also signal before the
    /// caller's listeners are attached; use [`lazy`](Self::lazy) when every
    /// signal must be observed.
    pub fn new<F>(setup: F) -> Self
    where
        F: FnOnce(Settler<T, E, P>),
    {
        let shared = Arc::new(Shared::new());
        setup(Settler::new(shared.clone()));
        Self {
            shared,
            start: Mutex::new(None),
        }
    }

    /// Create a future whose `setup` runs on the first poll instead of at
    /// construction.
    ///
    /// Listeners registered before the future is first awaited therefore see
    /// every signal, whatever runtime the work ends up on. Dropping the
    /// future unpolled means `setup` never runs.
    pub fn lazy<F>(setup: F) -> Self
    where
        F: FnOnce(Settler<T, E, P>) + Send + 'static,
    {
        Self {
            shared: Arc::new(Shared::new()),
            start: Mutex::new(Some(Box::new(setup))),
        }
    }

    /// Like [`new`](Self::new), but an `Err` returned by `setup` rejects the
    /// future (unless `setup` already settled it).
    pub fn try_new<F>(setup: F) -> Self
    where
        F: FnOnce(Settler<T, E, P>) -> std::result::Result<(), E>,
    {
        Self::new(|settler| {
            let boundary = settler.clone();
            if let Err(err) = setup(settler) {
                boundary.reject(err);
            }
        })
    }

    /// A future already fulfilled with `value`.
    pub fn resolved(value: T) -> Self {
        Self::new(|settler| {
            settler.resolve(value);
        })
    }

    /// A future already rejected with `reason`.
    pub fn rejected(reason: E) -> Self {
        Self::new(|settler| {
            settler.reject(reason);
        })
    }

    /// Register a progress handler.
    ///
    /// Handlers are invoked in registration order. Fails synchronously with
    /// [`ProgressError::InvalidHandler`] when the handler has nothing to
    /// invoke. Registering on a settled future succeeds but the handler is
    /// never called.
    pub fn register_progress(&self, handler: ProgressHandler<P, E>) -> Result<&Self> {
        let listener = handler
            .into_listener()
            .ok_or_else(ProgressError::not_invocable)?;
        self.shared.register(listener);
        Ok(self)
    }

    /// Register an infallible progress listener, builder style.
    pub fn on_progress<F>(self, listener: F) -> Self
    where
        F: Fn(&P) + Send + Sync + 'static,
        P: 'static,
        E: 'static,
    {
        self.try_on_progress(move |value| {
            listener(value);
            Ok(())
        })
    }

    /// Register a fallible progress listener, builder style.
    ///
    /// An `Err` from the listener rejects this future with that error.
    pub fn try_on_progress<F>(self, listener: F) -> Self
    where
        F: Fn(&P) -> std::result::Result<(), E> + Send + Sync + 'static,
        P: 'static,
        E: 'static,
    {
        self.shared.register(Arc::new(listener));
        self
    }

    /// Receive every later progress signal on a channel.
    ///
    /// The channel closes once the future settles.
    pub fn progress_updates(&self) -> mpsc::UnboundedReceiver<P>
    where
        P: Clone + Send + 'static,
        E: 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.register(Arc::new(
            move |value: &P| -> std::result::Result<(), E> {
                // A dropped receiver only means nobody is watching any more.
                let _ = tx.send(value.clone());
                Ok(())
            },
        ));
        rx
    }

    /// Whether the future has settled.
    pub fn is_settled(&self) -> bool {
        self.shared.is_settled()
    }
}

impl<T, E, P> Future for ProgressFuture<T, E, P> {
    type Output = std::result::Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let start = this
            .start
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(start) = start {
            start(Settler::new(this.shared.clone()));
        }
        this.shared.poll_outcome(cx)
    }
}

impl<T, E, P> FusedFuture for ProgressFuture<T, E, P> {
    fn is_terminated(&self) -> bool {
        self.shared.is_consumed()
    }
}

impl<T, E, P> fmt::Debug for ProgressFuture<T, E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressFuture")
            .field("state", &self.shared.state_name())
            .field("listeners", &self.shared.listener_count())
            .finish()
    }
}
