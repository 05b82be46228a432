//! Background task running an aggregate's driver loop.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::FutureExt;
use promissory_core::Settler;
use tracing::{Instrument, Span};

/// Spawn `driver` onto the ambient Tokio runtime inside `span`.
///
/// A panic raised by the driver, by a constituent it polls or by a progress
/// listener it signals settles the aggregate with that panic, so the task
/// awaiting the aggregate panics instead of waiting forever.
pub(crate) fn spawn_driver<T, E, P, D>(settler: Settler<T, E, P>, driver: D, span: Span)
where
    T: Send + 'static,
    E: Send + 'static,
    P: 'static,
    D: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(
        async move {
            if let Err(payload) = AssertUnwindSafe(driver).catch_unwind().await {
                settler.settle_panic(payload);
            }
        }
        .instrument(span),
    );
}
