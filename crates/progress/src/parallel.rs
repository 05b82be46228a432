//! Parallel fan-out over independently running works.

use futures::future::{FutureExt, TryFuture, TryFutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use promissory_core::{ProgressFuture, Settler};
use tracing::{debug, info_span};

use crate::aggregate::Aggregate;
use crate::config::AggregateConfig;
use crate::driver::spawn_driver;

/// Progress future produced by [`all`].
pub type AllFuture<T, E> = ProgressFuture<Aggregate<T>, E, Aggregate<T>>;

/// Run every work concurrently and collect their values in input order.
///
/// Each time a work fulfills, its value is written to the slot matching its
/// input position and listeners receive the aggregate with the updated
/// proportion. Once all works have fulfilled the future fulfills with that
/// same aggregate. The first rejection rejects the future with the work's
/// own error; nothing is signalled afterwards.
///
/// The works start running when the returned future is first polled, so
/// listeners registered before awaiting it observe every signal. An empty
/// input fulfills immediately with proportion 1.
///
/// # Panics
///
/// Panics when first polled outside a Tokio runtime with a non-empty input.
/// A panic in a work or a progress listener is re-raised in the task
/// awaiting the aggregate.
pub fn all<I, F, T, E>(works: I) -> AllFuture<T, E>
where
    I: IntoIterator<Item = F>,
    F: TryFuture<Ok = T, Error = E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    all_with(AggregateConfig::default(), works)
}

/// [`all`] with explicit configuration.
pub fn all_with<I, F, T, E>(config: AggregateConfig, works: I) -> AllFuture<T, E>
where
    I: IntoIterator<Item = F>,
    F: TryFuture<Ok = T, Error = E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let pending: FuturesUnordered<_> = works
        .into_iter()
        .enumerate()
        .map(|(index, work)| TryFutureExt::into_future(work).map(move |outcome| (index, outcome)))
        .collect();
    let total = pending.len();

    if total == 0 {
        let mut results = Aggregate::slotted(0);
        results.finish();
        return ProgressFuture::resolved(results);
    }

    ProgressFuture::lazy(move |settler| {
        let span = info_span!("aggregate", kind = "all", label = config.span_label(), total);
        let driver = drive(settler.clone(), pending, total, config.drain_after_failure);
        spawn_driver(settler, driver, span);
    })
}

async fn drive<S, T, E>(
    settler: Settler<Aggregate<T>, E, Aggregate<T>>,
    mut pending: S,
    total: usize,
    drain_after_failure: bool,
) where
    S: futures::Stream<Item = (usize, Result<T, E>)> + Unpin,
{
    let mut results = Aggregate::slotted(total);

    while let Some((index, outcome)) = pending.next().await {
        if settler.is_settled() {
            debug!(index, "constituent settled after the aggregate, discarding");
            continue;
        }

        match outcome {
            Ok(value) => {
                results.fill(index, value);
                debug!(index, proportion = results.proportion(), "constituent fulfilled");

                if !settler.signal_ref(&results) {
                    // A listener failed and rejected the aggregate.
                    if drain_after_failure {
                        continue;
                    }
                    return;
                }

                if results.is_complete() {
                    results.finish();
                    settler.resolve(results);
                    return;
                }
            }
            Err(err) => {
                debug!(index, "constituent rejected, rejecting aggregate");
                settler.reject(err);
                if !drain_after_failure {
                    return;
                }
            }
        }
    }
}
