//! Strictly sequential pipeline over a list of inputs.

use futures::future::{TryFuture, TryFutureExt};
use promissory_core::{ProgressFuture, Settler};
use tracing::{debug, info_span};

use crate::aggregate::Aggregate;
use crate::config::AggregateConfig;
use crate::driver::spawn_driver;

/// Progress future produced by [`sequence`].
pub type SequenceFuture<O, E> = ProgressFuture<Aggregate<O>, E, Aggregate<O>>;

/// Run `transform` on each item, one at a time, in input order.
///
/// The transform for an item is not invoked until the work for the previous
/// item has fulfilled. After every step the value is appended and listeners
/// receive the aggregate with the updated proportion. The first rejection
/// rejects the future with the step's own error and no later item is
/// transformed. A progress listener failing halts the pipeline the same way.
///
/// Nothing is transformed until the returned future is first polled, so
/// listeners registered before awaiting it observe every step. An empty
/// input fulfills immediately with proportion 1.
///
/// # Panics
///
/// Panics when first polled outside a Tokio runtime with a non-empty input.
/// A panic in the transform, a step or a progress listener is re-raised in
/// the task awaiting the pipeline.
pub fn sequence<I, Item, F, Fut, O, E>(items: I, transform: F) -> SequenceFuture<O, E>
where
    I: IntoIterator<Item = Item>,
    Item: Send + 'static,
    F: FnMut(Item) -> Fut + Send + 'static,
    Fut: TryFuture<Ok = O, Error = E> + Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    sequence_with(AggregateConfig::default(), items, transform)
}

/// [`sequence`] with explicit configuration.
pub fn sequence_with<I, Item, F, Fut, O, E>(
    config: AggregateConfig,
    items: I,
    transform: F,
) -> SequenceFuture<O, E>
where
    I: IntoIterator<Item = Item>,
    Item: Send + 'static,
    F: FnMut(Item) -> Fut + Send + 'static,
    Fut: TryFuture<Ok = O, Error = E> + Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    let items: Vec<Item> = items.into_iter().collect();

    if items.is_empty() {
        let mut results = Aggregate::growing(0);
        results.finish();
        return ProgressFuture::resolved(results);
    }

    ProgressFuture::lazy(move |settler| {
        let span = info_span!(
            "aggregate",
            kind = "sequence",
            label = config.span_label(),
            total = items.len()
        );
        let driver = drive(settler.clone(), items, transform);
        spawn_driver(settler, driver, span);
    })
}

async fn drive<Item, F, Fut, O, E>(
    settler: Settler<Aggregate<O>, E, Aggregate<O>>,
    items: Vec<Item>,
    mut transform: F,
) where
    F: FnMut(Item) -> Fut,
    Fut: TryFuture<Ok = O, Error = E>,
{
    let mut results = Aggregate::growing(items.len());

    for (index, item) in items.into_iter().enumerate() {
        match TryFutureExt::into_future(transform(item)).await {
            Ok(value) => {
                results.push(value);
                debug!(index, proportion = results.proportion(), "step fulfilled");

                if !settler.signal_ref(&results) {
                    debug!(index, "aggregate rejected by a listener, halting");
                    return;
                }
            }
            Err(err) => {
                debug!(index, "step rejected, halting");
                settler.reject(err);
                return;
            }
        }
    }

    results.finish();
    settler.resolve(results);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::FutureExt;
    use std::panic::AssertUnwindSafe;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Debug, Clone, PartialEq, thiserror::Error)]
    enum StepError {
        #[error("item {0} rejected")]
        Rejected(u32),
        #[error("listener refused")]
        Listener,
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_in_order() {
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let sink = lengths.clone();

        let future = sequence(vec![1u32, 2, 3], |x| async move {
            sleep(Duration::from_millis(10)).await;
            Ok::<_, StepError>(x * 10)
        })
        .on_progress(move |results: &Aggregate<u32>| {
            sink.lock().unwrap().push((results.len(), results.proportion()));
        });

        let results = future.await.unwrap();
        assert_eq!(results.proportion(), 1.0);
        assert_eq!(results.into_values(), Some(vec![10, 20, 30]));
        assert_eq!(
            *lengths.lock().unwrap(),
            vec![(1, 1.0 / 3.0), (2, 2.0 / 3.0), (3, 1.0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transform_waits_for_previous_step() {
        // Set while a step is in flight; a second concurrent step would see it.
        let busy = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let invoked = Arc::new(Mutex::new(Vec::new()));

        let (busy_flag, overlap_count, log) = (busy.clone(), overlaps.clone(), invoked.clone());
        let future = sequence(0..5u64, move |item| {
            if busy_flag.swap(true, Ordering::SeqCst) {
                overlap_count.fetch_add(1, Ordering::SeqCst);
            }
            log.lock().unwrap().push(item);
            let busy_flag = busy_flag.clone();
            async move {
                // Earlier items take longer.
                sleep(Duration::from_millis((5 - item) * 10)).await;
                busy_flag.store(false, Ordering::SeqCst);
                Ok::<_, StepError>(item)
            }
        });

        let results = future.await.unwrap();
        assert_eq!(results.into_values(), Some(vec![0, 1, 2, 3, 4]));
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(*invoked.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_rejection_halts_pipeline() {
        crate::init_test_tracing();

        let invoked = Arc::new(Mutex::new(Vec::new()));
        let log = invoked.clone();
        let progress = Arc::new(AtomicUsize::new(0));
        let counter = progress.clone();

        let future = sequence(vec![1u32, 2, 3, 4], move |item| {
            log.lock().unwrap().push(item);
            async move {
                if item == 2 {
                    Err(StepError::Rejected(item))
                } else {
                    Ok(item)
                }
            }
        })
        .on_progress(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(future.await, Err(StepError::Rejected(2)));
        assert_eq!(*invoked.lock().unwrap(), vec![1, 2]);
        assert_eq!(progress.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_failing_item() {
        let appended = Arc::new(AtomicUsize::new(0));
        let counter = appended.clone();

        let fail_if_true = |flag: bool| async move {
            if flag {
                Err(StepError::Rejected(0))
            } else {
                Ok(flag)
            }
        };

        let future = sequence(vec![true], fail_if_true).on_progress(move |results| {
            counter.store(results.len(), Ordering::SeqCst);
        });

        assert_eq!(future.await, Err(StepError::Rejected(0)));
        assert_eq!(appended.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_listener_failure_halts_pipeline() {
        let invoked = Arc::new(AtomicUsize::new(0));
        let counter = invoked.clone();

        let future = sequence(vec![1u32, 2, 3], move |item| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, StepError>(item) }
        })
        .try_on_progress(|_| Err(StepError::Listener));

        assert_eq!(future.await, Err(StepError::Listener));
        assert_eq!(invoked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_input_fulfills_immediately() {
        let future = sequence(Vec::<u32>::new(), |item| async move {
            Ok::<_, StepError>(item)
        });
        assert!(future.is_settled());

        let results = future.await.unwrap();
        assert!(results.is_empty());
        assert_eq!(results.proportion(), 1.0);
    }

    #[tokio::test]
    async fn test_labelled_sequence() {
        let config = AggregateConfig::new().label("checksums");
        let results = sequence_with(config, vec!["a", "bb"], |s| async move {
            Ok::<_, StepError>(s.len())
        })
        .await
        .unwrap();

        assert_eq!(results.into_values(), Some(vec![1, 2]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_listener_sees_every_step_across_threads() {
        for _ in 0..200 {
            let count = Arc::new(AtomicUsize::new(0));
            let counter = count.clone();

            let results = sequence(0..4u32, |item| async move { Ok::<_, StepError>(item) })
                .on_progress(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap();

            assert_eq!(results.into_values(), Some(vec![0, 1, 2, 3]));
            assert_eq!(count.load(Ordering::SeqCst), 4);
        }
    }

    #[tokio::test]
    async fn test_panicking_step_reaches_awaiting_task() {
        let future = sequence(vec![1u32, 2, 3], |item| async move {
            if item == 2 {
                panic!("step exploded");
            }
            Ok::<_, StepError>(item)
        });

        let caught = tokio::time::timeout(
            Duration::from_secs(5),
            AssertUnwindSafe(future).catch_unwind(),
        )
        .await
        .expect("the pipeline must not stay pending");
        let payload = caught.expect_err("the panic must be re-raised");
        assert_eq!(payload.downcast_ref::<&str>().copied(), Some("step exploded"));
    }

    #[tokio::test]
    async fn test_panicking_listener_reaches_awaiting_task() {
        let future = sequence(vec![1u32, 2], |item| async move { Ok::<_, StepError>(item) })
            .on_progress(|_| {
                panic!("listener exploded");
            });

        let caught = tokio::time::timeout(
            Duration::from_secs(5),
            AssertUnwindSafe(future).catch_unwind(),
        )
        .await
        .expect("the pipeline must not stay pending");
        let payload = caught.expect_err("the panic must be re-raised");
        assert_eq!(payload.downcast_ref::<&str>().copied(), Some("listener exploded"));
    }
}
