//! Aggregate progress (Layer 2)
//!
//! Combinators composing many fallible futures into one
//! [`ProgressFuture`](promissory_core::ProgressFuture) whose progress
//! signal is the fraction of constituents completed so far.
//!
//! - [`all`]: every work runs concurrently; results keep input order.
//! - [`sequence`]: one step at a time, in input order.

#![warn(missing_docs)]

pub mod aggregate;
pub mod config;
mod driver;
pub mod parallel;
pub mod sequence;

pub use aggregate::Aggregate;
pub use config::AggregateConfig;
pub use parallel::{all, all_with, AllFuture};
pub use sequence::{sequence, sequence_with, SequenceFuture};

#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
