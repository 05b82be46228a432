//! Progress-aware futures.
//!
//! A [`ProgressFuture`] settles exactly once, like any other future, and
//! additionally carries a progress channel: the work behind it can signal
//! intermediate values any number of times before it settles, and every
//! registered listener sees each of them in registration order.

#![warn(missing_docs)]

mod error;
mod future;
mod handler;
mod settler;
mod state;

pub use error::{ProgressError, Result};
pub use future::ProgressFuture;
pub use handler::ProgressHandler;
pub use settler::Settler;
