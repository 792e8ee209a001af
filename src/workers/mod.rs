//! Specialist workers.
//!
//! Each worker is a [`WorkerKind`] behind the single [`Worker::run`]
//! contract, resolved by id through the [`WorkerRegistry`].

pub mod kinds;
pub mod registry;
pub mod status;
pub mod worker;

pub use kinds::{WorkerKind, WorkerProfile};
pub use registry::WorkerRegistry;
pub use status::{BroadcastObserver, StatusEvent, StatusObserver, WorkerStatus};
pub use worker::{RunContext, Worker, WorkerDeps, WorkerResult};
