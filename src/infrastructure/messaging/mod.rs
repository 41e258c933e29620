pub mod enqueuer;
pub mod scheduler;
pub mod worker_pool;

pub use enqueuer::{EnqueueError, Enqueuer};
pub use scheduler::Scheduler;
pub use worker_pool::{WorkerConfig, WorkerPool};
