//! Notification delivery pipeline.
//!
//! Intake stores a pending record and enqueues it. A single consumption loop
//! pulls records off the queue and hands each one to the [`Dispatcher`],
//! which invokes the channel sender and either marks the record delivered,
//! schedules a delayed redelivery, or marks it failed once the retry budget
//! is spent.

pub mod dispatcher;
pub mod intake;
pub mod queue;
pub mod retry;
pub mod sender;
pub mod store;
pub mod worker;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use intake::{NotificationService, SubmitRequest};
pub use queue::QueueClient;
pub use retry::RetryPolicy;
pub use sender::{SendError, Sender, SenderRegistry};
pub use store::NotificationStore;
pub use worker::NotificationWorker;
