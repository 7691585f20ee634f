//! The seisbus in-process message broker.
//!
//! A [Queue] is a named pub/sub hub: it accepts messages from transport
//! clients, buffers regular messages in a bounded ring keyed by sequence
//! number, optionally runs them through a pipeline of processors on a
//! background worker, and distributes results to the members of
//! publish/subscribe groups. Transports implement [ClientTransport] for
//! their peers and drive the queue from a single owning thread; the worker
//! coordinates with that thread through a [MessageDispatcher].

mod client;
mod dispatcher;
mod group;
mod host;
mod message;
mod processor;
mod queue;
mod ring;
mod statistics;
mod sync;

pub mod errors;
pub mod status;

pub use client::{Client, ClientTransport};
pub use dispatcher::MessageDispatcher;
pub use group::Group;
pub use host::{HostMonitor, SystemMonitor};
pub use message::{Message, MessageKind};
pub use processor::{KeyValues, MessageProcessor};
pub use queue::{ConnectResult, Queue, QueueConfig};
pub use statistics::{GroupStatistics, QueueStatistics, Tx};
