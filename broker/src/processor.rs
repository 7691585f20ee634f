use crate::client::Client;
use crate::message::Message;
use crate::queue::Queue;
use chrono::{DateTime, Utc};

/// Accumulated key/value parameters exchanged during connection setup.
pub type KeyValues = Vec<(String, String)>;

/// A pluggable pipeline stage attached to a queue.
///
/// A processor declares which hooks it implements through the capability
/// flags; the queue routes connections to connection-enabled processors and
/// regular messages to message-enabled ones. A processor belongs to exactly
/// one queue for its entire lifetime.
pub trait MessageProcessor: Send + Sync {
    /// Whether [process](MessageProcessor::process) should be driven by the
    /// queue's worker.
    fn handles_messages(&self) -> bool {
        false
    }

    /// Whether the connection hooks are implemented.
    fn handles_connections(&self) -> bool {
        false
    }

    /// Called once when the processor is added to a queue; the place to
    /// reserve client scratch space via
    /// [allocate_client_heap](Queue::allocate_client_heap).
    fn attach(&self, _queue: &mut Queue) {}

    /// Accepts or rejects a connecting client. Out-parameters accumulate
    /// across all connection processors.
    fn accept_connection(
        &self,
        _client: &mut Client,
        _in_params: &[(String, String)],
        _out_params: &mut KeyValues,
    ) -> bool {
        true
    }

    /// A previously accepted client disconnected.
    fn drop_connection(&self, _client: &mut Client) {}

    /// Transforms a regular message before publication. Runs on the worker
    /// thread; returning false marks the message as failed.
    fn process(&self, _msg: &mut Message) -> bool {
        true
    }

    /// Called during queue shutdown.
    fn close(&self) {}

    /// Contributes `&key=value` text to the broker's state-of-health
    /// broadcast.
    fn get_info(&self, _now: DateTime<Utc>, _out: &mut String) {}
}
