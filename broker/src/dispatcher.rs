use crate::queue::Queue;

/// Bridge between the worker thread and the thread that owns the queue.
///
/// It is not safe to publish to subscribers from the worker; instead the
/// worker signals [message_available](MessageDispatcher::message_available)
/// and the owning thread arranges a later
/// [flush_processed_messages](Queue::flush_processed_messages) call in its
/// own context, typically its event loop. With native channels the
/// implementation collapses to a channel send.
pub trait MessageDispatcher: Send + Sync {
    /// Notifies the dispatcher that a processed message is ready on the
    /// named queue.
    fn message_available(&self, queue_name: &str);

    /// Drains the process-ready queue. May block when called without a
    /// preceding [message_available](MessageDispatcher::message_available)
    /// signal.
    fn flush_messages(&self, queue: &mut Queue) {
        queue.flush_processed_messages();
    }
}
