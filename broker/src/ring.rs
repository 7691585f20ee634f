use crate::message::Message;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded FIFO of recently published regular messages, ordered by sequence
/// number and used for client catch-up replay.
///
/// On overflow the oldest entry is dropped; the message itself survives as
/// long as an in-flight publish still holds it.
pub(crate) struct MessageRing {
    capacity: usize,
    items: VecDeque<Arc<Message>>,
}

impl MessageRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn push(&mut self, msg: Arc<Message>) {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(msg);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Message>> {
        self.items.get(index)
    }

    pub fn front_sequence(&self) -> Option<u64> {
        self.items.front().and_then(|m| m.sequence_number)
    }

    pub fn back_sequence(&self) -> Option<u64> {
        self.items.back().and_then(|m| m.sequence_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    fn msg(seq: u64) -> Arc<Message> {
        Arc::new(Message {
            kind: MessageKind::Regular,
            sequence_number: Some(seq),
            ..Message::default()
        })
    }

    #[test]
    fn overflow_evicts_exactly_one_front_entry_per_push() {
        let mut ring = MessageRing::new(3);
        for seq in 1..=3 {
            ring.push(msg(seq));
        }
        assert_eq!(ring.front_sequence(), Some(1));

        ring.push(msg(4));
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.front_sequence(), Some(2));
        assert_eq!(ring.back_sequence(), Some(4));
    }

    #[test]
    fn indexing_follows_insertion_order() {
        let mut ring = MessageRing::new(2);
        ring.push(msg(7));
        ring.push(msg(8));
        assert_eq!(ring.get(0).and_then(|m| m.sequence_number), Some(7));
        assert_eq!(ring.get(1).and_then(|m| m.sequence_number), Some(8));
        assert!(ring.get(2).is_none());
    }
}
