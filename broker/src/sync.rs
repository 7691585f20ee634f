use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("queue is closed")]
pub(crate) struct Closed;

/// Bounded blocking FIFO shared between the queue owner and its worker.
///
/// `push` blocks while the queue is full, giving back-pressure to upstream
/// transport reads; `pop` blocks until an item arrives. Closing wakes all
/// waiters with [Closed], which is how the worker learns to terminate.
pub(crate) struct BlockingQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> BlockingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    pub fn push(&self, item: T) -> Result<(), Closed> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(Closed);
            }
            if inner.items.len() < self.capacity {
                break;
            }
            self.not_full.wait(&mut inner);
        }

        inner.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    pub fn pop(&self) -> Result<T, Closed> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(Closed);
            }
            if let Some(item) = inner.items.pop_front() {
                self.not_full.notify_one();
                return Ok(item);
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Non-blocking pop; `None` when nothing is buffered.
    pub fn try_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn reopen(&self) {
        self.inner.lock().closed = false;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn push_pop_preserves_fifo_order() {
        let queue = BlockingQueue::new(4);
        for i in 0..4 {
            queue.push(i).unwrap();
        }
        for i in 0..4 {
            assert_eq!(queue.pop().unwrap(), i);
        }
    }

    #[test]
    fn close_unblocks_a_waiting_pop() {
        let queue = Arc::new(BlockingQueue::<u32>::new(1));
        let popper = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert_eq!(popper.join().unwrap(), Err(Closed));
    }

    #[test]
    fn bounded_push_blocks_until_drained() {
        let queue = Arc::new(BlockingQueue::new(1));
        queue.push(1u32).unwrap();

        let pusher = {
            let queue = queue.clone();
            thread::spawn(move || queue.push(2))
        };

        thread::sleep(Duration::from_millis(20));
        assert_eq!(queue.pop().unwrap(), 1);
        pusher.join().unwrap().unwrap();
        assert_eq!(queue.pop().unwrap(), 2);
    }

    #[test]
    fn reopen_allows_draining_leftovers() {
        let queue = BlockingQueue::new(4);
        queue.push(1u32).unwrap();
        queue.push(2).unwrap();
        queue.close();
        assert_eq!(queue.pop(), Err(Closed));

        queue.reopen();
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), None);
    }
}
