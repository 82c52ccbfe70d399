//! Hand-off queue between the parsing worker and the reader.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Rows the consumer waits for before being woken.
pub(crate) const NOTIFY_SIZE: usize = 100;

struct State<T> {
    items: VecDeque<T>,
    waitable: bool,
}

/// A deque guarded by one mutex. The producer marks itself active with
/// [`RowQueue::notify_all`] and finished with [`RowQueue::kill_all`];
/// [`RowQueue::wait`] only blocks while a producer is active.
pub(crate) struct RowQueue<T> {
    state: Mutex<State<T>>,
    cond: Condvar,
    notify_size: usize,
}

impl<T> RowQueue<T> {
    pub(crate) fn new(notify_size: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                waitable: false,
            }),
            cond: Condvar::new(),
            notify_size,
        }
    }

    // A panicking worker must not wedge the reader, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append all of `items` under a single lock.
    pub(crate) fn extend(&self, items: impl IntoIterator<Item = T>) {
        let mut state = self.lock();
        state.items.extend(items);
        if state.items.len() >= self.notify_size {
            self.cond.notify_all();
        }
    }

    pub(crate) fn pop_front(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub(crate) fn is_waitable(&self) -> bool {
        self.lock().waitable
    }

    /// Block until enough items are queued or the producer finishes.
    pub(crate) fn wait(&self) {
        let state = self.lock();
        if !state.waitable {
            return;
        }
        let _state = self
            .cond
            .wait_while(state, |s| s.items.len() < self.notify_size && s.waitable)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Mark the producer active.
    pub(crate) fn notify_all(&self) {
        self.lock().waitable = true;
        self.cond.notify_all();
    }

    /// Mark the producer finished and wake every waiter.
    pub(crate) fn kill_all(&self) {
        self.lock().waitable = false;
        self.cond.notify_all();
    }
}
