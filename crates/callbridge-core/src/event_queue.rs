use std::collections::VecDeque;
use std::sync::Mutex;

/// Mutex-guarded FIFO used by each producer thread to hand events to the
/// dispatcher. `push` never blocks and never fails; `try_pop` returns `None`
/// rather than blocking when empty. No size limit is imposed.
pub struct EventQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, value: T) {
        let mut q = self.inner.lock().unwrap();
        q.push_back(value);
    }

    pub fn try_pop(&self) -> Option<T> {
        let mut q = self.inner.lock().unwrap();
        q.pop_front()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_preserved() {
        let q: EventQueue<i32> = EventQueue::new();
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn pop_on_empty_never_blocks() {
        let q: EventQueue<i32> = EventQueue::new();
        assert_eq!(q.try_pop(), None);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn push_from_many_threads_preserves_all_items() {
        use std::sync::Arc;
        use std::thread;

        let q = Arc::new(EventQueue::<i32>::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let q = q.clone();
            handles.push(thread::spawn(move || {
                for i in 0..25 {
                    q.push(t * 100 + i);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(q.len(), 100);
    }
}
