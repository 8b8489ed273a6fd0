//! A lock-guarded double-ended work queue.
//!
//! Items are held in doubly linked nodes that the queue owns outright. Nodes
//! live in slab storage and link to each other by index, so removal never
//! leaves a dangling pointer behind. Every operation, reads included, holds
//! the queue lock for its whole duration.
//!
//! ```
//! use work_queue::WorkQueue;
//!
//! let queue = WorkQueue::new();
//! queue.push_back(1);
//! queue.push_back(2);
//! queue.push_front(0);
//!
//! assert_eq!(queue.len(), 3);
//! assert_eq!(queue.pop_front(), Some(0));
//! assert_eq!(queue.pop_back(), Some(2));
//! assert_eq!(queue.peek_front(), Some(1));
//! ```

use parking_lot::Mutex;

struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Linked storage behind the lock.
struct Links<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    front: Option<usize>,
    back: Option<usize>,
    len: usize,
}

impl<T> Links<T> {
    const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            front: None,
            back: None,
            len: 0,
        }
    }

    fn node(&self, idx: usize) -> &Node<T> {
        match self.nodes.get(idx).and_then(Option::as_ref) {
            Some(node) => node,
            None => unreachable!("work queue link {idx} points at a vacant slot"),
        }
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<T> {
        match self.nodes.get_mut(idx).and_then(Option::as_mut) {
            Some(node) => node,
            None => unreachable!("work queue link {idx} points at a vacant slot"),
        }
    }

    fn alloc(&mut self, node: Node<T>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    /// Take a node out of its slot. Its links go with it.
    fn release(&mut self, idx: usize) -> Node<T> {
        let node = match self.nodes.get_mut(idx).and_then(Option::take) {
            Some(node) => node,
            None => unreachable!("work queue released vacant slot {idx}"),
        };
        self.len -= 1;
        if self.len == 0 {
            self.nodes.clear();
            self.free.clear();
        } else {
            self.free.push(idx);
        }
        node
    }

    fn push_back(&mut self, value: T) {
        let idx = self.alloc(Node {
            value,
            prev: self.back,
            next: None,
        });
        match self.back {
            Some(back) => self.node_mut(back).next = Some(idx),
            None => self.front = Some(idx),
        }
        self.back = Some(idx);
        self.len += 1;
    }

    fn push_front(&mut self, value: T) {
        let idx = self.alloc(Node {
            value,
            prev: None,
            next: self.front,
        });
        match self.front {
            Some(front) => self.node_mut(front).prev = Some(idx),
            None => self.back = Some(idx),
        }
        self.front = Some(idx);
        self.len += 1;
    }

    fn pop_front(&mut self) -> Option<T> {
        let idx = self.front?;
        let node = self.release(idx);
        self.front = node.next;
        match node.next {
            Some(next) => self.node_mut(next).prev = None,
            None => self.back = None,
        }
        Some(node.value)
    }

    fn pop_back(&mut self) -> Option<T> {
        let idx = self.back?;
        let node = self.release(idx);
        self.back = node.prev;
        match node.prev {
            Some(prev) => self.node_mut(prev).next = None,
            None => self.front = None,
        }
        Some(node.value)
    }

    fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let mut cursor = self.front;
        std::iter::from_fn(move || {
            let idx = cursor?;
            let node = self.node(idx);
            cursor = node.next;
            Some(&node.value)
        })
    }

    fn linked_len(&self) -> Option<usize> {
        let mut steps = 0;
        let mut prev = None;
        let mut cursor = self.front;
        while let Some(idx) = cursor {
            let node = self.nodes.get(idx).and_then(Option::as_ref)?;
            if node.prev != prev || steps >= self.len {
                return None;
            }
            steps += 1;
            prev = Some(idx);
            cursor = node.next;
        }
        (prev == self.back && steps == self.len).then_some(steps)
    }
}

/// A thread-safe double-ended queue preserving insertion order.
pub struct WorkQueue<T> {
    inner: Mutex<Links<T>>,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue").field("len", &self.len()).finish()
    }
}

impl<T> WorkQueue<T> {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Links::new()),
        }
    }

    /// Append an item at the back.
    pub fn push_back(&self, item: T) {
        self.inner.lock().push_back(item);
    }

    /// Insert an item at the front.
    pub fn push_front(&self, item: T) {
        self.inner.lock().push_front(item);
    }

    /// Remove the front item, or `None` when the queue is empty.
    pub fn pop_front(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    /// Remove the back item, or `None` when the queue is empty.
    pub fn pop_back(&self) -> Option<T> {
        self.inner.lock().pop_back()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().len == 0
    }

    /// Remove every item, front to back.
    pub fn drain(&self) -> Vec<T> {
        let mut links = self.inner.lock();
        let mut items = Vec::with_capacity(links.len);
        while let Some(item) = links.pop_front() {
            items.push(item);
        }
        items
    }

    /// Walk the links from front to back, verifying every reverse link.
    ///
    /// Returns the number of steps taken, or `None` if the chain is broken or
    /// disagrees with the recorded length.
    pub fn linked_len(&self) -> Option<usize> {
        self.inner.lock().linked_len()
    }
}

impl<T: Clone> WorkQueue<T> {
    /// Clone of the front item without removing it.
    pub fn peek_front(&self) -> Option<T> {
        let links = self.inner.lock();
        links.front.map(|idx| links.node(idx).value.clone())
    }

    /// Clone of the back item without removing it.
    pub fn peek_back(&self) -> Option<T> {
        let links = self.inner.lock();
        links.back.map(|idx| links.node(idx).value.clone())
    }

    /// Clones of all items, front to back.
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy)]
    enum Op {
        PushBack(u32),
        PushFront(u32),
        PopFront,
        PopBack,
    }

    fn apply(queue: &WorkQueue<u32>, model: &mut std::collections::VecDeque<u32>, op: Op) {
        match op {
            Op::PushBack(v) => {
                queue.push_back(v);
                model.push_back(v);
            }
            Op::PushFront(v) => {
                queue.push_front(v);
                model.push_front(v);
            }
            Op::PopFront => assert_eq!(queue.pop_front(), model.pop_front()),
            Op::PopBack => assert_eq!(queue.pop_back(), model.pop_back()),
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = WorkQueue::new();
        for i in 0..5 {
            queue.push_back(i);
        }
        let popped: Vec<_> = std::iter::from_fn(|| queue.pop_front()).collect();
        assert_eq!(popped, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_empty_returns_none() {
        let queue: WorkQueue<u32> = WorkQueue::new();
        assert_eq!(queue.pop_front(), None);
        assert_eq!(queue.pop_back(), None);
        assert_eq!(queue.peek_front(), None);
        assert_eq!(queue.peek_back(), None);
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.linked_len(), Some(0));
    }

    #[test]
    fn test_push_front_on_empty_counts() {
        let queue = WorkQueue::new();
        queue.push_front("a");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek_front(), Some("a"));
        assert_eq!(queue.peek_back(), Some("a"));
    }

    #[test]
    fn test_single_item_clears_both_ends() {
        let queue = WorkQueue::new();
        queue.push_back(7);
        assert_eq!(queue.pop_back(), Some(7));
        assert_eq!(queue.peek_front(), None);
        queue.push_back(8);
        assert_eq!(queue.pop_front(), Some(8));
        assert_eq!(queue.peek_back(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_and_snapshot() {
        let queue = WorkQueue::new();
        queue.push_back(2);
        queue.push_front(1);
        queue.push_back(3);
        assert_eq!(queue.snapshot(), vec![1, 2, 3]);
        assert_eq!(queue.drain(), vec![1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[rstest]
    #[case::alternating(vec![Op::PushBack(1), Op::PushFront(2), Op::PopBack, Op::PushBack(3), Op::PopFront, Op::PopFront, Op::PopFront])]
    #[case::drain_from_back(vec![Op::PushBack(1), Op::PushBack(2), Op::PushBack(3), Op::PopBack, Op::PopBack, Op::PopBack, Op::PushFront(4)])]
    #[case::slot_reuse(vec![Op::PushBack(1), Op::PushBack(2), Op::PopFront, Op::PushFront(3), Op::PushBack(4), Op::PopBack, Op::PopFront, Op::PushBack(5)])]
    fn test_links_stay_consistent(#[case] ops: Vec<Op>) {
        let queue = WorkQueue::new();
        let mut model = std::collections::VecDeque::new();
        for op in ops {
            apply(&queue, &mut model, op);
            assert_eq!(queue.len(), model.len());
            assert_eq!(queue.is_empty(), queue.len() == 0);
            assert_eq!(queue.linked_len(), Some(model.len()));
            assert_eq!(queue.snapshot(), model.iter().copied().collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_pseudo_random_sequence_matches_model() {
        let queue = WorkQueue::new();
        let mut model = std::collections::VecDeque::new();
        let mut seed: u32 = 0x2545_f491;
        for step in 0..2_000u32 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let op = match seed % 4 {
                0 => Op::PushBack(step),
                1 => Op::PushFront(step),
                2 => Op::PopFront,
                _ => Op::PopBack,
            };
            apply(&queue, &mut model, op);
        }
        assert_eq!(queue.linked_len(), Some(model.len()));
    }

    #[test]
    fn test_concurrent_push_back() {
        let queue = Arc::new(WorkQueue::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        queue.push_back(t * 1000 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), 2000);
        assert_eq!(queue.linked_len(), Some(2000));

        // Per-producer order survives interleaving.
        let items = queue.drain();
        for t in 0..8 {
            let mine: Vec<_> = items.iter().filter(|v| **v / 1000 == t).collect();
            assert!(mine.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
