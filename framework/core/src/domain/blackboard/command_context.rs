// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Command Execution Context
//!
//! Unit of work for one top-level board command. The root context owns the
//! event queue; children created for nested sub-commands share the same queue
//! through a handle, so events keep their enqueue order whatever the nesting.
//! Dropping the root discards whatever was not consumed; dropping a child
//! leaves the queue untouched.

use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
pub struct CommandExecutionContext<E> {
    queue: Arc<Mutex<Vec<E>>>,
    depth: usize,
}

impl<E> CommandExecutionContext<E> {
    pub fn root() -> Self {
        Self {
            queue: Arc::new(Mutex::new(Vec::new())),
            depth: 0,
        }
    }

    /// Nested context forwarding to the same queue, one level deeper.
    pub fn child(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            depth: self.depth + 1,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    pub fn enqueue_event(&self, event: E) {
        self.queue.lock().push(event);
    }

    pub fn pending_events(&self) -> usize {
        self.queue.lock().len()
    }

    /// Drain the queue in enqueue order.
    pub fn consume_events(&self) -> Vec<E> {
        std::mem::take(&mut *self.queue.lock())
    }
}

impl<E> Drop for CommandExecutionContext<E> {
    fn drop(&mut self) {
        if self.is_root() {
            self.queue.lock().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_child_forwards_to_root_in_order() {
        let root = CommandExecutionContext::root();
        root.enqueue_event("A");
        root.enqueue_event("B");
        {
            let child = root.child();
            assert_eq!(child.depth(), 1);
            child.enqueue_event("C");
        }
        root.enqueue_event("D");

        assert_eq!(root.consume_events(), vec!["A", "B", "C", "D"]);
        assert_eq!(root.pending_events(), 0);
    }

    #[test]
    fn test_child_drop_keeps_queue() {
        let root = CommandExecutionContext::root();
        let child = root.child();
        let grandchild = child.child();
        assert_eq!(grandchild.depth(), 2);

        grandchild.enqueue_event(1);
        drop(grandchild);
        drop(child);

        assert_eq!(root.pending_events(), 1);
    }

    #[test]
    fn test_root_drop_clears_shared_queue() {
        let root = CommandExecutionContext::root();
        let child = root.child();
        child.enqueue_event(7);
        drop(root);

        assert_eq!(child.pending_events(), 0);
    }

    proptest! {
        #[test]
        fn test_flush_order_matches_enqueue_order(ops in proptest::collection::vec((0usize..4, any::<u32>()), 0..64)) {
            let root = CommandExecutionContext::root();
            let mut contexts = vec![root.child(), root.child().child(), root.child().child().child()];
            let mut expected = Vec::new();

            for (level, value) in ops {
                if level == 0 {
                    root.enqueue_event(value);
                } else {
                    contexts[level - 1].enqueue_event(value);
                }
                expected.push(value);
            }
            contexts.clear();

            prop_assert_eq!(root.consume_events(), expected);
        }
    }
}
