//! Bounded outbound queue held while a connection is not `Ready` (§3, §4.6).
//!
//! Two priority classes: `Control` frames (ping, initialize,
//! notifications/initialized, cancellation) always drain before `User`
//! frames. Only the `User` class is bounded; overflow drops the oldest
//! `User` entry.

use std::collections::VecDeque;

use crate::message::{Message, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Control,
    User,
}

pub struct QueuedMessage {
    pub message: Message,
    pub priority: Priority,
}

pub struct OutboundQueue {
    control: VecDeque<QueuedMessage>,
    user: VecDeque<QueuedMessage>,
    user_max: usize,
}

/// Returned when `push` must drop an existing entry to make room.
pub struct Overflowed {
    pub id: Option<RequestId>,
}

impl OutboundQueue {
    pub fn new(user_max: usize) -> Self {
        Self {
            control: VecDeque::new(),
            user: VecDeque::new(),
            user_max,
        }
    }

    /// Enqueue a message, returning the id of a dropped user entry if the
    /// `User` class overflowed.
    pub fn push(&mut self, message: Message, priority: Priority) -> Option<Overflowed> {
        match priority {
            Priority::Control => {
                self.control.push_back(QueuedMessage { message, priority });
                None
            }
            Priority::User => {
                let mut dropped = None;
                if self.user.len() >= self.user_max {
                    if let Some(old) = self.user.pop_front() {
                        dropped = Some(Overflowed {
                            id: old.message.id().cloned(),
                        });
                    }
                }
                self.user.push_back(QueuedMessage { message, priority });
                dropped
            }
        }
    }

    /// Push to the front of the `Control` class (used to re-queue an
    /// idempotent in-flight call ahead of newly enqueued control frames).
    pub fn push_front_control(&mut self, message: Message) {
        self.control.push_front(QueuedMessage {
            message,
            priority: Priority::Control,
        });
    }

    /// Drain the queue in flush order: all control frames first (FIFO),
    /// then all user frames (FIFO).
    pub fn drain(&mut self) -> Vec<QueuedMessage> {
        let mut out: Vec<QueuedMessage> = self.control.drain(..).collect();
        out.extend(self.user.drain(..));
        out
    }

    pub fn is_empty(&self) -> bool {
        self.control.is_empty() && self.user.is_empty()
    }

    pub fn user_len(&self) -> usize {
        self.user.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notif(method: &str) -> Message {
        Message::notification(method, None)
    }

    #[test]
    fn control_drains_before_user() {
        let mut q = OutboundQueue::new(10);
        q.push(notif("user_call_1"), Priority::User);
        q.push(notif("initialize"), Priority::Control);
        q.push(notif("user_call_2"), Priority::User);

        let drained = q.drain();
        let methods: Vec<_> = drained.iter().map(|m| m.message.method().unwrap()).collect();
        assert_eq!(methods, vec!["initialize", "user_call_1", "user_call_2"]);
    }

    #[test]
    fn overflow_drops_oldest_user_entry() {
        let mut q = OutboundQueue::new(2);
        assert!(q.push(notif("a"), Priority::User).is_none());
        assert!(q.push(notif("b"), Priority::User).is_none());
        let overflow = q.push(notif("c"), Priority::User);
        assert!(overflow.is_some());

        let drained = q.drain();
        let methods: Vec<_> = drained.iter().map(|m| m.message.method().unwrap()).collect();
        assert_eq!(methods, vec!["b", "c"]);
    }

    #[test]
    fn control_class_is_unbounded() {
        let mut q = OutboundQueue::new(1);
        for i in 0..50 {
            assert!(q.push(notif(&format!("ctl{i}")), Priority::Control).is_none());
        }
        assert_eq!(q.drain().len(), 50);
    }

    proptest::proptest! {
        /// Whatever the bound and however many `User` entries are pushed,
        /// what survives to drain is exactly the last `user_max` pushed, in
        /// the order they were pushed (FIFO-with-overflow, §4.6).
        #[test]
        fn overflow_keeps_last_n_in_fifo_order(
            user_max in 1_usize..20,
            push_count in 0_usize..200,
        ) {
            let mut q = OutboundQueue::new(user_max);
            for i in 0..push_count {
                q.push(notif(&format!("{i}")), Priority::User);
            }
            let drained = q.drain();
            let methods: Vec<usize> = drained
                .iter()
                .map(|m| m.message.method().unwrap().parse().unwrap())
                .collect();

            let expected_len = push_count.min(user_max);
            proptest::prop_assert_eq!(methods.len(), expected_len);
            let expected: Vec<usize> = (push_count.saturating_sub(expected_len)..push_count).collect();
            proptest::prop_assert_eq!(methods, expected);
        }

        /// `Control` frames are never dropped and always drain strictly
        /// before any `User` frame, regardless of interleaving.
        #[test]
        fn control_always_precedes_user_and_is_never_dropped(
            user_max in 1_usize..10,
            control_count in 0_usize..50,
            user_count in 0_usize..50,
        ) {
            let mut q = OutboundQueue::new(user_max);
            for i in 0..control_count {
                proptest::prop_assert!(q.push(notif(&format!("c{i}")), Priority::Control).is_none());
            }
            for i in 0..user_count {
                q.push(notif(&format!("u{i}")), Priority::User);
            }
            let drained = q.drain();
            let methods: Vec<_> = drained.iter().map(|m| m.message.method().unwrap().to_string()).collect();
            let control_prefix = methods.iter().take_while(|m| m.starts_with('c')).count();
            proptest::prop_assert_eq!(control_prefix, control_count);
        }
    }
}
