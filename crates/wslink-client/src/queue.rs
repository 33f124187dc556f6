//! Outbound queue: envelopes waiting for a connection.
//!
//! Appended at the tail, drained from the head in arrival order. Bounded by
//! `queue_capacity`; what happens on overflow is the configured
//! [`QueueOverflow`] policy.

use std::collections::VecDeque;

use wslink_core::error::{Result, WsLinkError};
use wslink_core::protocol::Envelope;

use crate::config::QueueOverflow;

#[derive(Debug)]
pub struct OutboundQueue {
    items: VecDeque<Envelope>,
    capacity: usize,
    overflow: QueueOverflow,
}

impl OutboundQueue {
    pub fn new(capacity: usize, overflow: QueueOverflow) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
            overflow,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append at the tail. Returns the evicted head under `DropOldest`.
    pub fn push(&mut self, env: Envelope) -> Result<Option<Envelope>> {
        let mut evicted = None;
        if self.items.len() >= self.capacity {
            match self.overflow {
                QueueOverflow::DropOldest => evicted = self.items.pop_front(),
                QueueOverflow::RejectNew => {
                    return Err(WsLinkError::QueueFull {
                        capacity: self.capacity,
                    })
                }
            }
        }
        self.items.push_back(env);
        Ok(evicted)
    }

    /// Take everything, head first.
    pub fn take_all(&mut self) -> VecDeque<Envelope> {
        std::mem::take(&mut self.items)
    }

    /// Put unsent envelopes back at the head, keeping their order.
    pub fn restore(&mut self, unsent: VecDeque<Envelope>) {
        for env in unsent.into_iter().rev() {
            self.items.push_front(env);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use wslink_core::protocol::{ChatData, Payload};

    fn text_of(env: &Envelope) -> &str {
        match &env.payload {
            Payload::Chat(ChatData::Text(t)) => t,
            _ => "",
        }
    }

    fn texts(q: &mut OutboundQueue) -> Vec<String> {
        q.take_all().iter().map(|e| text_of(e).to_owned()).collect()
    }

    #[test]
    fn fifo_order() {
        let mut q = OutboundQueue::new(10, QueueOverflow::DropOldest);
        for t in ["a", "b", "c"] {
            assert!(q.push(Envelope::chat(t)).unwrap().is_none());
        }
        assert_eq!(q.len(), 3);
        assert_eq!(texts(&mut q), vec!["a", "b", "c"]);
        assert!(q.is_empty());
    }

    #[test]
    fn drop_oldest_evicts_head() {
        let mut q = OutboundQueue::new(2, QueueOverflow::DropOldest);
        q.push(Envelope::chat("a")).unwrap();
        q.push(Envelope::chat("b")).unwrap();
        let evicted = q.push(Envelope::chat("c")).unwrap().unwrap();
        assert_eq!(text_of(&evicted), "a");
        assert_eq!(texts(&mut q), vec!["b", "c"]);
    }

    #[test]
    fn reject_new_keeps_existing() {
        let mut q = OutboundQueue::new(1, QueueOverflow::RejectNew);
        q.push(Envelope::chat("a")).unwrap();
        let err = q.push(Envelope::chat("b")).unwrap_err();
        assert_eq!(err, WsLinkError::QueueFull { capacity: 1 });
        assert_eq!(texts(&mut q), vec!["a"]);
    }

    #[test]
    fn restore_goes_before_newer_items() {
        let mut q = OutboundQueue::new(10, QueueOverflow::DropOldest);
        q.push(Envelope::chat("a")).unwrap();
        q.push(Envelope::chat("b")).unwrap();
        let mut pending = q.take_all();
        pending.pop_front();
        q.push(Envelope::chat("c")).unwrap();
        q.restore(pending);
        assert_eq!(texts(&mut q), vec!["b", "c"]);
    }
}
