//! Inbound event queue bridging transport callbacks to the poll loop.
//!
//! [`inbound_queue`] returns a producer half ([`EventSink`]) that transport
//! callbacks push into from any thread, and a consumer half
//! ([`InboundQueue`]) that the host drains one event per call without ever
//! blocking. Both halves wrap a tokio unbounded MPSC channel, which needs no
//! runtime for `send` / `try_recv`.
//!
//! The queue is unbounded. A host that stops polling while the peer keeps
//! sending will grow it without limit; draining is the caller's job.

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::debug;

use crate::event::InboundEvent;

/// Create an empty inbound queue.
pub fn inbound_queue() -> (EventSink, InboundQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, InboundQueue { rx })
}

/// Producer half of the inbound queue.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<InboundEvent>,
}

impl EventSink {
    /// Append an event to the tail of the queue.
    ///
    /// Never blocks. If the consumer half has been dropped the event is
    /// discarded.
    pub fn enqueue(&self, event: InboundEvent) {
        if self.tx.send(event).is_err() {
            debug!("inbound queue closed, consumer dropped");
        }
    }
}

/// Consumer half of the inbound queue.
#[derive(Debug)]
pub struct InboundQueue {
    rx: mpsc::UnboundedReceiver<InboundEvent>,
}

impl InboundQueue {
    /// Remove and return the oldest queued event, or `None` if the queue is empty.
    pub fn try_dequeue(&mut self) -> Option<InboundEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            // The controller holds a sink for as long as the queue lives, so
            // disconnection only happens during teardown.
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::event::Payload;

    fn error(description: &str) -> InboundEvent {
        InboundEvent::TransportError {
            description: description.into(),
        }
    }

    #[test]
    fn empty_queue_returns_none() {
        let (_sink, mut queue) = inbound_queue();
        assert!(queue.try_dequeue().is_none());
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn dequeues_in_arrival_order() {
        let (sink, mut queue) = inbound_queue();
        let events = vec![
            InboundEvent::from(Payload::from("one")),
            error("boom"),
            InboundEvent::from(Payload::from(vec![2u8])),
            InboundEvent::from(Payload::from("three")),
        ];
        for event in &events {
            sink.enqueue(event.clone());
        }

        for expected in events {
            assert_eq!(queue.try_dequeue(), Some(expected));
        }
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn identical_events_are_not_coalesced() {
        let (sink, mut queue) = inbound_queue();
        sink.enqueue(error("same"));
        sink.enqueue(error("same"));

        assert_eq!(queue.try_dequeue(), Some(error("same")));
        assert_eq!(queue.try_dequeue(), Some(error("same")));
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn enqueue_after_consumer_dropped_does_not_panic() {
        let (sink, queue) = inbound_queue();
        drop(queue);
        sink.enqueue(error("late"));
    }

    #[test]
    fn cloned_sinks_feed_one_queue() {
        let (sink, mut queue) = inbound_queue();
        let other = sink.clone();
        sink.enqueue(InboundEvent::from(Payload::from("a")));
        other.enqueue(InboundEvent::from(Payload::from("b")));

        assert_eq!(
            queue.try_dequeue().unwrap().payload().unwrap().as_text(),
            Some("a")
        );
        assert_eq!(
            queue.try_dequeue().unwrap().payload().unwrap().as_text(),
            Some("b")
        );
    }

    #[test]
    fn concurrent_producer_preserves_order() {
        const COUNT: usize = 10_000;
        let (sink, mut queue) = inbound_queue();

        let producer = std::thread::spawn(move || {
            for i in 0..COUNT {
                sink.enqueue(InboundEvent::from(Payload::Text(i.to_string())));
            }
        });

        let mut received = Vec::with_capacity(COUNT);
        while received.len() < COUNT {
            match queue.try_dequeue() {
                Some(event) => received.push(event),
                None => std::thread::yield_now(),
            }
        }
        producer.join().unwrap();

        for (i, event) in received.iter().enumerate() {
            assert_eq!(
                event.payload().unwrap().as_text(),
                Some(i.to_string().as_str())
            );
        }
        assert!(queue.try_dequeue().is_none());
    }
}
