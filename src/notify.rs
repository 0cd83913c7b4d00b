//! Bounded one-to-many event dispatch from the arena to websocket consumers.
//!
//! Producers never block: a subscriber that stops draining its buffer loses
//! frames until it catches up, and a dropped subscription is forgotten on the
//! next dispatch. Consumers reconcile through the producer-backed initial
//! frame they receive on (re)connect.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

/// Frames buffered per subscriber before drops begin.
const SUBSCRIBER_BUFFER: usize = 3;

/// One topic frame as it appears on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct EventFrame {
    /// Topic name, serialized as the `type` field of the envelope.
    #[serde(rename = "type")]
    pub topic: &'static str,
    /// Topic-specific payload.
    pub data: Value,
}

type Producer = Box<dyn Fn() -> Option<Value> + Send + Sync>;

/// Single-topic event channel with per-subscriber bounded buffers.
pub struct Notifier {
    topic: &'static str,
    subscribers: Mutex<Vec<mpsc::Sender<EventFrame>>>,
    producer: Option<Producer>,
}

impl Notifier {
    /// Create a fire-only notifier with no replayable state.
    pub fn new(topic: &'static str) -> Self {
        Self {
            topic,
            subscribers: Mutex::new(Vec::new()),
            producer: None,
        }
    }

    /// Create a notifier whose current payload can be rebuilt on demand.
    ///
    /// The producer runs on subscriber tasks, never on the arena tick; it must
    /// not take any lock the tick loop holds for the duration of a tick.
    pub fn with_producer(
        topic: &'static str,
        producer: impl Fn() -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            topic,
            subscribers: Mutex::new(Vec::new()),
            producer: Some(Box::new(producer)),
        }
    }

    /// The topic this notifier carries.
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Register a new subscriber.
    pub fn listen(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.lock_subscribers().push(tx);
        Subscription {
            topic: self.topic,
            receiver: rx,
        }
    }

    /// Dispatch the producer's current payload to every subscriber.
    pub fn notify(&self) {
        let data = match self.message() {
            Some(data) => data,
            None if self.producer.is_some() => return,
            None => Value::Null,
        };
        self.dispatch(EventFrame {
            topic: self.topic,
            data,
        });
    }

    /// Dispatch an explicit payload to every subscriber.
    pub fn notify_with(&self, data: Value) {
        self.dispatch(EventFrame {
            topic: self.topic,
            data,
        });
    }

    /// The current replayable payload, when this notifier has one.
    pub fn message(&self) -> Option<Value> {
        self.producer.as_ref().and_then(|producer| producer())
    }

    /// A frame carrying the current payload, for replay to a new subscriber.
    pub fn initial_frame(&self) -> Option<EventFrame> {
        self.message().map(|data| EventFrame {
            topic: self.topic,
            data,
        })
    }

    fn dispatch(&self, frame: EventFrame) {
        let topic = self.topic;
        self.lock_subscribers().retain(|tx| {
            match tx.try_send(frame.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Slow consumer: drop this frame for it rather than stall
                    // the producer. It reconciles from the next full payload.
                    warn!(topic, "subscriber buffer full; dropping frame");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::Sender<EventFrame>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }
}

/// Receiving side of a [`Notifier`]; dropped subscriptions are reaped lazily.
pub struct Subscription {
    topic: &'static str,
    receiver: mpsc::Receiver<EventFrame>,
}

impl Subscription {
    /// The topic this subscription belongs to.
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Wait for the next frame; `None` when the notifier is gone.
    pub async fn recv(&mut self) -> Option<EventFrame> {
        self.receiver.recv().await
    }

    /// Take a buffered frame without waiting.
    pub fn try_recv(&mut self) -> Option<EventFrame> {
        self.receiver.try_recv().ok()
    }

    /// Adapt the subscription into a stream for merged consumption.
    pub fn into_stream(self) -> ReceiverStream<EventFrame> {
        ReceiverStream::new(self.receiver)
    }
}
