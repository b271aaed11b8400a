//! Inbound event queue.
//!
//! Events are produced by:
//! - the scheduler (periodic sample / publish / reconnect ticks)
//! - transport I/O (inbound messages, connection loss)
//!
//! Events are consumed by the node's core loop, one at a time, in FIFO
//! order.  Producers never touch node state directly; this queue is the
//! only path into the core.
//!
//! A connection loss bypasses the bounded channel: it sets a sticky
//! signal that the consumer sees ahead of any queued event, so a full
//! queue can never swallow it.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Scheduler   │────▶│              │     │              │
//! │ MQTT reader │────▶│  EventQueue  │────▶│  Core loop   │
//! │ Loopback    │────▶│  (bounded)   │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::warn;

use crate::protocol::{Payload, Topic};

/// Maximum number of pending events per node.
pub const EVENT_QUEUE_CAP: usize = 32;

/// Periodic work items posted by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Sensing: read sensors, classify, drive the interlock, emit alerts.
    Sample,
    /// Sensing: publish the latest sample.
    PublishData,
    /// Sensing: refresh the retained status.
    PublishStatus,
    /// Supervisory: push the mirrored state to observers.
    DashboardSync,
    /// Both: let the connection manager attempt a reconnect if due.
    ReconnectCheck,
}

/// Handshake progress reported by a transport whose acknowledgements
/// arrive on its I/O thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportAck {
    /// The broker accepted the session.
    Connected,
    /// The broker refused the session.
    Refused,
    /// One subscription was acknowledged (`true`) or refused.
    Subscribed(bool),
}

/// Everything the core loop reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A scheduled task is due.
    Scheduled(Task),
    /// A message arrived on a subscribed topic.
    Inbound { topic: Topic, payload: Payload },
    /// The transport reported that the broker connection dropped.
    TransportLost,
    /// A pending handshake step completed.
    Ack(TransportAck),
}

impl Event {
    /// Build an inbound event, refusing topics or payloads that exceed the
    /// fixed buffers.
    pub fn inbound(topic: &str, payload: &[u8]) -> Option<Self> {
        let topic = Topic::try_from(topic).ok()?;
        let payload = Payload::from_slice(payload).ok()?;
        Some(Self::Inbound { topic, payload })
    }
}

/// Bounded MPSC queue feeding one node's core loop.
///
/// Shared via `Arc` between the core loop and I/O threads.
pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_CAP>,
    lost: Signal<CriticalSectionRawMutex, ()>,
    overflows: AtomicU32,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            lost: Signal::new(),
            overflows: AtomicU32::new(0),
        }
    }

    /// Post an event.  Returns `false` if the queue is full (event dropped).
    ///
    /// `TransportLost` is never dropped; repeated reports before the
    /// consumer sees one collapse into a single event.
    pub fn post(&self, event: Event) -> bool {
        if event == Event::TransportLost {
            self.lost.signal(());
            return true;
        }
        match self.channel.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                self.overflows.fetch_add(1, Ordering::Relaxed);
                warn!("EVENTS: queue full, event dropped");
                false
            }
        }
    }

    /// Events dropped because the queue was full.
    pub fn overflows(&self) -> u32 {
        self.overflows.load(Ordering::Relaxed)
    }

    /// Forget a pending loss report.  Transports call this when a new
    /// session starts, so a notice about the previous one cannot tear the
    /// new one down.
    pub fn clear_lost(&self) {
        self.lost.reset();
    }

    pub fn is_lost_pending(&self) -> bool {
        self.lost.signaled()
    }

    /// Pop the next event without waiting.  A pending loss comes first.
    pub fn try_next(&self) -> Option<Event> {
        if self.lost.try_take().is_some() {
            return Some(Event::TransportLost);
        }
        self.channel.try_receive().ok()
    }

    /// Wait for the next event.
    pub async fn next(&self) -> Event {
        if let Some(event) = self.try_next() {
            return event;
        }
        future::or(
            async {
                self.lost.wait().await;
                Event::TransportLost
            },
            self.channel.receive(),
        )
        .await
    }

    /// Drain all pending events into a handler, FIFO.
    pub fn drain(&self, mut handler: impl FnMut(Event)) {
        while let Some(event) = self.try_next() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.channel.len() + usize::from(self.is_lost_pending())
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty() && !self.is_lost_pending()
    }
}
