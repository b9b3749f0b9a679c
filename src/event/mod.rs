//! The event-driven scheduler: a min-heap of events keyed by
//! `(time, sequence_number)` with deterministic tie-breaking.

use crate::book::BookLevel;
use crate::types::order::{AgentId, Order, Symbol};
use crate::types::{Money, Trade};
use ordered_float::OrderedFloat;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A freshly-submitted order arriving at the engine gate. Subject to
    /// the single-order-per-tick admission policy (4.2).
    OrderSubmission { order: Order },

    /// A deferred admission slot created by the admission-control policy.
    /// Always admits immediately when it fires; the order's `receive_time`
    /// is preserved from the original submission.
    OrderQueued { order: Order },

    /// Market-data broadcast of one trade to one agent, already delayed by
    /// that agent's sampled latency.
    MarketData { trade: Trade, target: AgentId },

    /// Request to sample the top-N levels of a book. The capture happens
    /// at this event's fire time; delivery is deferred to a
    /// `SnapshotResponse`.
    SnapshotRequest {
        requester: AgentId,
        symbol: Symbol,
        depth: usize,
    },

    /// Delivery of a snapshot captured earlier, at `captured_at`.
    SnapshotResponse {
        requester: AgentId,
        symbol: Symbol,
        captured_at: f64,
        buy_view: Vec<BookLevel>,
        sell_view: Vec<BookLevel>,
    },

    /// A self-scheduled wake-up for agents that act independently of
    /// market-data flow (interval/Poisson traders, snapshot arbitrageurs).
    AgentWakeup { agent: AgentId },

    /// Synthetic broadcast the main loop injects when the queue runs dry,
    /// carrying the book's `last_trade_price` forward so starved agents
    /// still see a tick.
    SyntheticMarketData { symbol: Symbol, price: Money, target: AgentId },
}

impl Event {
    /// Used only for a human-readable invariant-violation message; not part
    /// of scheduling order.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Event::OrderSubmission { .. } => "OrderSubmission",
            Event::OrderQueued { .. } => "OrderQueued",
            Event::MarketData { .. } => "MarketData",
            Event::SnapshotRequest { .. } => "SnapshotRequest",
            Event::SnapshotResponse { .. } => "SnapshotResponse",
            Event::AgentWakeup { .. } => "AgentWakeup",
            Event::SyntheticMarketData { .. } => "SyntheticMarketData",
        }
    }
}

/// One entry in the scheduler's heap: an event paired with its fire time
/// and an admission sequence number that breaks ties deterministically.
#[derive(Clone, Debug)]
struct TimedEvent {
    time: OrderedFloat<f64>,
    seq: u64,
    event: Event,
}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for TimedEvent {}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time).then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-heap of events ordered by `(time, sequence_number)`. No removal
/// except pop-min; stable among equal times because `seq` is assigned at
/// push time in admission order.
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<TimedEvent>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, time: f64, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(TimedEvent {
            time: OrderedFloat(time),
            seq,
            event,
        }));
    }

    pub fn pop(&mut self) -> Option<(f64, Event)> {
        self.heap.pop().map(|Reverse(te)| (te.time.into_inner(), te.event))
    }

    pub fn peek_time(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse(te)| te.time.into_inner())
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::order::Side;

    fn wakeup(agent: AgentId) -> Event {
        Event::AgentWakeup { agent }
    }

    #[test]
    fn pops_in_time_order() {
        let mut q = EventQueue::new();
        q.push(5.0, wakeup(0));
        q.push(1.0, wakeup(1));
        q.push(3.0, wakeup(2));

        let order: Vec<f64> = std::iter::from_fn(|| q.pop().map(|(t, _)| t)).collect();
        assert_eq!(order, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn ties_broken_by_insertion_order() {
        let mut q = EventQueue::new();
        q.push(2.0, wakeup(10));
        q.push(2.0, wakeup(20));
        q.push(2.0, wakeup(30));

        let agents: Vec<AgentId> = std::iter::from_fn(|| {
            q.pop().map(|(_, e)| match e {
                Event::AgentWakeup { agent } => agent,
                _ => unreachable!(),
            })
        })
        .collect();
        assert_eq!(agents, vec![10, 20, 30]);
    }

    #[test]
    fn empty_queue_reports_no_peek() {
        let q = EventQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.peek_time(), None);
    }

    #[test]
    fn order_submission_roundtrips() {
        let mut q = EventQueue::new();
        let order = Order::new(
            1,
            0,
            Side::Buy,
            "A".to_string(),
            10,
            Money::from_f64(50.0),
            1.0,
        );
        q.push(1.5, Event::OrderSubmission { order: order.clone() });
        let (t, e) = q.pop().unwrap();
        assert_eq!(t, 1.5);
        match e {
            Event::OrderSubmission { order: got } => assert_eq!(got.id, order.id),
            _ => panic!("wrong variant"),
        }
    }
}
