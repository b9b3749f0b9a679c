//! Order identity and the mutable residual state that a resting order
//! carries inside a book.

use crate::types::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type OrderId = u64;

/// Index of an agent inside `Simulation`'s agent arena. Orders, trades and
/// event payloads all address agents through this stable index rather than
/// a pointer, so the agent list can be iterated deterministically and never
/// forms a reference cycle.
pub type AgentId = usize;

pub type Symbol = String;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Monotonic, `Simulation`-owned minter of order ids. Never a process-global
/// atomic counter: two independently constructed `Simulation`s in the same
/// process must not observe each other's ids, or determinism across
/// independent runs would depend on launch order.
#[derive(Debug, Default)]
pub struct IdCounter(OrderId);

impl IdCounter {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next(&mut self) -> OrderId {
        let current = self.0;
        self.0 += 1;
        current
    }
}

/// A limit order. Immutable identity (`id`, `owner`, `side`, `symbol`,
/// `is_cancel`), mutable residual amount while resident in a book.
#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub owner: AgentId,
    pub side: Side,
    pub symbol: Symbol,
    pub residual_amount: u64,
    pub price: Money,
    pub submit_time: f64,
    pub receive_time: f64,
    pub process_time: f64,
    pub is_cancel: bool,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OrderId,
        owner: AgentId,
        side: Side,
        symbol: Symbol,
        residual_amount: u64,
        price: Money,
        submit_time: f64,
    ) -> Self {
        Order {
            id,
            owner,
            side,
            symbol,
            residual_amount,
            price,
            submit_time,
            receive_time: submit_time,
            process_time: submit_time,
            is_cancel: false,
        }
    }

    /// Mint a cancel order targeting `target_id`. Per the data model, a
    /// cancel order reuses the id of the order it targets rather than
    /// minting a fresh one, and carries zero amount/price.
    pub fn cancel_of(target_id: OrderId, owner: AgentId, symbol: Symbol, submit_time: f64) -> Self {
        Order {
            id: target_id,
            owner,
            side: Side::Buy,
            symbol,
            residual_amount: 0,
            price: Money::ZERO,
            submit_time,
            receive_time: submit_time,
            process_time: submit_time,
            is_cancel: true,
        }
    }

    pub fn is_fully_filled(&self) -> bool {
        self.residual_amount == 0
    }
}
