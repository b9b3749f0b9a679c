//! The matching engine: two price-time-priority heaps per symbol.
//!
//! Cancellation uses an auxiliary `id -> Order` index (`resident`) with lazy
//! tombstoning rather than a linear heap scan: a cancel simply removes the
//! id from `resident`. Stale or tombstoned heap entries are discarded the
//! next time they reach the top of a heap, whether that happens during
//! matching or during a read-only peek (per the redesign notes on
//! heap-based cancellation and snapshot capture).

use crate::error::SimError;
use crate::types::money::Money;
use crate::types::order::{Order, OrderId, Side, Symbol};
use crate::types::trade::Trade;
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// One resting order as it sits on the buy side: higher price first, then
/// earlier `receive_time` first.
#[derive(Clone, Debug)]
struct BuyEntry(Order);

impl PartialEq for BuyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id && self.0.residual_amount == other.0.residual_amount
    }
}
impl Eq for BuyEntry {}
impl PartialOrd for BuyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for BuyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .price
            .cmp(&other.0.price)
            .then_with(|| OrderedFloat(other.0.receive_time).cmp(&OrderedFloat(self.0.receive_time)))
    }
}

/// One resting order as it sits on the sell side: lower price first, then
/// earlier `receive_time` first.
#[derive(Clone, Debug)]
struct SellEntry(Order);

impl PartialEq for SellEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id && self.0.residual_amount == other.0.residual_amount
    }
}
impl Eq for SellEntry {}
impl PartialOrd for SellEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for SellEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .price
            .cmp(&self.0.price)
            .then_with(|| OrderedFloat(other.0.receive_time).cmp(&OrderedFloat(self.0.receive_time)))
    }
}

/// Market-only state captured immediately after an admission, before any
/// per-agent fields (which the book has no access to) are joined in by the
/// caller to build a full `DataPoint`.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketSnapshot {
    pub time: f64,
    pub last_trade_price: Money,
    pub book_size: u64,
    /// best_sell - best_buy, or -1.0 if either side is empty.
    pub gap: f64,
    pub queue_size: f64,
}

/// A top-N price level exposed by a snapshot query: residual quantity
/// aggregated across every resident order at that price.
#[derive(Clone, Debug, PartialEq)]
pub struct BookLevel {
    pub price: Money,
    pub quantity: u64,
}

/// One `(Trades, MarketSnapshot)` admission result.
pub struct AdmitOutcome {
    pub trades: Vec<Trade>,
    /// `None` for a cancel admission; cancels never produce a data point.
    pub market_snapshot: Option<MarketSnapshot>,
    /// For a cancel admission only: the resident order that was actually
    /// removed, or `None` if the target id was not found (already filled
    /// or already canceled — a silent no-op, not an error). Always `None`
    /// for a non-cancel admission.
    pub canceled: Option<Order>,
}

pub struct OrderBook {
    symbol: Symbol,
    buy_heap: BinaryHeap<BuyEntry>,
    sell_heap: BinaryHeap<SellEntry>,
    /// Authoritative current state of every resident order, keyed by id.
    /// Absence means canceled, fully filled, or never admitted.
    resident: HashMap<OrderId, Order>,
    buy_total_qty: u64,
    sell_total_qty: u64,
    pub last_trade_price: Money,
    pub last_order_service_time: f64,
    pub last_unqueue_time: f64,
    pub trades: Vec<Trade>,
    pub data_points: Vec<crate::output::DataPoint>,
}

impl OrderBook {
    pub fn new(symbol: impl Into<Symbol>, starting_price: Money) -> Self {
        OrderBook {
            symbol: symbol.into(),
            buy_heap: BinaryHeap::new(),
            sell_heap: BinaryHeap::new(),
            resident: HashMap::new(),
            buy_total_qty: 0,
            sell_total_qty: 0,
            last_trade_price: starting_price,
            last_order_service_time: f64::NEG_INFINITY,
            last_unqueue_time: 0.0,
            trades: Vec::new(),
            data_points: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Attempt to match `order`, inserting whatever residual remains. Fatal
    /// programming errors (non-positive residual/price on a non-cancel
    /// order) are reported rather than silently tolerated.
    pub fn admit(&mut self, mut order: Order) -> Result<AdmitOutcome, SimError> {
        if order.is_cancel {
            let canceled = self.cancel(order.id);
            self.last_unqueue_time = order.receive_time;
            return Ok(AdmitOutcome {
                trades: Vec::new(),
                market_snapshot: None,
                canceled,
            });
        }

        if order.residual_amount == 0 {
            return Err(SimError::invariant(format!(
                "admit called with zero residual for order {}",
                order.id
            )));
        }
        if !order.price.is_positive() {
            return Err(SimError::invariant(format!(
                "admit called with non-positive price for order {}",
                order.id
            )));
        }

        let mut trades = Vec::new();
        while order.residual_amount > 0 {
            let opposite = order.side.opposite();
            let Some(mut counter) = self.pop_live(opposite) else {
                break;
            };

            let crosses = match order.side {
                Side::Buy => order.price >= counter.price,
                Side::Sell => order.price <= counter.price,
            };
            if !crosses {
                self.push_into_book(counter);
                break;
            }

            let fill = order.residual_amount.min(counter.residual_amount);
            let trade_time = order.process_time.max(counter.process_time);
            let (buy_order_id, sell_order_id, buyer, seller) = match order.side {
                Side::Buy => (order.id, counter.id, order.owner, counter.owner),
                Side::Sell => (counter.id, order.id, counter.owner, order.owner),
            };
            let trade = Trade::new(
                buyer,
                seller,
                buy_order_id,
                sell_order_id,
                counter.price,
                self.symbol.clone(),
                fill,
                trade_time,
            );
            self.last_trade_price = counter.price;
            trades.push(trade);

            order.residual_amount -= fill;
            counter.residual_amount -= fill;

            if counter.residual_amount > 0 {
                self.push_into_book(counter);
            }
        }

        if order.residual_amount > 0 {
            self.push_into_book(order.clone());
        }

        self.assert_non_crossed()?;

        let queue_size = order.process_time - self.last_unqueue_time;
        let gap = self.gap();
        let snapshot = MarketSnapshot {
            time: order.process_time,
            last_trade_price: self.last_trade_price,
            book_size: self.buy_total_qty + self.sell_total_qty,
            gap,
            queue_size,
        };
        self.last_unqueue_time = order.receive_time;
        self.trades.extend(trades.iter().cloned());

        Ok(AdmitOutcome {
            trades,
            market_snapshot: Some(snapshot),
            canceled: None,
        })
    }

    /// Residual amount still resting for `order_id`, or `None` if it has
    /// been fully filled, canceled, or was never admitted. Used by
    /// `Simulation` to tell whether one side of a trade fully consumed a
    /// resting order (so it can stop tracking it as live for that order's
    /// owner).
    pub fn residual_of(&self, order_id: OrderId) -> Option<u64> {
        self.resident.get(&order_id).map(|o| o.residual_amount)
    }

    /// Remove any resident entry with this id. Silently a no-op if it has
    /// already filled or been canceled. Returns the removed order (for the
    /// caller to credit its owner's cancellation counter with the residual
    /// that was pulled off the book).
    pub fn cancel(&mut self, order_id: OrderId) -> Option<Order> {
        let removed = self.resident.remove(&order_id)?;
        match removed.side {
            Side::Buy => self.buy_total_qty -= removed.residual_amount,
            Side::Sell => self.sell_total_qty -= removed.residual_amount,
        }
        Some(removed)
    }

    pub fn record_data_point(&mut self, dp: crate::output::DataPoint) {
        self.data_points.push(dp);
    }

    pub fn best_buy_price(&mut self) -> Option<Money> {
        self.peek_best(Side::Buy)
    }

    pub fn best_sell_price(&mut self) -> Option<Money> {
        self.peek_best(Side::Sell)
    }

    pub fn total_residual(&self) -> u64 {
        self.buy_total_qty + self.sell_total_qty
    }

    /// Top-N resident price levels on one side, without disturbing which
    /// orders are resident (dead heap ghosts encountered along the way are
    /// permanently discarded, but every live order peeked at is pushed
    /// back unchanged).
    pub fn peek_top_n(&mut self, side: Side, n: usize) -> Vec<BookLevel> {
        let mut popped_orders = Vec::new();
        let mut levels: Vec<BookLevel> = Vec::new();

        loop {
            if levels.len() >= n {
                break;
            }
            let Some(candidate) = self.pop_raw(side) else {
                break;
            };
            match self.resident.get(&candidate.id) {
                Some(current) if current.residual_amount == candidate.residual_amount => {
                    if let Some(last) = levels.last_mut() {
                        if last.price == candidate.price {
                            last.quantity += candidate.residual_amount;
                            popped_orders.push(candidate);
                            continue;
                        }
                    }
                    levels.push(BookLevel {
                        price: candidate.price,
                        quantity: candidate.residual_amount,
                    });
                    popped_orders.push(candidate);
                }
                _ => continue,
            }
        }

        for order in popped_orders {
            self.push_raw(side, order);
        }
        levels
    }

    fn gap(&mut self) -> f64 {
        match (self.best_sell_price(), self.best_buy_price()) {
            (Some(sell), Some(buy)) => sell.to_f64() - buy.to_f64(),
            _ => -1.0,
        }
    }

    fn assert_non_crossed(&mut self) -> Result<(), SimError> {
        if let (Some(sell), Some(buy)) = (self.best_sell_price(), self.best_buy_price()) {
            if sell < buy {
                return Err(SimError::invariant(format!(
                    "book {} crossed: best_sell {} < best_buy {}",
                    self.symbol, sell, buy
                )));
            }
        }
        Ok(())
    }

    /// Pop the best live order from one side, removing it from `resident`
    /// (the caller is responsible for reinserting it via
    /// `push_into_book`/`push_raw` if it should remain resting). Stale or
    /// tombstoned heap ghosts are discarded permanently along the way.
    fn pop_live(&mut self, side: Side) -> Option<Order> {
        loop {
            let candidate = self.pop_raw(side)?;
            match self.resident.get(&candidate.id) {
                Some(current) if current.residual_amount == candidate.residual_amount => {
                    self.resident.remove(&candidate.id);
                    match side {
                        Side::Buy => self.buy_total_qty -= candidate.residual_amount,
                        Side::Sell => self.sell_total_qty -= candidate.residual_amount,
                    }
                    return Some(candidate);
                }
                _ => continue,
            }
        }
    }

    fn pop_raw(&mut self, side: Side) -> Option<Order> {
        match side {
            Side::Buy => self.buy_heap.pop().map(|e| e.0),
            Side::Sell => self.sell_heap.pop().map(|e| e.0),
        }
    }

    /// Push `order` into the heap and (re-)establish it as the
    /// authoritative resident state for its id.
    fn push_into_book(&mut self, order: Order) {
        match order.side {
            Side::Buy => self.buy_total_qty += order.residual_amount,
            Side::Sell => self.sell_total_qty += order.residual_amount,
        }
        self.resident.insert(order.id, order.clone());
        self.push_raw(order.side, order);
    }

    /// Push an already-resident order back into its heap without touching
    /// `resident` or the running totals (used when peeking/snapshotting).
    fn push_raw(&mut self, side: Side, order: Order) {
        match side {
            Side::Buy => self.buy_heap.push(BuyEntry(order)),
            Side::Sell => self.sell_heap.push(SellEntry(order)),
        }
    }
}
