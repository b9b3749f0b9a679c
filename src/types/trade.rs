//! A single fill between two resting/incoming orders.

use crate::agent::AgentRecord;
use crate::error::SimError;
use crate::types::money::Money;
use crate::types::order::{AgentId, OrderId, Side, Symbol};

/// Record of a fill. Transfers `amount` shares seller -> buyer and
/// `amount * price` cash buyer -> seller when `process` is called, exactly
/// once.
#[derive(Clone, Debug, PartialEq)]
pub struct Trade {
    pub buyer: AgentId,
    pub seller: AgentId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub price: Money,
    pub symbol: Symbol,
    pub amount: u64,
    pub time: f64,
    pub completed: bool,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        buyer: AgentId,
        seller: AgentId,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        price: Money,
        symbol: Symbol,
        amount: u64,
        time: f64,
    ) -> Self {
        Trade {
            buyer,
            seller,
            buy_order_id,
            sell_order_id,
            price,
            symbol,
            amount,
            time,
            completed: false,
        }
    }

    /// Apply the cash/share transfer to both parties and latch `completed`.
    /// Calling this on an already-completed trade is a programming error.
    pub fn process(&mut self, agents: &mut [AgentRecord]) -> Result<(), SimError> {
        if self.completed {
            return Err(SimError::invariant(format!(
                "trade {}x{} between orders {}/{} processed twice",
                self.amount, self.price, self.buy_order_id, self.sell_order_id
            )));
        }
        if self.amount == 0 {
            return Err(SimError::invariant("trade with zero amount"));
        }

        let buyer_group = agents[self.buyer].group_name.clone();
        let seller_group = agents[self.seller].group_name.clone();

        // Buyer and seller may be the same agent (self-trade): apply the two
        // fills one at a time rather than borrowing both sides at once, so
        // there's never a need for two simultaneous mutable borrows.
        agents[self.buyer].apply_fill(Side::Buy, &self.symbol, self.amount, self.price, &seller_group);
        agents[self.seller].apply_fill(Side::Sell, &self.symbol, self.amount, self.price, &buyer_group);

        self.completed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::plain_agent;

    #[test]
    fn process_transfers_cash_and_shares() {
        let mut agents = vec![plain_agent("buyer"), plain_agent("seller")];
        agents[0].balance = Money::from_f64(1000.0);
        agents[1].shares.insert("A".to_string(), 50);

        let mut trade = Trade::new(0, 1, 10, 11, Money::from_f64(10.0), "A".to_string(), 5, 1.0);
        trade.process(&mut agents).unwrap();

        assert_eq!(agents[0].balance, Money::from_f64(950.0));
        assert_eq!(agents[1].balance, Money::from_f64(50.0));
        assert_eq!(*agents[0].shares.get("A").unwrap(), 5);
        assert_eq!(*agents[1].shares.get("A").unwrap(), 45);
        assert_eq!(agents[0].counters.matched, 5);
        assert_eq!(agents[1].counters.matched, 5);
        assert!(trade.completed);
    }

    #[test]
    fn double_process_is_rejected() {
        let mut agents = vec![plain_agent("buyer"), plain_agent("seller")];
        let mut trade = Trade::new(0, 1, 10, 11, Money::from_f64(10.0), "A".to_string(), 5, 1.0);
        trade.process(&mut agents).unwrap();
        assert!(trade.process(&mut agents).is_err());
    }

    #[test]
    fn self_trade_applies_both_sides() {
        let mut agents = vec![plain_agent("solo")];
        let mut trade = Trade::new(0, 0, 10, 11, Money::from_f64(10.0), "A".to_string(), 5, 1.0);
        trade.process(&mut agents).unwrap();
        assert_eq!(*agents[0].shares.get("A").unwrap(), 0);
        assert_eq!(agents[0].counters.matched, 10);
    }
}
