//! Agents: the seven strategy families enumerated in the agent contract,
//! expressed as a single closed sum type rather than trait objects, so the
//! arena (`Vec<AgentRecord>`) stays a plain, cache-friendly `Vec` with no
//! dynamic dispatch and no possibility of an agent outliving its index.
//!
//! An `AgentRecord` reacts to `on_data`/`on_wakeup`/`on_snapshot` by
//! returning a list of `Intent`s. It never mints an order id, samples
//! latency, or touches the event queue itself — those are `Simulation`'s
//! job, since only `Simulation` owns the RNG and the id counter. This
//! keeps agent reactions pure and replayable in isolation (see the tests
//! below and in `crate::types::trade`).

pub mod test_support;

use crate::algorithm::{AlgorithmContext, AlgorithmKind};
use crate::book::BookLevel;
use crate::latency::LatencyFunction;
use crate::types::money::Money;
use crate::types::order::{AgentId, OrderId, Side, Symbol};
use crate::types::trade::Trade;
use rand::Rng;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Running totals in shares, not order counts: a 10-share order that fills
/// in two 5-share trades credits `matched` by 10, not 2.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub sent: u64,
    pub matched: u64,
    pub canceled: u64,
}

/// Running totals kept per counterparty group, used only to render the
/// end-of-run stats row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CounterpartyHistory {
    pub count: u64,
    pub buy_count: u64,
    pub buy_price_sum: Money,
    pub sell_count: u64,
    pub sell_price_sum: Money,
}

impl CounterpartyHistory {
    pub fn avg_buy_price(&self) -> f64 {
        if self.buy_count == 0 {
            0.0
        } else {
            self.buy_price_sum.to_f64() / self.buy_count as f64
        }
    }

    pub fn avg_sell_price(&self) -> f64 {
        if self.sell_count == 0 {
            0.0
        } else {
            self.sell_price_sum.to_f64() / self.sell_count as f64
        }
    }
}

/// The strategy-specific extra state each agent family carries. Algorithms
/// (which actually produce order prices/quantities) are orthogonal and live
/// in `AlgorithmKind`; this enum is about *when* an agent acts and what
/// bookkeeping it needs to decide that.
#[derive(Clone, Debug)]
pub enum AgentKind {
    /// Submits on every market-data tick, no further bookkeeping.
    Reactive,

    /// Like Reactive, plus auto-cancels outstanding orders older than
    /// `order_lifespan`, submits only with probability `order_chance`, and
    /// enters a cooldown (`order_cooldown`) after every submission.
    CancelingReactive {
        order_lifespan: f64,
        order_chance: f64,
        order_cooldown: f64,
    },

    /// Like CancelingReactive, plus a windowed trade-price history used by
    /// mean-reversion-style algorithms.
    HistoryRecording {
        order_lifespan: f64,
        order_chance: f64,
        order_cooldown: f64,
        time_interval: f64,
        history: VecDeque<(f64, Money)>,
    },

    /// Tracks its own last buy/last sell fill price, reacts to every tick.
    BasicMarketMaker {
        last_buy: Option<Money>,
        last_sell: Option<Money>,
    },

    /// Ignores market data entirely; self-schedules every `interval`.
    IntervalTrader { interval: f64 },

    /// Ignores market data; self-schedules after `-ln(U)/rate`.
    PoissonTrader { rate: f64 },

    /// Periodically requests a top-N snapshot; on response, cancels
    /// outstanding orders and re-quotes from the (stale) view.
    SnapshotArbitrage {
        snapshot_interval: f64,
        depth: usize,
    },
}

/// Something an agent wants done, for `Simulation` to realize (mint an id,
/// sample latency, enqueue an event) or refuse (soft, silent).
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    Submit { side: Side, symbol: Symbol, qty: u64, price: Money },
    Cancel { target: OrderId },
    SnapshotRequest { symbol: Symbol, depth: usize },
}

/// One agent's complete mutable state, addressed everywhere else by its
/// stable arena index rather than by reference.
#[derive(Clone, Debug)]
pub struct AgentRecord {
    pub id: AgentId,
    pub name: String,
    pub group_name: String,
    /// The single symbol this agent trades. The config format has no
    /// per-agent symbol field, so every agent is bound to one book —
    /// `symbols[0]` by construction convention (see `config::build_agents`).
    pub symbol: Symbol,
    /// Agents named with a leading underscore are omitted from the
    /// per-agent order counters in the CSV output (but not from cash/
    /// shares/net worth, which are reported for everyone).
    pub hidden: bool,

    pub balance: Money,
    pub shares: HashMap<Symbol, i64>,
    pub share_prices: HashMap<Symbol, Money>,

    /// Set after a submission by strategies with a cooldown; suppresses
    /// further submissions until virtual time passes this value.
    pub order_block_time: f64,
    /// Live (unfilled, uncanceled) orders this agent believes it has
    /// outstanding, keyed by id, valued by submit time (for lifespan
    /// checks) — the agent's own mirror, never authoritative over the
    /// book's resident state. A `BTreeMap` rather than a `HashMap`: ids are
    /// minted in strictly increasing order, so iterating by key is the
    /// same as iterating in submission order, deterministically, without
    /// leaning on hash-iteration order anywhere (see §5's determinism
    /// hazard).
    pub live_orders: BTreeMap<OrderId, f64>,

    pub algorithm: AlgorithmKind,
    pub latency: LatencyFunction,
    pub kind: AgentKind,

    pub counters: Counters,
    /// Whether `attempt_submit`'s overdraft check applies to this agent.
    /// Strategies that explicitly allow short/negative positions (most
    /// market-making and zero-intelligence configurations) set this false.
    pub checks_overdraft: bool,

    pub match_prices: Vec<Money>,
    pub buy_prices: Vec<Money>,
    pub sell_prices: Vec<Money>,
    pub by_counterparty: HashMap<String, CounterpartyHistory>,
}

impl AgentRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AgentId,
        name: impl Into<String>,
        group_name: impl Into<String>,
        symbol: impl Into<String>,
        balance: Money,
        shares: HashMap<Symbol, i64>,
        algorithm: AlgorithmKind,
        latency: LatencyFunction,
        kind: AgentKind,
        checks_overdraft: bool,
    ) -> Self {
        let name = name.into();
        let hidden = name.starts_with('_');
        AgentRecord {
            id,
            group_name: group_name.into(),
            symbol: symbol.into(),
            hidden,
            name,
            balance,
            shares,
            share_prices: HashMap::new(),
            order_block_time: f64::NEG_INFINITY,
            live_orders: BTreeMap::new(),
            algorithm,
            latency,
            kind,
            counters: Counters::default(),
            checks_overdraft,
            match_prices: Vec::new(),
            buy_prices: Vec::new(),
            sell_prices: Vec::new(),
            by_counterparty: HashMap::new(),
        }
    }

    pub fn shares_of(&self, symbol: &str) -> i64 {
        *self.shares.get(symbol).unwrap_or(&0)
    }

    /// Overdraft/short-position check from the agent contract: refuse a buy
    /// if cash can't cover `qty*price`; refuse a sell if holdings can't
    /// cover `qty`. Agents that allow short positions always pass.
    pub fn passes_overdraft_check(&self, side: Side, symbol: &str, qty: u64, price: Money) -> bool {
        if !self.checks_overdraft {
            return true;
        }
        match side {
            Side::Buy => match price.checked_mul_qty(qty) {
                Some(cost) => self.balance >= cost,
                None => false,
            },
            Side::Sell => self.shares_of(symbol) >= qty as i64,
        }
    }

    /// Apply a settled fill: transfer cash/shares, bump counters, and
    /// record the price into every history the end-of-run stats need.
    /// Called exactly once per trade side by `Trade::process`.
    pub fn apply_fill(&mut self, side: Side, symbol: &str, amount: u64, price: Money, counterparty_group: &str) {
        let signed = amount as i64;
        match side {
            Side::Buy => {
                self.balance -= price.checked_mul_qty(amount).expect("trade value overflow");
                *self.shares.entry(symbol.to_string()).or_insert(0) += signed;
                self.buy_prices.push(price);
            }
            Side::Sell => {
                self.balance += price.checked_mul_qty(amount).expect("trade value overflow");
                *self.shares.entry(symbol.to_string()).or_insert(0) -= signed;
                self.sell_prices.push(price);
            }
        }
        self.share_prices.insert(symbol.to_string(), price);
        self.counters.matched += amount;
        self.match_prices.push(price);

        let entry = self.by_counterparty.entry(counterparty_group.to_string()).or_default();
        entry.count += 1;
        match side {
            Side::Buy => {
                entry.buy_count += 1;
                entry.buy_price_sum += price;
            }
            Side::Sell => {
                entry.sell_count += 1;
                entry.sell_price_sum += price;
            }
        }
    }

    /// Record that a submission was actually sent (passed the overdraft
    /// check and was minted into an event). Counted in shares, not orders,
    /// matching the cancellation and fill counters.
    pub fn note_submitted(&mut self, order_id: OrderId, qty: u64, t: f64) {
        self.counters.sent += qty;
        self.live_orders.insert(order_id, t);
    }

    /// Record a cancellation the book actually honored, crediting the
    /// counter by the residual quantity the book actually removed.
    pub fn note_canceled(&mut self, order_id: OrderId, residual_qty: u64) {
        if self.live_orders.remove(&order_id).is_some() {
            self.counters.canceled += residual_qty;
        }
    }

    /// Record a fill that fully consumed an outstanding order (so it's no
    /// longer a candidate for this agent's own auto-cancel sweep).
    pub fn note_filled(&mut self, order_id: OrderId) {
        self.live_orders.remove(&order_id);
    }

    fn default_on_data(&mut self, trade: &Trade) {
        self.share_prices.insert(trade.symbol.clone(), trade.price);
    }

    /// React to one market-data tick.
    pub fn on_data(&mut self, trade: &Trade, t: f64, ctx: &AlgorithmContext, rng: &mut impl Rng) -> Vec<Intent> {
        self.default_on_data(trade);

        match &mut self.kind {
            AgentKind::Reactive => self.quote(ctx, rng),
            AgentKind::CancelingReactive { order_lifespan, order_chance, order_cooldown } => {
                let lifespan = *order_lifespan;
                let chance = *order_chance;
                let cooldown = *order_cooldown;
                let mut intents = self.sweep_expired(t, lifespan);
                if t >= self.order_block_time && rng.random::<f64>() < chance {
                    intents.extend(self.quote(ctx, rng));
                    self.order_block_time = t + cooldown;
                }
                intents
            }
            AgentKind::HistoryRecording { order_lifespan, order_chance, order_cooldown, time_interval, history } => {
                let lifespan = *order_lifespan;
                let chance = *order_chance;
                let cooldown = *order_cooldown;
                let window = *time_interval;
                history.push_back((t, trade.price));
                while let Some((front_t, _)) = history.front() {
                    if t - front_t > window {
                        history.pop_front();
                    } else {
                        break;
                    }
                }
                let mut intents = self.sweep_expired(t, lifespan);
                if t >= self.order_block_time && rng.random::<f64>() < chance {
                    intents.extend(self.quote(ctx, rng));
                    self.order_block_time = t + cooldown;
                }
                intents
            }
            AgentKind::BasicMarketMaker { .. } => {
                let intents = self.quote(ctx, rng);
                if let AgentKind::BasicMarketMaker { last_buy, last_sell } = &mut self.kind {
                    for intent in &intents {
                        if let Intent::Submit { side, price, .. } = intent {
                            match side {
                                Side::Buy => *last_buy = Some(*price),
                                Side::Sell => *last_sell = Some(*price),
                            }
                        }
                    }
                }
                intents
            }
            AgentKind::IntervalTrader { .. } | AgentKind::PoissonTrader { .. } => Vec::new(),
            AgentKind::SnapshotArbitrage { .. } => Vec::new(),
        }
    }

    /// React to a self-scheduled wake-up (interval/Poisson traders,
    /// snapshot arbitrageurs).
    pub fn on_wakeup(&mut self, t: f64, ctx: &AlgorithmContext, rng: &mut impl Rng) -> Vec<Intent> {
        match &self.kind {
            AgentKind::IntervalTrader { .. } | AgentKind::PoissonTrader { .. } => self.quote(ctx, rng),
            AgentKind::SnapshotArbitrage { depth, .. } => {
                vec![Intent::SnapshotRequest {
                    symbol: ctx.symbol.to_string(),
                    depth: *depth,
                }]
            }
            _ => Vec::new(),
        }
    }

    /// React to a previously-requested snapshot arriving.
    pub fn on_snapshot(
        &mut self,
        t: f64,
        ctx: &AlgorithmContext,
        buy_view: &[BookLevel],
        sell_view: &[BookLevel],
        rng: &mut impl Rng,
    ) -> Vec<Intent> {
        if !matches!(self.kind, AgentKind::SnapshotArbitrage { .. }) {
            return Vec::new();
        }
        let mut intents = self.cancel_all_live();
        let mut snap_ctx = ctx.clone();
        snap_ctx.best_buy = buy_view.first().map(|l| l.price);
        snap_ctx.best_sell = sell_view.first().map(|l| l.price);
        snap_ctx.snapshot_buy = buy_view.to_vec();
        snap_ctx.snapshot_sell = sell_view.to_vec();
        let _ = t;
        // The sweep above already cancels every standing order regardless of
        // algorithm; call the algorithm directly rather than through `quote`
        // so a `replaces_own_orders` algorithm (ZI, SimpleMarketMaker) paired
        // with this agent type doesn't cancel the same ids a second time.
        let requests = self.algorithm.get_orders(&snap_ctx, rng);
        intents.extend(requests.into_iter().map(|r| Intent::Submit {
            side: r.side,
            symbol: snap_ctx.symbol.clone(),
            qty: r.qty,
            price: r.price,
        }));
        intents
    }

    /// The next self-scheduled wake-up delay, or `None` for agents that
    /// never self-schedule.
    pub fn next_wakeup_delta(&self, rng: &mut impl Rng) -> Option<f64> {
        match &self.kind {
            AgentKind::IntervalTrader { interval } => Some(*interval),
            AgentKind::PoissonTrader { rate } => {
                let u: f64 = rng.random();
                Some(-u.max(f64::MIN_POSITIVE).ln() / rate)
            }
            AgentKind::SnapshotArbitrage { snapshot_interval, .. } => Some(*snapshot_interval),
            _ => None,
        }
    }

    /// Algorithms whose contract explicitly re-quotes by replacing a prior
    /// standing order rather than layering on top of it (ZI's single
    /// position-indexed order; the simple market maker's buy/sell pair).
    fn replaces_own_orders(&self) -> bool {
        matches!(
            self.algorithm,
            AlgorithmKind::ZeroIntelligence { .. } | AlgorithmKind::SimpleMarketMaker { .. }
        )
    }

    fn quote(&mut self, ctx: &AlgorithmContext, rng: &mut impl Rng) -> Vec<Intent> {
        let mut intents = if self.replaces_own_orders() {
            self.cancel_all_live()
        } else {
            Vec::new()
        };
        let requests = self.algorithm.get_orders(ctx, rng);
        intents.extend(requests.into_iter().map(|r| Intent::Submit {
            side: r.side,
            symbol: ctx.symbol.to_string(),
            qty: r.qty,
            price: r.price,
        }));
        intents
    }

    fn sweep_expired(&mut self, t: f64, lifespan: f64) -> Vec<Intent> {
        self.live_orders
            .iter()
            .filter(|(_, &submit_time)| t - submit_time > lifespan)
            .map(|(&id, _)| Intent::Cancel { target: id })
            .collect()
    }

    fn cancel_all_live(&mut self) -> Vec<Intent> {
        self.live_orders.keys().map(|&id| Intent::Cancel { target: id }).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::AlgorithmContext;
    use crate::algorithm::AlgorithmKind;
    use crate::latency::LatencyFunction;
    use crate::types::trade::Trade;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ctx() -> AlgorithmContext {
        AlgorithmContext::new("A", Money::from_f64(100.0), 0.0)
    }

    fn fixed_price_agent(checks_overdraft: bool) -> AgentRecord {
        AgentRecord::new(
            0,
            "trader",
            "trader",
            "A",
            Money::from_f64(1000.0),
            HashMap::new(),
            AlgorithmKind::FixedPrice { side: Side::Buy, qty: 10, price: Money::from_f64(50.0) },
            LatencyFunction::linear(0.0, 0.0),
            AgentKind::Reactive,
            checks_overdraft,
        )
    }

    fn trade_at(t: f64) -> Trade {
        Trade::new(0, 0, 0, 0, Money::from_f64(100.0), "A".to_string(), 0, t)
    }

    #[test]
    fn reactive_submits_on_every_tick() {
        let mut agent = fixed_price_agent(true);
        let mut rng = StdRng::seed_from_u64(1);
        let intents = agent.on_data(&trade_at(0.0), 0.0, &ctx(), &mut rng);
        assert_eq!(intents.len(), 1);
        assert!(matches!(intents[0], Intent::Submit { side: Side::Buy, qty: 10, .. }));
    }

    #[test]
    fn overdraft_check_refuses_unaffordable_buy() {
        let agent = fixed_price_agent(true);
        assert!(!agent.passes_overdraft_check(Side::Buy, "A", 1000, Money::from_f64(50.0)));
        assert!(agent.passes_overdraft_check(Side::Buy, "A", 1, Money::from_f64(50.0)));
    }

    #[test]
    fn overdraft_check_refuses_short_sell() {
        let agent = fixed_price_agent(true);
        assert!(!agent.passes_overdraft_check(Side::Sell, "A", 1, Money::ZERO));
    }

    #[test]
    fn agents_allowing_short_positions_skip_overdraft_check() {
        let agent = fixed_price_agent(false);
        assert!(agent.passes_overdraft_check(Side::Sell, "A", 1_000_000, Money::ZERO));
    }

    #[test]
    fn canceling_reactive_respects_cooldown_and_sweeps_expired_orders() {
        let mut agent = fixed_price_agent(true);
        agent.kind = AgentKind::CancelingReactive {
            order_lifespan: 5.0,
            order_chance: 1.0,
            order_cooldown: 10.0,
        };
        let mut rng = StdRng::seed_from_u64(1);

        let intents = agent.on_data(&trade_at(0.0), 0.0, &ctx(), &mut rng);
        assert_eq!(intents.len(), 1);
        assert_eq!(agent.order_block_time, 10.0);
        agent.note_submitted(7, 1, 0.0);

        // still inside cooldown: no new submission, but the aged-out order
        // from t=0 is swept once its lifespan elapses.
        let intents = agent.on_data(&trade_at(6.0), 6.0, &ctx(), &mut rng);
        assert_eq!(intents, vec![Intent::Cancel { target: 7 }]);
    }

    #[test]
    fn history_recording_drops_samples_outside_the_window() {
        let mut agent = fixed_price_agent(true);
        agent.kind = AgentKind::HistoryRecording {
            order_lifespan: 1000.0,
            order_chance: 0.0,
            order_cooldown: 0.0,
            time_interval: 10.0,
            history: VecDeque::new(),
        };
        let mut rng = StdRng::seed_from_u64(1);
        agent.on_data(&trade_at(0.0), 0.0, &ctx(), &mut rng);
        agent.on_data(&trade_at(5.0), 5.0, &ctx(), &mut rng);
        agent.on_data(&trade_at(20.0), 20.0, &ctx(), &mut rng);

        match &agent.kind {
            AgentKind::HistoryRecording { history, .. } => {
                assert_eq!(history.len(), 1);
                assert_eq!(history.front().unwrap().0, 20.0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn basic_market_maker_tracks_last_quoted_sides() {
        let mut agent = fixed_price_agent(true);
        agent.algorithm = AlgorithmKind::SimpleMarketMaker { distance: Money::from_f64(1.0), qty: 1 };
        agent.kind = AgentKind::BasicMarketMaker { last_buy: None, last_sell: None };
        let mut rng = StdRng::seed_from_u64(1);
        let mut c = ctx();
        c.best_buy = Some(Money::from_f64(90.0));
        c.best_sell = Some(Money::from_f64(110.0));

        agent.on_data(&trade_at(0.0), 0.0, &c, &mut rng);
        match agent.kind {
            AgentKind::BasicMarketMaker { last_buy, last_sell } => {
                assert!(last_buy.is_some());
                assert!(last_sell.is_some());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn interval_and_poisson_traders_ignore_market_data_but_self_schedule() {
        let mut agent = fixed_price_agent(true);
        agent.kind = AgentKind::IntervalTrader { interval: 3.0 };
        let mut rng = StdRng::seed_from_u64(1);
        assert!(agent.on_data(&trade_at(0.0), 0.0, &ctx(), &mut rng).is_empty());
        assert_eq!(agent.next_wakeup_delta(&mut rng), Some(3.0));

        let intents = agent.on_wakeup(0.0, &ctx(), &mut rng);
        assert_eq!(intents.len(), 1);

        agent.kind = AgentKind::PoissonTrader { rate: 2.0 };
        assert!(agent.next_wakeup_delta(&mut rng).unwrap() >= 0.0);
    }

    #[test]
    fn snapshot_arbitrage_requests_on_wakeup_and_requotes_on_response() {
        let mut agent = fixed_price_agent(true);
        agent.algorithm = AlgorithmKind::StaleQuoteArbitrage { threshold: 0.05, qty: 1 };
        agent.kind = AgentKind::SnapshotArbitrage { snapshot_interval: 5.0, depth: 3 };
        let mut rng = StdRng::seed_from_u64(1);

        let intents = agent.on_wakeup(0.0, &ctx(), &mut rng);
        assert_eq!(intents, vec![Intent::SnapshotRequest { symbol: "A".to_string(), depth: 3 }]);

        agent.note_submitted(1, 1, 0.0);
        agent.note_submitted(2, 1, 0.0);
        let mut c = ctx();
        c.fundamental_value = Some(100.0);
        let buy_view = vec![crate::book::BookLevel { price: Money::from_f64(90.0), quantity: 10 }];
        let sell_view = vec![crate::book::BookLevel { price: Money::from_f64(110.0), quantity: 10 }];
        let intents = agent.on_snapshot(5.0, &c, &buy_view, &sell_view, &mut rng);

        // both prior live orders canceled, plus fresh counter-orders against
        // the mispriced stale levels (StaleQuoteArbitrage doesn't itself
        // re-cancel, so on_snapshot's own sweep is the only cancellation).
        assert!(intents.contains(&Intent::Cancel { target: 1 }));
        assert!(intents.contains(&Intent::Cancel { target: 2 }));
        assert_eq!(intents.len(), 4);
    }

    #[test]
    fn zero_intelligence_replaces_rather_than_layers_its_standing_order() {
        let mut agent = fixed_price_agent(true);
        agent.algorithm = AlgorithmKind::ZeroIntelligence {
            private_value: crate::algorithm::private_value::PrivateValue::new(5, 1.0, &mut StdRng::seed_from_u64(9)),
            offset_min: 0.0,
            offset_max: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut c = ctx();
        c.fundamental_value = Some(100.0);

        agent.note_submitted(1, 1, 0.0);
        let intents = agent.on_data(&trade_at(0.0), 0.0, &c, &mut rng);
        assert!(intents.iter().any(|i| matches!(i, Intent::Cancel { target: 1 })));
        assert!(intents.iter().any(|i| matches!(i, Intent::Submit { .. })));
    }

    #[test]
    fn note_filled_and_note_canceled_clear_live_order_bookkeeping() {
        let mut agent = fixed_price_agent(true);
        agent.note_submitted(1, 3, 0.0);
        agent.note_submitted(2, 4, 0.0);

        agent.note_filled(1);
        assert!(!agent.live_orders.contains_key(&1));

        agent.note_canceled(2, 4);
        assert_eq!(agent.counters.canceled, 4);
        assert!(!agent.live_orders.contains_key(&2));

        // canceling an id that's already gone does not double-count
        agent.note_canceled(2, 4);
        assert_eq!(agent.counters.canceled, 4);
    }
}
