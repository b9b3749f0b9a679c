//! `Simulation`: owns every book, every agent, the event queue, the
//! fundamental, and the RNG; runs the event loop described in §4.5; fans
//! trades out to agents with sampled latency; mints cancel orders on
//! demand.
//!
//! Nothing here is reachable except through `&mut Simulation` — there is
//! no back-reference from an `Agent` or `Order` into the simulation (per
//! §9's back-reference redesign note). Agents react by returning `Intent`s;
//! `Simulation` is the only thing that mints order ids, samples latency,
//! and touches the event queue.

use crate::agent::{AgentKind, AgentRecord, Intent};
use crate::algorithm::AlgorithmContext;
use crate::book::{BookLevel, OrderBook};
use crate::config::{self, SimConfig};
use crate::error::{SimError, SimResult};
use crate::event::{Event, EventQueue};
use crate::fundamental::Fundamental;
use crate::output::{AgentSnapshot, AgentStats, CounterpartyStats, DataPoint};
use crate::types::money::Money;
use crate::types::order::{AgentId, IdCounter, Order, OrderId, Side, Symbol};
use crate::types::trade::Trade;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;

pub struct Simulation {
    books: Vec<(Symbol, OrderBook)>,
    book_index: HashMap<Symbol, usize>,
    agents: Vec<AgentRecord>,
    queue: EventQueue,
    fundamental: Option<Fundamental>,
    rng: StdRng,
    ids: IdCounter,
    runtime: f64,
    virtual_time: f64,
    volatility_window: f64,
}

impl Simulation {
    /// Build a `Simulation` from a parsed configuration document. Every
    /// agent is bound to `config.symbols[0]` (see the comment on
    /// `AgentRecord::symbol`); validation/tag-resolution errors from
    /// `config::build_agents` propagate as `SimError::Config`.
    pub fn new(config: &SimConfig) -> SimResult<Self> {
        if config.symbols.is_empty() {
            return Err(SimError::config("`symbols` must declare at least one book"));
        }
        let mut rng = StdRng::seed_from_u64(config.resolved_seed());

        let mut books = Vec::with_capacity(config.symbols.len());
        let mut book_index = HashMap::with_capacity(config.symbols.len());
        for sym in &config.symbols {
            book_index.insert(sym.symbol.clone(), books.len());
            books.push((sym.symbol.clone(), OrderBook::new(sym.symbol.clone(), Money::from_f64(sym.starting_price))));
        }

        let default_symbol = config.symbols[0].symbol.clone();
        let mut agents = Vec::new();
        for spec in &config.agents {
            let next_id = agents.len();
            agents.extend(config::build_agents(spec, next_id, &default_symbol, &mut rng)?);
        }

        let fundamental = config.fundamental.clone().map(Fundamental::new);

        log::info!(
            "simulation constructed: runtime={} symbols={} agents={} seed={}",
            config.runtime,
            books.len(),
            agents.len(),
            config.resolved_seed()
        );

        let mut sim = Simulation {
            books,
            book_index,
            agents,
            queue: EventQueue::new(),
            fundamental,
            rng,
            ids: IdCounter::new(),
            runtime: config.runtime,
            virtual_time: 0.0,
            volatility_window: config.volatility_window,
        };

        sim.init_broadcasts_and_wakeups();
        Ok(sim)
    }

    /// Initialization per §4.5: emit a synthetic market-data broadcast per
    /// book at t=0 carrying its starting price, then let every agent that
    /// self-schedules queue its first wake-up.
    fn init_broadcasts_and_wakeups(&mut self) {
        self.synthesize_broadcasts();
        for id in 0..self.agents.len() {
            if let Some(delta) = self.agents[id].next_wakeup_delta(&mut self.rng) {
                self.queue.push(delta, Event::AgentWakeup { agent: id });
            }
        }
    }

    fn book_idx(&self, symbol: &str) -> usize {
        self.book_index[symbol]
    }

    fn book_mut(&mut self, symbol: &str) -> &mut OrderBook {
        let idx = self.book_idx(symbol);
        &mut self.books[idx].1
    }

    /// Run to completion: pop events in `(time, sequence)` order, halting
    /// once an event's fire time exceeds `runtime`. Recovers from a dry
    /// queue by synthesizing a market-data tick per book (§4.5 step 1).
    pub fn run(&mut self) -> SimResult<()> {
        if self.agents.is_empty() || self.books.is_empty() {
            log::warn!("simulation has no agents or no books; nothing to run");
            return Ok(());
        }

        loop {
            if self.queue.is_empty() {
                self.synthesize_broadcasts();
                if self.queue.is_empty() {
                    let min_block = self
                        .agents
                        .iter()
                        .map(|a| a.order_block_time)
                        .fold(f64::INFINITY, f64::min);
                    if !min_block.is_finite() {
                        log::warn!("event queue permanently dry at t={}; stopping", self.virtual_time);
                        break;
                    }
                    self.virtual_time = min_block;
                    continue;
                }
            }

            let Some((t, event)) = self.queue.pop() else { break };
            if t > self.runtime {
                log::info!("halting: next event at t={} exceeds runtime {}", t, self.runtime);
                break;
            }
            self.virtual_time = t;
            self.run_event(t, event)?;
        }

        log::info!("simulation run complete at t={}", self.virtual_time);
        Ok(())
    }

    fn run_event(&mut self, t: f64, event: Event) -> SimResult<()> {
        match event {
            Event::OrderSubmission { order } => self.handle_order_submission(t, order),
            Event::OrderQueued { order } => self.handle_order_queued(t, order),
            Event::MarketData { trade, target } => self.handle_market_data(trade, target, t),
            Event::SnapshotRequest { requester, symbol, depth } => {
                self.handle_snapshot_request(requester, symbol, depth, t)
            }
            Event::SnapshotResponse { requester, symbol, captured_at, buy_view, sell_view } => {
                self.handle_snapshot_response(requester, symbol, captured_at, buy_view, sell_view, t)
            }
            Event::AgentWakeup { agent } => self.handle_wakeup(agent, t),
            Event::SyntheticMarketData { symbol, price, target } => {
                self.handle_synthetic_market_data(symbol, price, target, t)
            }
        }
    }

    // ---- admission control (§4.2) ----

    fn handle_order_submission(&mut self, t: f64, mut order: Order) -> SimResult<()> {
        order.receive_time = t;
        let idx = self.book_idx(&order.symbol);
        let book = &mut self.books[idx].1;
        if t - book.last_order_service_time >= 1.0 {
            book.last_order_service_time = t;
            order.process_time = t;
            self.admit_and_broadcast(idx, order)
        } else {
            book.last_order_service_time += 1.0;
            let admit_time = book.last_order_service_time;
            self.queue.push(admit_time, Event::OrderQueued { order });
            Ok(())
        }
    }

    fn handle_order_queued(&mut self, t: f64, mut order: Order) -> SimResult<()> {
        order.process_time = t;
        let idx = self.book_idx(&order.symbol);
        self.admit_and_broadcast(idx, order)
    }

    /// Admit `order` into book `idx`, process any resulting trades,
    /// broadcast them, update agent bookkeeping, and record a `DataPoint`
    /// for a non-cancel admission.
    fn admit_and_broadcast(&mut self, idx: usize, order: Order) -> SimResult<()> {
        let is_cancel = order.is_cancel;
        let order_id = order.id;
        let owner = order.owner;
        let symbol = self.books[idx].0.clone();

        let outcome = self.books[idx].1.admit(order)?;

        if is_cancel {
            if let Some(removed) = outcome.canceled {
                if owner < self.agents.len() {
                    self.agents[owner].note_canceled(order_id, removed.residual_amount);
                }
            }
            return Ok(());
        }

        for mut trade in outcome.trades {
            trade.process(&mut self.agents)?;
            self.note_fill_if_complete(idx, trade.buy_order_id, trade.buyer);
            self.note_fill_if_complete(idx, trade.sell_order_id, trade.seller);
            self.broadcast_trade(&trade, false);
        }

        if let Some(snapshot) = outcome.market_snapshot {
            let dp = self.build_data_point(&symbol, &snapshot);
            self.books[idx].1.record_data_point(dp);
        }

        Ok(())
    }

    fn note_fill_if_complete(&mut self, book_idx: usize, order_id: OrderId, owner: AgentId) {
        if self.books[book_idx].1.residual_of(order_id).is_none() && owner < self.agents.len() {
            self.agents[owner].note_filled(order_id);
        }
    }

    fn build_data_point(&self, symbol: &str, snapshot: &crate::book::MarketSnapshot) -> DataPoint {
        let agents = self
            .agents
            .iter()
            .map(|agent| {
                let shares: i64 = agent.shares.values().sum();
                let holdings_value: Money = agent
                    .shares
                    .iter()
                    .map(|(sym, &qty)| agent.share_prices.get(sym).copied().unwrap_or(Money::ZERO) * qty)
                    .sum();
                AgentSnapshot {
                    name: agent.name.clone(),
                    hidden: agent.hidden,
                    balance: agent.balance,
                    shares,
                    net_worth: agent.balance + holdings_value,
                    sent: agent.counters.sent,
                    matched: agent.counters.matched,
                    canceled: agent.counters.canceled,
                }
            })
            .collect();

        DataPoint {
            time: snapshot.time,
            symbol: symbol.to_string(),
            last_trade_price: snapshot.last_trade_price,
            book_size: snapshot.book_size,
            gap: snapshot.gap,
            queue_size: snapshot.queue_size,
            agents,
        }
    }

    // ---- broadcast fan-out (§4.5) ----

    /// Sample latency per agent and enqueue a delivery if the agent isn't
    /// in its own order-block cooldown. `synthetic` selects whether the
    /// delivered event is a real `MarketData` (with a processed `Trade`)
    /// or a `SyntheticMarketData` (price-only, no settlement).
    fn broadcast_trade(&mut self, trade: &Trade, synthetic: bool) {
        for target in 0..self.agents.len() {
            let latency = self.agents[target].latency.sample(&mut self.rng);
            let fire = trade.time + latency;
            if fire > self.agents[target].order_block_time {
                if synthetic {
                    self.queue.push(
                        fire,
                        Event::SyntheticMarketData { symbol: trade.symbol.clone(), price: trade.price, target },
                    );
                } else {
                    self.queue.push(fire, Event::MarketData { trade: trade.clone(), target });
                }
            }
        }
    }

    /// §4.5 step 1: when the queue runs dry, synthesize one tick per book
    /// from its `last_trade_price` so starved agents still see market
    /// data and strategies relying on self-scheduling aren't the only
    /// source of forward progress.
    fn synthesize_broadcasts(&mut self) {
        for i in 0..self.books.len() {
            let (symbol, price) = {
                let (symbol, book) = &self.books[i];
                (symbol.clone(), book.last_trade_price)
            };
            let trade = Trade::new(0, 0, 0, 0, price, symbol, 0, self.virtual_time);
            self.broadcast_trade(&trade, true);
        }
    }

    // ---- event handlers ----

    fn handle_market_data(&mut self, trade: Trade, target: AgentId, t: f64) -> SimResult<()> {
        let ctx = self.build_context(target, t);
        let intents = self.agents[target].on_data(&trade, t, &ctx, &mut self.rng);
        self.realize_intents(target, intents, t)
    }

    fn handle_synthetic_market_data(&mut self, symbol: Symbol, price: Money, target: AgentId, t: f64) -> SimResult<()> {
        let trade = Trade::new(target, target, 0, 0, price, symbol, 0, t);
        let ctx = self.build_context(target, t);
        let intents = self.agents[target].on_data(&trade, t, &ctx, &mut self.rng);
        self.realize_intents(target, intents, t)
    }

    fn handle_wakeup(&mut self, agent: AgentId, t: f64) -> SimResult<()> {
        let ctx = self.build_context(agent, t);
        let intents = self.agents[agent].on_wakeup(t, &ctx, &mut self.rng);
        self.realize_intents(agent, intents, t)?;

        if let Some(delta) = self.agents[agent].next_wakeup_delta(&mut self.rng) {
            self.queue.push(t + delta, Event::AgentWakeup { agent });
        }
        Ok(())
    }

    fn handle_snapshot_request(&mut self, requester: AgentId, symbol: Symbol, depth: usize, t: f64) -> SimResult<()> {
        let buy_view = self.book_mut(&symbol).peek_top_n(Side::Buy, depth);
        let sell_view = self.book_mut(&symbol).peek_top_n(Side::Sell, depth);
        let latency = self.agents[requester].latency.sample(&mut self.rng);
        self.queue.push(
            t + latency,
            Event::SnapshotResponse { requester, symbol, captured_at: t, buy_view, sell_view },
        );
        Ok(())
    }

    /// `symbol` (the book the snapshot was captured from) and `captured_at`
    /// aren't consulted here: an agent trades exactly one symbol, which
    /// `build_context` already derives from the agent record itself, and
    /// the contract only specifies reacting to the delivered view, not its
    /// staleness relative to capture time.
    #[allow(clippy::too_many_arguments)]
    fn handle_snapshot_response(
        &mut self,
        requester: AgentId,
        _symbol: Symbol,
        _captured_at: f64,
        buy_view: Vec<BookLevel>,
        sell_view: Vec<BookLevel>,
        t: f64,
    ) -> SimResult<()> {
        let ctx = self.build_context(requester, t);
        let intents = self.agents[requester].on_snapshot(t, &ctx, &buy_view, &sell_view, &mut self.rng);
        self.realize_intents(requester, intents, t)
    }

    // ---- intent realization ----

    /// Turn an agent's `Intent`s into minted orders/events, or a silent
    /// soft refusal (overdraft check fails). Never constructs a
    /// `SimError` — every refusal here is tracked purely via counters.
    fn realize_intents(&mut self, agent_id: AgentId, intents: Vec<Intent>, t: f64) -> SimResult<()> {
        for intent in intents {
            match intent {
                Intent::Submit { side, symbol, qty, price } => {
                    let agent = &self.agents[agent_id];
                    if !agent.passes_overdraft_check(side, &symbol, qty, price) {
                        continue;
                    }
                    let latency = agent.latency.sample(&mut self.rng);
                    let id = self.ids.next();
                    let order = Order::new(id, agent_id, side, symbol, qty, price, t);
                    self.agents[agent_id].note_submitted(id, qty, t);
                    self.queue.push(t + latency, Event::OrderSubmission { order });
                }
                Intent::Cancel { target } => {
                    let agent = &self.agents[agent_id];
                    let latency = agent.latency.sample(&mut self.rng);
                    let cancel = Order::cancel_of(target, agent_id, agent.symbol.clone(), t);
                    self.queue.push(t + latency, Event::OrderSubmission { order: cancel });
                }
                Intent::SnapshotRequest { symbol, depth } => {
                    self.queue.push(t, Event::SnapshotRequest { requester: agent_id, symbol, depth });
                }
            }
        }
        Ok(())
    }

    /// Build the read-only market context handed to an agent's
    /// `on_data`/`on_wakeup`/`on_snapshot`. Disjoint-field self-borrows
    /// (`books`, `fundamental`, `rng`, `agents`) let this run without a
    /// method-call indirection that would otherwise force a whole-`self`
    /// borrow.
    fn build_context(&mut self, agent_id: AgentId, t: f64) -> AlgorithmContext {
        let symbol = self.agents[agent_id].symbol.clone();
        let idx = self.book_idx(&symbol);
        let book = &mut self.books[idx].1;
        let last_price = book.last_trade_price;
        let best_buy = book.best_buy_price();
        let best_sell = book.best_sell_price();

        let position = self.agents[agent_id].shares_of(&symbol);
        let recorded_avg = match &self.agents[agent_id].kind {
            AgentKind::HistoryRecording { history, .. } if !history.is_empty() => {
                let sum: f64 = history.iter().map(|(_, p)| p.to_f64()).sum();
                Some(sum / history.len() as f64)
            }
            _ => None,
        };
        let fundamental_value = match self.fundamental.as_mut() {
            Some(f) => Some(f.value(t, &mut self.rng)),
            None => None,
        };

        let mut ctx = AlgorithmContext::new(symbol, last_price, t);
        ctx.best_buy = best_buy;
        ctx.best_sell = best_sell;
        ctx.position = position;
        ctx.recorded_avg = recorded_avg;
        ctx.fundamental_value = fundamental_value;
        ctx
    }

    // ---- end-of-run reporting ----

    /// Every captured `DataPoint` across every book, merged and ordered
    /// by time (stable, so same-time points keep their per-book relative
    /// order — there is no cross-book sequence number to break ties with
    /// more precisely, and admission is already serialized per tick).
    pub fn data_points(&self) -> Vec<DataPoint> {
        let mut all: Vec<DataPoint> = self.books.iter().flat_map(|(_, b)| b.data_points.iter().cloned()).collect();
        all.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
        all
    }

    pub fn volatility_window(&self) -> f64 {
        self.volatility_window
    }

    /// End-of-run per-agent stats row (§6), in agent declaration order.
    /// Per-counterparty-group entries are sorted by group name: the
    /// groups an agent has traded with are discovered dynamically over
    /// the run (there is no declared ordering for them the way there is
    /// for agents/symbols), so alphabetical order is the deterministic
    /// choice here rather than hash-iteration order.
    pub fn agent_stats(&self) -> Vec<AgentStats> {
        self.agents
            .iter()
            .map(|agent| {
                let mut by_counterparty: Vec<CounterpartyStats> = agent
                    .by_counterparty
                    .iter()
                    .map(|(group, hist)| CounterpartyStats {
                        group_name: group.clone(),
                        count: hist.count,
                        buy_count: hist.buy_count,
                        avg_buy_price: hist.avg_buy_price(),
                        sell_count: hist.sell_count,
                        avg_sell_price: hist.avg_sell_price(),
                    })
                    .collect();
                by_counterparty.sort_by(|a, b| a.group_name.cmp(&b.group_name));

                let holdings_value: Money = agent
                    .shares
                    .iter()
                    .map(|(sym, &qty)| agent.share_prices.get(sym).copied().unwrap_or(Money::ZERO) * qty)
                    .sum();

                AgentStats {
                    name: agent.name.clone(),
                    avg_match_price: mean(&agent.match_prices),
                    avg_buy_price: mean(&agent.buy_prices),
                    avg_sell_price: mean(&agent.sell_prices),
                    sent: agent.counters.sent,
                    matched: agent.counters.matched,
                    canceled: agent.counters.canceled,
                    standing: agent.balance + holdings_value,
                    by_counterparty,
                }
            })
            .collect()
    }

    pub fn agents(&self) -> &[AgentRecord] {
        &self.agents
    }

    pub fn total_shares(&self, symbol: &str) -> i64 {
        self.agents.iter().map(|a| a.shares_of(symbol)).sum()
    }

    pub fn total_cash(&self) -> Money {
        self.agents.iter().map(|a| a.balance).sum()
    }
}

fn mean(prices: &[Money]) -> f64 {
    if prices.is_empty() {
        0.0
    } else {
        prices.iter().map(|p| p.to_f64()).sum::<f64>() / prices.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    fn config_text(extra_agent: &str) -> String {
        format!(
            r#"{{
                "runtime": 50.0,
                "seed": 7,
                "symbols": [{{"symbol": "A", "starting_price": 100.0}}],
                "agents": [{extra_agent}]
            }}"#
        )
    }

    fn fixed_price_agent(name: &str, side: &str, price: f64) -> String {
        format!(
            r#"{{
                "name": "{name}",
                "balance": 1000000.0,
                "shares": {{"A": 1000}},
                "type": "basic",
                "algorithm": "fixedprice",
                "algorithmargs": {{"side": "{side}", "qty": 1, "price": {price}}},
                "latency": "linear",
                "latencyargs": {{"min": 0.0, "max": 0.0}}
            }}"#
        )
    }

    #[test]
    fn constructs_and_runs_to_completion() {
        let buyer = fixed_price_agent("buyer", "buy", 101.0);
        let seller = fixed_price_agent("seller", "sell", 99.0);
        let text = config_text(&format!("{buyer}, {seller}"));
        let config = SimConfig::load_from_str(&text).unwrap();
        let mut sim = Simulation::new(&config).unwrap();
        sim.run().unwrap();
        assert!(sim.virtual_time >= 0.0);
    }

    #[test]
    fn conserves_cash_and_shares_across_a_run() {
        let buyer = fixed_price_agent("buyer", "buy", 101.0);
        let seller = fixed_price_agent("seller", "sell", 99.0);
        let text = config_text(&format!("{buyer}, {seller}"));
        let config = SimConfig::load_from_str(&text).unwrap();
        let mut sim = Simulation::new(&config).unwrap();

        let initial_cash = sim.total_cash();
        let initial_shares = sim.total_shares("A");

        sim.run().unwrap();

        assert_eq!(sim.total_cash(), initial_cash);
        assert_eq!(sim.total_shares("A"), initial_shares);
    }

    #[test]
    fn deterministic_given_same_seed() {
        let buyer = fixed_price_agent("buyer", "buy", 101.0);
        let seller = fixed_price_agent("seller", "sell", 99.0);
        let text = config_text(&format!("{buyer}, {seller}"));
        let config = SimConfig::load_from_str(&text).unwrap();

        let mut sim1 = Simulation::new(&config).unwrap();
        sim1.run().unwrap();
        let mut sim2 = Simulation::new(&config).unwrap();
        sim2.run().unwrap();

        let dp1 = sim1.data_points();
        let dp2 = sim2.data_points();
        assert_eq!(dp1, dp2);
    }

    #[test]
    fn empty_agent_list_does_not_hang() {
        let text = r#"{
            "runtime": 10.0,
            "symbols": [{"symbol": "A", "starting_price": 10.0}],
            "agents": []
        }"#;
        let config = SimConfig::load_from_str(text).unwrap();
        let mut sim = Simulation::new(&config).unwrap();
        sim.run().unwrap();
    }
}
