//! The nine strategy-pricing families, expressed as a closed sum type with
//! a single pure dispatch function (`get_orders`) rather than a trait
//! object per strategy. None of these variants touch the RNG's seed state
//! beyond the `rng` passed in by the caller, carry a clock, or know about
//! the event queue — they only turn a market snapshot into zero or more
//! desired orders.

pub mod private_value;

use crate::book::BookLevel;
use crate::types::money::Money;
use crate::types::order::Side;
use private_value::PrivateValue;
use rand::Rng;
use rand_distr::{Distribution, LogNormal, Normal};

/// One order an algorithm wants placed; `Simulation` is responsible for
/// the overdraft check, id minting, and latency.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrderRequest {
    pub side: Side,
    pub qty: u64,
    pub price: Money,
}

/// Read-only market context handed to `get_orders`. Owned rather than
/// borrowed so agents can cheaply build a modified copy (e.g. snapshot
/// arbitrage overwriting `best_buy`/`best_sell` with a stale view).
#[derive(Clone, Debug)]
pub struct AlgorithmContext {
    pub symbol: String,
    pub last_price: Money,
    /// Virtual time this quote request is happening at; consulted only by
    /// the keyframe-interpolating fixed market maker.
    pub time: f64,
    pub best_buy: Option<Money>,
    pub best_sell: Option<Money>,
    pub position: i64,
    pub recorded_avg: Option<f64>,
    pub fundamental_value: Option<f64>,
    pub snapshot_buy: Vec<BookLevel>,
    pub snapshot_sell: Vec<BookLevel>,
}

impl AlgorithmContext {
    pub fn new(symbol: impl Into<String>, last_price: Money, time: f64) -> Self {
        AlgorithmContext {
            symbol: symbol.into(),
            last_price,
            time,
            best_buy: None,
            best_sell: None,
            position: 0,
            recorded_avg: None,
            fundamental_value: None,
            snapshot_buy: Vec::new(),
            snapshot_sell: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum AlgorithmKind {
    /// One order per call, static `(side, qty, price)`.
    FixedPrice { side: Side, qty: u64, price: Money },

    /// `price = last_price * U(1-pct, 1+pct)`; side fair-coin unless
    /// `buy_chance` is given.
    RandomLinear { pct: f64, qmin: u64, qmax: u64, buy_chance: f64 },

    /// `price = last_price * Normal(1, sd)`.
    RandomNormal { sd: f64, qmin: u64, qmax: u64, buy_chance: f64 },

    /// `price = last_price * LogNormal(mu, sigma)`.
    RandomLognormal { mu: f64, sigma: f64, qmin: u64, qmax: u64, buy_chance: f64 },

    /// Buy iff `price <= buy_threshold`; sell iff `price >= sell_threshold`.
    Threshold { buy_threshold: Money, sell_threshold: Money, qty: u64 },

    /// Buy iff `price < avg*(1-threshold)`; sell iff `price > avg*(1+threshold)`,
    /// using the host's recorded window average.
    MeanReversion { threshold: f64, qty: u64 },

    /// Quote a pair at `last_buy + distance` / `last_sell - distance`, only
    /// when non-crossed.
    SimpleMarketMaker { distance: Money, qty: u64 },

    /// Linear-interpolated price curve from `(time, price)` keyframes;
    /// quotes `p - spread/2` / `p + spread/2` plus a matched pair at `p`
    /// (price anchoring).
    FixedMarketMaker { keyframes: Vec<(f64, Money)>, spread: Money, qty: u64 },

    /// Reads `fundamental.value(t)` (via `ctx.fundamental_value`); quotes
    /// `tick_count` levels on each side that improve on the current best.
    FundamentalMarketMaker {
        spread: Money,
        tick_spread: Money,
        tick_count: u32,
        qty: u64,
    },

    /// A private-value vector indexed by current position; submits a
    /// single 1-share order priced off the fundamental plus a uniform
    /// offset.
    ZeroIntelligence {
        private_value: PrivateValue,
        offset_min: f64,
        offset_max: f64,
    },

    /// Submits counter-orders against any stale snapshot level that
    /// misprices the current fundamental by more than `threshold`.
    StaleQuoteArbitrage { threshold: f64, qty: u64 },
}

impl AlgorithmKind {
    pub fn get_orders(&self, ctx: &AlgorithmContext, rng: &mut impl Rng) -> Vec<OrderRequest> {
        match self {
            AlgorithmKind::FixedPrice { side, qty, price } => {
                vec![OrderRequest { side: *side, qty: *qty, price: *price }]
            }

            AlgorithmKind::RandomLinear { pct, qmin, qmax, buy_chance } => {
                let u: f64 = rng.random();
                let perturbation = 1.0 + (u * 2.0 - 1.0) * pct;
                random_order(ctx.last_price, perturbation, *qmin, *qmax, *buy_chance, rng)
            }

            AlgorithmKind::RandomNormal { sd, qmin, qmax, buy_chance } => {
                let dist = Normal::new(1.0, sd.max(1e-12)).expect("invalid normal parameters");
                let perturbation = dist.sample(rng);
                random_order(ctx.last_price, perturbation, *qmin, *qmax, *buy_chance, rng)
            }

            AlgorithmKind::RandomLognormal { mu, sigma, qmin, qmax, buy_chance } => {
                let dist = LogNormal::new(*mu, sigma.max(1e-12)).expect("invalid lognormal parameters");
                let perturbation = dist.sample(rng);
                random_order(ctx.last_price, perturbation, *qmin, *qmax, *buy_chance, rng)
            }

            AlgorithmKind::Threshold { buy_threshold, sell_threshold, qty } => {
                if ctx.last_price <= *buy_threshold {
                    vec![OrderRequest { side: Side::Buy, qty: *qty, price: *buy_threshold }]
                } else if ctx.last_price >= *sell_threshold {
                    vec![OrderRequest { side: Side::Sell, qty: *qty, price: *sell_threshold }]
                } else {
                    Vec::new()
                }
            }

            AlgorithmKind::MeanReversion { threshold, qty } => {
                let Some(avg) = ctx.recorded_avg else { return Vec::new() };
                let price = ctx.last_price.to_f64();
                if price < avg * (1.0 - threshold) {
                    vec![OrderRequest { side: Side::Buy, qty: *qty, price: ctx.last_price }]
                } else if price > avg * (1.0 + threshold) {
                    vec![OrderRequest { side: Side::Sell, qty: *qty, price: ctx.last_price }]
                } else {
                    Vec::new()
                }
            }

            AlgorithmKind::SimpleMarketMaker { distance, qty } => {
                let buy_price = ctx.best_buy.unwrap_or(ctx.last_price) + *distance;
                let sell_price = ctx.best_sell.unwrap_or(ctx.last_price) - *distance;
                if sell_price >= buy_price {
                    vec![
                        OrderRequest { side: Side::Buy, qty: *qty, price: buy_price },
                        OrderRequest { side: Side::Sell, qty: *qty, price: sell_price },
                    ]
                } else {
                    Vec::new()
                }
            }

            AlgorithmKind::FixedMarketMaker { keyframes, spread, qty } => {
                let p = interpolate_keyframes(keyframes, ctx.time, ctx.last_price);
                let half = Money::from_cents(spread.cents() / 2);
                vec![
                    OrderRequest { side: Side::Buy, qty: *qty, price: p - half },
                    OrderRequest { side: Side::Sell, qty: *qty, price: p + half },
                    OrderRequest { side: Side::Buy, qty: *qty, price: p },
                    OrderRequest { side: Side::Sell, qty: *qty, price: p },
                ]
            }

            AlgorithmKind::FundamentalMarketMaker { spread, tick_spread, tick_count, qty } => {
                let Some(fv) = ctx.fundamental_value else { return Vec::new() };
                let base = Money::from_f64(fv);
                let mut out = Vec::new();
                for i in 0..*tick_count {
                    let offset = *spread + Money::from_cents(tick_spread.cents() * i as i64);
                    let buy_price = base - offset;
                    if ctx.best_buy.is_none_or(|b| buy_price > b) {
                        out.push(OrderRequest { side: Side::Buy, qty: *qty, price: buy_price });
                    }
                    let sell_price = base + offset;
                    if ctx.best_sell.is_none_or(|s| sell_price < s) {
                        out.push(OrderRequest { side: Side::Sell, qty: *qty, price: sell_price });
                    }
                }
                out
            }

            AlgorithmKind::ZeroIntelligence { private_value, offset_min, offset_max } => {
                let Some(fv) = ctx.fundamental_value else { return Vec::new() };
                let u: f64 = rng.random();
                let offset = offset_min + u * (offset_max - offset_min);
                let is_buy = rng.random::<bool>();
                let pv = private_value.get_value(ctx.position, is_buy);
                let price = Money::from_f64(fv + pv + if is_buy { offset } else { -offset });
                vec![OrderRequest {
                    side: if is_buy { Side::Buy } else { Side::Sell },
                    qty: 1,
                    price,
                }]
            }

            AlgorithmKind::StaleQuoteArbitrage { threshold, qty } => {
                let Some(fv) = ctx.fundamental_value else { return Vec::new() };
                let mut out = Vec::new();
                for level in &ctx.snapshot_sell {
                    if level.price.to_f64() < fv * (1.0 - threshold) {
                        out.push(OrderRequest { side: Side::Buy, qty: *qty, price: level.price });
                    }
                }
                for level in &ctx.snapshot_buy {
                    if level.price.to_f64() > fv * (1.0 + threshold) {
                        out.push(OrderRequest { side: Side::Sell, qty: *qty, price: level.price });
                    }
                }
                out
            }
        }
    }
}

fn random_order(last_price: Money, perturbation: f64, qmin: u64, qmax: u64, buy_chance: f64, rng: &mut impl Rng) -> Vec<OrderRequest> {
    let price = Money::from_f64((last_price.to_f64() * perturbation).max(0.01));
    let qty = if qmax > qmin { rng.random_range(qmin..=qmax) } else { qmin.max(1) };
    let side = if rng.random::<f64>() < buy_chance { Side::Buy } else { Side::Sell };
    vec![OrderRequest { side, qty, price }]
}

/// Piecewise-linear interpolation over `(time, price)` keyframes. Assumes
/// keyframes are sorted ascending by time; clamps to the first/last price
/// outside the covered range.
fn interpolate_keyframes(keyframes: &[(f64, Money)], t: f64, fallback: Money) -> Money {
    let Some(&(first_t, first_p)) = keyframes.first() else {
        return fallback;
    };
    let &(last_t, last_p) = keyframes.last().unwrap();
    if t <= first_t {
        return first_p;
    }
    if t >= last_t {
        return last_p;
    }
    for pair in keyframes.windows(2) {
        let (t0, p0) = pair[0];
        let (t1, p1) = pair[1];
        if t >= t0 && t <= t1 {
            if (t1 - t0).abs() < f64::EPSILON {
                return p0;
            }
            let frac = (t - t0) / (t1 - t0);
            let cents = p0.cents() as f64 + frac * (p1.cents() - p0.cents()) as f64;
            return Money::from_cents(cents.round() as i64);
        }
    }
    last_p
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn fixed_price_is_static() {
        let algo = AlgorithmKind::FixedPrice { side: Side::Buy, qty: 10, price: Money::from_f64(50.0) };
        let ctx = AlgorithmContext::new("A", Money::from_f64(100.0), 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let orders = algo.get_orders(&ctx, &mut rng);
        assert_eq!(orders, vec![OrderRequest { side: Side::Buy, qty: 10, price: Money::from_f64(50.0) }]);
    }

    #[test]
    fn threshold_buys_low_sells_high() {
        let algo = AlgorithmKind::Threshold {
            buy_threshold: Money::from_f64(95.0),
            sell_threshold: Money::from_f64(105.0),
            qty: 5,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let below = AlgorithmContext::new("A", Money::from_f64(90.0), 0.0);
        assert_eq!(algo.get_orders(&below, &mut rng)[0].side, Side::Buy);

        let above = AlgorithmContext::new("A", Money::from_f64(110.0), 0.0);
        assert_eq!(algo.get_orders(&above, &mut rng)[0].side, Side::Sell);

        let middle = AlgorithmContext::new("A", Money::from_f64(100.0), 0.0);
        assert!(algo.get_orders(&middle, &mut rng).is_empty());
    }

    #[test]
    fn simple_market_maker_refuses_crossed_quote() {
        let algo = AlgorithmKind::SimpleMarketMaker { distance: Money::from_f64(1.0), qty: 1 };
        let mut ctx = AlgorithmContext::new("A", Money::from_f64(100.0), 0.0);
        ctx.best_buy = Some(Money::from_f64(100.0));
        ctx.best_sell = Some(Money::from_f64(100.5));
        let mut rng = StdRng::seed_from_u64(1);
        // best_buy+1 = 101, best_sell-1 = 99.5: crossed, must refuse
        assert!(algo.get_orders(&ctx, &mut rng).is_empty());
    }

    #[test]
    fn simple_market_maker_quotes_when_wide_enough() {
        let algo = AlgorithmKind::SimpleMarketMaker { distance: Money::from_f64(1.0), qty: 1 };
        let mut ctx = AlgorithmContext::new("A", Money::from_f64(100.0), 0.0);
        ctx.best_buy = Some(Money::from_f64(90.0));
        ctx.best_sell = Some(Money::from_f64(110.0));
        let mut rng = StdRng::seed_from_u64(1);
        let orders = algo.get_orders(&ctx, &mut rng);
        assert_eq!(orders.len(), 2);
    }

    #[test]
    fn zero_intelligence_submits_single_share() {
        let pv = PrivateValue::new(5, 2.0, &mut StdRng::seed_from_u64(3));
        let algo = AlgorithmKind::ZeroIntelligence { private_value: pv, offset_min: 0.0, offset_max: 1.0 };
        let mut ctx = AlgorithmContext::new("A", Money::from_f64(100.0), 0.0);
        ctx.fundamental_value = Some(100.0);
        let mut rng = StdRng::seed_from_u64(4);
        let orders = algo.get_orders(&ctx, &mut rng);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].qty, 1);
    }

    #[test]
    fn stale_quote_arbitrage_targets_mispriced_levels() {
        let algo = AlgorithmKind::StaleQuoteArbitrage { threshold: 0.05, qty: 1 };
        let mut ctx = AlgorithmContext::new("A", Money::from_f64(100.0), 0.0);
        ctx.fundamental_value = Some(100.0);
        ctx.snapshot_sell = vec![BookLevel { price: Money::from_f64(90.0), quantity: 10 }];
        ctx.snapshot_buy = vec![BookLevel { price: Money::from_f64(112.0), quantity: 10 }];
        let mut rng = StdRng::seed_from_u64(1);
        let orders = algo.get_orders(&ctx, &mut rng);
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().any(|o| o.side == Side::Buy && o.price == Money::from_f64(90.0)));
        assert!(orders.iter().any(|o| o.side == Side::Sell && o.price == Money::from_f64(112.0)));
    }
}
