//! Configuration document loading: `serde`/`serde_json`-backed structs
//! mirroring the recognized options, plus the tag-string -> concrete-variant
//! construction logic for agents, algorithms, and latency functions.
//!
//! `symbols` is represented as an array of `{symbol, starting_price}`
//! objects rather than a JSON object keyed by symbol. A JSON object's
//! natural `serde_json` representation (`serde_json::Map`, a `BTreeMap`
//! without the non-default `preserve_order` feature) would iterate
//! alphabetically rather than in declaration order, and pulling in that
//! feature would mean depending on `indexmap` for a concern an array
//! already solves for free.

use crate::agent::{AgentKind, AgentRecord};
use crate::algorithm::private_value::PrivateValue;
use crate::algorithm::AlgorithmKind;
use crate::error::SimError;
use crate::fundamental::FundamentalConfig;
use crate::latency::LatencyFunction;
use crate::types::money::Money;
use crate::types::order::Side;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Deserialize)]
pub struct SymbolConfig {
    pub symbol: String,
    pub starting_price: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    #[serde(default = "default_count")]
    pub count: u32,
    pub balance: f64,
    #[serde(default)]
    pub shares: HashMap<String, i64>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub typeargs: Value,
    pub algorithm: String,
    #[serde(default)]
    pub algorithmargs: Value,
    pub latency: String,
    #[serde(default)]
    pub latencyargs: Value,
}

fn default_count() -> u32 {
    1
}

#[derive(Clone, Debug, Deserialize)]
pub struct SimConfig {
    pub runtime: f64,
    pub seed: Option<u64>,
    #[serde(default)]
    pub fundamental: Option<FundamentalConfig>,
    pub symbols: Vec<SymbolConfig>,
    pub agents: Vec<AgentSpec>,
    #[serde(default = "default_volatility_window")]
    pub volatility_window: f64,
}

fn default_volatility_window() -> f64 {
    100.0
}

/// Never sampled from entropy: a fixed constant used whenever `seed` is
/// absent from the document, so an unseeded config is still reproducible.
pub const DEFAULT_SEED: u64 = 0xA17C_E55E_D;

impl SimConfig {
    pub fn load_from_str(s: &str) -> Result<Self, SimError> {
        serde_json::from_str(s).map_err(|e| SimError::config(format!("malformed config: {e}")))
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = fs::read_to_string(path.as_ref())
            .map_err(|e| SimError::config(format!("cannot read {}: {e}", path.as_ref().display())))?;
        Self::load_from_str(&text)
    }

    pub fn resolved_seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_SEED)
    }
}

fn f64_field(args: &Value, key: &str) -> Result<f64, SimError> {
    args.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| SimError::config(format!("missing or non-numeric field `{key}`")))
}

fn f64_field_or(args: &Value, key: &str, default: f64) -> f64 {
    args.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn u64_field(args: &Value, key: &str) -> Result<u64, SimError> {
    args.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| SimError::config(format!("missing or non-numeric field `{key}`")))
}

fn u64_field_or(args: &Value, key: &str, default: u64) -> u64 {
    args.get(key).and_then(Value::as_u64).unwrap_or(default)
}

pub fn build_latency(tag: &str, args: &Value) -> Result<LatencyFunction, SimError> {
    match tag {
        "linear" => Ok(LatencyFunction::linear(f64_field(args, "min")?, f64_field(args, "max")?)),
        "normal" => Ok(LatencyFunction::normal(f64_field(args, "mean")?, f64_field(args, "deviation")?)),
        other => Err(SimError::config(format!("unknown latency tag `{other}`"))),
    }
}

pub fn build_algorithm(tag: &str, args: &Value, rng: &mut impl Rng) -> Result<AlgorithmKind, SimError> {
    match tag {
        "fixedprice" => Ok(AlgorithmKind::FixedPrice {
            side: side_field(args, "side")?,
            qty: u64_field_or(args, "qty", 1),
            price: Money::from_f64(f64_field(args, "price")?),
        }),
        "randomlinear" => Ok(AlgorithmKind::RandomLinear {
            pct: f64_field(args, "pct")?,
            qmin: u64_field_or(args, "qmin", 1),
            qmax: u64_field_or(args, "qmax", 1),
            buy_chance: f64_field_or(args, "buychance", 0.5),
        }),
        "randomnormal" => Ok(AlgorithmKind::RandomNormal {
            sd: f64_field(args, "sd")?,
            qmin: u64_field_or(args, "qmin", 1),
            qmax: u64_field_or(args, "qmax", 1),
            buy_chance: f64_field_or(args, "buychance", 0.5),
        }),
        "randomlognormal" => Ok(AlgorithmKind::RandomLognormal {
            mu: f64_field_or(args, "mu", 0.0),
            sigma: f64_field(args, "sigma")?,
            qmin: u64_field_or(args, "qmin", 1),
            qmax: u64_field_or(args, "qmax", 1),
            buy_chance: f64_field_or(args, "buychance", 0.5),
        }),
        "buylowsellhigh" => Ok(AlgorithmKind::Threshold {
            buy_threshold: Money::from_f64(f64_field(args, "buy_threshold")?),
            sell_threshold: Money::from_f64(f64_field(args, "sell_threshold")?),
            qty: u64_field_or(args, "qty", 1),
        }),
        "meanreversion" => Ok(AlgorithmKind::MeanReversion {
            threshold: f64_field(args, "threshold")?,
            qty: u64_field_or(args, "qty", 1),
        }),
        "simplemarketmaker" => Ok(AlgorithmKind::SimpleMarketMaker {
            distance: Money::from_f64(f64_field(args, "distance")?),
            qty: u64_field_or(args, "qty", 1),
        }),
        "fixedmarketmaker" => {
            let keyframes = args
                .get("keyframes")
                .and_then(Value::as_array)
                .ok_or_else(|| SimError::config("fixedmarketmaker requires `keyframes`"))?
                .iter()
                .map(|kf| {
                    let t = kf.get(0).and_then(Value::as_f64).unwrap_or(0.0);
                    let p = kf.get(1).and_then(Value::as_f64).unwrap_or(0.0);
                    (t, Money::from_f64(p))
                })
                .collect();
            Ok(AlgorithmKind::FixedMarketMaker {
                keyframes,
                spread: Money::from_f64(f64_field(args, "spread")?),
                qty: u64_field_or(args, "qty", 1),
            })
        }
        "fundamentalmarketmaker" => Ok(AlgorithmKind::FundamentalMarketMaker {
            spread: Money::from_f64(f64_field(args, "spread")?),
            tick_spread: Money::from_f64(f64_field_or(args, "tick_spread", 0.0)),
            tick_count: u64_field_or(args, "tick_count", 1) as u32,
            qty: u64_field_or(args, "qty", 1),
        }),
        "zi" => {
            let max_pos = u64_field_or(args, "max_pos", 10) as i64;
            let variance = f64_field_or(args, "variance", 1.0);
            Ok(AlgorithmKind::ZeroIntelligence {
                private_value: PrivateValue::new(max_pos, variance, rng),
                offset_min: f64_field_or(args, "offset_min", 0.0),
                offset_max: f64_field_or(args, "offset_max", 0.0),
            })
        }
        "stalequotearbitrage" => Ok(AlgorithmKind::StaleQuoteArbitrage {
            threshold: f64_field(args, "threshold")?,
            qty: u64_field_or(args, "qty", 1),
        }),
        other => Err(SimError::config(format!("unknown algorithm tag `{other}`"))),
    }
}

fn side_field(args: &Value, key: &str) -> Result<Side, SimError> {
    match args.get(key).and_then(Value::as_str) {
        Some("buy") => Ok(Side::Buy),
        Some("sell") => Ok(Side::Sell),
        _ => Err(SimError::config(format!("field `{key}` must be \"buy\" or \"sell\""))),
    }
}

pub fn build_agent_kind(tag: &str, args: &Value) -> Result<(AgentKind, bool), SimError> {
    match tag {
        "basic" => Ok((AgentKind::Reactive, true)),
        "canceling" => Ok((
            AgentKind::CancelingReactive {
                order_lifespan: f64_field(args, "order_lifespan")?,
                order_chance: f64_field_or(args, "order_chance", 1.0),
                order_cooldown: f64_field_or(args, "order_cooldown", 0.0),
            },
            true,
        )),
        "recording" => Ok((
            AgentKind::HistoryRecording {
                order_lifespan: f64_field(args, "order_lifespan")?,
                order_chance: f64_field_or(args, "order_chance", 1.0),
                order_cooldown: f64_field_or(args, "order_cooldown", 0.0),
                time_interval: f64_field(args, "time_interval")?,
                history: Default::default(),
            },
            true,
        )),
        "basicmarketmaker" => Ok((AgentKind::BasicMarketMaker { last_buy: None, last_sell: None }, false)),
        "regulartrading" => Ok((AgentKind::IntervalTrader { interval: f64_field(args, "interval")? }, false)),
        "poisson" => Ok((AgentKind::PoissonTrader { rate: f64_field(args, "rate")? }, false)),
        "stalequotearbitrage" => Ok((
            AgentKind::SnapshotArbitrage {
                snapshot_interval: f64_field(args, "snapshot_interval")?,
                depth: u64_field_or(args, "depth", 5) as usize,
            },
            false,
        )),
        other => Err(SimError::config(format!("unknown agent type tag `{other}`"))),
    }
}

/// Expand one `AgentSpec` into `spec.count` `AgentRecord`s, named
/// `"<name><index>"` for `count > 1`. `next_id` is the first arena index to
/// assign; ids are handed out contiguously in replicate order.
///
/// `default_symbol` is the one book every agent is bound to: the config
/// format carries no per-agent symbol field (see the comment on
/// `AgentRecord::symbol`), so `Simulation` passes the first declared
/// symbol here.
pub fn build_agents(
    spec: &AgentSpec,
    next_id: usize,
    default_symbol: &str,
    rng: &mut impl Rng,
) -> Result<Vec<AgentRecord>, SimError> {
    let (kind_template, checks_overdraft) = build_agent_kind(&spec.kind, &spec.typeargs)?;
    let latency = build_latency(&spec.latency, &spec.latencyargs)?;

    let mut out = Vec::with_capacity(spec.count as usize);
    for i in 0..spec.count {
        let name = if spec.count == 1 { spec.name.clone() } else { format!("{}{}", spec.name, i) };
        let algorithm = build_algorithm(&spec.algorithm, &spec.algorithmargs, rng)?;
        let shares: HashMap<String, i64> = spec.shares.clone();
        out.push(AgentRecord::new(
            next_id + i as usize,
            name,
            spec.name.clone(),
            default_symbol,
            Money::from_f64(spec.balance),
            shares,
            algorithm,
            latency.clone(),
            kind_template.clone(),
            checks_overdraft,
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn loads_minimal_config() {
        let text = r#"{
            "runtime": 100.0,
            "symbols": [{"symbol": "A", "starting_price": 100.0}],
            "agents": [{
                "name": "trader",
                "balance": 1000.0,
                "type": "basic",
                "algorithm": "fixedprice",
                "algorithmargs": {"side": "buy", "qty": 1, "price": 99.0},
                "latency": "linear",
                "latencyargs": {"min": 0.0, "max": 1.0}
            }]
        }"#;
        let cfg = SimConfig::load_from_str(text).unwrap();
        assert_eq!(cfg.symbols.len(), 1);
        assert_eq!(cfg.resolved_seed(), DEFAULT_SEED);
    }

    #[test]
    fn unknown_algorithm_tag_is_a_config_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = build_algorithm("not_a_real_algorithm", &Value::Null, &mut rng).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn replicated_agents_get_suffixed_names() {
        let spec = AgentSpec {
            name: "zi".to_string(),
            count: 3,
            balance: 1000.0,
            shares: HashMap::new(),
            kind: "basic".to_string(),
            typeargs: Value::Null,
            algorithm: "fixedprice".to_string(),
            algorithmargs: serde_json::json!({"side": "buy", "qty": 1, "price": 10.0}),
            latency: "linear".to_string(),
            latencyargs: serde_json::json!({"min": 0.0, "max": 0.0}),
        };
        let mut rng = StdRng::seed_from_u64(1);
        let agents = build_agents(&spec, 0, "A", &mut rng).unwrap();
        let names: Vec<_> = agents.iter().map(|a| a.name.clone()).collect();
        assert_eq!(names, vec!["zi0", "zi1", "zi2"]);
    }
}
