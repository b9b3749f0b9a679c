//! Per-run CSV rendering: one row per captured `DataPoint`, plus a second,
//! smaller end-of-run per-agent stats table. Both are plain row-renderers —
//! no cross-run aggregation, no charting.

use crate::error::SimError;
use crate::types::money::Money;
use std::io::Write;

/// A market-plus-agents snapshot captured immediately after one admitted
/// non-cancel order. `agents` is always in agent declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct DataPoint {
    pub time: f64,
    pub symbol: String,
    pub last_trade_price: Money,
    pub book_size: u64,
    pub gap: f64,
    pub queue_size: f64,
    pub agents: Vec<AgentSnapshot>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentSnapshot {
    pub name: String,
    pub hidden: bool,
    pub balance: Money,
    pub shares: i64,
    pub net_worth: Money,
    pub sent: u64,
    pub matched: u64,
    pub canceled: u64,
}

/// Per-counterparty-group rollup in the end-of-run stats row.
#[derive(Clone, Debug, PartialEq)]
pub struct CounterpartyStats {
    pub group_name: String,
    pub count: u64,
    pub buy_count: u64,
    pub avg_buy_price: f64,
    pub sell_count: u64,
    pub avg_sell_price: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentStats {
    pub name: String,
    pub avg_match_price: f64,
    pub avg_buy_price: f64,
    pub avg_sell_price: f64,
    pub sent: u64,
    pub matched: u64,
    pub canceled: u64,
    pub standing: Money,
    pub by_counterparty: Vec<CounterpartyStats>,
}

/// Sample standard deviation of `last_trade_price` over every data point
/// whose time falls in `[data_points[idx].time - window, data_points[idx].time]`.
pub fn volatility_at(data_points: &[DataPoint], idx: usize, window: f64) -> f64 {
    let now = data_points[idx].time;
    let prices: Vec<f64> = data_points[..=idx]
        .iter()
        .rev()
        .take_while(|dp| now - dp.time <= window)
        .map(|dp| dp.last_trade_price.to_f64())
        .collect();

    if prices.len() < 2 {
        return 0.0;
    }
    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    let variance =
        prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (prices.len() - 1) as f64;
    variance.sqrt()
}

/// Write one CSV row per `DataPoint`, with a volatility column computed by
/// scanning backward over `volatility_window` virtual-time units.
pub fn write_data_points<W: Write>(
    writer: W,
    data_points: &[DataPoint],
    volatility_window: f64,
) -> Result<(), SimError> {
    let mut wtr = csv::Writer::from_writer(writer);

    if let Some(first) = data_points.first() {
        let mut header = vec![
            "time".to_string(),
            "price".to_string(),
            "bookSize".to_string(),
            "gap".to_string(),
            "volatility".to_string(),
            "queueSize".to_string(),
        ];
        for agent in &first.agents {
            header.push(format!("cash/{}", agent.name));
        }
        for agent in &first.agents {
            header.push(format!("shares/{}", agent.name));
        }
        for agent in &first.agents {
            header.push(format!("netWorth/{}", agent.name));
        }
        for agent in first.agents.iter().filter(|a| !a.hidden) {
            header.push(format!("{} Orders/Sent", agent.name));
            header.push(format!("{} Orders/Matched", agent.name));
            header.push(format!("{} Orders/Canceled", agent.name));
        }
        wtr.write_record(&header)?;
    }

    for (idx, dp) in data_points.iter().enumerate() {
        let mut row = vec![
            dp.time.to_string(),
            dp.last_trade_price.to_f64().to_string(),
            dp.book_size.to_string(),
            dp.gap.to_string(),
            volatility_at(data_points, idx, volatility_window).to_string(),
            dp.queue_size.to_string(),
        ];
        for agent in &dp.agents {
            row.push(agent.balance.to_f64().to_string());
        }
        for agent in &dp.agents {
            row.push(agent.shares.to_string());
        }
        for agent in &dp.agents {
            row.push(agent.net_worth.to_f64().to_string());
        }
        for agent in dp.agents.iter().filter(|a| !a.hidden) {
            row.push(agent.sent.to_string());
            row.push(agent.matched.to_string());
            row.push(agent.canceled.to_string());
        }
        wtr.write_record(&row)?;
    }

    wtr.flush().map_err(SimError::Io)?;
    Ok(())
}

pub fn write_agent_stats<W: Write>(writer: W, stats: &[AgentStats]) -> Result<(), SimError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let max_counterparties = stats.iter().map(|s| s.by_counterparty.len()).max().unwrap_or(0);
    let mut header = vec![
        "name".to_string(),
        "avg_match_price".to_string(),
        "avg_buy_price".to_string(),
        "avg_sell_price".to_string(),
        "sent".to_string(),
        "matched".to_string(),
        "canceled".to_string(),
        "standing".to_string(),
    ];
    for i in 0..max_counterparties {
        header.push(format!("counterparty{i}/group"));
        header.push(format!("counterparty{i}/count"));
        header.push(format!("counterparty{i}/buy_count"));
        header.push(format!("counterparty{i}/avg_buy_price"));
        header.push(format!("counterparty{i}/sell_count"));
        header.push(format!("counterparty{i}/avg_sell_price"));
    }
    wtr.write_record(&header)?;

    for s in stats {
        let mut row = vec![
            s.name.clone(),
            s.avg_match_price.to_string(),
            s.avg_buy_price.to_string(),
            s.avg_sell_price.to_string(),
            s.sent.to_string(),
            s.matched.to_string(),
            s.canceled.to_string(),
            s.standing.to_f64().to_string(),
        ];
        for i in 0..max_counterparties {
            if let Some(cp) = s.by_counterparty.get(i) {
                row.push(cp.group_name.clone());
                row.push(cp.count.to_string());
                row.push(cp.buy_count.to_string());
                row.push(cp.avg_buy_price.to_string());
                row.push(cp.sell_count.to_string());
                row.push(cp.avg_sell_price.to_string());
            } else {
                row.extend(["".to_string(), "0".to_string(), "0".to_string(), "0".to_string(), "0".to_string(), "0".to_string()]);
            }
        }
        wtr.write_record(&row)?;
    }

    wtr.flush().map_err(SimError::Io)?;
    Ok(())
}
