//! Construction helpers shared by unit tests across modules (`trade`,
//! `book`, `simulation`) that need a minimal, fully-formed `AgentRecord`
//! without wiring up a whole `SimConfig`.

#![cfg(test)]

use super::{AgentKind, AgentRecord};
use crate::algorithm::AlgorithmKind;
use crate::latency::LatencyFunction;
use crate::types::money::Money;
use crate::types::order::Side;
use std::collections::HashMap;

/// A reactive agent with zero balance/shares, a static fixed-price
/// algorithm, and zero latency — good enough for anything that only
/// exercises `apply_fill`/`attempt_submit` bookkeeping.
pub fn plain_agent(name: &str) -> AgentRecord {
    AgentRecord::new(
        0,
        name,
        name,
        "A",
        Money::ZERO,
        HashMap::new(),
        AlgorithmKind::FixedPrice { side: Side::Buy, qty: 1, price: Money::ZERO },
        LatencyFunction::linear(0.0, 0.0),
        AgentKind::Reactive,
        true,
    )
}
