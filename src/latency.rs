//! Per-action latency sampling.
//!
//! Every agent owns one `LatencyFunction`, drawn from against the
//! simulation's single deterministic RNG (never a thread-local or
//! process-global generator, so that two runs with the same seed draw
//! identical sequences regardless of agent iteration order elsewhere).

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LatencyFunction {
    /// Uniform on `[min, max]`.
    Linear { min: f64, max: f64 },
    /// `max(0, Normal(mean, dev))`.
    Normal { mean: f64, dev: f64 },
}

impl LatencyFunction {
    pub fn linear(min: f64, max: f64) -> Self {
        LatencyFunction::Linear { min, max }
    }

    pub fn normal(mean: f64, dev: f64) -> Self {
        LatencyFunction::Normal { mean, dev }
    }

    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        match *self {
            LatencyFunction::Linear { min, max } => {
                let u: f64 = rng.random();
                u * (max - min) + min
            }
            LatencyFunction::Normal { mean, dev } => {
                let dist = Normal::new(mean, dev.max(1e-12)).expect("invalid normal parameters");
                dist.sample(rng).max(0.0)
            }
        }
    }
}
