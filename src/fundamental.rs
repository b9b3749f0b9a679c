//! A synthetic latent "true price" process, consulted by fundamental-aware
//! algorithms instead of the observed market.
//!
//! `value(t)` is lazy and memoized: the sequence `f[0..N]` only grows as far
//! as a caller has actually asked, and once computed a given `f[i]` never
//! changes, so repeated queries at the same or earlier tick are free and
//! reproducible.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FundamentalConfig {
    pub kappa: f64,
    pub mean: f64,
    /// Wire name `shock` (§6's `{kappa, mean, shock, prob}` schema); named
    /// `shock_sd` here since it's a standard deviation, not the boolean
    /// shock event itself.
    #[serde(rename = "shock")]
    pub shock_sd: f64,
    #[serde(rename = "prob")]
    pub shock_prob: f64,
}

impl Default for FundamentalConfig {
    fn default() -> Self {
        FundamentalConfig {
            kappa: 0.05,
            mean: 100.0,
            shock_sd: 1.0,
            shock_prob: 0.1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Fundamental {
    config: FundamentalConfig,
    series: Vec<f64>,
}

impl Fundamental {
    pub fn new(config: FundamentalConfig) -> Self {
        Fundamental {
            config,
            series: Vec::new(),
        }
    }

    /// `f[floor(t)]`, extending the memoized series forward as needed.
    pub fn value(&mut self, t: f64, rng: &mut impl Rng) -> f64 {
        let idx = t.max(0.0).floor() as usize;
        self.extend_to(idx, rng);
        self.series[idx]
    }

    fn extend_to(&mut self, idx: usize, rng: &mut impl Rng) {
        if self.series.is_empty() {
            let dist = Normal::new(self.config.mean, self.config.shock_sd.max(1e-12))
                .expect("invalid fundamental parameters");
            self.series.push(dist.sample(rng));
        }
        while self.series.len() <= idx {
            let prev = *self.series.last().unwrap();
            let shocked: bool = rng.random::<f64>() < self.config.shock_prob;
            let next = if shocked {
                let target = self.config.mean * self.config.kappa + prev * (1.0 - self.config.kappa);
                let dist = Normal::new(target, self.config.shock_sd.max(1e-12))
                    .expect("invalid fundamental parameters");
                dist.sample(rng)
            } else {
                prev
            };
            self.series.push(next);
        }
    }
}
