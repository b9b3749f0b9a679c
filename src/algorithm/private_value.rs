//! The classical zero-intelligence private-value marginal curve: a fixed
//! vector of `2m` draws, sorted descending, indexed around the agent's
//! current position so that buying becomes less attractive (and selling
//! more attractive) the longer an agent's position grows.

use rand::Rng;
use rand_distr::{Distribution, Normal};

#[derive(Clone, Debug, PartialEq)]
pub struct PrivateValue {
    max_pos: i64,
    values: Vec<f64>,
}

impl PrivateValue {
    /// Draw `2*max_pos` i.i.d. `Normal(0, variance.sqrt())` samples and
    /// sort them descending.
    pub fn new(max_pos: i64, variance: f64, rng: &mut impl Rng) -> Self {
        let dist = Normal::new(0.0, variance.max(0.0).sqrt()).expect("invalid private value variance");
        let mut values: Vec<f64> = (0..2 * max_pos).map(|_| dist.sample(rng)).collect();
        values.sort_by(|a, b| b.partial_cmp(a).unwrap());
        PrivateValue { max_pos, values }
    }

    /// `values[clamp(pos + m, 0, 2m-1) + (0 if buy else -1)]`.
    pub fn get_value(&self, pos: i64, is_buy: bool) -> f64 {
        let m = self.max_pos;
        let base = (pos + m).clamp(0, 2 * m - 1);
        let idx = if is_buy { base } else { base - 1 };
        let idx = idx.clamp(0, 2 * m - 1) as usize;
        self.values[idx]
    }
}
