//! Error kinds and policy.
//!
//! Only two things in this crate are ever fatal: a malformed configuration
//! document, and a broken invariant inside a running simulation. Everything
//! else (an `attempt_submit` refusal, a cancel of an id that already
//! filled) is a silent, bookkept non-event and never constructs a
//! `SimError` at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Unknown strategy/algorithm/latency tag, missing required arg, or
    /// malformed configuration document. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A broken invariant discovered while the simulation is running
    /// (zero-residual book entry, negative gap, duplicate order id, a
    /// matching loop that cannot make progress). Fatal; never recovered.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Propagated from the CSV/output writer only.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl SimError {
    pub fn config(msg: impl Into<String>) -> Self {
        SimError::Config(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        SimError::InvariantViolation(msg.into())
    }
}

pub type SimResult<T> = Result<T, SimError>;
