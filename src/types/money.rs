//! Fixed-point monetary values.
//!
//! Every price and every cash balance in the simulation is represented as an
//! integer number of cents rather than a raw `f64`. This makes the "rounded
//! to 2 decimal places" invariant from the data model exact instead of
//! emergent from rounding discipline, and keeps book comparisons free of
//! the classic `0.1 + 0.2` floating point trap.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A monetary amount, stored as an integer number of cents.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Construct from a whole number of cents.
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Construct from a floating point dollar amount, rounding to the
    /// nearest cent. This is the single write point for float-to-fixed
    /// conversion; everywhere else uses exact integer arithmetic.
    pub fn from_f64(dollars: f64) -> Self {
        Money((dollars * 100.0).round() as i64)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiply by an integer share count, as used when a Trade settles
    /// `amount * price` cash for `amount` shares.
    pub fn checked_mul_qty(&self, qty: u64) -> Option<Money> {
        self.0.checked_mul(qty as i64).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let negative = self.0 < 0;
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{}{}.{:02}",
            if negative { "-" } else { "" },
            abs / 100,
            abs % 100
        )
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for Money {
    type Output = Money;
    fn mul(self, rhs: i64) -> Money {
        Money(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let dollars = f64::deserialize(deserializer)?;
        Ok(Money::from_f64(dollars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_cents() {
        assert_eq!(Money::from_f64(1.005), Money::from_cents(101));
        assert_eq!(Money::from_f64(0.1) + Money::from_f64(0.2), Money::from_f64(0.3));
    }

    #[test]
    fn display_formats_two_decimals() {
        assert_eq!(Money::from_cents(4999).to_string(), "49.99");
        assert_eq!(Money::from_cents(-150).to_string(), "-1.50");
    }

    #[test]
    fn mul_by_quantity() {
        let price = Money::from_cents(2500);
        assert_eq!(price.checked_mul_qty(4), Some(Money::from_cents(10000)));
    }
}
