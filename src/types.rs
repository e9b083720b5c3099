// 1.0: all the primitives live here. ids, coins, prices, amounts, leverage, timestamps.
// each is a newtype so the compiler catches type mixups between a price and a balance.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

// 1.1: coin slug as used by the price listing, e.g. "bitcoin". the ticker symbol travels next to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoinId(String);

impl CoinId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CoinId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => dec!(1),
            Side::Short => dec!(-1),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

// 1.2: price in quote currency per coin. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: quote currency amount. balances, margin, pnl, portfolio value all use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote(Decimal);

impl Quote {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    // add/sub/mul saturate at the Decimal range. valuation paths use these.
    // ledger mutations go through the checked_ variants and reject on overflow.
    pub fn add(&self, other: Quote) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn sub(&self, other: Quote) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn mul(&self, factor: Decimal) -> Self {
        Self(self.0.saturating_mul(factor))
    }

    pub fn checked_add(&self, other: Quote) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_mul(&self, factor: Decimal) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }

    pub fn negate(&self) -> Self {
        Self(-self.0)
    }

    pub fn max_zero(&self) -> Self {
        Self(self.0.max(Decimal::ZERO))
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Quote {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quote {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Quote {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(q))
    }
}

impl<'a> Sum<&'a Quote> for Quote {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(*q))
    }
}

// 1.4: leverage multiplier. must be >= 1x. the upper bound is a config concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Leverage(Decimal);

impl Leverage {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ONE {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value >= Decimal::ONE);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

// 1.5: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn elapsed_millis(&self, later: &Timestamp) -> i64 {
        later.0.saturating_sub(self.0)
    }

    pub fn plus_millis(&self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    pub fn to_rfc3339(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| self.0.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_sign() {
        assert_eq!(Side::Long.sign(), dec!(1));
        assert_eq!(Side::Short.sign(), dec!(-1));
    }

    #[test]
    fn price_rejects_non_positive() {
        assert!(Price::new(dec!(0)).is_none());
        assert!(Price::new(dec!(-1)).is_none());
        assert_eq!(Price::new(dec!(42.5)).unwrap().value(), dec!(42.5));
    }

    #[test]
    fn leverage_at_least_one() {
        assert_eq!(Leverage::new(dec!(10)).unwrap().value(), dec!(10));
        assert!(Leverage::new(dec!(1)).is_some());
        assert!(Leverage::new(dec!(0.5)).is_none());
    }

    #[test]
    fn quote_sum_and_floor() {
        let total: Quote = [Quote::new(dec!(10)), Quote::new(dec!(-25))].iter().sum();
        assert_eq!(total.value(), dec!(-15));
        assert_eq!(total.max_zero(), Quote::zero());
    }

    #[test]
    fn quote_overflow() {
        let max = Quote::new(Decimal::MAX);
        assert_eq!(max.add(Quote::new(dec!(1))), max);
        assert_eq!(max.mul(dec!(2)), max);
        assert!(max.checked_add(Quote::new(dec!(1))).is_none());
        assert!(max.checked_mul(dec!(2)).is_none());
        assert_eq!(Quote::new(dec!(2)).checked_mul(dec!(3)), Some(Quote::new(dec!(6))));
    }

    #[test]
    fn timestamp_formats_as_rfc3339() {
        let ts = Timestamp::from_millis(0);
        assert!(ts.to_rfc3339().starts_with("1970-01-01T00:00:00"));
        assert_eq!(ts.elapsed_millis(&Timestamp::from_millis(1500)), 1500);
        assert_eq!(Timestamp::from_millis(i64::MAX).plus_millis(1), Timestamp::from_millis(i64::MAX));
    }
}
