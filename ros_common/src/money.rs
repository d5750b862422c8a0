use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------       Money         ---------------------------------------------------------
/// An amount of currency expressed in minor units (one hundredth of the major unit).
///
/// All monetary arithmetic in the order server happens on this type. It is a thin wrapper over `i64`, so sums and
/// differences are exact; there is no floating point anywhere in the money path.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in currency minor units: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    /// `percent` percent of this amount, rounded half-up to the nearest minor unit.
    pub fn percent_of(&self, percent: i64) -> Self {
        let raw = self.0 * percent;
        Self((raw + raw.signum() * 50) / 100)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_formats_minor_units() {
        assert_eq!(Money::from(123_456).to_string(), "1234.56");
        assert_eq!(Money::from(5).to_string(), "0.05");
        assert_eq!(Money::from(-205).to_string(), "-2.05");
    }

    #[test]
    fn percent_rounds_half_up() {
        // 10% of 1.25 is 0.125, which rounds up to 0.13
        assert_eq!(Money::from(125).percent_of(10), Money::from(13));
        // 10% of 1.24 is 0.124, which rounds down to 0.12
        assert_eq!(Money::from(124).percent_of(10), Money::from(12));
        assert_eq!(Money::from(200_000_00).percent_of(10), Money::from(20_000_00));
        assert_eq!(Money::from(0).percent_of(50), Money::from(0));
    }

    #[test]
    fn sums_exactly() {
        let total: Money = [100, 250, 3].into_iter().map(Money::from).sum();
        assert_eq!(total, Money::from(353));
    }
}
