use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
    str::FromStr,
};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    sqlite::{Sqlite, SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef},
    Decode,
    Encode,
    Type,
};
use thiserror::Error;

use crate::op;

//--------------------------------------       Amount        ---------------------------------------------------------
/// A decimal amount of money in some currency. The currency itself is tracked alongside the amount, never inside it.
///
/// Amounts are stored as canonical text in the database (trailing zeros stripped), so that two equal amounts always
/// produce the same string. This matters for price lock keys, which embed the amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

op!(binary Amount, Add, add);
op!(binary Amount, Sub, sub);
op!(inplace Amount, AddAssign, add_assign);
op!(inplace Amount, SubAssign, sub_assign);
op!(unary Amount, Neg, neg);

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as an amount: {0}")]
pub struct AmountConversionError(String);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Truncates the amount down to a whole multiple of `unit`. Amounts are never rounded up.
    ///
    /// A non-positive unit leaves the amount unchanged.
    pub fn truncate_to(&self, unit: Amount) -> Amount {
        if !unit.is_positive() {
            return *self;
        }
        let unit = unit.0.normalize();
        if unit.mantissa() == 1 {
            return Self(self.0.round_dp_with_strategy(unit.scale(), RoundingStrategy::ToZero).normalize());
        }
        // Division rounds past 28 significant digits, so the quotient can land on the next multiple of the unit.
        let mut result = (self.0 / unit).trunc() * unit;
        if result.abs() > self.0.abs() {
            if result.is_sign_negative() {
                result += unit;
            } else {
                result -= unit;
            }
        }
        Self(result.normalize())
    }

    /// Returns `self + unit * steps`.
    pub fn offset_by(&self, unit: Amount, steps: u32) -> Amount {
        Self((self.0 + unit.0 * Decimal::from(steps)).normalize())
    }
}

impl Mul<i64> for Amount {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * Decimal::from(rhs))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl FromStr for Amount {
    type Err = AmountConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Self).map_err(|e| AmountConversionError(format!("{s} ({e})")))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

//--------------------------------------   SQLite encoding   ---------------------------------------------------------
impl Type<Sqlite> for Amount {
    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as Type<Sqlite>>::compatible(ty)
    }
}

impl<'q> Encode<'q, Sqlite> for Amount {
    fn encode_by_ref(&self, buf: &mut Vec<SqliteArgumentValue<'q>>) -> IsNull {
        <String as Encode<'q, Sqlite>>::encode(self.to_string(), buf)
    }
}

impl<'r> Decode<'r, Sqlite> for Amount {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let text = <&str as Decode<Sqlite>>::decode(value)?;
        Ok(text.parse::<Amount>()?)
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn truncation_never_rounds_up() {
        let unit = Amount::from(dec!(0.01));
        assert_eq!(Amount::from(dec!(7.149999)).truncate_to(unit), Amount::from(dec!(7.14)));
        assert_eq!(Amount::from(dec!(7.1)).truncate_to(unit), Amount::from(dec!(7.10)));
        assert_eq!(Amount::from(dec!(0.009)).truncate_to(unit), Amount::ZERO);
        let odd_unit = Amount::from(dec!(0.05));
        assert_eq!(Amount::from(dec!(1.09)).truncate_to(odd_unit), Amount::from(dec!(1.05)));
        assert_eq!(Amount::from(dec!(3.3)).truncate_to(Amount::ZERO), Amount::from(dec!(3.3)));
    }

    #[test]
    fn truncation_at_full_precision() {
        // One ulp below 11 * 0.3. The quotient needs more digits than a Decimal holds and rounds up to 11.
        let price = Amount::from(dec!(3.2999999999999999999999999999));
        assert_eq!(price.truncate_to(Amount::from(dec!(0.3))), Amount::from(dec!(3.0)));
        assert_eq!((-price).truncate_to(Amount::from(dec!(0.3))), Amount::from(dec!(-3.0)));
        let price = Amount::from(dec!(0.0999999999999999999999999999));
        assert_eq!(price.truncate_to(Amount::from(dec!(0.0001))), Amount::from(dec!(0.0999)));
        assert_eq!(Amount::from(dec!(12.5)).truncate_to(Amount::from(10)), Amount::from(10));
        for unit in [dec!(0.05), dec!(0.3), dec!(0.0001), dec!(0.01)] {
            let unit = Amount::from(unit);
            assert!(price.truncate_to(unit) <= price, "{price} truncated to {unit} rounded up");
        }
    }

    #[test]
    fn canonical_text() {
        assert_eq!(Amount::from(dec!(10.0100)).to_string(), "10.01");
        assert_eq!(Amount::from(dec!(100.00)).to_string(), "100");
        assert_eq!(Amount::from(dec!(10.00)).offset_by(Amount::from(dec!(0.0001)), 3).to_string(), "10.0003");
        assert_eq!("  12.50 ".parse::<Amount>().unwrap(), Amount::from(dec!(12.5)));
        assert!("twelve".parse::<Amount>().is_err());
    }

    #[test]
    fn arithmetic() {
        let total: Amount = [dec!(1.5), dec!(2.25), dec!(0.25)].into_iter().map(Amount::from).sum();
        assert_eq!(total, Amount::from(4));
        let mut a = Amount::from(5);
        a -= Amount::from(dec!(0.5));
        assert_eq!(a * 2, Amount::from(9));
        assert!(!Amount::ZERO.is_positive());
        assert!(!(-a).is_positive());
        assert_eq!(serde_json::to_string(&Amount::from(dec!(1.20))).unwrap(), "\"1.20\"");
    }
}
