use std::{
    fmt::{Display, Formatter},
    iter::Sum,
    str::FromStr,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{
    database::{HasArguments, HasValueRef},
    encode::IsNull,
    error::BoxDynError,
    sqlite::SqliteTypeInfo,
    Decode,
    Encode,
    Sqlite,
    Type,
};

/// Declares a decimal-backed quantity newtype. Quantities of different kinds cannot be mixed by accident, but each one
/// supports the arithmetic the allocation logic needs, and is stored as TEXT in SQLite so that no precision is lost.
macro_rules! decimal_quantity {
    ($(#[$meta:meta])* $name:ident, $suffix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Decimal);

        crate::op!(binary $name, Add, add);
        crate::op!(binary $name, Sub, sub);
        crate::op!(inplace $name, AddAssign, add_assign);
        crate::op!(inplace $name, SubAssign, sub_assign);
        crate::op!(unary $name, Neg, neg);

        impl $name {
            pub const ZERO: Self = Self(Decimal::ZERO);

            pub fn new(value: Decimal) -> Self {
                Self(value)
            }

            pub fn value(&self) -> Decimal {
                self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.is_zero()
            }

            pub fn is_positive(&self) -> bool {
                self.0 > Decimal::ZERO
            }

            pub fn is_negative(&self) -> bool {
                self.0 < Decimal::ZERO
            }

            /// The fraction `self / total`. Returns zero when `total` is zero.
            pub fn ratio_of(&self, total: Self) -> Decimal {
                if total.0.is_zero() {
                    Decimal::ZERO
                } else {
                    self.0 / total.0
                }
            }

            pub fn scale(&self, factor: Decimal) -> Self {
                Self(self.0 * factor)
            }

            pub fn abs(&self) -> Self {
                Self(self.0.abs())
            }
        }

        impl From<Decimal> for $name {
            fn from(value: Decimal) -> Self {
                Self(value)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(Decimal::from(value))
            }
        }

        impl FromStr for $name {
            type Err = rust_decimal::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Decimal::from_str(s.trim()).map(Self)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", self.0.normalize(), $suffix)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold(Self::ZERO, |acc, v| acc + v)
            }
        }

        impl<'a> Sum<&'a $name> for $name {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                iter.fold(Self::ZERO, |acc, v| acc + *v)
            }
        }

        impl Type<Sqlite> for $name {
            fn type_info() -> SqliteTypeInfo {
                <String as Type<Sqlite>>::type_info()
            }

            fn compatible(ty: &SqliteTypeInfo) -> bool {
                <String as Type<Sqlite>>::compatible(ty)
            }
        }

        impl<'q> Encode<'q, Sqlite> for $name {
            fn encode_by_ref(&self, buf: &mut <Sqlite as HasArguments<'q>>::ArgumentBuffer) -> IsNull {
                <String as Encode<'q, Sqlite>>::encode(self.0.to_string(), buf)
            }
        }

        impl<'r> Decode<'r, Sqlite> for $name {
            fn decode(value: <Sqlite as HasValueRef<'r>>::ValueRef) -> Result<Self, BoxDynError> {
                let text = <String as Decode<'r, Sqlite>>::decode(value)?;
                let value = Decimal::from_str(&text)?;
                Ok(Self(value))
            }
        }
    };
}

decimal_quantity!(
    /// Cargo weight, in whatever weight unit the deployment uses.
    Weight,
    ""
);

decimal_quantity!(
    /// Cargo volume.
    Volume,
    ""
);

decimal_quantity!(
    /// A monetary amount. Currency is implied by the deployment.
    Money,
    ""
);

decimal_quantity!(
    /// A share of a whole, expressed in percent units (`100` is the whole).
    Percentage,
    "%"
);

decimal_quantity!(
    /// A ratio in `[0, 1]`, such as a fill level or a minimum load requirement.
    Fraction,
    ""
);

impl Fraction {
    pub fn one() -> Self {
        Self(Decimal::ONE)
    }

    pub fn as_percentage(&self) -> Percentage {
        Percentage(self.0 * Decimal::ONE_HUNDRED)
    }
}

impl Percentage {
    pub fn hundred() -> Self {
        Self(Decimal::ONE_HUNDRED)
    }

    /// Builds a percentage from a fraction in `[0, 1]`.
    pub fn from_fraction(fraction: Decimal) -> Self {
        Self(fraction * Decimal::ONE_HUNDRED)
    }

    pub fn as_fraction(&self) -> Fraction {
        Fraction(self.0 / Decimal::ONE_HUNDRED)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let mut w = Weight::from(1000);
        w -= Weight::from(200);
        assert_eq!(w, Weight::from(800));
        assert_eq!(w + Weight::from(200), Weight::from(1000));
        assert_eq!(-w, Weight::from(-800));
        let total: Weight = [Weight::from(1), Weight::from(2), Weight::from(3)].iter().sum();
        assert_eq!(total, Weight::from(6));
    }

    #[test]
    fn ratio_of_zero_total() {
        assert_eq!(Weight::from(10).ratio_of(Weight::ZERO), Decimal::ZERO);
        assert_eq!(Weight::from(10).ratio_of(Weight::from(40)), Decimal::new(25, 2));
    }

    #[test]
    fn display_and_parse() {
        let p: Percentage = "20.00".parse().unwrap();
        assert_eq!(p.to_string(), "20%");
        assert_eq!(Percentage::from_fraction(Decimal::new(2, 1)), Percentage::from(20));
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn serializes_as_string() {
        let m = Money::from_str("1100.50").unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"1100.50\"");
    }
}
