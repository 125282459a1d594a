use std::fmt::Display;
use std::iter::Sum;
use std::ops::Add;
use std::ops::AddAssign;
use std::str::FromStr;

use num_traits::CheckedAdd;
use num_traits::Zero;
use serde::de;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

/// `Coins` records an amount of the mined currency. Amounts are internally
/// represented by an atomic unit of one micro-coin, stored as a `u64`.
///
/// 1 coin = 10^6 micro-coins.
///
/// Every balance, rate and session total goes through this type, so all
/// additions are exact integer additions and there is no floating point drift
/// to round away after many reward cycles. Floating point values only appear
/// at the remote boundary and are rounded to 6 decimal places on the way in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coins(u64);

impl Coins {
    /// Number of decimal places kept internally.
    pub const DECIMALS: u32 = 6;

    /// Number of decimal places used by `Display`.
    pub const DISPLAY_DECIMALS: u32 = 4;

    pub const ZERO: Coins = Coins(0);

    const fn conversion_factor() -> u64 {
        10u64.pow(Self::DECIMALS)
    }

    /// Create an amount of the given number of whole coins.
    pub const fn new(num_coins: u32) -> Self {
        Self(num_coins as u64 * Self::conversion_factor())
    }

    pub const fn from_micro(micro: u64) -> Self {
        Self(micro)
    }

    pub const fn to_micro(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::conversion_factor() as f64
    }

    /// Multiply by a whole number of reward cycles. Saturates instead of
    /// wrapping.
    pub const fn scalar_mul(self, factor: u64) -> Self {
        Self(self.0.saturating_mul(factor))
    }

    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Fixed decimal rendering with all internal places, e.g. `0.360000`.
    pub fn to_fixed_string(self) -> String {
        let factor = Self::conversion_factor();
        format!(
            "{}.{:0width$}",
            self.0 / factor,
            self.0 % factor,
            width = Self::DECIMALS as usize
        )
    }
}

impl Add for Coins {
    type Output = Coins;

    fn add(self, rhs: Self) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl AddAssign for Coins {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl CheckedAdd for Coins {
    fn checked_add(&self, v: &Self) -> Option<Self> {
        self.0.checked_add(v.0).map(Self)
    }
}

impl Sum for Coins {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Coins::ZERO, |acc, x| acc + x)
    }
}

impl Zero for Coins {
    fn zero() -> Self {
        Self::ZERO
    }

    fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AmountConversionError {
    #[error("amount is not a number")]
    NaN,
    #[error("amount is infinite")]
    Infinity,
    #[error("amount is negative")]
    Negative,
    #[error("amount is too large")]
    Overflow,
    #[error("amount is not a decimal number")]
    InvalidFormat,
}

impl TryFrom<f64> for Coins {
    type Error = AmountConversionError;

    /// Rounds half away from zero to [`Coins::DECIMALS`] places.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_nan() {
            return Err(AmountConversionError::NaN);
        }
        if value.is_infinite() {
            return Err(AmountConversionError::Infinity);
        }
        if value < 0.0 {
            return Err(AmountConversionError::Negative);
        }
        let micro = (value * Self::conversion_factor() as f64).round();
        if micro >= u64::MAX as f64 {
            return Err(AmountConversionError::Overflow);
        }
        Ok(Self(micro as u64))
    }
}

impl FromStr for Coins {
    type Err = AmountConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(AmountConversionError::Negative);
        }
        let (integer_part, fractional_part) = s.split_once('.').unwrap_or((s, ""));
        if integer_part.is_empty() && fractional_part.is_empty() {
            return Err(AmountConversionError::InvalidFormat);
        }
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if !all_digits(integer_part) || !all_digits(fractional_part) {
            return Err(AmountConversionError::InvalidFormat);
        }

        let whole: u64 = if integer_part.is_empty() {
            0
        } else {
            integer_part
                .parse()
                .map_err(|_| AmountConversionError::Overflow)?
        };

        // Keep DECIMALS places, round on the first dropped digit.
        let places = Self::DECIMALS as usize;
        let mut fraction: u64 = 0;
        for (i, c) in fractional_part.chars().take(places).enumerate() {
            let digit = u64::from(c.to_digit(10).unwrap_or(0));
            fraction += digit * 10u64.pow((places - 1 - i) as u32);
        }
        let round_up = fractional_part
            .chars()
            .nth(places)
            .and_then(|c| c.to_digit(10))
            .is_some_and(|d| d >= 5);

        whole
            .checked_mul(Self::conversion_factor())
            .and_then(|m| m.checked_add(fraction))
            .and_then(|m| m.checked_add(u64::from(round_up)))
            .map(Self)
            .ok_or(AmountConversionError::Overflow)
    }
}

impl Display for Coins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dropped = 10u64.pow(Self::DECIMALS - Self::DISPLAY_DECIMALS);
        let rounded = self.0.saturating_add(dropped / 2) / dropped;
        let display_factor = 10u64.pow(Self::DISPLAY_DECIMALS);
        write!(
            f,
            "{}.{:0width$}",
            rounded / display_factor,
            rounded % display_factor,
            width = Self::DISPLAY_DECIMALS as usize
        )
    }
}

impl Serialize for Coins {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_fixed_string())
    }
}

/// Accepts the fixed decimal string written by [`Coins`] and, for records
/// written by older clients, plain JSON numbers.
impl<'de> Deserialize<'de> for Coins {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CoinsVisitor;

        impl de::Visitor<'_> for CoinsVisitor {
            type Value = Coins;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a non-negative decimal amount")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Coins, E> {
                Coins::from_str(v).map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Coins, E> {
                Coins::try_from(v).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Coins, E> {
                v.checked_mul(Coins::conversion_factor())
                    .map(Coins)
                    .ok_or_else(|| E::custom(AmountConversionError::Overflow))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Coins, E> {
                let unsigned =
                    u64::try_from(v).map_err(|_| E::custom(AmountConversionError::Negative))?;
                self.visit_u64(unsigned)
            }
        }

        deserializer.deserialize_any(CoinsVisitor)
    }
}
