use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

#[allow(clippy::assign_op_pattern)]
mod uint {
    uint::construct_uint! {
        pub struct U256(4);
    }

    uint::construct_uint! {
        pub struct U512(8);
    }
}

pub use uint::{U256, U512};

impl From<U256> for U512 {
    fn from(value: U256) -> Self {
        let mut u256_le_bytes = [0u8; 8 * 4];

        value.to_little_endian(&mut u256_le_bytes);

        Self::from_little_endian(&u256_le_bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverflowError;

impl fmt::Display for OverflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("arithmetic overflow")
    }
}

impl std::error::Error for OverflowError {}

impl TryFrom<U512> for U256 {
    type Error = OverflowError;

    fn try_from(value: U512) -> Result<Self, Self::Error> {
        if value.bits() > 256 {
            return Err(OverflowError);
        }

        let mut u512_le_bytes = [0u8; 8 * 8];

        value.to_little_endian(&mut u512_le_bytes);

        Ok(Self::from_little_endian(&u512_le_bytes[..(8 * 4)]))
    }
}

/// `x * numer / denom` without intermediate overflow, truncating the result
pub fn mul_div_floor(x: u128, numer: u128, denom: u128) -> Option<u128> {
    if denom == 0 {
        return None;
    }

    let ans = U256::from(x) * U256::from(numer) / U256::from(denom);

    ans.try_into().ok()
}

/// Unsigned fixed point decimal with 18 fractional digits, backed by a U256.
///
/// All operations truncate toward zero, there is no rounding mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Decimal(U256);

impl Decimal {
    pub const DECIMAL_PLACES: usize = 18;

    fn scale() -> U256 {
        U256::exp10(Self::DECIMAL_PLACES)
    }

    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn one() -> Self {
        Self(Self::scale())
    }

    pub const fn raw(x: U256) -> Self {
        Self(x)
    }

    pub const fn into_raw(self) -> U256 {
        self.0
    }

    pub fn from_u128(x: u128) -> Self {
        // u128::MAX * 10^18 < 2^188
        Self(U256::from(x) * Self::scale())
    }

    pub fn from_ratio(numer: u128, denom: u128) -> Option<Self> {
        if denom == 0 {
            return None;
        }

        Some(Self(U256::from(numer) * Self::scale() / U256::from(denom)))
    }

    pub fn from_bps(bps: u32) -> Self {
        Self(U256::from(bps) * U256::exp10(Self::DECIMAL_PLACES - 4))
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        if self.0.is_zero() || rhs.0.is_zero() {
            return Some(Self::zero());
        }

        let ans = U512::from(self.0).checked_mul(U512::from(rhs.0))? / U512::from(Self::scale());

        ans.try_into().ok().map(Self)
    }

    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.0.is_zero() {
            return None;
        }

        if self.0.is_zero() {
            return Some(Self::zero());
        }

        let ans = U512::from(self.0).checked_mul(U512::from(Self::scale()))? / U512::from(rhs.0);

        ans.try_into().ok().map(Self)
    }

    /// Multiply an integer amount by this decimal, truncating the result
    pub fn mul_floor(self, x: u128) -> Option<u128> {
        let ans = U512::from(self.0).checked_mul(U512::from(U256::from(x)))?
            / U512::from(Self::scale());

        let ans: U256 = ans.try_into().ok()?;

        ans.try_into().ok()
    }

    /// Divide an integer amount by this decimal, truncating the result
    pub fn div_floor(self, x: u128) -> Option<u128> {
        Self::from_u128(x).checked_div(self)?.floor()
    }

    /// The integer part, if it fits into a u128
    pub fn floor(self) -> Option<u128> {
        (self.0 / Self::scale()).try_into().ok()
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::scale();
        let fractional = self.0 % Self::scale();

        if fractional.is_zero() {
            return write!(f, "{whole}");
        }

        let fractional = format!(
            "{:0>width$}",
            fractional.to_string(),
            width = Self::DECIMAL_PLACES
        );

        write!(f, "{whole}.{}", fractional.trim_end_matches('0'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDecimalError(String);

impl fmt::Display for ParseDecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid decimal: {}", self.0)
    }
}

impl std::error::Error for ParseDecimalError {}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDecimalError(s.to_owned());

        let (whole, fractional) = s.split_once('.').unwrap_or((s, ""));

        if whole.is_empty() || fractional.len() > Self::DECIMAL_PLACES {
            return Err(err());
        }

        if !whole.bytes().chain(fractional.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(err());
        }

        let whole = U256::from_dec_str(whole).map_err(|_| err())?;

        let fractional = if fractional.is_empty() {
            U256::zero()
        } else {
            let padded = format!("{fractional:0<width$}", width = Self::DECIMAL_PLACES);

            U256::from_dec_str(&padded).map_err(|_| err())?
        };

        whole
            .checked_mul(Self::scale())
            .and_then(|x| x.checked_add(fractional))
            .map(Self)
            .ok_or_else(err)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;

        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use test_utils::{check, prelude::expect};

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn u256_try_from_u512() {
        assert_eq!(U256::try_from(U512::zero()).unwrap(), U256::zero());
        assert_eq!(U256::try_from(U512::one()).unwrap(), U256::one());
        assert_eq!(
            U256::try_from(U512::from(U256::max_value())).unwrap(),
            U256::max_value()
        );
        assert!(U256::try_from(U512::from(U256::max_value()) + U512::one()).is_err());
        assert!(U256::try_from(U512::max_value()).is_err());
    }

    #[test]
    fn mul_div_floor_truncates() {
        assert_eq!(mul_div_floor(10, 1, 3), Some(3));
        assert_eq!(mul_div_floor(u128::MAX, 2, 2), Some(u128::MAX));
        assert_eq!(mul_div_floor(u128::MAX, 2, 1), None);
        assert_eq!(mul_div_floor(1, 1, 0), None);
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(dec("1").to_string(), "1");
        assert_eq!(dec("1.2").to_string(), "1.2");
        assert_eq!(dec("0.25").to_string(), "0.25");
        assert_eq!(dec("0.000000000000000001").to_string(), "0.000000000000000001");
        assert_eq!(dec("12.500").to_string(), "12.5");

        assert!("".parse::<Decimal>().is_err());
        assert!(".5".parse::<Decimal>().is_err());
        assert!("1.0000000000000000001".parse::<Decimal>().is_err());
        assert!("-1".parse::<Decimal>().is_err());
        assert!("1e5".parse::<Decimal>().is_err());
    }

    #[test]
    fn from_ratio() {
        assert_eq!(Decimal::from_ratio(1, 4).unwrap(), dec("0.25"));
        assert_eq!(Decimal::from_ratio(2, 3).unwrap().to_string(), "0.666666666666666666");
        assert!(Decimal::from_ratio(1, 0).is_none());
        assert_eq!(Decimal::from_bps(250), dec("0.025"));
    }

    #[test]
    fn checked_arithmetic() {
        let half = dec("0.5");
        let quarter = dec("0.25");

        assert_eq!(half.checked_add(quarter).unwrap(), dec("0.75"));
        assert_eq!(half.checked_sub(quarter).unwrap(), quarter);
        assert!(quarter.checked_sub(half).is_none());
        assert_eq!(half.checked_mul(half).unwrap(), quarter);
        assert_eq!(quarter.checked_div(half).unwrap(), half);
        assert!(half.checked_div(Decimal::zero()).is_none());
        assert_eq!(Decimal::zero().checked_div(half).unwrap(), Decimal::zero());

        let max = Decimal::from_u128(u128::MAX);

        assert!(max.checked_mul(max).is_none());
    }

    #[test]
    fn integer_conversions_truncate() {
        let rate = dec("1.2");

        assert_eq!(rate.div_floor(1_000_000).unwrap(), 833_333);
        assert_eq!(rate.mul_floor(833_333).unwrap(), 999_999);
        assert_eq!(dec("0.333333333333333333").mul_floor(3).unwrap(), 0);
        assert_eq!(dec("2.999").floor().unwrap(), 2);
        assert!(Decimal::zero().div_floor(1).is_none());
        assert!(Decimal::from_u128(u128::MAX).mul_floor(2).is_none());
    }

    #[test]
    fn serde_as_string() {
        check(dec("1.05"), expect![[r#""1.05""#]]);
        check(Decimal::one(), expect![[r#""1""#]]);
    }
}
