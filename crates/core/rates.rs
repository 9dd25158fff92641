use crate::{checked_sum, Decimal, OverflowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{bps} bps exceeds the maximum of {max} bps")]
pub struct BpsOutOfRange {
    pub bps: u32,
    pub max: u32,
}

macro_rules! bps_rate {
    ($T:ident, max=$max:expr, default=$default:expr) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(try_from = "u32", into = "u32")]
        pub struct $T {
            bps: u32,
        }

        impl $T {
            pub const MAX: u32 = $max;

            pub fn new(bps: u32) -> Option<Self> {
                if bps > Self::MAX {
                    return None;
                }

                Some(Self { bps })
            }

            pub fn raw(self) -> u32 {
                self.bps
            }

            pub fn rate(self) -> $crate::Decimal {
                $crate::Decimal::from_bps(self.bps)
            }
        }

        ::static_assertions::const_assert!($default <= $max);

        impl Default for $T {
            fn default() -> Self {
                Self { bps: $default }
            }
        }

        impl TryFrom<u32> for $T {
            type Error = BpsOutOfRange;

            fn try_from(bps: u32) -> Result<Self, Self::Error> {
                Self::new(bps).ok_or(BpsOutOfRange { bps, max: Self::MAX })
            }
        }

        impl From<$T> for u32 {
            fn from(rate: $T) -> Self {
                rate.bps
            }
        }
    };
}

macro_rules! percent {
    ($x:literal) => {
        $x * 100
    };
}

bps_rate!(MaxRateIncrease, max = percent!(100), default = 200);

bps_rate!(MaxRateDecrease, max = percent!(100), default = 500);

bps_rate!(GlobalCap, max = percent!(100), default = percent!(100));

bps_rate!(ValidatorCap, max = percent!(100), default = percent!(100));

// a multiple of the validator's own bond, 250x by default
bps_rate!(
    ValidatorBondCap,
    max = percent!(100_000),
    default = percent!(25_000)
);

/// Value backing the receipt supply
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Backing {
    pub delegated: u128,
    /// Rewards swept into the withdrawal account but not yet delegated
    pub rewards: u128,
    /// Withdrawals unbonded but not yet paid out
    pub in_flight: u128,
}

impl Backing {
    pub fn total(self) -> Result<u128, OverflowError> {
        checked_sum([self.delegated, self.rewards, self.in_flight])
    }
}

/// The next redemption rate, `backing / supply`, clipped to move at most by the given bounds
pub fn next_redemption_rate(
    current: Decimal,
    backing: Backing,
    supply: u128,
    max_increase: MaxRateIncrease,
    max_decrease: MaxRateDecrease,
) -> Result<Decimal, OverflowError> {
    if supply == 0 {
        return Ok(Decimal::one());
    }

    let raw = Decimal::from_ratio(backing.total()?, supply).ok_or(OverflowError)?;

    // the first computation has nothing to clip against
    if current.is_zero() {
        return Ok(raw);
    }

    let ceiling = current
        .checked_mul(Decimal::one().checked_add(max_increase.rate()).ok_or(OverflowError)?)
        .ok_or(OverflowError)?;

    let floor = current
        .checked_mul(Decimal::one().saturating_sub(max_decrease.rate()))
        .ok_or(OverflowError)?;

    Ok(raw.clamp(floor, ceiling))
}
