use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    rates::{GlobalCap, ValidatorBondCap, ValidatorCap},
    validator::{BondStatus, Validator},
    Address, Decimal, OverflowError,
};

/// Limits on how much of the zone's stake may be liquid staked
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LsmCaps {
    pub global_cap: GlobalCap,
    pub validator_cap: ValidatorCap,
    pub validator_bond_cap: ValidatorBondCap,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("liquid staked supply would exceed the global cap")]
    ExceedsGlobalCap,

    #[error("liquid shares of {0} would exceed the validator cap")]
    ExceedsValidatorCap(Address),

    #[error("liquid shares of {0} would exceed the validator bond cap")]
    ExceedsValidatorBondCap(Address),

    #[error(transparent)]
    Overflow(#[from] OverflowError),
}

fn sum_decimals(values: impl IntoIterator<Item = Decimal>) -> Result<Decimal, OverflowError> {
    values
        .into_iter()
        .try_fold(Decimal::zero(), |acc, x| acc.checked_add(x))
        .ok_or(OverflowError)
}

impl LsmCaps {
    /// Tokenizing `amount` more must keep the liquid fraction of bonded stake under the global cap
    pub fn check_global(&self, validators: &[Validator], amount: u128) -> Result<(), Error> {
        let bonded = || validators.iter().filter(|v| v.status == BondStatus::Bonded);

        let liquid = sum_decimals(bonded().map(|v| v.liquid_shares))?
            .checked_add(Decimal::from_u128(amount))
            .ok_or(OverflowError)?;

        let total = sum_decimals(bonded().map(|v| Decimal::from_u128(v.voting_power)))?;

        let Some(fraction) = liquid.checked_div(total) else {
            // nothing bonded, nothing to tokenize against
            return Err(Error::ExceedsGlobalCap);
        };

        if fraction > self.global_cap.rate() {
            return Err(Error::ExceedsGlobalCap);
        }

        Ok(())
    }

    pub fn check_validator(&self, validator: &Validator, amount: u128) -> Result<(), Error> {
        let amount = Decimal::from_u128(amount);

        let liquid = validator
            .liquid_shares
            .checked_add(amount)
            .ok_or(OverflowError)?;

        let tokens = Decimal::from_u128(validator.voting_power)
            .checked_add(amount)
            .ok_or(OverflowError)?;

        let exceeds = liquid
            .checked_div(tokens)
            .map_or(true, |fraction| fraction > self.validator_cap.rate());

        if exceeds {
            return Err(Error::ExceedsValidatorCap(validator.address.clone()));
        }

        let max_shares = validator
            .validator_bond_shares
            .checked_mul(self.validator_bond_cap.rate())
            .ok_or(OverflowError)?;

        if liquid > max_shares {
            return Err(Error::ExceedsValidatorBondCap(validator.address.clone()));
        }

        Ok(())
    }

    /// The most which may still be allocated to `validator` before either per validator cap is hit
    pub fn max_allocation(&self, validator: &Validator) -> Result<u128, OverflowError> {
        let by_bond = validator
            .validator_bond_shares
            .checked_mul(self.validator_bond_cap.rate())
            .ok_or(OverflowError)?
            .saturating_sub(validator.liquid_shares);

        let by_power = Decimal::from_u128(validator.voting_power)
            .checked_mul(self.validator_cap.rate())
            .ok_or(OverflowError)?
            .saturating_sub(validator.liquid_shares);

        by_bond.min(by_power).floor().ok_or(OverflowError)
    }

    pub fn max_allocations(
        &self,
        validators: &[Validator],
    ) -> Result<BTreeMap<Address, u128>, OverflowError> {
        validators
            .iter()
            .map(|v| Ok((v.address.clone(), self.max_allocation(v)?)))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use test_utils::{check_err, prelude::*};

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn validator(address: &str, voting_power: u128, liquid: &str, bond: &str) -> Validator {
        Validator {
            voting_power,
            status: BondStatus::Bonded,
            liquid_shares: dec(liquid),
            validator_bond_shares: dec(bond),
            ..Validator::new(address)
        }
    }

    fn caps(global: u32, validator: u32, bond: u32) -> LsmCaps {
        LsmCaps {
            global_cap: GlobalCap::new(global).unwrap(),
            validator_cap: ValidatorCap::new(validator).unwrap(),
            validator_bond_cap: ValidatorBondCap::new(bond).unwrap(),
        }
    }

    #[test]
    fn max_allocation_takes_the_tighter_cap() {
        // bond: 10 * 250 - 100 = 2_400, power: 10_000 * 0.5 - 100 = 4_900
        let val = validator("val_a", 10_000, "100", "10");

        assert_eq!(caps(10_000, 5_000, 2_500_000).max_allocation(&val).unwrap(), 2_400);

        // bond: 100 * 250 - 100, power: 10_000 * 0.1 - 100 = 900
        let val = validator("val_a", 10_000, "100", "100");

        assert_eq!(caps(10_000, 1_000, 2_500_000).max_allocation(&val).unwrap(), 900);
    }

    #[test]
    fn max_allocation_never_negative() {
        let val = validator("val_a", 1_000, "900", "1");

        assert_eq!(LsmCaps::default().max_allocation(&val).unwrap(), 0);
    }

    #[rstest]
    #[case(100, true)]
    #[case(250, true)]
    #[case(251, false)]
    fn global_cap(#[case] amount: u128, #[case] ok: bool) {
        let validators = [
            validator("val_a", 1_000, "0", "1000"),
            validator("val_b", 1_000, "250", "1000"),
        ];

        let res = caps(2_500, 10_000, 2_500_000).check_global(&validators, amount);

        assert_eq!(res.is_ok(), ok);
    }

    #[test]
    fn validator_caps() {
        let val = validator("val_a", 1_000, "100", "1");
        let caps = caps(10_000, 5_000, 1_000_000);

        check_err(
            caps.check_validator(&val, 101).unwrap_err(),
            expect!["liquid shares of val_a would exceed the validator bond cap"],
        );

        check_err(
            caps.check_validator(&validator("val_b", 100, "50", "100"), 10).unwrap_err(),
            expect!["liquid shares of val_b would exceed the validator cap"],
        );

        assert!(caps.check_validator(&val, 0).is_ok());
    }
}
