use std::collections::BTreeMap;

use cosmwasm_std::Storage;

use ics_core::{
    checked_sum, delegation::Delegation, rebalance::Holding, Address, OverflowError, Timestamp,
};

use crate::StorageExt as _;

#[rustfmt::skip]
mod key {
    use crate::MapKey;

    macro_rules! key {
        ($k:literal) => {
            concat!("delegations::", $k)
        };
    }

    macro_rules! map_key {
        ($k:literal) => {
            crate::MapKey::new(key!($k))
        };
    }

    pub const DELEGATION : MapKey = map_key!("delegation");
}

pub trait DelegationsExt: Storage {
    fn delegation(&self, delegator: &str, validator: &str) -> Option<Delegation> {
        self.json_at(key::DELEGATION.multi([&delegator, &validator]))
    }

    fn set_delegation(&mut self, delegation: &Delegation) {
        self.set_json(
            key::DELEGATION.multi([&delegation.delegator, &delegation.validator]),
            delegation,
        )
    }

    /// Every delegation of `delegator` in validator order
    fn delegations(&self, delegator: &str) -> Vec<Delegation> {
        self.json_with_prefix(key::DELEGATION.multi([&delegator]))
    }

    fn all_delegations(&self) -> Vec<Delegation> {
        self.json_with_prefix(key::DELEGATION.all())
    }
}

impl<T> DelegationsExt for T where T: Storage + ?Sized {}

fn get_or_default(storage: &dyn Storage, delegator: &str, validator: &str) -> Delegation {
    storage
        .delegation(delegator, validator)
        .unwrap_or_else(|| Delegation::new(delegator, validator, 0))
}

pub fn add(
    storage: &mut dyn Storage,
    delegator: &str,
    validator: &str,
    amount: u128,
) -> Result<Delegation, OverflowError> {
    let mut delegation = get_or_default(storage, delegator, validator);

    delegation.amount = delegation.amount.checked_add(amount).ok_or(OverflowError)?;

    storage.set_delegation(&delegation);

    Ok(delegation)
}

/// Decrease a delegation, a zero delegation is kept rather than removed
pub fn subtract(storage: &mut dyn Storage, delegator: &str, validator: &str, amount: u128) -> Delegation {
    let mut delegation = get_or_default(storage, delegator, validator);

    delegation.amount = delegation.amount.saturating_sub(amount);

    storage.set_delegation(&delegation);

    delegation
}

/// Prevent the delegation from being redelegated again until `until`
pub fn lock(storage: &mut dyn Storage, delegator: &str, validator: &str, until: Timestamp) {
    let mut delegation = get_or_default(storage, delegator, validator);

    delegation.redelegation_end = Some(delegation.redelegation_end.map_or(until, |end| end.max(until)));

    storage.set_delegation(&delegation);
}

/// Replace the delegator's amounts with those reported by the remote chain.
///
/// Known delegations missing from the report are set to zero.
pub fn refresh(storage: &mut dyn Storage, delegator: &str, reported: &BTreeMap<Address, u128>) {
    for mut delegation in storage.delegations(delegator) {
        if !reported.contains_key(&delegation.validator) {
            delegation.amount = 0;

            storage.set_delegation(&delegation);
        }
    }

    for (validator, amount) in reported {
        let mut delegation = get_or_default(storage, delegator, validator);

        delegation.amount = *amount;

        storage.set_delegation(&delegation);
    }
}

/// Current stake per validator
pub fn current(storage: &dyn Storage, delegator: &str) -> BTreeMap<Address, u128> {
    storage
        .delegations(delegator)
        .into_iter()
        .map(|d| (d.validator, d.amount))
        .collect()
}

/// Stake per validator which is free to be undelegated or redelegated at `now`
pub fn unlocked(storage: &dyn Storage, delegator: &str, now: Timestamp) -> BTreeMap<Address, u128> {
    storage
        .delegations(delegator)
        .into_iter()
        .filter(|d| !d.is_locked(now))
        .map(|d| (d.validator, d.amount))
        .collect()
}

pub fn holdings(storage: &dyn Storage, delegator: &str, now: Timestamp) -> Vec<Holding> {
    storage
        .delegations(delegator)
        .into_iter()
        .map(|d| Holding {
            locked: d.is_locked(now),
            validator: d.validator,
            amount: d.amount,
        })
        .collect()
}

pub fn total(storage: &dyn Storage, delegator: &str) -> Result<u128, OverflowError> {
    checked_sum(storage.delegations(delegator).into_iter().map(|d| d.amount))
}

#[cfg(test)]
mod test {
    use cosmwasm_std::testing::MockStorage;
    use test_utils::prelude::*;

    use super::*;

    const DELEGATOR: &str = "cosmos1delegate";

    #[test]
    fn subtract_saturates_and_keeps_zero() {
        let mut storage = MockStorage::default();

        add(&mut storage, DELEGATOR, "val_a", 100).unwrap();

        let delegation = subtract(&mut storage, DELEGATOR, "val_a", 150);

        assert_eq!(delegation.amount, 0);
        assert!(storage.delegation(DELEGATOR, "val_a").is_some());
    }

    #[test]
    fn add_detects_overflow() {
        let mut storage = MockStorage::default();

        add(&mut storage, DELEGATOR, "val_a", u128::MAX).unwrap();

        assert_eq!(add(&mut storage, DELEGATOR, "val_a", 1), Err(OverflowError));
    }

    #[test]
    fn refresh_is_absolute() {
        let mut storage = MockStorage::default();

        add(&mut storage, DELEGATOR, "val_a", 100).unwrap();
        add(&mut storage, DELEGATOR, "val_b", 100).unwrap();
        lock(&mut storage, DELEGATOR, "val_b", 500);

        let reported = [("val_b".to_owned(), 70), ("val_c".to_owned(), 30)].into();

        refresh(&mut storage, DELEGATOR, &reported);

        check(
            current(&storage, DELEGATOR),
            expect![[r#"
                {
                  "val_a": 0,
                  "val_b": 70,
                  "val_c": 30,
                }"#]],
        );

        assert_eq!(
            storage.delegation(DELEGATOR, "val_b").unwrap().redelegation_end,
            Some(500),
            "refresh keeps the lock"
        );
    }

    #[test]
    fn locked_stake_is_not_unlocked() {
        let mut storage = MockStorage::default();

        add(&mut storage, DELEGATOR, "val_a", 100).unwrap();
        add(&mut storage, DELEGATOR, "val_b", 200).unwrap();
        lock(&mut storage, DELEGATOR, "val_b", 1_000);
        lock(&mut storage, DELEGATOR, "val_b", 900);

        assert_eq!(unlocked(&storage, DELEGATOR, 1_000), [("val_a".to_owned(), 100)].into());
        assert_eq!(unlocked(&storage, DELEGATOR, 1_001).len(), 2);
        assert_eq!(total(&storage, DELEGATOR), Ok(300));
    }
}
