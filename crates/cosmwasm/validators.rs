use std::collections::BTreeSet;

use cosmwasm_std::Storage;

use ics_core::{
    admin::AdminRole,
    validator::{Validator, ValidatorReport},
    Address,
};

use crate::{event, Error, Outcome, StorageExt as _};

#[rustfmt::skip]
mod key {
    use crate::MapKey;

    macro_rules! key {
        ($k:literal) => {
            concat!("validators::", $k)
        };
    }

    macro_rules! map_key {
        ($k:literal) => {
            crate::MapKey::new(key!($k))
        };
    }

    pub const DENIED    : MapKey = map_key!("denied");
    pub const VALIDATOR : MapKey = map_key!("validator");
}

pub trait ValidatorsExt: Storage {
    fn validator(&self, address: &str) -> Option<Validator> {
        self.json_at(key::VALIDATOR.with(address))
    }

    fn require_validator(&self, address: &str) -> Result<Validator, Error> {
        self.validator(address)
            .ok_or_else(|| Error::UnknownValidator(address.to_owned()))
    }

    fn set_validator(&mut self, validator: &Validator) {
        self.set_json(key::VALIDATOR.with(&validator.address), validator)
    }

    /// Every registered validator in address order
    fn validators(&self) -> Vec<Validator> {
        self.json_with_prefix(key::VALIDATOR.all())
    }

    fn validator_addresses(&self) -> BTreeSet<Address> {
        self.validators().into_iter().map(|v| v.address).collect()
    }

    fn is_denied(&self, address: &str) -> bool {
        self.has_key(key::DENIED.with(address))
    }
}

impl<T> ValidatorsExt for T where T: Storage + ?Sized {}

/// Register a new validator, observed values arrive with the next validators query
pub fn add_validator(storage: &mut dyn Storage, address: &str) -> Result<(), Error> {
    if storage.validator(address).is_some() {
        return Err(Error::DuplicateValidator(address.to_owned()));
    }

    storage.set_validator(&Validator::new(address));

    Ok(())
}

/// Apply the validators reported by the remote chain.
///
/// Unseen validators are registered unless an admin denied them.
pub fn apply_reports(storage: &mut dyn Storage, reports: Vec<ValidatorReport>) -> Outcome {
    let mut outcome = Outcome::default();

    for report in reports {
        if storage.is_denied(&report.address) {
            continue;
        }

        let mut validator = match storage.validator(&report.address) {
            Some(validator) => validator,
            None => {
                outcome.push_event(
                    event("validator_registered").add_attribute("validator", &report.address),
                );

                Validator::new(&report.address)
            }
        };

        validator.apply_report(report);

        storage.set_validator(&validator);
    }

    outcome
}

/// Remove a validator from the registry and keep it from being registered again
pub fn deny_validator(
    storage: &mut dyn Storage,
    _: AdminRole,
    address: &str,
) -> Result<Outcome, Error> {
    storage.require_validator(address)?;

    storage.remove_key(key::VALIDATOR.with(address));
    storage.set_bool(key::DENIED.with(address), true);

    let mut outcome = Outcome::default();

    outcome.push_event(event("validator_denied").add_attribute("validator", address));

    Ok(outcome)
}
