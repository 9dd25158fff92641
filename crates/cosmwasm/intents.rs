use std::collections::{BTreeMap, BTreeSet};

use cosmwasm_std::Storage;

use ics_core::{
    intent::{self, equal_weights, normalize, DelegatorIntent, ValidatorIntent},
    Address, Decimal, OverflowError,
};

use crate::{
    validators::ValidatorsExt as _, zone::ZoneExt as _, BalanceOracle, Error, StorageExt as _,
};

#[rustfmt::skip]
mod key {
    use crate::MapKey;

    macro_rules! key {
        ($k:literal) => {
            concat!("intents::", $k)
        };
    }

    macro_rules! map_key {
        ($k:literal) => {
            crate::MapKey::new(key!($k))
        };
    }

    pub const LIVE     : MapKey = map_key!("live");
    pub const SNAPSHOT : MapKey = map_key!("snapshot");
}

pub trait IntentsExt: Storage {
    fn intent(&self, delegator: &str) -> Option<DelegatorIntent> {
        self.json_at(key::LIVE.with(delegator))
    }

    fn snapshot_intent(&self, delegator: &str) -> Option<DelegatorIntent> {
        self.json_at(key::SNAPSHOT.with(delegator))
    }

    fn live_intents(&self) -> Vec<DelegatorIntent> {
        self.json_with_prefix(key::LIVE.all())
    }

    fn snapshot_intents(&self) -> Vec<DelegatorIntent> {
        self.json_with_prefix(key::SNAPSHOT.all())
    }
}

impl<T> IntentsExt for T where T: Storage + ?Sized {}

pub fn set_intent(storage: &mut dyn Storage, intent: Option<&DelegatorIntent>, delegator: &str) {
    match intent {
        Some(intent) => storage.set_json(key::LIVE.with(delegator), intent),
        None => storage.remove_key(key::LIVE.with(delegator)),
    }
}

/// Replace the delegator's intent with explicitly signalled weights
pub fn signal_intent(
    storage: &mut dyn Storage,
    delegator: &str,
    weights: Vec<ValidatorIntent>,
) -> Result<DelegatorIntent, Error> {
    let mut amounts: BTreeMap<Address, Decimal> = BTreeMap::new();

    for ValidatorIntent { validator, weight } in weights {
        storage.require_validator(&validator)?;

        let entry = amounts.entry(validator).or_default();

        *entry = entry.checked_add(weight).ok_or(OverflowError)?;
    }

    let intents = normalize(amounts)?;

    if intents.is_empty() {
        return Err(Error::EmptyIntent);
    }

    let intent = DelegatorIntent::new(delegator, intents);

    set_intent(storage, Some(&intent), delegator);

    Ok(intent)
}

/// Base denom value of the delegator's receipt tokens at the current redemption rate
pub fn holding_value(
    storage: &dyn Storage,
    oracle: &dyn BalanceOracle,
    delegator: &str,
) -> Result<u128, Error> {
    let balance = oracle.balance_of(delegator, &storage.local_denom())?;

    let value = storage
        .redemption_rate()
        .mul_floor(balance)
        .ok_or(OverflowError)?;

    Ok(value)
}

/// Blend the intent implied by a deposit into the depositor's existing intent
pub fn merge_intent(
    storage: &mut dyn Storage,
    oracle: &dyn BalanceOracle,
    delegator: &str,
    incoming: &[ValidatorIntent],
    incoming_value: u128,
) -> Result<DelegatorIntent, Error> {
    let merged = match storage.intent(delegator) {
        Some(current) => {
            let current_value = holding_value(storage, oracle, delegator)?;

            current.merge(current_value, incoming, incoming_value)?
        }
        None => DelegatorIntent::new(delegator, incoming.to_vec()),
    };

    set_intent(storage, Some(&merged), delegator);

    Ok(merged)
}

fn registered_only(mut intent: DelegatorIntent, registered: &BTreeSet<Address>) -> DelegatorIntent {
    intent.intents.retain(|i| registered.contains(&i.validator));
    intent
}

/// Recompute the zone's aggregate intent from a snapshot of every live intent, weighted by holdings
pub fn aggregate(
    storage: &mut dyn Storage,
    oracle: &dyn BalanceOracle,
) -> Result<Vec<ValidatorIntent>, Error> {
    for intent in storage.snapshot_intents() {
        storage.remove_key(key::SNAPSHOT.with(&intent.delegator));
    }

    for intent in storage.live_intents() {
        storage.set_json(key::SNAPSHOT.with(&intent.delegator), &intent);
    }

    let registered = storage.validator_addresses();

    let mut weighted = vec![];

    for intent in storage.snapshot_intents() {
        let value = holding_value(storage, oracle, &intent.delegator)?;

        weighted.push((registered_only(intent, &registered), value));
    }

    let validators: Vec<Address> = registered.into_iter().collect();

    let aggregate = intent::aggregate(weighted, &validators)?;

    storage.set_aggregate_intent(&aggregate);

    Ok(aggregate)
}

/// The zone's aggregate intent, or equal weights when none has been computed yet
pub fn aggregate_or_default(storage: &dyn Storage) -> Result<Vec<ValidatorIntent>, Error> {
    let aggregate = storage.aggregate_intent();

    if !aggregate.is_empty() {
        return Ok(aggregate);
    }

    let validators: Vec<Address> = storage.validator_addresses().into_iter().collect();

    Ok(equal_weights(&validators)?)
}

/// The delegator's own intent over registered validators, falling back to the aggregate
pub fn delegator_or_aggregate(
    storage: &dyn Storage,
    delegator: &str,
) -> Result<Vec<ValidatorIntent>, Error> {
    if let Some(intent) = storage.intent(delegator) {
        let registered = storage.validator_addresses();

        let weights = registered_only(intent, &registered)
            .intents
            .into_iter()
            .map(|i| (i.validator, i.weight))
            .collect();

        let intents = normalize(weights)?;

        if !intents.is_empty() {
            return Ok(intents);
        }
    }

    aggregate_or_default(storage)
}
