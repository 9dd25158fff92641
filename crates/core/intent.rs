use std::collections::BTreeMap;

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};

use crate::{Address, Decimal, OverflowError};

/// Weight bytes in a memo intent are expressed in units of 1/200
const MEMO_WEIGHT_DENOM: u128 = 200;
const MEMO_ADDRESS_LEN: usize = 20;
const MEMO_FIELD_SEPARATOR: u8 = 0xFF;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorIntent {
    pub validator: Address,
    pub weight: Decimal,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorIntent {
    pub delegator: Address,
    pub intents: Vec<ValidatorIntent>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no validators to weight")]
    NoValidators,

    #[error("memo intent is truncated")]
    TruncatedMemo,

    #[error("memo intent weight {0} exceeds {MEMO_WEIGHT_DENOM}")]
    InvalidMemoWeight(u8),

    #[error("memo intent is empty")]
    EmptyMemo,

    #[error("invalid validator address prefix: {0}")]
    InvalidPrefix(String),

    #[error(transparent)]
    Overflow(#[from] OverflowError),
}

impl DelegatorIntent {
    pub fn new(delegator: impl Into<Address>, intents: Vec<ValidatorIntent>) -> Self {
        Self {
            delegator: delegator.into(),
            intents,
        }
    }

    /// Turn relative weights into absolute amounts of `value`
    pub fn ordinalize(&self, value: u128) -> Result<Vec<(Address, Decimal)>, OverflowError> {
        let value = Decimal::from_u128(value);

        self.intents
            .iter()
            .map(|i| {
                let amount = i.weight.checked_mul(value).ok_or(OverflowError)?;

                Ok((i.validator.clone(), amount))
            })
            .collect()
    }

    /// Blend `incoming` (worth `incoming_value`) into this intent (worth `current_value`)
    pub fn merge(
        &self,
        current_value: u128,
        incoming: &[ValidatorIntent],
        incoming_value: u128,
    ) -> Result<Self, OverflowError> {
        let incoming = DelegatorIntent::new(self.delegator.clone(), incoming.to_vec());

        let mut amounts: BTreeMap<Address, Decimal> = BTreeMap::new();

        for (validator, amount) in self
            .ordinalize(current_value)?
            .into_iter()
            .chain(incoming.ordinalize(incoming_value)?)
        {
            let entry = amounts.entry(validator).or_default();

            *entry = entry.checked_add(amount).ok_or(OverflowError)?;
        }

        Ok(Self::new(self.delegator.clone(), normalize(amounts)?))
    }
}

/// Normalise absolute amounts into weights summing to one, dropping zero weights.
/// Returns an empty list when the total is zero.
pub fn normalize(amounts: BTreeMap<Address, Decimal>) -> Result<Vec<ValidatorIntent>, OverflowError> {
    let mut total = Decimal::zero();

    for amount in amounts.values() {
        total = total.checked_add(*amount).ok_or(OverflowError)?;
    }

    if total.is_zero() {
        return Ok(vec![]);
    }

    let mut intents = Vec::with_capacity(amounts.len());

    for (validator, amount) in amounts {
        let weight = amount.checked_div(total).ok_or(OverflowError)?;

        if weight.is_zero() {
            continue;
        }

        intents.push(ValidatorIntent { validator, weight });
    }

    Ok(intents)
}

/// Equal weighting across `validators`, in address order
pub fn equal_weights(validators: &[Address]) -> Result<Vec<ValidatorIntent>, Error> {
    let count = u128::try_from(validators.len()).map_err(|_| OverflowError)?;

    let weight = Decimal::from_ratio(1, count).ok_or(Error::NoValidators)?;

    let mut validators = validators.to_vec();

    validators.sort();

    Ok(validators
        .into_iter()
        .map(|validator| ValidatorIntent { validator, weight })
        .collect())
}

/// Aggregate delegator intents, each paired with the base denom value of the delegator's holdings.
///
/// When nothing is held the result is an equal weighting across `validators`.
pub fn aggregate(
    intents: impl IntoIterator<Item = (DelegatorIntent, u128)>,
    validators: &[Address],
) -> Result<Vec<ValidatorIntent>, Error> {
    let mut amounts: BTreeMap<Address, Decimal> = BTreeMap::new();

    for (intent, value) in intents {
        for (validator, amount) in intent.ordinalize(value)? {
            let entry = amounts.entry(validator).or_default();

            *entry = entry.checked_add(amount).ok_or(OverflowError)?;
        }
    }

    let aggregate = normalize(amounts)?;

    if aggregate.is_empty() {
        return equal_weights(validators);
    }

    Ok(aggregate)
}

/// Parse the binary intent carried in a deposit memo.
///
/// Each entry is one weight byte (in 1/200ths) followed by a 20 byte validator address. A 0xFF
/// byte ends the intent, anything after it belongs to other memo fields.
pub fn parse_memo_intent(memo: &[u8], valoper_prefix: &str) -> Result<Vec<ValidatorIntent>, Error> {
    let hrp = Hrp::parse(valoper_prefix).map_err(|_| Error::InvalidPrefix(valoper_prefix.to_owned()))?;

    let field = memo
        .split(|b| *b == MEMO_FIELD_SEPARATOR)
        .next()
        .unwrap_or_default();

    if field.is_empty() {
        return Err(Error::EmptyMemo);
    }

    if field.len() % (MEMO_ADDRESS_LEN + 1) != 0 {
        return Err(Error::TruncatedMemo);
    }

    let mut amounts: BTreeMap<Address, Decimal> = BTreeMap::new();

    for entry in field.chunks(MEMO_ADDRESS_LEN + 1) {
        let (weight, address) = entry.split_first().ok_or(Error::TruncatedMemo)?;

        if u128::from(*weight) > MEMO_WEIGHT_DENOM {
            return Err(Error::InvalidMemoWeight(*weight));
        }

        let weight =
            Decimal::from_ratio((*weight).into(), MEMO_WEIGHT_DENOM).ok_or(OverflowError)?;

        let validator = bech32::encode::<Bech32>(hrp, address)
            .map_err(|_| Error::InvalidPrefix(valoper_prefix.to_owned()))?;

        let entry = amounts.entry(validator).or_default();

        *entry = entry.checked_add(weight).ok_or(OverflowError)?;
    }

    let intents = normalize(amounts)?;

    if intents.is_empty() {
        return Err(Error::EmptyMemo);
    }

    Ok(intents)
}
