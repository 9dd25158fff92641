use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{amount_str, checked_sum, intent::ValidatorIntent, Address, OverflowError, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: Address,
    pub validator: Address,
    #[serde(with = "amount_str")]
    pub amount: u128,
    /// Set when stake arrived through a redelegation, it may not be moved again until then
    pub redelegation_end: Option<Timestamp>,
}

impl Delegation {
    pub fn new(delegator: impl Into<Address>, validator: impl Into<Address>, amount: u128) -> Self {
        Self {
            delegator: delegator.into(),
            validator: validator.into(),
            amount,
            redelegation_end: None,
        }
    }

    pub fn is_locked(&self, now: Timestamp) -> bool {
        self.redelegation_end.is_some_and(|end| end >= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub validator: Address,
    #[serde(with = "amount_str")]
    pub amount: u128,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("cannot allocate against an empty intent")]
    EmptyIntent,

    #[error(transparent)]
    Overflow(#[from] OverflowError),
}

/// Split `amount` across the intent's validators.
///
/// Validators furthest below their target are topped up first, anything left over is spread by
/// weight and truncation dust goes to the first validator in address order.
pub fn plan(
    amount: u128,
    intent: &[ValidatorIntent],
    current: &BTreeMap<Address, u128>,
) -> Result<Vec<Allocation>, Error> {
    let mut intent: Vec<&ValidatorIntent> = intent.iter().filter(|i| !i.weight.is_zero()).collect();

    if intent.is_empty() {
        return Err(Error::EmptyIntent);
    }

    intent.sort_by(|a, b| a.validator.cmp(&b.validator));

    let current_sum = checked_sum(current.values().copied())?;

    let total = current_sum.checked_add(amount).ok_or(OverflowError)?;

    let mut deltas = Vec::with_capacity(intent.len());

    for i in &intent {
        let target = i.weight.mul_floor(total).ok_or(OverflowError)?;

        let current = current.get(&i.validator).copied().unwrap_or_default();

        deltas.push(target.saturating_sub(current));
    }

    let delta_sum = checked_sum(deltas.iter().copied())?;

    let unequal_split = delta_sum.min(amount);

    let mut allocations: Vec<u128> = deltas
        .iter()
        .map(|delta| num::mul_div_floor(*delta, unequal_split, delta_sum).unwrap_or_default())
        .collect();

    let equal_split = amount - unequal_split;

    if equal_split != 0 {
        for (allocation, i) in allocations.iter_mut().zip(&intent) {
            let share = i.weight.mul_floor(equal_split).ok_or(OverflowError)?;

            *allocation = allocation.checked_add(share).ok_or(OverflowError)?;
        }
    }

    let allocated = checked_sum(allocations.iter().copied())?;

    // weights may sum to slightly more than one after normalisation
    if allocated > amount {
        return Err(OverflowError.into());
    }

    allocations[0] += amount - allocated;

    Ok(intent
        .into_iter()
        .zip(allocations)
        .filter(|(_, amount)| *amount != 0)
        .map(|(i, amount)| Allocation {
            validator: i.validator.clone(),
            amount,
        })
        .collect())
}
