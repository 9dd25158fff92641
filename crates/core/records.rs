use serde::{Deserialize, Serialize};

use crate::{amount_str, Address, Coin, Epoch, Timestamp};

/// One undelegation issued for a validator at the end of an epoch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingRecord {
    pub validator: Address,
    pub epoch: Epoch,
    /// Sorted hashes of the withdrawals served by this undelegation
    pub related_txhash: Vec<String>,
    #[serde(with = "amount_str")]
    pub amount: u128,
    pub completion_time: Option<Timestamp>,
}

impl UnbondingRecord {
    pub fn new(validator: impl Into<Address>, epoch: Epoch, amount: u128, mut hashes: Vec<String>) -> Self {
        hashes.sort();
        hashes.dedup();

        Self {
            validator: validator.into(),
            epoch,
            related_txhash: hashes,
            amount,
            completion_time: None,
        }
    }

    pub fn forget(&mut self, hash: &str) {
        self.related_txhash.retain(|h| h != hash);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedelegationRecord {
    pub source: Address,
    pub destination: Address,
    pub epoch: Epoch,
    #[serde(with = "amount_str")]
    pub amount: u128,
    /// Set once the remote chain acknowledges the redelegation
    pub completion_time: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl RedelegationRecord {
    /// Records are dropped once their redelegation completed or the unbonding period passed
    pub fn is_collectable(&self, now: Timestamp, unbonding_period: u64) -> bool {
        let completed = self.completion_time.is_some_and(|t| t <= now);

        let expired = self.created_at.saturating_add(unbonding_period) < now;

        completed || expired
    }
}

/// A deposit observed on the deposit account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub hash: String,
    /// Empty for deposits which were rejected
    pub sender: Address,
    pub amount: Vec<Coin>,
    pub first_seen: Timestamp,
    pub completed: Option<Timestamp>,
}

impl Receipt {
    /// A marker for a rejected deposit, so it is not processed again
    pub fn nil(hash: impl Into<String>, now: Timestamp) -> Self {
        Self {
            hash: hash.into(),
            sender: Address::new(),
            amount: vec![],
            first_seen: now,
            completed: Some(now),
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.completed.is_none()
    }
}
