pub mod ack;
pub mod admin;
pub mod delegations;
pub mod epoch;
pub mod intents;
pub mod rebalance;
pub mod receipts;
pub mod redelegations;
pub mod staking;
pub mod storage;
pub mod unbondings;
pub mod validators;
pub mod withdrawals;
pub mod zone;

#[cfg(test)]
mod mock;

use cosmwasm_std::{Event, StdError};
use cw_utils::PaymentError;
use serde::Serialize;

use ics_core::{
    admin::UnauthorizedError, delegation, deposit, intent, lsm, msg::Cmd, withdrawal,
    Address, OverflowError,
};

pub use storage::{MapKey, StorageExt};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("zone is not initialised")]
    ZoneNotInitialised,

    #[error("{0} account is not registered")]
    AccountNotRegistered(&'static str),

    #[error("unknown validator: {0}")]
    UnknownValidator(Address),

    #[error("validator {0} is already registered")]
    DuplicateValidator(Address),

    #[error("epoch cannot end before {next}")]
    EpochNotElapsed { next: u64 },

    #[error("intent carries no weight")]
    EmptyIntent,

    #[error("redemption rate is zero")]
    ZeroRate,

    #[error("tokenized redemptions are not enabled for this zone")]
    LsmDisabled,

    #[error(transparent)]
    Withdrawal(#[from] withdrawal::Error),

    #[error(transparent)]
    Intent(#[from] intent::Error),

    #[error(transparent)]
    Rebalance(#[from] ics_core::rebalance::Error),

    #[error(transparent)]
    Delegation(#[from] delegation::Error),

    #[error(transparent)]
    Deposit(#[from] deposit::Error),

    #[error(transparent)]
    Lsm(#[from] lsm::Error),

    #[error(transparent)]
    Overflow(#[from] OverflowError),

    #[error(transparent)]
    Unauthorized(#[from] UnauthorizedError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    CosmWasm(#[from] StdError),
}

/// Holdings of the local receipt token
pub trait BalanceOracle {
    fn balance_of(&self, address: &str, denom: &str) -> Result<u128, StdError>;

    fn supply_of(&self, denom: &str) -> Result<u128, StdError>;
}

/// Commands for the contract to execute along with the events describing what happened
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub cmds: Vec<Cmd>,
    pub events: Vec<Event>,
}

impl Outcome {
    pub fn push_cmd(&mut self, cmd: impl Into<Cmd>) {
        self.cmds.push(cmd.into());
    }

    pub fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn extend(&mut self, other: Outcome) {
        self.cmds.extend(other.cmds);
        self.events.extend(other.events);
    }
}

pub fn event(kind: &'static str) -> Event {
    Event::new("interchain_staking").add_attribute("kind", kind)
}
