use serde::{Deserialize, Serialize};

use crate::{Address, Coin};

/// The interchain accounts controlled on the remote chain
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Account {
    /// Receives user deposits
    Deposit = 0,
    /// Holds the zone's stake
    Delegation = 1,
    /// Receives staking rewards
    Withdrawal = 2,
    /// Delegates a small amount to each validator to observe their rewards
    Performance = 3,
}

impl Account {
    const DEPOSIT_ID: &'static str = "deposit";
    const DELEGATION_ID: &'static str = "delegate";
    const WITHDRAWAL_ID: &'static str = "withdrawal";
    const PERFORMANCE_ID: &'static str = "performance";

    pub const fn id(&self) -> &'static str {
        match self {
            Self::Deposit => Self::DEPOSIT_ID,
            Self::Delegation => Self::DELEGATION_ID,
            Self::Withdrawal => Self::WITHDRAWAL_ID,
            Self::Performance => Self::PERFORMANCE_ID,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            Self::DEPOSIT_ID => Some(Self::Deposit),
            Self::DELEGATION_ID => Some(Self::Delegation),
            Self::WITHDRAWAL_ID => Some(Self::Withdrawal),
            Self::PERFORMANCE_ID => Some(Self::Performance),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Account {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Deposit),
            1 => Ok(Self::Delegation),
            2 => Ok(Self::Withdrawal),
            3 => Ok(Self::Performance),
            _ => Err(value),
        }
    }
}

/// A message executed by one of the interchain accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteMsg {
    Delegate {
        delegator: Address,
        validator: Address,
        amount: Coin,
    },
    Undelegate {
        delegator: Address,
        validator: Address,
        amount: Coin,
    },
    Redelegate {
        delegator: Address,
        source: Address,
        destination: Address,
        amount: Coin,
    },
    TokenizeShares {
        delegator: Address,
        validator: Address,
        amount: Coin,
        owner: Address,
    },
    RedeemTokens {
        delegator: Address,
        amount: Coin,
    },
    Send {
        from: Address,
        to: Address,
        amount: Vec<Coin>,
    },
    SetWithdrawAddress {
        delegator: Address,
        withdraw_address: Address,
    },
    WithdrawRewards {
        delegator: Address,
        validator: Address,
    },
}

/// A batch of messages submitted through one interchain account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTx {
    pub account: Account,
    pub msgs: Vec<RemoteMsg>,
    pub memo: String,
}

impl RemoteTx {
    pub fn new(account: Account, msgs: Vec<RemoteMsg>, memo: impl ToString) -> Self {
        Self {
            account,
            msgs,
            memo: memo.to_string(),
        }
    }
}

/// Side effects requested by the keeper, applied by the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cmd {
    Submit(RemoteTx),
    Mint {
        #[serde(with = "crate::amount_str")]
        amount: u128,
        recipient: Address,
    },
    Burn {
        #[serde(with = "crate::amount_str")]
        amount: u128,
    },
}

impl From<RemoteTx> for Cmd {
    fn from(tx: RemoteTx) -> Self {
        Self::Submit(tx)
    }
}
