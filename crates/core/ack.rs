use serde::{Deserialize, Serialize};

use crate::{msg::RemoteMsg, Address, Coin, Timestamp};

/// A message from an acknowledged (or failed) interchain transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AckMsg {
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
    Transfer {
        sender: Address,
        receiver: Address,
        token: Coin,
    },
    /// A message type this contract never issues, identified by its type url
    Unknown(String),
}

impl From<RemoteMsg> for AckMsg {
    fn from(msg: RemoteMsg) -> Self {
        match msg {
            RemoteMsg::Delegate {
                delegator,
                validator,
                amount,
            } => Self::Delegate {
                delegator,
                validator,
                amount,
            },
            RemoteMsg::Undelegate {
                delegator,
                validator,
                amount,
            } => Self::Undelegate {
                delegator,
                validator,
                amount,
            },
            RemoteMsg::Redelegate {
                delegator,
                source,
                destination,
                amount,
            } => Self::Redelegate {
                delegator,
                source,
                destination,
                amount,
            },
            RemoteMsg::TokenizeShares {
                delegator,
                validator,
                amount,
                owner,
            } => Self::TokenizeShares {
                delegator,
                validator,
                amount,
                owner,
            },
            RemoteMsg::RedeemTokens { delegator, amount } => {
                Self::RedeemTokens { delegator, amount }
            }
            RemoteMsg::Send { from, to, amount } => Self::Send { from, to, amount },
            RemoteMsg::SetWithdrawAddress {
                delegator,
                withdraw_address,
            } => Self::SetWithdrawAddress {
                delegator,
                withdraw_address,
            },
            RemoteMsg::WithdrawRewards {
                delegator,
                validator,
            } => Self::WithdrawRewards {
                delegator,
                validator,
            },
        }
    }
}

/// Data returned by the remote chain for a successful message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckResponse {
    None,
    Undelegate {
        completion_time: Timestamp,
        /// Reported by chains which return the amount actually unbonded
        amount: Option<Coin>,
    },
    Redelegate {
        completion_time: Timestamp,
    },
    Tokenize {
        amount: Coin,
    },
    Redeem {
        amount: Coin,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckOutcome {
    Success(AckResponse),
    Error(String),
}

impl AckOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Every message of one interchain transaction, in submission order, paired with its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub memo: String,
    pub msgs: Vec<(AckMsg, AckOutcome)>,
}

impl Ack {
    pub fn success(memo: impl Into<String>, msgs: Vec<(AckMsg, AckResponse)>) -> Self {
        Self {
            memo: memo.into(),
            msgs: msgs
                .into_iter()
                .map(|(msg, res)| (msg, AckOutcome::Success(res)))
                .collect(),
        }
    }

    /// A failed or timed out transaction, every message shares the same error
    pub fn failure(memo: impl Into<String>, msgs: Vec<AckMsg>, error: &str) -> Self {
        Self {
            memo: memo.into(),
            msgs: msgs
                .into_iter()
                .map(|msg| (msg, AckOutcome::Error(error.to_owned())))
                .collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use test_utils::prelude::*;

    use super::*;

    #[test]
    fn failure_applies_to_every_message() {
        let ack = Ack::failure(
            "withdrawal/3",
            vec![
                AckMsg::WithdrawRewards {
                    delegator: "cosmos1delegate".to_owned(),
                    validator: "cosmosvaloper1a".to_owned(),
                },
                AckMsg::Unknown("/cosmos.gov.v1.MsgVote".to_owned()),
            ],
            "timeout",
        );

        assert!(ack.msgs.iter().all(|(_, outcome)| !outcome.is_success()));

        check(
            ack,
            expect![[r#"
                (
                  memo: "withdrawal/3",
                  msgs: [
                    (withdraw_rewards(
                      delegator: "cosmos1delegate",
                      validator: "cosmosvaloper1a",
                    ), error("timeout")),
                    (unknown("/cosmos.gov.v1.MsgVote"), error("timeout")),
                  ],
                )"#]],
        );
    }

    #[test]
    fn kinds() {
        let kind: &'static str = AckMsg::Unknown(String::new()).into();

        assert_eq!(kind, "unknown");

        let kind: &'static str = AckMsg::from(RemoteMsg::RedeemTokens {
            delegator: "d".to_owned(),
            amount: Coin::new(1, "v/1"),
        })
        .into();

        assert_eq!(kind, "redeem_tokens");
    }
}
