use std::str::FromStr;

use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{to_json_binary, Binary, Decimal, Env, MessageInfo, StdError, Storage, Uint128};
use cw_utils::{must_pay, nonpayable};
use strum::{IntoEnumIterator, IntoStaticStr};

use ics_core::{
    intent::ValidatorIntent, msg::Account, withdrawal::WithdrawalStatus,
    Coin as CoreCoin, Decimal as CoreDecimal,
};

use crate::{
    delegations::DelegationsExt as _,
    epoch, event,
    intents::{self, IntentsExt as _},
    receipts::ReceiptsExt as _,
    redelegations::RedelegationsExt as _,
    unbondings::UnbondingsExt as _,
    validators::ValidatorsExt as _,
    withdrawals::{self, Redemption, WithdrawalsExt as _},
    zone::ZoneExt as _,
    BalanceOracle, Error, Outcome,
};

#[cw_serde]
pub struct IntentWeight {
    pub validator: String,
    pub weight: Decimal,
}

#[cw_serde]
#[derive(IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ExecuteMsg {
    /// Hand over receipt tokens to be redeemed for the staked asset, paid to `recipient` on the
    /// remote chain
    RequestRedemption {
        recipient: String,
        /// Take the stake as tokenized shares instead of waiting out the unbonding period
        tokenize: Option<bool>,
    },

    /// Replace the sender's delegation intent, an empty list clears it
    SignalIntent { intents: Vec<IntentWeight> },

    /// Close the current epoch, anyone may call this once it is due
    EndEpoch {},
}

impl ExecuteMsg {
    /// A string representing the message 'kind'
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

#[cw_serde]
pub struct AccountAddress {
    pub id: String,
    pub address: String,
}

#[cw_serde]
pub struct ZoneResponse {
    pub chain_id: String,
    pub connection_id: String,
    pub base_denom: String,
    pub local_denom: String,
    pub account_prefix: String,
    pub epoch: u64,
    pub last_epoch_time: u64,
    pub redemption_rate: Decimal,
    pub last_redemption_rate: Decimal,
    pub accounts: Vec<AccountAddress>,
    pub aggregate_intent: Vec<IntentWeight>,
    pub rewards_balance: Uint128,
    pub withdrawal_waitgroup: u32,
}

#[cw_serde]
pub struct ValidatorInfo {
    pub address: String,
    pub voting_power: Uint128,
    pub commission_rate: Decimal,
    pub status: String,
    pub jailed: bool,
    pub score: Decimal,
}

#[cw_serde]
pub struct ValidatorsResponse {
    pub validators: Vec<ValidatorInfo>,
}

#[cw_serde]
pub struct DelegationInfo {
    pub validator: String,
    pub amount: Uint128,
    pub redelegation_end: Option<u64>,
}

#[cw_serde]
pub struct DelegationsResponse {
    pub delegations: Vec<DelegationInfo>,
}

#[cw_serde]
pub struct IntentResponse {
    pub intents: Vec<IntentWeight>,
}

#[cw_serde]
pub struct Coin {
    pub denom: String,
    pub amount: Uint128,
}

#[cw_serde]
pub struct WithdrawalInfo {
    pub hash: String,
    pub delegator: String,
    pub recipient: String,
    pub amount: Uint128,
    pub burn_amount: Uint128,
    pub status: String,
    pub epoch: u64,
    pub completion_time: Option<u64>,
    pub requeued: bool,
    pub acknowledged: bool,
}

#[cw_serde]
pub struct WithdrawalsResponse {
    pub withdrawals: Vec<WithdrawalInfo>,
}

#[cw_serde]
pub struct UnbondingInfo {
    pub validator: String,
    pub epoch: u64,
    pub amount: Uint128,
    pub related_txhash: Vec<String>,
    pub completion_time: Option<u64>,
}

#[cw_serde]
pub struct UnbondingsResponse {
    pub unbondings: Vec<UnbondingInfo>,
}

#[cw_serde]
pub struct RedelegationInfo {
    pub source: String,
    pub destination: String,
    pub epoch: u64,
    pub amount: Uint128,
    pub completion_time: Option<u64>,
}

#[cw_serde]
pub struct RedelegationsResponse {
    pub redelegations: Vec<RedelegationInfo>,
}

#[cw_serde]
pub struct ReceiptInfo {
    pub hash: String,
    pub sender: String,
    pub amount: Vec<Coin>,
    pub first_seen: u64,
    pub completed: Option<u64>,
}

#[cw_serde]
pub struct ReceiptsResponse {
    pub receipts: Vec<ReceiptInfo>,
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    /// Returns the zone's identity, epoch and redemption rate
    #[returns(ZoneResponse)]
    Zone {},

    #[returns(ValidatorsResponse)]
    Validators {},

    /// Returns the delegation account's delegations as last recorded
    #[returns(DelegationsResponse)]
    Delegations {},

    #[returns(IntentResponse)]
    Intent { delegator: String },

    /// Returns withdrawal records, only those with the given status if present
    #[returns(WithdrawalsResponse)]
    Withdrawals { status: Option<String> },

    #[returns(UnbondingsResponse)]
    Unbondings {},

    #[returns(RedelegationsResponse)]
    Redelegations {},

    #[returns(ReceiptsResponse)]
    Receipts {},

    /// Returns receipts whose deposit has not been delegated yet
    #[returns(ReceiptsResponse)]
    OutstandingReceipts {},
}

pub fn to_cw_decimal(decimal: CoreDecimal) -> Result<Decimal, StdError> {
    Decimal::from_str(&decimal.to_string())
}

pub fn from_cw_decimal(decimal: Decimal) -> Result<CoreDecimal, StdError> {
    decimal
        .to_string()
        .parse()
        .map_err(|err: num::ParseDecimalError| StdError::generic_err(err.to_string()))
}

fn intent_weights(intents: Vec<ValidatorIntent>) -> Result<Vec<IntentWeight>, StdError> {
    intents
        .into_iter()
        .map(|i| {
            Ok(IntentWeight {
                validator: i.validator,
                weight: to_cw_decimal(i.weight)?,
            })
        })
        .collect()
}

fn coins(coins: Vec<CoreCoin>) -> Vec<Coin> {
    coins
        .into_iter()
        .map(|c| Coin {
            denom: c.denom,
            amount: c.amount.into(),
        })
        .collect()
}

fn handle_request_redemption(
    storage: &mut dyn Storage,
    env: &Env,
    info: MessageInfo,
    recipient: String,
    tokenize: bool,
) -> Result<Outcome, Error> {
    let burn_amount = must_pay(&info, &storage.local_denom())?;

    withdrawals::queue_redemption(
        storage,
        Redemption {
            sender: info.sender.into_string(),
            recipient,
            burn_amount: burn_amount.u128(),
            tokenize,
        },
        env.block.time.seconds(),
    )
}

fn handle_signal_intent(
    storage: &mut dyn Storage,
    info: MessageInfo,
    weights: Vec<IntentWeight>,
) -> Result<Outcome, Error> {
    nonpayable(&info)?;

    let delegator = info.sender.into_string();

    let mut outcome = Outcome::default();

    if weights.is_empty() {
        intents::set_intent(storage, None, &delegator);

        outcome.push_event(event("intent_cleared").add_attribute("delegator", delegator));

        return Ok(outcome);
    }

    let weights = weights
        .into_iter()
        .map(|w| {
            Ok(ValidatorIntent {
                validator: w.validator,
                weight: from_cw_decimal(w.weight)?,
            })
        })
        .collect::<Result<Vec<_>, StdError>>()?;

    let intent = intents::signal_intent(storage, &delegator, weights)?;

    outcome.push_event(
        event("intent_signalled")
            .add_attribute("delegator", delegator)
            .add_attribute("validators", intent.intents.len().to_string()),
    );

    Ok(outcome)
}

pub fn handle_execute_msg(
    storage: &mut dyn Storage,
    oracle: &dyn BalanceOracle,
    env: &Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Outcome, Error> {
    if !storage.is_initialised() {
        return Err(Error::ZoneNotInitialised);
    }

    match msg {
        ExecuteMsg::RequestRedemption {
            recipient,
            tokenize,
        } => handle_request_redemption(storage, env, info, recipient, tokenize.unwrap_or_default()),

        ExecuteMsg::SignalIntent { intents } => handle_signal_intent(storage, info, intents),

        ExecuteMsg::EndEpoch {} => {
            nonpayable(&info)?;

            epoch::end_epoch(storage, oracle, env.block.time.seconds())
        }
    }
}

fn zone(storage: &dyn Storage) -> Result<ZoneResponse, StdError> {
    let accounts = Account::iter()
        .filter_map(|account| {
            storage.account_address(account).map(|address| AccountAddress {
                id: account.id().to_owned(),
                address,
            })
        })
        .collect();

    Ok(ZoneResponse {
        chain_id: storage.chain_id(),
        connection_id: storage.connection_id(),
        base_denom: storage.base_denom(),
        local_denom: storage.local_denom(),
        account_prefix: storage.account_prefix(),
        epoch: storage.epoch(),
        last_epoch_time: storage.last_epoch_time(),
        redemption_rate: to_cw_decimal(storage.redemption_rate())?,
        last_redemption_rate: to_cw_decimal(storage.last_redemption_rate())?,
        accounts,
        aggregate_intent: intent_weights(storage.aggregate_intent())?,
        rewards_balance: storage.rewards_balance().into(),
        withdrawal_waitgroup: storage.withdrawal_waitgroup(),
    })
}

fn validators(storage: &dyn Storage) -> Result<ValidatorsResponse, StdError> {
    let validators = storage
        .validators()
        .into_iter()
        .map(|v| {
            Ok(ValidatorInfo {
                status: v.status.to_string(),
                voting_power: v.voting_power.into(),
                commission_rate: to_cw_decimal(v.commission_rate)?,
                jailed: v.jailed,
                score: to_cw_decimal(v.score)?,
                address: v.address,
            })
        })
        .collect::<Result<_, StdError>>()?;

    Ok(ValidatorsResponse { validators })
}

fn delegations(storage: &dyn Storage) -> DelegationsResponse {
    let delegations = storage
        .account_address(Account::Delegation)
        .map(|delegator| storage.delegations(&delegator))
        .unwrap_or_default()
        .into_iter()
        .map(|d| DelegationInfo {
            validator: d.validator,
            amount: d.amount.into(),
            redelegation_end: d.redelegation_end,
        })
        .collect();

    DelegationsResponse { delegations }
}

fn withdrawals(storage: &dyn Storage, status: Option<String>) -> Result<WithdrawalsResponse, StdError> {
    let records = match status {
        Some(status) => {
            let status = WithdrawalStatus::from_str(&status)
                .map_err(|_| StdError::generic_err(format!("unknown withdrawal status: {status}")))?;

            storage.withdrawals_by_status(status)
        }
        None => storage.withdrawals(),
    };

    let withdrawals = records
        .into_iter()
        .map(|r| WithdrawalInfo {
            status: r.status.to_string(),
            hash: r.hash,
            delegator: r.delegator,
            recipient: r.recipient,
            amount: r.amount.into(),
            burn_amount: r.burn_amount.into(),
            epoch: r.epoch,
            completion_time: r.completion_time,
            requeued: r.requeued,
            acknowledged: r.acknowledged,
        })
        .collect();

    Ok(WithdrawalsResponse { withdrawals })
}

fn receipts(receipts: Vec<ics_core::records::Receipt>) -> ReceiptsResponse {
    let receipts = receipts
        .into_iter()
        .map(|r| ReceiptInfo {
            hash: r.hash,
            sender: r.sender,
            amount: coins(r.amount),
            first_seen: r.first_seen,
            completed: r.completed,
        })
        .collect();

    ReceiptsResponse { receipts }
}

pub fn handle_query_msg(storage: &dyn Storage, msg: QueryMsg) -> Result<Binary, StdError> {
    match msg {
        QueryMsg::Zone {} => to_json_binary(&zone(storage)?),

        QueryMsg::Validators {} => to_json_binary(&validators(storage)?),

        QueryMsg::Delegations {} => to_json_binary(&delegations(storage)),

        QueryMsg::Intent { delegator } => {
            let intents = storage
                .intent(&delegator)
                .map(|intent| intent.intents)
                .unwrap_or_default();

            to_json_binary(&IntentResponse {
                intents: intent_weights(intents)?,
            })
        }

        QueryMsg::Withdrawals { status } => to_json_binary(&withdrawals(storage, status)?),

        QueryMsg::Unbondings {} => to_json_binary(&UnbondingsResponse {
            unbondings: storage
                .unbondings()
                .into_iter()
                .map(|u| UnbondingInfo {
                    validator: u.validator,
                    epoch: u.epoch,
                    amount: u.amount.into(),
                    related_txhash: u.related_txhash,
                    completion_time: u.completion_time,
                })
                .collect(),
        }),

        QueryMsg::Redelegations {} => to_json_binary(&RedelegationsResponse {
            redelegations: storage
                .redelegations()
                .into_iter()
                .map(|r| RedelegationInfo {
                    source: r.source,
                    destination: r.destination,
                    epoch: r.epoch,
                    amount: r.amount.into(),
                    completion_time: r.completion_time,
                })
                .collect(),
        }),

        QueryMsg::Receipts {} => to_json_binary(&receipts(storage.receipts())),

        QueryMsg::OutstandingReceipts {} => to_json_binary(&receipts(storage.outstanding_receipts())),
    }
}

#[cfg(test)]
mod test {
    use cosmwasm_std::{
        coins, from_json,
        testing::{mock_env, mock_info, MockStorage},
    };
    use test_utils::prelude::*;

    use super::*;
    use crate::mock::{self, MockOracle};

    #[test]
    fn redemption_requires_receipt_tokens() {
        let mut storage = MockStorage::default();

        mock::init_zone_with_delegations(&mut storage, &[1_000]);

        let msg = ExecuteMsg::RequestRedemption {
            recipient: mock::REMOTE_ALICE.to_owned(),
            tokenize: None,
        };

        let err = handle_execute_msg(
            &mut storage,
            &MockOracle::default(),
            &mock_env(),
            mock_info(mock::LOCAL_ALICE, &coins(100, "uatom")),
            msg.clone(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::Payment(_)));

        handle_execute_msg(
            &mut storage,
            &MockOracle::default(),
            &mock_env(),
            mock_info(mock::LOCAL_ALICE, &coins(100, mock::LOCAL_DENOM)),
            msg,
        )
        .unwrap();

        let response: WithdrawalsResponse = from_json(
            handle_query_msg(
                &storage,
                QueryMsg::Withdrawals {
                    status: Some("queued".to_owned()),
                },
            )
            .unwrap(),
        )
        .unwrap();

        assert_eq!(response.withdrawals.len(), 1);
        assert_eq!(response.withdrawals[0].burn_amount, Uint128::new(100));
    }

    #[test]
    fn signalled_intent_is_queryable() {
        let mut storage = MockStorage::default();

        mock::init_zone_with_validators(&mut storage, 2);

        handle_execute_msg(
            &mut storage,
            &MockOracle::default(),
            &mock_env(),
            mock_info("alice", &[]),
            ExecuteMsg::SignalIntent {
                intents: vec![
                    IntentWeight {
                        validator: "val_0".to_owned(),
                        weight: Decimal::percent(30),
                    },
                    IntentWeight {
                        validator: "val_1".to_owned(),
                        weight: Decimal::percent(90),
                    },
                ],
            },
        )
        .unwrap();

        let response: IntentResponse = from_json(
            handle_query_msg(
                &storage,
                QueryMsg::Intent {
                    delegator: "alice".to_owned(),
                },
            )
            .unwrap(),
        )
        .unwrap();

        check(
            response,
            expect![[r#"
                (
                  intents: [
                    (
                      validator: "val_0",
                      weight: "0.25",
                    ),
                    (
                      validator: "val_1",
                      weight: "0.75",
                    ),
                  ],
                )"#]],
        );
    }

    #[test]
    fn unknown_status_is_rejected() {
        let storage = MockStorage::default();

        let err = handle_query_msg(
            &storage,
            QueryMsg::Withdrawals {
                status: Some("pending".to_owned()),
            },
        )
        .unwrap_err();

        assert!(err.to_string().contains("unknown withdrawal status: pending"));
    }
}
