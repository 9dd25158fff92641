use anyhow::{anyhow, Context, Result};
use cosmos_sdk_proto::cosmos::{
    bank::v1beta1::MsgSend,
    base::v1beta1::Coin as ProtoCoin,
    distribution::v1beta1::{MsgSetWithdrawAddress, MsgWithdrawDelegatorReward},
    staking::v1beta1::{
        MsgBeginRedelegate, MsgDelegate, MsgUndelegate,
        Validator as ProtoValidator,
    },
    tx::v1beta1::{TxBody, TxRaw},
};
use cosmwasm_std::{from_json, Binary};
use neutron_sdk::bindings::types::ProtobufAny;
use prost::{Message, Name};
use prost_types::{Any, Timestamp as ProtoTimestamp};
use serde::Deserialize;

use ics_core::{
    ack::{AckMsg, AckResponse},
    deposit::{DepositTx, Transfer},
    msg::RemoteMsg,
    validator::{BondStatus, ValidatorReport},
    Coin, Decimal, Timestamp,
};

/// Liquid staking module messages, not part of the upstream staking protos
mod lsm {
    use cosmos_sdk_proto::cosmos::base::v1beta1::Coin;
    use prost::Message;

    #[derive(Clone, PartialEq, Message)]
    pub struct MsgTokenizeShares {
        #[prost(string, tag = "1")]
        pub delegator_address: String,
        #[prost(string, tag = "2")]
        pub validator_address: String,
        #[prost(message, optional, tag = "3")]
        pub amount: Option<Coin>,
        #[prost(string, tag = "4")]
        pub tokenized_share_owner: String,
    }

    impl MsgTokenizeShares {
        pub const TYPE_URL: &'static str = "/cosmos.staking.v1beta1.MsgTokenizeShares";
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct MsgTokenizeSharesResponse {
        #[prost(message, optional, tag = "1")]
        pub amount: Option<Coin>,
    }

    impl MsgTokenizeSharesResponse {
        pub const TYPE_URL: &'static str = "/cosmos.staking.v1beta1.MsgTokenizeSharesResponse";
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct MsgRedeemTokensForShares {
        #[prost(string, tag = "1")]
        pub delegator_address: String,
        #[prost(message, optional, tag = "2")]
        pub amount: Option<Coin>,
    }

    impl MsgRedeemTokensForShares {
        pub const TYPE_URL: &'static str = "/cosmos.staking.v1beta1.MsgRedeemTokensForShares";
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct MsgRedeemTokensForSharesResponse {
        #[prost(message, optional, tag = "1")]
        pub amount: Option<Coin>,
    }

    impl MsgRedeemTokensForSharesResponse {
        pub const TYPE_URL: &'static str =
            "/cosmos.staking.v1beta1.MsgRedeemTokensForSharesResponse";
    }
}

use lsm::{
    MsgRedeemTokensForShares, MsgRedeemTokensForSharesResponse, MsgTokenizeShares,
    MsgTokenizeSharesResponse,
};

/// Newer staking modules also report the amount actually unbonded
#[derive(Clone, PartialEq, Message)]
struct MsgUndelegateResponse {
    #[prost(message, optional, tag = "1")]
    completion_time: Option<ProtoTimestamp>,
    #[prost(message, optional, tag = "2")]
    amount: Option<ProtoCoin>,
}

impl MsgUndelegateResponse {
    const TYPE_URL: &'static str = "/cosmos.staking.v1beta1.MsgUndelegateResponse";
}

#[derive(Clone, PartialEq, Message)]
struct MsgBeginRedelegateResponse {
    #[prost(message, optional, tag = "1")]
    completion_time: Option<ProtoTimestamp>,
}

impl MsgBeginRedelegateResponse {
    const TYPE_URL: &'static str = "/cosmos.staking.v1beta1.MsgBeginRedelegateResponse";
}

#[derive(Clone, PartialEq, Message)]
struct MsgTransfer {
    #[prost(string, tag = "1")]
    source_port: String,
    #[prost(string, tag = "2")]
    source_channel: String,
    #[prost(message, optional, tag = "3")]
    token: Option<ProtoCoin>,
    #[prost(string, tag = "4")]
    sender: String,
    #[prost(string, tag = "5")]
    receiver: String,
}

impl MsgTransfer {
    const TYPE_URL: &'static str = "/ibc.applications.transfer.v1.MsgTransfer";
}

/// The body of an interchain accounts packet
#[derive(Clone, PartialEq, Message)]
struct CosmosTx {
    #[prost(message, repeated, tag = "1")]
    messages: Vec<Any>,
}

/// The result of a successful interchain accounts packet
#[derive(Clone, PartialEq, Message)]
struct TxMsgData {
    #[prost(message, repeated, tag = "2")]
    msg_responses: Vec<Any>,
}

/// ICS-27 packet data, JSON encoded by the controller
#[derive(Deserialize)]
struct PacketData {
    data: Binary,
    #[serde(default)]
    memo: String,
}

fn to_proto_coin(coin: Coin) -> ProtoCoin {
    ProtoCoin {
        denom: coin.denom,
        amount: coin.amount.to_string(),
    }
}

fn from_proto_coin(coin: ProtoCoin) -> Result<Coin> {
    let amount = coin
        .amount
        .parse()
        .with_context(|| format!("invalid coin amount: {}", coin.amount))?;

    Ok(Coin::new(amount, coin.denom))
}

fn from_proto_timestamp(ts: Option<ProtoTimestamp>) -> Timestamp {
    ts.and_then(|ts| u64::try_from(ts.seconds).ok())
        .unwrap_or_default()
}

fn any<M: Message>(type_url: impl Into<String>, msg: &M) -> ProtobufAny {
    ProtobufAny {
        type_url: type_url.into(),
        value: msg.encode_to_vec().into(),
    }
}

pub fn encode_msg(msg: RemoteMsg) -> ProtobufAny {
    match msg {
        RemoteMsg::Delegate {
            delegator,
            validator,
            amount,
        } => any(
            MsgDelegate::type_url(),
            &MsgDelegate {
                delegator_address: delegator,
                validator_address: validator,
                amount: Some(to_proto_coin(amount)),
            },
        ),

        RemoteMsg::Undelegate {
            delegator,
            validator,
            amount,
        } => any(
            MsgUndelegate::type_url(),
            &MsgUndelegate {
                delegator_address: delegator,
                validator_address: validator,
                amount: Some(to_proto_coin(amount)),
            },
        ),

        RemoteMsg::Redelegate {
            delegator,
            source,
            destination,
            amount,
        } => any(
            MsgBeginRedelegate::type_url(),
            &MsgBeginRedelegate {
                delegator_address: delegator,
                validator_src_address: source,
                validator_dst_address: destination,
                amount: Some(to_proto_coin(amount)),
            },
        ),

        RemoteMsg::TokenizeShares {
            delegator,
            validator,
            amount,
            owner,
        } => any(
            MsgTokenizeShares::TYPE_URL,
            &MsgTokenizeShares {
                delegator_address: delegator,
                validator_address: validator,
                amount: Some(to_proto_coin(amount)),
                tokenized_share_owner: owner,
            },
        ),

        RemoteMsg::RedeemTokens { delegator, amount } => any(
            MsgRedeemTokensForShares::TYPE_URL,
            &MsgRedeemTokensForShares {
                delegator_address: delegator,
                amount: Some(to_proto_coin(amount)),
            },
        ),

        RemoteMsg::Send { from, to, amount } => any(
            MsgSend::type_url(),
            &MsgSend {
                from_address: from,
                to_address: to,
                amount: amount.into_iter().map(to_proto_coin).collect(),
            },
        ),

        RemoteMsg::SetWithdrawAddress {
            delegator,
            withdraw_address,
        } => any(
            MsgSetWithdrawAddress::type_url(),
            &MsgSetWithdrawAddress {
                delegator_address: delegator,
                withdraw_address,
            },
        ),

        RemoteMsg::WithdrawRewards {
            delegator,
            validator,
        } => any(
            MsgWithdrawDelegatorReward::type_url(),
            &MsgWithdrawDelegatorReward {
                delegator_address: delegator,
                validator_address: validator,
            },
        ),
    }
}

fn required_coin(coin: Option<ProtoCoin>) -> Result<Coin> {
    coin.map(from_proto_coin)
        .unwrap_or_else(|| Err(anyhow!("missing coin")))
}

fn try_decode_msg(msg: &Any) -> Result<AckMsg> {
    let value = msg.value.as_slice();

    let decoded = match msg.type_url.as_str() {
        url if url == MsgDelegate::type_url() => {
            let msg = MsgDelegate::decode(value)?;

            AckMsg::Delegate {
                delegator: msg.delegator_address,
                validator: msg.validator_address,
                amount: required_coin(msg.amount)?,
            }
        }

        url if url == MsgUndelegate::type_url() => {
            let msg = MsgUndelegate::decode(value)?;

            AckMsg::Undelegate {
                delegator: msg.delegator_address,
                validator: msg.validator_address,
                amount: required_coin(msg.amount)?,
            }
        }

        url if url == MsgBeginRedelegate::type_url() => {
            let msg = MsgBeginRedelegate::decode(value)?;

            AckMsg::Redelegate {
                delegator: msg.delegator_address,
                source: msg.validator_src_address,
                destination: msg.validator_dst_address,
                amount: required_coin(msg.amount)?,
            }
        }

        MsgTokenizeShares::TYPE_URL => {
            let msg = MsgTokenizeShares::decode(value)?;

            AckMsg::TokenizeShares {
                delegator: msg.delegator_address,
                validator: msg.validator_address,
                amount: required_coin(msg.amount)?,
                owner: msg.tokenized_share_owner,
            }
        }

        MsgRedeemTokensForShares::TYPE_URL => {
            let msg = MsgRedeemTokensForShares::decode(value)?;

            AckMsg::RedeemTokens {
                delegator: msg.delegator_address,
                amount: required_coin(msg.amount)?,
            }
        }

        url if url == MsgSend::type_url() => {
            let msg = MsgSend::decode(value)?;

            AckMsg::Send {
                from: msg.from_address,
                to: msg.to_address,
                amount: msg
                    .amount
                    .into_iter()
                    .map(from_proto_coin)
                    .collect::<Result<_>>()?,
            }
        }

        url if url == MsgSetWithdrawAddress::type_url() => {
            let msg = MsgSetWithdrawAddress::decode(value)?;

            AckMsg::SetWithdrawAddress {
                delegator: msg.delegator_address,
                withdraw_address: msg.withdraw_address,
            }
        }

        url if url == MsgWithdrawDelegatorReward::type_url() => {
            let msg = MsgWithdrawDelegatorReward::decode(value)?;

            AckMsg::WithdrawRewards {
                delegator: msg.delegator_address,
                validator: msg.validator_address,
            }
        }

        MsgTransfer::TYPE_URL => {
            let msg = MsgTransfer::decode(value)?;

            AckMsg::Transfer {
                sender: msg.sender,
                receiver: msg.receiver,
                token: required_coin(msg.token)?,
            }
        }

        other => AckMsg::Unknown(other.to_owned()),
    };

    Ok(decoded)
}

/// Messages which fail to decode are treated as unknown
pub fn decode_msg(msg: &Any) -> AckMsg {
    try_decode_msg(msg).unwrap_or_else(|_| AckMsg::Unknown(msg.type_url.clone()))
}

/// The memo and messages of a request packet sent through an interchain account
pub fn decode_packet(data: &[u8]) -> Result<(String, Vec<AckMsg>)> {
    let packet: PacketData =
        from_json(data).context("invalid interchain accounts packet data")?;

    let tx = CosmosTx::decode(packet.data.as_slice()).context("invalid cosmos tx")?;

    let msgs = tx.messages.iter().map(decode_msg).collect();

    Ok((packet.memo, msgs))
}

fn decode_response(res: &Any) -> Result<AckResponse> {
    let value = res.value.as_slice();

    let decoded = match res.type_url.as_str() {
        MsgUndelegateResponse::TYPE_URL => {
            let res = MsgUndelegateResponse::decode(value)?;

            AckResponse::Undelegate {
                completion_time: from_proto_timestamp(res.completion_time),
                amount: res.amount.map(from_proto_coin).transpose()?,
            }
        }

        MsgBeginRedelegateResponse::TYPE_URL => {
            let res = MsgBeginRedelegateResponse::decode(value)?;

            AckResponse::Redelegate {
                completion_time: from_proto_timestamp(res.completion_time),
            }
        }

        MsgTokenizeSharesResponse::TYPE_URL => {
            let res = MsgTokenizeSharesResponse::decode(value)?;

            AckResponse::Tokenize {
                amount: required_coin(res.amount)?,
            }
        }

        MsgRedeemTokensForSharesResponse::TYPE_URL => {
            let res = MsgRedeemTokensForSharesResponse::decode(value)?;

            AckResponse::Redeem {
                amount: required_coin(res.amount)?,
            }
        }

        _ => AckResponse::None,
    };

    Ok(decoded)
}

/// Responses of a successful interchain transaction, in message order
pub fn decode_responses(data: &[u8]) -> Result<Vec<AckResponse>> {
    let tx_msg_data = TxMsgData::decode(data).context("invalid tx msg data")?;

    tx_msg_data.msg_responses.iter().map(decode_response).collect()
}

/// The bank sends of a transaction found by the deposit transfers query
pub fn decode_deposit_tx(data: &[u8]) -> Result<DepositTx> {
    let hash = hex::encode_upper(hmac_sha256::Hash::hash(data));

    let raw = TxRaw::decode(data).context("invalid tx")?;

    let body = TxBody::decode(raw.body_bytes.as_slice()).context("invalid tx body")?;

    let mut transfers = vec![];

    for msg in body.messages {
        if msg.type_url != MsgSend::type_url() {
            continue;
        }

        let send = MsgSend::decode(msg.value.as_slice())?;

        transfers.push(Transfer {
            from: send.from_address,
            to: send.to_address,
            coins: send
                .amount
                .into_iter()
                .map(from_proto_coin)
                .collect::<Result<_>>()?,
        });
    }

    Ok(DepositTx {
        hash,
        memo: body.memo,
        transfers,
    })
}

/// Decimals travel either as a plain decimal string or as a raw integer scaled by 10^18
fn parse_legacy_dec(s: &str) -> Result<Decimal> {
    if s.is_empty() {
        return Ok(Decimal::zero());
    }

    if s.contains('.') {
        return s.parse().map_err(|err| anyhow!("invalid decimal {s}: {err}"));
    }

    let raw = num::U256::from_dec_str(s).map_err(|err| anyhow!("invalid decimal {s}: {err:?}"))?;

    Ok(Decimal::raw(raw))
}

/// A staking module validator record read from the validators query
pub fn decode_validator(value: &[u8]) -> Result<ValidatorReport> {
    let validator = ProtoValidator::decode(value).context("invalid validator record")?;

    let tokens = validator
        .tokens
        .parse()
        .with_context(|| format!("invalid validator tokens: {}", validator.tokens))?;

    let commission_rate = validator
        .commission
        .and_then(|c| c.commission_rates)
        .map(|rates| parse_legacy_dec(&rates.rate))
        .transpose()?
        .unwrap_or_default();

    Ok(ValidatorReport {
        address: validator.operator_address,
        tokens,
        delegator_shares: parse_legacy_dec(&validator.delegator_shares)?,
        commission_rate,
        status: BondStatus::from_proto(validator.status),
        jailed: validator.jailed,
    })
}
