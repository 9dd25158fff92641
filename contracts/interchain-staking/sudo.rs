use std::collections::BTreeMap;

use anyhow::{bail, Result};
use cosmwasm_schema::cw_serde;
use cosmwasm_std::{from_json, Binary, DepsMut, Env, Response};
use neutron_sdk::{
    bindings::{msg::NeutronMsg, query::NeutronQuery},
    interchain_queries::{
        queries::get_raw_interchain_query_result,
        v047::queries::{query_balance, query_delegations},
    },
    sudo::msg::RequestPacket,
};

use ics_core::{
    ack::{Ack, AckResponse},
    msg::Account,
};
use ics_cw::{
    ack::handle_ack,
    delegations, event, receipts, validators,
    zone::{self, Icq, ZoneExt as _},
    Outcome,
};
use ics_ntrn::BankOracle;

use crate::{icq, into_response, proto};

fn account_from_port_id(port_id: &str) -> Option<Account> {
    port_id.split('.').last().and_then(Account::from_id)
}

#[cw_serde]
struct OpenAckVersion {
    pub version: String,
    pub controller_connection_id: String,
    pub host_connection_id: String,
    pub address: String,
    pub encoding: String,
    pub tx_type: String,
}

pub fn handle_open_ack(
    deps: DepsMut<NeutronQuery>,
    env: Env,
    port_id: String,
    counterparty_version: String,
) -> Result<Response<NeutronMsg>> {
    let Some(account) = account_from_port_id(&port_id) else {
        bail!("unrecognised interchain account port: {port_id}");
    };

    let version: OpenAckVersion = from_json(counterparty_version)?;

    let outcome = zone::on_account_opened(deps.storage, account, &version.address);

    let icq_msgs = icq::account_opened_msgs(deps.storage, account)?;

    let response = into_response(deps.as_ref(), &env, outcome)?;

    Ok(response.add_submessages(icq_msgs))
}

fn packet_data(request: &RequestPacket) -> Result<&Binary> {
    let Some(data) = request.data.as_ref() else {
        bail!("request packet carries no data");
    };

    Ok(data)
}

fn apply_ack(deps: DepsMut<NeutronQuery>, env: &Env, ack: Ack) -> Result<Response<NeutronMsg>> {
    let oracle = BankOracle::new(deps.querier);

    let outcome = handle_ack(deps.storage, &oracle, ack, env.block.time.seconds())?;

    into_response(deps.as_ref(), env, outcome)
}

pub fn handle_response(
    deps: DepsMut<NeutronQuery>,
    env: Env,
    request: RequestPacket,
    data: Binary,
) -> Result<Response<NeutronMsg>> {
    let (memo, msgs) = proto::decode_packet(packet_data(&request)?)?;

    let mut responses = proto::decode_responses(&data)?.into_iter();

    let msgs = msgs
        .into_iter()
        .map(|msg| (msg, responses.next().unwrap_or(AckResponse::None)))
        .collect();

    apply_ack(deps, &env, Ack::success(memo, msgs))
}

pub fn handle_error(
    deps: DepsMut<NeutronQuery>,
    env: Env,
    request: RequestPacket,
    details: String,
) -> Result<Response<NeutronMsg>> {
    let (memo, msgs) = proto::decode_packet(packet_data(&request)?)?;

    apply_ack(deps, &env, Ack::failure(memo, msgs, &details))
}

pub fn handle_timeout(
    deps: DepsMut<NeutronQuery>,
    env: Env,
    request: RequestPacket,
) -> Result<Response<NeutronMsg>> {
    let (memo, msgs) = proto::decode_packet(packet_data(&request)?)?;

    apply_ack(deps, &env, Ack::failure(memo, msgs, "timeout"))
}

fn refresh_delegations(
    deps: DepsMut<NeutronQuery>,
    env: Env,
    query_id: u64,
) -> Result<Outcome> {
    let res = query_delegations(deps.as_ref(), env, query_id)?;

    let delegator = deps.storage.require_account(Account::Delegation)?;

    let base_denom = deps.storage.base_denom();

    let reported: BTreeMap<_, _> = res
        .delegations
        .into_iter()
        .filter(|d| d.amount.denom == base_denom)
        .map(|d| (d.validator, d.amount.amount.u128()))
        .collect();

    delegations::refresh(deps.storage, &delegator, &reported);

    let mut outcome = Outcome::default();

    outcome.push_event(
        event("delegations_refreshed")
            .add_attribute("count", reported.len().to_string())
            .add_attribute("height", res.last_submitted_local_height.to_string()),
    );

    Ok(outcome)
}

fn refresh_validators(deps: DepsMut<NeutronQuery>, query_id: u64) -> Result<Outcome> {
    let result = get_raw_interchain_query_result(deps.as_ref(), query_id)?;

    let reports = result
        .result
        .kv_results
        .iter()
        .filter(|kv| !kv.value.is_empty())
        .map(|kv| proto::decode_validator(kv.value.as_slice()))
        .collect::<Result<Vec<_>>>()?;

    Ok(validators::apply_reports(deps.storage, reports))
}

fn refresh_withdrawal_balance(
    deps: DepsMut<NeutronQuery>,
    env: Env,
    query_id: u64,
) -> Result<Outcome> {
    let res = query_balance(deps.as_ref(), env, query_id)?;

    let base_denom = deps.storage.base_denom();

    let balance = res
        .balances
        .coins
        .iter()
        .filter(|coin| coin.denom == base_denom)
        .map(|coin| coin.amount.u128())
        .sum::<u128>();

    deps.storage.set_rewards_balance(balance);

    let mut outcome = Outcome::default();

    outcome.push_event(
        event("rewards_balance_refreshed").add_attribute("balance", balance.to_string()),
    );

    Ok(outcome)
}

pub fn handle_kv_query_result(
    mut deps: DepsMut<NeutronQuery>,
    env: Env,
    query_id: u64,
) -> Result<Response<NeutronMsg>> {
    let outcome = match deps.storage.query_kind(query_id) {
        Some(Icq::Delegations) => refresh_delegations(deps.branch(), env.clone(), query_id)?,

        Some(Icq::Validators) => refresh_validators(deps.branch(), query_id)?,

        Some(Icq::WithdrawalBalance) => {
            refresh_withdrawal_balance(deps.branch(), env.clone(), query_id)?
        }

        Some(Icq::DepositTransfers) | None => return Ok(Response::default()),
    };

    into_response(deps.as_ref(), &env, outcome)
}

pub fn handle_tx_query_result(
    deps: DepsMut<NeutronQuery>,
    env: Env,
    query_id: u64,
    data: Binary,
) -> Result<Response<NeutronMsg>> {
    if deps.storage.query_kind(query_id) != Some(Icq::DepositTransfers) {
        return Ok(Response::default());
    }

    let tx = proto::decode_deposit_tx(&data)?;

    let oracle = BankOracle::new(deps.querier);

    let outcome = receipts::handle_deposit(deps.storage, &oracle, tx, env.block.time.seconds())?;

    into_response(deps.as_ref(), &env, outcome)
}
