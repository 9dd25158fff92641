pub mod icq;
pub mod msg;
pub mod proto;
pub mod reply;
pub mod sudo;

#[cfg(test)]
mod test;

use anyhow::{bail, ensure, Result};
use cosmwasm_std::{
    entry_point, to_json_binary, Binary, Coin, Deps, DepsMut, Env, MessageInfo, Reply, Response,
    StdError, Storage,
};
use cw_utils::must_pay;
use neutron_sdk::{
    bindings::{
        msg::{IbcFee, NeutronMsg},
        query::NeutronQuery,
    },
    query::min_ibc_fee::query_min_ibc_fee,
    sudo::msg::SudoMsg,
};
use strum::IntoEnumIterator;

use ics_core::{
    lsm::LsmCaps,
    msg::{Account, Cmd, RemoteTx},
    rates::{GlobalCap, MaxRateDecrease, MaxRateIncrease, ValidatorBondCap, ValidatorCap},
};
use ics_cw::{
    admin::{self, ExecuteMsg as AdminExecuteMsg, Repository as AdminRepository},
    staking::{self, ExecuteMsg as StakingExecuteMsg},
    validators,
    zone::{self, Icq, ZoneExt as _, ZoneParams},
    Outcome,
};
use ics_ntrn::{query::QuerierExt as _, token_factory::TokenFactory, BankOracle};

use self::{
    msg::{
        Config, ExecuteMsg, InstantiateMsg, LsmCapsConfig, MigrateMsg, QueryIdsResponse,
        QueryMsg, ZoneExecuteMsg, ZoneQueryMsg,
    },
    reply::{Kind as ReplyKind, State as ReplyState},
};

/// Deposit needed to register every interchain account and query
fn required_registration_deposit(
    ica_register_fee: Option<&Coin>,
    icq_deposit: Option<&Coin>,
) -> Result<Option<Coin>> {
    let icas_required = Account::iter().count() as u128;

    let icqs_required = Icq::iter().count() as u128;

    let required = match (ica_register_fee, icq_deposit) {
        (None, None) => None,

        (Some(fee), None) => Some(cosmwasm_std::coin(fee.amount.u128() * icas_required, &fee.denom)),

        (None, Some(deposit)) => Some(cosmwasm_std::coin(
            deposit.amount.u128() * icqs_required,
            &deposit.denom,
        )),

        (Some(fee), Some(deposit)) => {
            ensure!(fee.denom == deposit.denom, "ica & icq fee denoms do not match");

            Some(cosmwasm_std::coin(
                fee.amount.u128() * icas_required + deposit.amount.u128() * icqs_required,
                &fee.denom,
            ))
        }
    };

    Ok(required)
}

fn check_payment(info: &MessageInfo, required: Option<Coin>) -> Result<()> {
    let Some(required) = required else {
        return Ok(());
    };

    let paid = must_pay(info, &required.denom)?;

    if paid != required.amount {
        bail!("{required} required, received {paid}{}", required.denom);
    }

    Ok(())
}

fn register_ica_msg(storage: &dyn Storage, account: Account, fee: Option<&Coin>) -> NeutronMsg {
    NeutronMsg::RegisterInterchainAccount {
        connection_id: storage.connection_id(),
        interchain_account_id: account.id().to_owned(),
        register_fee: fee.map(|fee| vec![fee.clone()]),
    }
}

#[entry_point]
pub fn instantiate(
    deps: DepsMut<NeutronQuery>,
    env: Env,
    info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response<NeutronMsg>> {
    let InstantiateMsg {
        config,
        initial_validators,
    } = msg;

    ensure!(!config.chain_id.is_empty(), "chain ID is empty");
    ensure!(!config.connection_id.is_empty(), "connection ID is empty");
    ensure!(!config.base_denom.is_empty(), "base denom is empty");
    ensure!(!config.subdenom.is_empty(), "subdenom is empty");
    ensure!(!config.account_prefix.is_empty(), "account prefix is empty");
    ensure!(!config.local_prefix.is_empty(), "local prefix is empty");
    ensure!(config.epoch_duration != 0, "epoch duration is zero");
    ensure!(!initial_validators.is_empty(), "initial validator set is empty");

    let ica_register_fee = deps.querier.interchain_account_register_fee()?;

    let icq_deposit = deps.querier.interchain_query_deposit()?;

    let required = required_registration_deposit(ica_register_fee.as_ref(), icq_deposit.as_ref())?;

    check_payment(&info, required)?;

    let token_factory = TokenFactory::new(&env);

    let params = ZoneParams {
        chain_id: config.chain_id,
        connection_id: config.connection_id,
        base_denom: config.base_denom,
        local_denom: token_factory.denom(&config.subdenom),
        account_prefix: config.account_prefix,
        local_prefix: config.local_prefix,
        unbonding_period: config.unbonding_period,
        epoch_duration: config.epoch_duration,
        interchain_tx_timeout: config.interchain_tx_timeout,
        icq_update_period: config.icq_update_period,
        lsm_enabled: config.lsm_enabled,
        max_rate_increase: MaxRateIncrease::try_from(config.max_rate_increase_bps)?,
        max_rate_decrease: MaxRateDecrease::try_from(config.max_rate_decrease_bps)?,
    };

    zone::init(deps.storage, &params, env.block.time.seconds());

    admin::init(deps.storage, &info);

    for validator in &initial_validators {
        validators::add_validator(deps.storage, validator)?;
    }

    let mut response = Response::default().add_message(token_factory.create(&config.subdenom));

    for account in Account::iter() {
        response = response.add_message(register_ica_msg(
            deps.storage,
            account,
            ica_register_fee.as_ref(),
        ));
    }

    if let Some(msg) = icq::registration_msg(deps.storage, Icq::Validators)? {
        response = response.add_submessage(msg);
    }

    Ok(response)
}

fn submit_tx_msg(deps: Deps<NeutronQuery>, tx: RemoteTx, fee: IbcFee) -> NeutronMsg {
    NeutronMsg::SubmitTx {
        connection_id: deps.storage.connection_id(),
        interchain_account_id: tx.account.id().to_owned(),
        msgs: tx.msgs.into_iter().map(proto::encode_msg).collect(),
        memo: tx.memo,
        timeout: deps.storage.interchain_tx_timeout(),
        fee,
    }
}

/// Turn the keeper's commands into messages, remote transactions are split to fit the host limit
pub fn into_response(
    deps: Deps<NeutronQuery>,
    env: &Env,
    outcome: Outcome,
) -> Result<Response<NeutronMsg>> {
    let Outcome { cmds, events } = outcome;

    let mut response = Response::default().add_events(events);

    let token_factory = TokenFactory::new(env);

    let local_denom = deps.storage.local_denom();

    let mut submit_params = None;

    for cmd in cmds {
        let tx = match cmd {
            Cmd::Submit(tx) if tx.msgs.is_empty() => continue,

            Cmd::Submit(tx) => tx,

            cmd => {
                if let Some(msg) = token_factory.handle_cmd(&local_denom, &cmd) {
                    response = response.add_message(msg);
                }

                continue;
            }
        };

        let (fee, max_msg_count) = match submit_params.take() {
            Some(params) => params,
            None => (
                query_min_ibc_fee(deps).map(|res| res.min_fee)?,
                deps.querier.interchain_tx_max_msg_count()?.max(1),
            ),
        };

        for msgs in tx.msgs.chunks(max_msg_count) {
            let chunk = RemoteTx::new(tx.account, msgs.to_vec(), &tx.memo);

            response = response.add_message(submit_tx_msg(deps, chunk, fee.clone()));
        }

        submit_params = Some((fee, max_msg_count));
    }

    Ok(response)
}

pub fn execute_admin_msg(
    deps: DepsMut<NeutronQuery>,
    info: MessageInfo,
    msg: AdminExecuteMsg,
) -> Result<Response<NeutronMsg>> {
    let repository = AdminRepository::new(deps.storage);

    let cmds = admin::handle_execute_msg(deps.api, &repository, info, msg)?;

    for cmd in cmds {
        admin::handle_cmd(deps.storage, cmd);
    }

    Ok(Response::default())
}

pub fn execute_staking_msg(
    deps: DepsMut<NeutronQuery>,
    env: Env,
    info: MessageInfo,
    msg: StakingExecuteMsg,
) -> Result<Response<NeutronMsg>> {
    let kind = msg.kind();

    let oracle = BankOracle::new(deps.querier);

    let outcome = staking::handle_execute_msg(deps.storage, &oracle, &env, info, msg)?;

    let response = into_response(deps.as_ref(), &env, outcome)?;

    Ok(response.add_attribute("action", kind))
}

fn lsm_caps(config: LsmCapsConfig) -> Result<LsmCaps> {
    Ok(LsmCaps {
        global_cap: GlobalCap::try_from(config.global_cap_bps)?,
        validator_cap: ValidatorCap::try_from(config.validator_cap_bps)?,
        validator_bond_cap: ValidatorBondCap::try_from(config.validator_bond_cap_bps)?,
    })
}

pub fn execute_zone_msg(
    deps: DepsMut<NeutronQuery>,
    env: Env,
    info: MessageInfo,
    msg: ZoneExecuteMsg,
) -> Result<Response<NeutronMsg>> {
    let kind = msg.kind();

    let response = match msg {
        ZoneExecuteMsg::DenyValidator { validator } => {
            let role = admin::get_admin_role(&AdminRepository::new(deps.storage), &info)?;

            let outcome = validators::deny_validator(deps.storage, role, &validator)?;

            into_response(deps.as_ref(), &env, outcome)?
        }

        ZoneExecuteMsg::RestoreIca { id } => {
            let Some(account) = Account::from_id(&id) else {
                bail!("unrecognised ica id: {id}");
            };

            let ica_register_fee = deps.querier.interchain_account_register_fee()?;

            check_payment(&info, ica_register_fee.clone())?;

            Response::default().add_message(register_ica_msg(
                deps.storage,
                account,
                ica_register_fee.as_ref(),
            ))
        }

        ZoneExecuteMsg::UpdateConfig {
            epoch_duration,
            unbonding_period,
            interchain_tx_timeout,
            icq_update_period,
            lsm_enabled,
            max_rate_increase_bps,
            max_rate_decrease_bps,
            lsm_caps: caps,
        } => {
            admin::get_admin_role(&AdminRepository::new(deps.storage), &info)?;

            let storage = deps.storage;

            if let Some(v) = epoch_duration {
                ensure!(v != 0, "epoch duration is zero");

                storage.set_epoch_duration(v);
            }

            if let Some(v) = unbonding_period {
                storage.set_unbonding_period(v);
            }

            if let Some(v) = interchain_tx_timeout {
                storage.set_interchain_tx_timeout(v);
            }

            if let Some(v) = icq_update_period {
                storage.set_icq_update_period(v);
            }

            if let Some(v) = lsm_enabled {
                storage.set_lsm_enabled(v);
            }

            if let Some(v) = max_rate_increase_bps {
                storage.set_max_rate_increase(MaxRateIncrease::try_from(v)?);
            }

            if let Some(v) = max_rate_decrease_bps {
                storage.set_max_rate_decrease(MaxRateDecrease::try_from(v)?);
            }

            if let Some(v) = caps {
                storage.set_lsm_caps(Some(lsm_caps(v)?));
            }

            Response::default()
        }
    };

    Ok(response.add_attribute("action", kind))
}

#[entry_point]
pub fn execute(
    deps: DepsMut<NeutronQuery>,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Response<NeutronMsg>> {
    match msg {
        ExecuteMsg::Admin(admin_msg) => execute_admin_msg(deps, info, admin_msg),
        ExecuteMsg::Staking(staking_msg) => execute_staking_msg(deps, env, info, staking_msg),
        ExecuteMsg::Zone(zone_msg) => execute_zone_msg(deps, env, info, zone_msg),
    }
}

pub fn handle_zone_query(deps: Deps<NeutronQuery>, query: ZoneQueryMsg) -> Result<Binary, StdError> {
    let storage = deps.storage;

    match query {
        ZoneQueryMsg::Config {} => {
            let local_denom = storage.local_denom();

            let subdenom = local_denom.rsplit('/').next().unwrap_or_default().to_owned();

            to_json_binary(&Config {
                chain_id: storage.chain_id(),
                connection_id: storage.connection_id(),
                base_denom: storage.base_denom(),
                subdenom,
                account_prefix: storage.account_prefix(),
                local_prefix: storage.local_prefix(),
                unbonding_period: storage.unbonding_period(),
                epoch_duration: storage.epoch_duration(),
                interchain_tx_timeout: storage.interchain_tx_timeout(),
                icq_update_period: storage.icq_update_period(),
                lsm_enabled: storage.lsm_enabled(),
                max_rate_increase_bps: storage.max_rate_increase().raw(),
                max_rate_decrease_bps: storage.max_rate_decrease().raw(),
            })
        }

        ZoneQueryMsg::LsmCaps {} => to_json_binary(&storage.lsm_caps().map(|caps| LsmCapsConfig {
            global_cap_bps: caps.global_cap.raw(),
            validator_cap_bps: caps.validator_cap.raw(),
            validator_bond_cap_bps: caps.validator_bond_cap.raw(),
        })),

        ZoneQueryMsg::QueryIds {} => to_json_binary(&QueryIdsResponse {
            deposit_transfers: storage.query_id(Icq::DepositTransfers),
            delegations: storage.query_id(Icq::Delegations),
            validators: storage.query_id(Icq::Validators),
            withdrawal_balance: storage.query_id(Icq::WithdrawalBalance),
        }),
    }
}

#[entry_point]
pub fn query(deps: Deps<NeutronQuery>, _env: Env, msg: QueryMsg) -> Result<Binary> {
    let binary = match msg {
        QueryMsg::Admin(admin_query) => {
            let repository = AdminRepository::new(deps.storage);

            admin::handle_query_msg(&repository, admin_query)?
        }

        QueryMsg::Staking(staking_query) => staking::handle_query_msg(deps.storage, staking_query)?,

        QueryMsg::Zone(zone_query) => handle_zone_query(deps, zone_query)?,
    };

    Ok(binary)
}

#[entry_point]
pub fn reply(deps: DepsMut<NeutronQuery>, _env: Env, reply: Reply) -> Result<Response<NeutronMsg>> {
    let ReplyState { kind, icq } = ReplyState::try_from(reply.id)?;

    match kind {
        ReplyKind::RegisterIcq => reply::handle_register_icq(deps, icq, reply),
    }
}

#[entry_point]
pub fn sudo(deps: DepsMut<NeutronQuery>, env: Env, msg: SudoMsg) -> Result<Response<NeutronMsg>> {
    match msg {
        SudoMsg::OpenAck {
            port_id,
            counterparty_version,
            ..
        } => sudo::handle_open_ack(deps, env, port_id, counterparty_version),

        SudoMsg::Response { request, data } => sudo::handle_response(deps, env, request, data),

        SudoMsg::Error { request, details } => sudo::handle_error(deps, env, request, details),

        SudoMsg::Timeout { request } => sudo::handle_timeout(deps, env, request),

        SudoMsg::KVQueryResult { query_id } => sudo::handle_kv_query_result(deps, env, query_id),

        SudoMsg::TxQueryResult { query_id, data, .. } => {
            sudo::handle_tx_query_result(deps, env, query_id, data)
        }
    }
}

#[entry_point]
pub fn migrate(_deps: DepsMut, _env: Env, _msg: MigrateMsg) -> Result<Response> {
    Ok(Response::default())
}
