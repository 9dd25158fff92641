use anyhow::Result;
use cosmwasm_std::{Storage, SubMsg};
use neutron_sdk::{
    bindings::msg::NeutronMsg,
    interchain_queries::v047::register_queries::{
        new_register_balance_query_msg, new_register_delegator_delegations_query_msg,
        new_register_staking_validators_query_msg, new_register_transfers_query_msg,
    },
};

use ics_core::msg::Account;
use ics_cw::{
    validators::ValidatorsExt as _,
    zone::{Icq, ZoneExt as _},
};

use crate::reply::{Kind as ReplyKind, State as ReplyState};

fn with_reply(msg: NeutronMsg, icq: Icq) -> SubMsg<NeutronMsg> {
    SubMsg::reply_on_success(
        msg,
        ReplyState {
            kind: ReplyKind::RegisterIcq,
            icq,
        }
        .into(),
    )
}

/// The account whose address a query needs before it can be registered
pub fn account_of(icq: Icq) -> Option<Account> {
    match icq {
        Icq::DepositTransfers => Some(Account::Deposit),
        Icq::Delegations => Some(Account::Delegation),
        Icq::WithdrawalBalance => Some(Account::Withdrawal),
        Icq::Validators => None,
    }
}

/// Registration message for `icq`, `None` while the account it watches is not open yet
pub fn registration_msg(storage: &dyn Storage, icq: Icq) -> Result<Option<SubMsg<NeutronMsg>>> {
    let connection_id = storage.connection_id();

    let update_period = storage.icq_update_period();

    let address = match account_of(icq) {
        Some(account) => match storage.account_address(account) {
            Some(address) => address,
            None => return Ok(None),
        },
        None => String::new(),
    };

    let validators: Vec<_> = storage.validator_addresses().into_iter().collect();

    let msg = match icq {
        Icq::DepositTransfers => {
            new_register_transfers_query_msg(connection_id, address, update_period, None)?
        }

        Icq::Delegations => new_register_delegator_delegations_query_msg(
            connection_id,
            address,
            validators,
            update_period,
        )?,

        Icq::Validators => {
            new_register_staking_validators_query_msg(connection_id, validators, update_period)?
        }

        Icq::WithdrawalBalance => new_register_balance_query_msg(
            connection_id,
            address,
            storage.base_denom(),
            update_period,
        )?,
    };

    Ok(Some(with_reply(msg, icq)))
}

/// Registration messages for every query watching `account` that is not registered yet
pub fn account_opened_msgs(storage: &dyn Storage, account: Account) -> Result<Vec<SubMsg<NeutronMsg>>> {
    let mut msgs = vec![];

    for icq in [Icq::DepositTransfers, Icq::Delegations, Icq::WithdrawalBalance] {
        if account_of(icq) != Some(account) || storage.query_id(icq).is_some() {
            continue;
        }

        msgs.extend(registration_msg(storage, icq)?);
    }

    Ok(msgs)
}
