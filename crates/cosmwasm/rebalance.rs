use cosmwasm_std::Storage;

use ics_core::{
    memo::{Memo, MemoKind},
    msg::{Account, RemoteMsg, RemoteTx},
    rebalance::rebalance as plan_rebalance,
    records::RedelegationRecord,
    Coin, Epoch, OverflowError, Timestamp,
};

use crate::{
    delegations, event, redelegations::RedelegationsExt as _, validators::ValidatorsExt as _,
    withdrawals, zone::ZoneExt as _, Error, Outcome,
};

/// Redelegate the delegation account's stake toward the aggregate intent.
///
/// Stake promised to pending withdrawals is left where it is.
pub fn rebalance(storage: &mut dyn Storage, epoch: Epoch, now: Timestamp) -> Result<Outcome, Error> {
    let mut outcome = Outcome::default();

    let Some(delegator) = storage.account_address(Account::Delegation) else {
        return Ok(outcome);
    };

    let intent = storage.aggregate_intent();

    if intent.is_empty() {
        return Ok(outcome);
    }

    let reserved = withdrawals::reserved(storage)?;

    let holdings: Vec<_> = delegations::holdings(storage, &delegator, now)
        .into_iter()
        .map(|mut holding| {
            let taken = reserved.get(&holding.validator).copied().unwrap_or_default();

            holding.amount = holding.amount.saturating_sub(taken);

            holding
        })
        .collect();

    let max_allocations = if storage.lsm_caps().is_some() {
        storage.max_allocations()
    } else {
        Default::default()
    };

    let plan = plan_rebalance(
        &holdings,
        &intent,
        &storage.validator_addresses(),
        &max_allocations,
    )?;

    for validator in plan.skipped_locked {
        outcome.push_event(event("rebalance_skipped_locked").add_attribute("validator", validator));
    }

    if plan.redelegations.is_empty() {
        return Ok(outcome);
    }

    let base_denom = storage.base_denom();

    let mut msgs = Vec::with_capacity(plan.redelegations.len());

    for redelegation in plan.redelegations {
        let mut record = storage
            .redelegation(&redelegation.source, &redelegation.destination, epoch)
            .unwrap_or(RedelegationRecord {
                source: redelegation.source.clone(),
                destination: redelegation.destination.clone(),
                epoch,
                amount: 0,
                completion_time: None,
                created_at: now,
            });

        record.amount = record
            .amount
            .checked_add(redelegation.amount)
            .ok_or(OverflowError)?;

        storage.set_redelegation(&record);

        msgs.push(RemoteMsg::Redelegate {
            delegator: delegator.clone(),
            source: redelegation.source,
            destination: redelegation.destination,
            amount: Coin::new(redelegation.amount, &base_denom),
        });
    }

    outcome.push_event(
        event("rebalance")
            .add_attribute("epoch", epoch.to_string())
            .add_attribute("redelegations", msgs.len().to_string()),
    );

    outcome.push_cmd(RemoteTx::new(
        Account::Delegation,
        msgs,
        Memo::epoch(MemoKind::Rebalance, epoch),
    ));

    Ok(outcome)
}

/// Move the stake in the ledger, the destination is locked until the redelegation completes
pub fn on_redelegate_success(
    storage: &mut dyn Storage,
    source: &str,
    destination: &str,
    amount: u128,
    epoch: Epoch,
    completion_time: Timestamp,
) -> Result<Outcome, Error> {
    if let Some(mut record) = storage.redelegation(source, destination, epoch) {
        record.completion_time = Some(completion_time);

        storage.set_redelegation(&record);
    }

    let delegator = storage.require_account(Account::Delegation)?;

    delegations::subtract(storage, &delegator, source, amount);
    delegations::add(storage, &delegator, destination, amount)?;
    delegations::lock(storage, &delegator, destination, completion_time);

    let mut outcome = Outcome::default();

    outcome.push_event(
        event("redelegated")
            .add_attribute("source", source)
            .add_attribute("destination", destination)
            .add_attribute("amount", amount.to_string()),
    );

    Ok(outcome)
}

pub fn on_redelegate_failure(
    storage: &mut dyn Storage,
    source: &str,
    destination: &str,
    epoch: Epoch,
) -> Outcome {
    storage.remove_redelegation(source, destination, epoch);

    let mut outcome = Outcome::default();

    outcome.push_event(
        event("redelegation_failed")
            .add_attribute("source", source)
            .add_attribute("destination", destination),
    );

    outcome
}
