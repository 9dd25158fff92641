use cosmwasm_std::Storage;

use ics_core::{
    delegation,
    memo::{Memo, MemoKind},
    msg::{Account, RemoteMsg, RemoteTx},
    rates::{next_redemption_rate, Backing},
    Coin, Epoch, OverflowError, Timestamp,
};

use crate::{
    delegations::{self, DelegationsExt as _},
    event, intents, rebalance, receipts, redelegations,
    validators::ValidatorsExt as _,
    withdrawals,
    zone::ZoneExt as _,
    BalanceOracle, Error, Outcome,
};

/// Close the current epoch and run the periodic upkeep, anyone may trigger it once it is due
pub fn end_epoch(
    storage: &mut dyn Storage,
    oracle: &dyn BalanceOracle,
    now: Timestamp,
) -> Result<Outcome, Error> {
    let next = storage
        .last_epoch_time()
        .saturating_add(storage.epoch_duration());

    if now < next {
        return Err(Error::EpochNotElapsed { next });
    }

    let epoch = storage.epoch() + 1;

    storage.set_epoch(epoch);
    storage.set_last_epoch_time(now);

    let mut outcome = Outcome::default();

    let unbonding_period = storage.unbonding_period();

    let redelegations_collected = redelegations::collect_garbage(storage, now, unbonding_period);

    let withdrawals_collected = withdrawals::collect_garbage(storage, now);

    outcome.push_event(
        event("epoch_ended")
            .add_attribute("epoch", epoch.to_string())
            .add_attribute("redelegations_collected", redelegations_collected.to_string())
            .add_attribute("withdrawals_collected", withdrawals_collected.to_string()),
    );

    if let Some(caps) = storage.lsm_caps() {
        let max_allocations = caps.max_allocations(&storage.validators())?;

        storage.set_max_allocations(&max_allocations);
    }

    intents::aggregate(storage, oracle)?;

    outcome.extend(withdrawals::requeue_unacknowledged(storage, epoch)?);

    outcome.extend(withdrawals::pay_pending(storage, now)?);

    storage.set_withdrawal_waitgroup(0);

    outcome.extend(withdrawals::handle_queued_unbondings(storage, epoch, now)?);

    outcome.extend(rebalance::rebalance(storage, epoch, now)?);

    outcome.extend(sweep_rewards(storage, oracle, epoch)?);

    Ok(outcome)
}

/// Withdraw rewards from every validator holding stake, the rate is updated once all are in
fn sweep_rewards(
    storage: &mut dyn Storage,
    oracle: &dyn BalanceOracle,
    epoch: Epoch,
) -> Result<Outcome, Error> {
    let Some(delegator) = storage.account_address(Account::Delegation) else {
        return update_redemption_rate(storage, oracle);
    };

    let msgs: Vec<_> = storage
        .delegations(&delegator)
        .into_iter()
        .filter(|d| d.amount != 0)
        .map(|d| RemoteMsg::WithdrawRewards {
            delegator: delegator.clone(),
            validator: d.validator,
        })
        .collect();

    if msgs.is_empty() {
        return update_redemption_rate(storage, oracle);
    }

    let waitgroup = u32::try_from(msgs.len()).map_err(|_| OverflowError)?;

    storage.set_withdrawal_waitgroup(waitgroup);
    storage.set_rewards_sweep_epoch(epoch);

    let mut outcome = Outcome::default();

    outcome.push_cmd(RemoteTx::new(
        Account::Delegation,
        msgs,
        Memo::epoch(MemoKind::Rewards, epoch),
    ));

    Ok(outcome)
}

/// Recompute the redemption rate from the zone's backing and the receipt supply
pub fn update_redemption_rate(
    storage: &mut dyn Storage,
    oracle: &dyn BalanceOracle,
) -> Result<Outcome, Error> {
    let delegated = match storage.account_address(Account::Delegation) {
        Some(delegator) => delegations::total(storage, &delegator)?,
        None => 0,
    };

    let in_flight = withdrawals::in_flight(storage)?
        .checked_add(receipts::pending_value(storage)?)
        .ok_or(OverflowError)?;

    let backing = Backing {
        delegated,
        rewards: storage.rewards_balance(),
        in_flight,
    };

    let supply = oracle.supply_of(&storage.local_denom())?;

    let current = storage.redemption_rate();

    let next = next_redemption_rate(
        current,
        backing,
        supply,
        storage.max_rate_increase(),
        storage.max_rate_decrease(),
    )?;

    storage.push_redemption_rate(next);

    let mut outcome = Outcome::default();

    outcome.push_event(
        event("redemption_rate_updated")
            .add_attribute("previous", current.to_string())
            .add_attribute("rate", next.to_string())
            .add_attribute("supply", supply.to_string()),
    );

    Ok(outcome)
}

/// Count down the rewards waitgroup, at zero the rate is updated and the rewards are collected.
///
/// Acks left over from the sweep of an earlier epoch are ignored.
pub fn on_rewards_withdrawn(
    storage: &mut dyn Storage,
    oracle: &dyn BalanceOracle,
    epoch: Epoch,
) -> Result<Outcome, Error> {
    let waitgroup = storage.withdrawal_waitgroup();

    if waitgroup == 0 || storage.rewards_sweep_epoch() != Some(epoch) {
        let mut outcome = Outcome::default();

        outcome.push_event(
            event("rewards_ack_ignored")
                .add_attribute("epoch", epoch.to_string())
                .add_attribute("waitgroup", waitgroup.to_string()),
        );

        return Ok(outcome);
    }

    storage.set_withdrawal_waitgroup(waitgroup - 1);

    if waitgroup > 1 {
        return Ok(Outcome::default());
    }

    let mut outcome = update_redemption_rate(storage, oracle)?;

    let rewards = storage.rewards_balance();

    let accounts = (
        storage.account_address(Account::Withdrawal),
        storage.account_address(Account::Delegation),
    );

    if let (Some(from), Some(to)) = accounts {
        if rewards != 0 {
            outcome.push_cmd(RemoteTx::new(
                Account::Withdrawal,
                vec![RemoteMsg::Send {
                    from,
                    to,
                    amount: vec![Coin::new(rewards, storage.base_denom())],
                }],
                Memo::epoch(MemoKind::Rewards, epoch),
            ));
        }
    }

    Ok(outcome)
}

/// Delegate rewards which reached the delegation account
pub fn on_rewards_forwarded(
    storage: &mut dyn Storage,
    epoch: Epoch,
    amount: u128,
) -> Result<Outcome, Error> {
    let mut outcome = Outcome::default();

    let remaining = storage.rewards_balance().saturating_sub(amount);

    storage.set_rewards_balance(remaining);

    let delegator = storage.require_account(Account::Delegation)?;

    let plan = delegation::plan(
        amount,
        &intents::aggregate_or_default(storage)?,
        &delegations::current(storage, &delegator),
    )?;

    if plan.is_empty() {
        return Ok(outcome);
    }

    let base_denom = storage.base_denom();

    let msgs = plan
        .into_iter()
        .map(|allocation| RemoteMsg::Delegate {
            delegator: delegator.clone(),
            validator: allocation.validator,
            amount: Coin::new(allocation.amount, &base_denom),
        })
        .collect();

    outcome.push_cmd(RemoteTx::new(
        Account::Delegation,
        msgs,
        Memo::epoch(MemoKind::Rewards, epoch),
    ));

    Ok(outcome)
}

#[cfg(test)]
mod test {
    use cosmwasm_std::testing::MockStorage;
    use ics_core::{msg::Cmd, Decimal};
    use test_utils::event_kinds;

    use super::*;
    use crate::mock::{self, MockOracle};

    #[test]
    fn epoch_is_time_gated() {
        let mut storage = MockStorage::default();

        mock::init_zone_with_validators(&mut storage, 2);

        let err = end_epoch(&mut storage, &MockOracle::default(), mock::EPOCH_DURATION - 1)
            .unwrap_err();

        assert_eq!(err.to_string(), format!("epoch cannot end before {}", mock::EPOCH_DURATION));

        end_epoch(&mut storage, &MockOracle::default(), mock::EPOCH_DURATION).unwrap();

        assert_eq!(storage.epoch(), 1);
        assert_eq!(storage.last_epoch_time(), mock::EPOCH_DURATION);
    }

    #[test]
    fn rewards_sweep_waits_for_every_validator() {
        let mut storage = MockStorage::default();

        mock::init_zone_with_delegations(&mut storage, &[1_000, 1_000]);

        let oracle = MockOracle::default().with_supply(mock::LOCAL_DENOM, 2_000);

        let outcome = end_epoch(&mut storage, &oracle, mock::EPOCH_DURATION).unwrap();

        let Some(Cmd::Submit(sweep)) = outcome.cmds.last() else {
            panic!("expected the rewards sweep");
        };

        assert_eq!(sweep.memo, "rewards/1");
        assert_eq!(sweep.msgs.len(), 2);
        assert_eq!(storage.withdrawal_waitgroup(), 2);

        storage.set_rewards_balance(20);

        let outcome = on_rewards_withdrawn(&mut storage, &oracle, 1).unwrap();

        assert!(outcome.cmds.is_empty());
        assert_eq!(storage.redemption_rate(), Decimal::one());

        let outcome = on_rewards_withdrawn(&mut storage, &oracle, 1).unwrap();

        // (2_000 + 20) / 2_000
        assert_eq!(storage.redemption_rate(), "1.01".parse().unwrap());
        assert_eq!(storage.last_redemption_rate(), Decimal::one());

        let [Cmd::Submit(send)] = outcome.cmds.as_slice() else {
            panic!("expected the rewards send");
        };

        assert_eq!(send.account, Account::Withdrawal);
        assert_eq!(send.memo, "rewards/1");

        let outcome = on_rewards_forwarded(&mut storage, 1, 20).unwrap();

        assert_eq!(storage.rewards_balance(), 0);
        assert_eq!(outcome.cmds.len(), 1);
    }

    #[test]
    fn late_rewards_acks_do_not_count_towards_the_next_sweep() {
        let mut storage = MockStorage::default();

        mock::init_zone_with_delegations(&mut storage, &[1_000, 1_000]);

        let oracle = MockOracle::default().with_supply(mock::LOCAL_DENOM, 2_000);

        end_epoch(&mut storage, &oracle, mock::EPOCH_DURATION).unwrap();

        on_rewards_withdrawn(&mut storage, &oracle, 1).unwrap();

        end_epoch(&mut storage, &oracle, 2 * mock::EPOCH_DURATION).unwrap();

        assert_eq!(storage.withdrawal_waitgroup(), 2);
        assert_eq!(storage.rewards_sweep_epoch(), Some(2));

        storage.set_rewards_balance(20);

        let outcome = on_rewards_withdrawn(&mut storage, &oracle, 1).unwrap();

        assert_eq!(event_kinds(&outcome.events), ["rewards_ack_ignored"]);
        assert_eq!(storage.withdrawal_waitgroup(), 2);
        assert_eq!(storage.redemption_rate(), Decimal::one());

        on_rewards_withdrawn(&mut storage, &oracle, 2).unwrap();

        let outcome = on_rewards_withdrawn(&mut storage, &oracle, 2).unwrap();

        assert_eq!(storage.withdrawal_waitgroup(), 0);
        assert_eq!(storage.redemption_rate(), "1.01".parse().unwrap());
        assert_eq!(outcome.cmds.len(), 1);
    }

    #[test]
    fn rate_moves_are_clipped() {
        let mut storage = MockStorage::default();

        mock::init_zone_with_delegations(&mut storage, &[1_000]);

        let oracle = MockOracle::default().with_supply(mock::LOCAL_DENOM, 500);

        update_redemption_rate(&mut storage, &oracle).unwrap();

        // raw rate of 2 is clipped to +2%
        assert_eq!(storage.redemption_rate(), "1.02".parse().unwrap());
    }
}
