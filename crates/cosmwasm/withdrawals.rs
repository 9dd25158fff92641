use std::collections::BTreeMap;

use cosmwasm_std::{Event, Storage};

use ics_core::{
    checked_sum, derive_hash,
    deposit::convert_prefix,
    memo::{Memo, MemoKind},
    msg::{Account, Cmd, RemoteMsg, RemoteTx},
    records::UnbondingRecord,
    withdrawal::{
        batch_unbondings, check_legs, distribute, Error as WithdrawalError, Unwind,
        WithdrawalRecord, WithdrawalStatus,
    },
    Address, Coin, Decimal, Epoch, OverflowError, Timestamp,
};

use crate::{
    delegations, event, intents,
    unbondings::UnbondingsExt as _,
    validators::ValidatorsExt as _,
    zone::ZoneExt as _,
    Error, Outcome, StorageExt as _,
};

#[rustfmt::skip]
mod key {
    use crate::MapKey;

    macro_rules! key {
        ($k:literal) => {
            concat!("withdrawals::", $k)
        };
    }

    macro_rules! map_key {
        ($k:literal) => {
            crate::MapKey::new(key!($k))
        };
    }

    pub const RECORD : MapKey = map_key!("record");
    pub const STATUS : MapKey = map_key!("status");
}

pub trait WithdrawalsExt: Storage {
    fn withdrawal_status(&self, hash: &str) -> Option<WithdrawalStatus> {
        self.string_at(key::STATUS.with(hash))
            .map(|status| status.parse().expect("always: valid status in index"))
    }

    fn withdrawal(&self, hash: &str) -> Option<WithdrawalRecord> {
        let status = self.withdrawal_status(hash)?;

        self.json_at(key::RECORD.multi([&status, &hash]))
    }

    fn withdrawals_by_status(&self, status: WithdrawalStatus) -> Vec<WithdrawalRecord> {
        self.json_with_prefix(key::RECORD.multi([&status]))
    }

    fn withdrawals(&self) -> Vec<WithdrawalRecord> {
        self.json_with_prefix(key::RECORD.all())
    }

    /// Store the record under its status, dropping the key of its previous status
    fn save_withdrawal(&mut self, record: &WithdrawalRecord) {
        if let Some(previous) = self.withdrawal_status(&record.hash) {
            self.remove_key(key::RECORD.multi([&previous, &record.hash]));
        }

        self.set_json(key::RECORD.multi([&record.status, &record.hash]), record);
        self.set_string(key::STATUS.with(&record.hash), record.status.into());
    }

    fn remove_withdrawal(&mut self, hash: &str) {
        if let Some(status) = self.withdrawal_status(hash) {
            self.remove_key(key::RECORD.multi([&status, &hash]));
        }

        self.remove_key(key::STATUS.with(hash));
    }
}

impl<T> WithdrawalsExt for T where T: Storage + ?Sized {}

fn is_pending(status: WithdrawalStatus) -> bool {
    matches!(
        status,
        WithdrawalStatus::Queued | WithdrawalStatus::Unbond | WithdrawalStatus::Tokenize
    )
}

/// Legs promised to withdrawals which are yet to leave the delegation ledger, per validator
pub(crate) fn reserved(storage: &dyn Storage) -> Result<BTreeMap<Address, u128>, OverflowError> {
    let mut reserved: BTreeMap<Address, u128> = BTreeMap::new();

    for record in storage.withdrawals().into_iter().filter(|r| is_pending(r.status)) {
        for leg in record.distribution {
            let total = reserved.entry(leg.validator).or_default();

            *total = total.checked_add(leg.amount).ok_or(OverflowError)?;
        }
    }

    Ok(reserved)
}

/// Unlocked stake per validator not yet promised to a withdrawal
fn available(
    storage: &dyn Storage,
    delegator: &str,
    now: Timestamp,
) -> Result<BTreeMap<Address, u128>, OverflowError> {
    let reserved = reserved(storage)?;

    Ok(delegations::unlocked(storage, delegator, now)
        .into_iter()
        .map(|(validator, amount)| {
            let taken = reserved.get(&validator).copied().unwrap_or_default();

            (validator, amount.saturating_sub(taken))
        })
        .collect())
}

/// Base denom owed by withdrawals which no longer count as delegated
pub fn in_flight(storage: &dyn Storage) -> Result<u128, OverflowError> {
    let mut total = 0u128;

    for record in storage.withdrawals() {
        total = total.checked_add(record.in_flight()?).ok_or(OverflowError)?;
    }

    Ok(total)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub sender: Address,
    /// Remote address paid once the withdrawal settles
    pub recipient: Address,
    /// Receipt tokens handed over to be burned
    pub burn_amount: u128,
    /// Take the stake as tokenized shares instead of waiting out the unbonding period
    pub tokenize: bool,
}

pub fn queue_redemption(
    storage: &mut dyn Storage,
    redemption: Redemption,
    now: Timestamp,
) -> Result<Outcome, Error> {
    if !storage.is_initialised() {
        return Err(Error::ZoneNotInitialised);
    }

    if redemption.burn_amount == 0 {
        return Err(WithdrawalError::ZeroAmount.into());
    }

    let rate = storage.redemption_rate();

    if rate.is_zero() {
        return Err(Error::ZeroRate);
    }

    let amount = rate
        .mul_floor(redemption.burn_amount)
        .ok_or(OverflowError)?;

    if amount == 0 {
        return Err(WithdrawalError::ZeroAmount.into());
    }

    let recipient = convert_prefix(&redemption.recipient, &storage.account_prefix())?;

    let delegator = storage.require_account(Account::Delegation)?;

    let available = available(storage, &delegator, now)?;

    let total_available = checked_sum(available.values().copied())?;

    if amount > total_available {
        return Err(WithdrawalError::InsufficientUnlocked {
            available: total_available,
            wanted: amount,
        }
        .into());
    }

    let intent = if redemption.tokenize {
        intents::delegator_or_aggregate(storage, &redemption.sender)?
    } else {
        intents::aggregate_or_default(storage)?
    };

    let distribution = distribute(amount, &intent)?;

    let sequence = storage.next_redemption_sequence();

    let hash = derive_hash(&[
        redemption.sender.as_str(),
        &now.to_string(),
        &sequence.to_string(),
    ]);

    let mut outcome = Outcome::default();

    let status = if redemption.tokenize {
        if !storage.lsm_enabled() {
            return Err(Error::LsmDisabled);
        }

        check_legs(&distribution, &available)?;

        if let Some(caps) = storage.lsm_caps() {
            caps.check_global(&storage.validators(), amount)?;

            for leg in &distribution {
                caps.check_validator(&storage.require_validator(&leg.validator)?, leg.amount)?;
            }
        }

        let base_denom = storage.base_denom();

        let msgs = distribution
            .iter()
            .map(|leg| RemoteMsg::TokenizeShares {
                delegator: delegator.clone(),
                validator: leg.validator.clone(),
                amount: Coin::new(leg.amount, &base_denom),
                owner: delegator.clone(),
            })
            .collect();

        outcome.push_cmd(RemoteTx::new(Account::Delegation, msgs, &hash));

        WithdrawalStatus::Tokenize
    } else {
        WithdrawalStatus::Queued
    };

    let record = WithdrawalRecord {
        hash: hash.clone(),
        delegator: redemption.sender,
        recipient,
        amount,
        burn_amount: redemption.burn_amount,
        distribution,
        status,
        epoch: storage.epoch(),
        completion_time: None,
        requeued: false,
        acknowledged: false,
        sent: false,
        tokenized: vec![],
    };

    storage.save_withdrawal(&record);

    outcome.push_event(
        event("redemption_queued")
            .add_attribute("hash", hash)
            .add_attribute("status", record.status.to_string())
            .add_attribute("amount", amount.to_string())
            .add_attribute("burn_amount", record.burn_amount.to_string()),
    );

    Ok(outcome)
}

/// Batch every queued withdrawal into one undelegation per validator
pub fn handle_queued_unbondings(
    storage: &mut dyn Storage,
    epoch: Epoch,
    now: Timestamp,
) -> Result<Outcome, Error> {
    let mut outcome = Outcome::default();

    let Some(delegator) = storage.account_address(Account::Delegation) else {
        return Ok(outcome);
    };

    let queued = storage.withdrawals_by_status(WithdrawalStatus::Queued);

    if queued.is_empty() {
        return Ok(outcome);
    }

    // queued legs are only reserved against the stake they are about to take
    let mut available = delegations::unlocked(storage, &delegator, now);

    for record in storage
        .withdrawals()
        .into_iter()
        .filter(|r| matches!(r.status, WithdrawalStatus::Unbond | WithdrawalStatus::Tokenize))
    {
        for leg in record.distribution {
            if let Some(amount) = available.get_mut(&leg.validator) {
                *amount = amount.saturating_sub(leg.amount);
            }
        }
    }

    let epoch_str = epoch.to_string();

    let batch = batch_unbondings(queued, available, epoch, |record| {
        derive_hash(&[record.hash.as_str(), &epoch_str])
    })?;

    for record in batch.unbond.iter().chain(&batch.queued) {
        storage.save_withdrawal(record);
    }

    for hash in batch.skipped {
        outcome.push_event(event("unbonding_skipped").add_attribute("hash", hash));
    }

    let base_denom = storage.base_denom();

    let mut msgs = vec![];

    for (validator, (amount, hashes)) in batch.undelegations {
        storage.set_unbonding(&UnbondingRecord::new(&validator, epoch, amount, hashes));

        msgs.push(RemoteMsg::Undelegate {
            delegator: delegator.clone(),
            validator,
            amount: Coin::new(amount, &base_denom),
        });
    }

    if !msgs.is_empty() {
        outcome.push_cmd(RemoteTx::new(
            Account::Delegation,
            msgs,
            Memo::epoch(MemoKind::Withdrawal, epoch),
        ));
    }

    Ok(outcome)
}

/// Issue the payout send if the record is due, marking it as sent
fn pay_if_due(
    storage: &dyn Storage,
    record: &mut WithdrawalRecord,
    now: Timestamp,
    outcome: &mut Outcome,
) -> Result<(), Error> {
    if !record.is_payable(now) {
        return Ok(());
    }

    let from = storage.require_account(Account::Delegation)?;

    let msg = RemoteMsg::Send {
        from,
        to: record.recipient.clone(),
        amount: record.payout(&storage.base_denom()),
    };

    outcome.push_cmd(RemoteTx::new(Account::Delegation, vec![msg], &record.hash));

    record.sent = true;

    Ok(())
}

/// Move a record whose legs are all settled on to the send stage
fn settle_if_drained(
    storage: &dyn Storage,
    record: &mut WithdrawalRecord,
    now: Timestamp,
    outcome: &mut Outcome,
) -> Result<(), Error> {
    if !record.distribution.is_empty() || record.status == WithdrawalStatus::Send {
        return Ok(());
    }

    record.transition(WithdrawalStatus::Send)?;

    pay_if_due(storage, record, now, outcome)
}

fn unbonding_missing(validator: &str, epoch: Epoch) -> Event {
    event("unbonding_record_missing")
        .add_attribute("validator", validator)
        .add_attribute("epoch", epoch.to_string())
}

fn withdrawal_missing(hash: &str) -> Event {
    event("withdrawal_record_missing").add_attribute("hash", hash)
}

pub fn on_undelegate_success(
    storage: &mut dyn Storage,
    validator: &str,
    epoch: Epoch,
    completion_time: Timestamp,
    received: Option<Coin>,
    now: Timestamp,
) -> Result<Outcome, Error> {
    let mut outcome = Outcome::default();

    let Some(unbonding) = storage.unbonding(validator, epoch) else {
        outcome.push_event(unbonding_missing(validator, epoch));

        return Ok(outcome);
    };

    let ratio = received
        .filter(|coin| coin.amount < unbonding.amount)
        .map(|coin| Decimal::from_ratio(coin.amount, unbonding.amount).ok_or(OverflowError))
        .transpose()?;

    for hash in &unbonding.related_txhash {
        let Some(mut record) = storage.withdrawal(hash) else {
            outcome.push_event(withdrawal_missing(hash));

            continue;
        };

        // records requeued since then belong to a later batch
        if record.status != WithdrawalStatus::Unbond || record.epoch != epoch {
            continue;
        }

        record.confirm_unbond(validator, completion_time, ratio)?;

        settle_if_drained(storage, &mut record, now, &mut outcome)?;

        storage.save_withdrawal(&record);
    }

    let delegator = storage.require_account(Account::Delegation)?;

    delegations::subtract(storage, &delegator, validator, unbonding.amount);

    storage.remove_unbonding(validator, epoch);

    outcome.push_event(
        event("undelegated")
            .add_attribute("validator", validator)
            .add_attribute("amount", unbonding.amount.to_string())
            .add_attribute("completion_time", completion_time.to_string()),
    );

    Ok(outcome)
}

/// Put the failed leg back on the queue, splitting it off when other legs remain
fn unwind(
    storage: &mut dyn Storage,
    record: WithdrawalRecord,
    validator: &str,
    new_hash: String,
    now: Timestamp,
    outcome: &mut Outcome,
) -> Result<(), Error> {
    let intent = intents::aggregate_or_default(storage)?;

    let hash = record.hash.clone();

    match record.unwind_leg(validator, new_hash, &intent)? {
        None => {}

        Some(Unwind::Requeued(requeued)) => {
            storage.remove_withdrawal(&hash);
            storage.save_withdrawal(&requeued);

            outcome.push_event(
                event("withdrawal_requeued")
                    .add_attribute("hash", hash)
                    .add_attribute("new_hash", requeued.hash),
            );
        }

        Some(Unwind::Split { mut kept, carved }) => {
            settle_if_drained(storage, &mut kept, now, outcome)?;

            storage.save_withdrawal(&kept);
            storage.save_withdrawal(&carved);

            outcome.push_event(
                event("withdrawal_split")
                    .add_attribute("hash", hash)
                    .add_attribute("new_hash", carved.hash),
            );
        }
    }

    Ok(())
}

pub fn on_undelegate_failure(
    storage: &mut dyn Storage,
    validator: &str,
    epoch: Epoch,
    now: Timestamp,
) -> Result<Outcome, Error> {
    let mut outcome = Outcome::default();

    let Some(unbonding) = storage.unbonding(validator, epoch) else {
        outcome.push_event(unbonding_missing(validator, epoch));

        return Ok(outcome);
    };

    for hash in &unbonding.related_txhash {
        let Some(record) = storage.withdrawal(hash) else {
            outcome.push_event(withdrawal_missing(hash));

            continue;
        };

        if record.status != WithdrawalStatus::Unbond || record.epoch != epoch {
            continue;
        }

        let new_hash = derive_hash(&[hash.as_str(), "requeue", &epoch.to_string()]);

        unwind(storage, record, validator, new_hash, now, &mut outcome)?;
    }

    storage.remove_unbonding(validator, epoch);

    outcome.push_event(
        event("undelegation_failed")
            .add_attribute("validator", validator)
            .add_attribute("epoch", epoch.to_string()),
    );

    Ok(outcome)
}

pub fn on_tokenize_success(
    storage: &mut dyn Storage,
    hash: &str,
    validator: &str,
    received: Coin,
    now: Timestamp,
) -> Result<Outcome, Error> {
    let mut outcome = Outcome::default();

    let Some(mut record) = storage.withdrawal(hash) else {
        outcome.push_event(withdrawal_missing(hash));

        return Ok(outcome);
    };

    if record.status != WithdrawalStatus::Tokenize {
        return Ok(outcome);
    }

    let Some(amount) = record.confirm_tokenize(validator, received) else {
        return Ok(outcome);
    };

    let delegator = storage.require_account(Account::Delegation)?;

    delegations::subtract(storage, &delegator, validator, amount);

    settle_if_drained(storage, &mut record, now, &mut outcome)?;

    storage.save_withdrawal(&record);

    outcome.push_event(
        event("shares_tokenized")
            .add_attribute("hash", hash)
            .add_attribute("validator", validator)
            .add_attribute("amount", amount.to_string()),
    );

    Ok(outcome)
}

pub fn on_tokenize_failure(
    storage: &mut dyn Storage,
    hash: &str,
    validator: &str,
    now: Timestamp,
) -> Result<Outcome, Error> {
    let mut outcome = Outcome::default();

    let Some(record) = storage.withdrawal(hash) else {
        outcome.push_event(withdrawal_missing(hash));

        return Ok(outcome);
    };

    if record.status != WithdrawalStatus::Tokenize {
        return Ok(outcome);
    }

    let new_hash = derive_hash(&[hash, "requeue", validator]);

    unwind(storage, record, validator, new_hash, now, &mut outcome)?;

    Ok(outcome)
}

/// Complete the withdrawal settled by a send, burning its receipt tokens exactly once
pub fn on_send_success(
    storage: &mut dyn Storage,
    hash: &str,
    to: &str,
    coins: &[Coin],
    now: Timestamp,
) -> Result<Outcome, Error> {
    let mut outcome = Outcome::default();

    let Some(mut record) = storage.withdrawal(hash) else {
        outcome.push_event(withdrawal_missing(hash));

        return Ok(outcome);
    };

    if !record.is_settled_by(to, coins, &storage.base_denom()) {
        return Ok(outcome);
    }

    record.transition(WithdrawalStatus::Completed)?;

    record.completion_time = Some(now);

    storage.save_withdrawal(&record);

    if record.burn_amount != 0 {
        outcome.push_cmd(Cmd::Burn {
            amount: record.burn_amount,
        });
    }

    outcome.push_event(
        event("withdrawal_completed")
            .add_attribute("hash", hash)
            .add_attribute("burn_amount", record.burn_amount.to_string()),
    );

    Ok(outcome)
}

/// A failed payout is retried at the next epoch
pub fn on_send_failure(storage: &mut dyn Storage, hash: &str) -> Outcome {
    let mut outcome = Outcome::default();

    let Some(mut record) = storage.withdrawal(hash) else {
        outcome.push_event(withdrawal_missing(hash));

        return outcome;
    };

    if record.status != WithdrawalStatus::Send {
        return outcome;
    }

    record.sent = false;

    storage.save_withdrawal(&record);

    outcome.push_event(event("withdrawal_send_failed").add_attribute("hash", hash));

    outcome
}

/// Issue the payout of every withdrawal which has finished unbonding
pub fn pay_pending(storage: &mut dyn Storage, now: Timestamp) -> Result<Outcome, Error> {
    let mut outcome = Outcome::default();

    for mut record in storage.withdrawals_by_status(WithdrawalStatus::Send) {
        if !record.is_payable(now) {
            continue;
        }

        pay_if_due(storage, &mut record, now, &mut outcome)?;

        storage.save_withdrawal(&record);
    }

    Ok(outcome)
}

/// Return unbondings from earlier epochs which were never acknowledged to the queue
pub fn requeue_unacknowledged(storage: &mut dyn Storage, epoch: Epoch) -> Result<Outcome, Error> {
    let mut outcome = Outcome::default();

    for mut record in storage.withdrawals_by_status(WithdrawalStatus::Unbond) {
        if record.acknowledged || record.epoch >= epoch {
            continue;
        }

        // the batch it left may still be acknowledged, it must no longer settle this record
        for leg in &record.distribution {
            if let Some(mut unbonding) = storage.unbonding(&leg.validator, record.epoch) {
                unbonding.forget(&record.hash);

                storage.set_unbonding(&unbonding);
            }
        }

        record.transition(WithdrawalStatus::Queued)?;
        record.requeued = true;

        storage.save_withdrawal(&record);

        outcome.push_event(event("withdrawal_requeued").add_attribute("hash", &record.hash));
    }

    Ok(outcome)
}

/// Drop completed records past their retention period, returns how many were removed
pub fn collect_garbage(storage: &mut dyn Storage, now: Timestamp) -> usize {
    let collectable: Vec<_> = storage
        .withdrawals_by_status(WithdrawalStatus::Completed)
        .into_iter()
        .filter(|r| r.is_collectable(now))
        .collect();

    for record in &collectable {
        storage.remove_withdrawal(&record.hash);
    }

    collectable.len()
}
