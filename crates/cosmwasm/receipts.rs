use std::collections::BTreeMap;

use cosmwasm_std::{Binary, Storage};

use ics_core::{
    checked_sum,
    delegation::{self, Allocation},
    deposit::{
        classify_denom, coin_intent, convert_prefix, deposit_value, validate_coins, Denom,
        DepositTx, Sender,
    },
    intent::{normalize, parse_memo_intent, ValidatorIntent},
    msg::{Account, Cmd, RemoteMsg, RemoteTx},
    records::Receipt,
    Address, Coin, Decimal, OverflowError, Timestamp,
};

use crate::{
    delegations, event, intents, validators::ValidatorsExt as _, zone::ZoneExt as _,
    BalanceOracle, Error, Outcome, StorageExt as _,
};

#[rustfmt::skip]
mod key {
    use crate::MapKey;

    macro_rules! key {
        ($k:literal) => {
            concat!("receipts::", $k)
        };
    }

    macro_rules! map_key {
        ($k:literal) => {
            crate::MapKey::new(key!($k))
        };
    }

    pub const PLAN    : MapKey = map_key!("plan");
    pub const RECEIPT : MapKey = map_key!("receipt");
}

pub trait ReceiptsExt: Storage {
    fn receipt(&self, hash: &str) -> Option<Receipt> {
        self.json_at(key::RECEIPT.with(hash))
    }

    fn set_receipt(&mut self, receipt: &Receipt) {
        self.set_json(key::RECEIPT.with(&receipt.hash), receipt)
    }

    fn receipts(&self) -> Vec<Receipt> {
        self.json_with_prefix(key::RECEIPT.all())
    }

    fn outstanding_receipts(&self) -> Vec<Receipt> {
        self.receipts()
            .into_iter()
            .filter(Receipt::is_outstanding)
            .collect()
    }

    /// Delegation plan of a deposit still on its way to the delegation account
    fn delegation_plan(&self, hash: &str) -> Option<Vec<Allocation>> {
        self.json_at(key::PLAN.with(hash))
    }
}

impl<T> ReceiptsExt for T where T: Storage + ?Sized {}

/// Value of deposits which were minted against but are not yet delegated
pub fn pending_value(storage: &dyn Storage) -> Result<u128, OverflowError> {
    let mut total = 0u128;

    for receipt in storage.outstanding_receipts() {
        total = total
            .checked_add(deposit_value(&receipt.amount)?)
            .ok_or(OverflowError)?;
    }

    Ok(total)
}

fn drop_deposit(storage: &mut dyn Storage, hash: &str, reason: &str, now: Timestamp) -> Outcome {
    storage.set_receipt(&Receipt::nil(hash, now));

    let mut outcome = Outcome::default();

    outcome.push_event(
        event("deposit_dropped")
            .add_attribute("hash", hash)
            .add_attribute("reason", reason),
    );

    outcome
}

/// The intent carried by the deposit memo, limited to registered validators
fn memo_intent(storage: &dyn Storage, memo: &str) -> Option<Vec<ValidatorIntent>> {
    let bytes = Binary::from_base64(memo).ok()?;

    let parsed = parse_memo_intent(&bytes, &storage.valoper_prefix()).ok()?;

    let registered = storage.validator_addresses();

    let amounts: BTreeMap<Address, Decimal> = parsed
        .into_iter()
        .filter(|i| registered.contains(&i.validator))
        .map(|i| (i.validator, i.weight))
        .collect();

    normalize(amounts).ok().filter(|intents| !intents.is_empty())
}

/// Process a transaction observed on the deposit account.
///
/// Rejected deposits are reported through events, only a zero redemption rate or an arithmetic
/// failure is an error.
pub fn handle_deposit(
    storage: &mut dyn Storage,
    oracle: &dyn BalanceOracle,
    tx: DepositTx,
    now: Timestamp,
) -> Result<Outcome, Error> {
    if storage.receipt(&tx.hash).is_some() {
        return Ok(Outcome::default());
    }

    let deposit_address = storage.require_account(Account::Deposit)?;

    let sender = match tx.sender(&deposit_address) {
        Sender::Single(sender) => sender,
        Sender::Multiple => return Ok(drop_deposit(storage, &tx.hash, "multiple senders", now)),
        Sender::None => return Ok(drop_deposit(storage, &tx.hash, "no sender", now)),
    };

    let coins = tx.received(&deposit_address)?;

    let base_denom = storage.base_denom();

    let validators = storage.validator_addresses();

    if let Err(err) = validate_coins(&coins, &base_denom, &validators) {
        let mut outcome = Outcome::default();

        outcome.push_event(
            event("deposit_rejected")
                .add_attribute("hash", &tx.hash)
                .add_attribute("reason", err.to_string()),
        );

        return Ok(outcome);
    }

    let Ok(local_sender) = convert_prefix(&sender, &storage.local_prefix()) else {
        return Ok(drop_deposit(storage, &tx.hash, "invalid sender", now));
    };

    let rate = storage.redemption_rate();

    if rate.is_zero() {
        return Err(Error::ZeroRate);
    }

    let value = deposit_value(&coins)?;

    let (intent, intent_value) = match memo_intent(storage, &tx.memo) {
        Some(intent) => (intent, value),
        None => coin_intent(&coins, &base_denom, &validators)?,
    };

    if !intent.is_empty() {
        intents::merge_intent(storage, oracle, &local_sender, &intent, intent_value)?;
    }

    let minted = rate.div_floor(value).ok_or(OverflowError)?;

    let base_amount = checked_sum(
        coins
            .iter()
            .filter(|c| c.denom == base_denom)
            .map(|c| c.amount),
    )?;

    let plan = if base_amount == 0 {
        vec![]
    } else {
        let delegator = storage.require_account(Account::Delegation)?;

        delegation::plan(
            base_amount,
            &intents::aggregate_or_default(storage)?,
            &delegations::current(storage, &delegator),
        )?
    };

    let mut outcome = Outcome::default();

    if minted != 0 {
        outcome.push_cmd(Cmd::Mint {
            amount: minted,
            recipient: local_sender.clone(),
        });
    }

    outcome.push_cmd(RemoteTx::new(
        Account::Deposit,
        vec![RemoteMsg::Send {
            from: deposit_address,
            to: storage.require_account(Account::Delegation)?,
            amount: coins.clone(),
        }],
        &tx.hash,
    ));

    storage.set_json(key::PLAN.with(&tx.hash), &plan);

    storage.set_receipt(&Receipt {
        hash: tx.hash.clone(),
        sender,
        amount: coins,
        first_seen: now,
        completed: None,
    });

    outcome.push_event(
        event("deposit_received")
            .add_attribute("hash", tx.hash)
            .add_attribute("recipient", local_sender)
            .add_attribute("value", value.to_string())
            .add_attribute("minted", minted.to_string()),
    );

    Ok(outcome)
}

/// Delegate a deposit once it reached the delegation account
pub fn on_deposit_forwarded(
    storage: &mut dyn Storage,
    hash: &str,
    now: Timestamp,
) -> Result<Outcome, Error> {
    let mut outcome = Outcome::default();

    let Some(receipt) = storage.receipt(hash).filter(Receipt::is_outstanding) else {
        return Ok(outcome);
    };

    let delegator = storage.require_account(Account::Delegation)?;

    let base_denom = storage.base_denom();

    let validators = storage.validator_addresses();

    let plan = storage.delegation_plan(hash).unwrap_or_default();

    let base = plan.into_iter().map(|allocation| RemoteMsg::Delegate {
        delegator: delegator.clone(),
        validator: allocation.validator,
        amount: Coin::new(allocation.amount, &base_denom),
    });

    let lsm = receipt
        .amount
        .iter()
        .filter(|coin| matches!(classify_denom(&coin.denom, &base_denom, &validators), Denom::Lsm { .. }))
        .map(|coin| RemoteMsg::RedeemTokens {
            delegator: delegator.clone(),
            amount: coin.clone(),
        });

    let msgs: Vec<RemoteMsg> = base.chain(lsm).collect();

    storage.remove_key(key::PLAN.with(hash));

    if msgs.is_empty() {
        complete_receipt(storage, hash, now);

        return Ok(outcome);
    }

    outcome.push_cmd(RemoteTx::new(Account::Delegation, msgs, hash));

    Ok(outcome)
}

fn complete_receipt(storage: &mut dyn Storage, hash: &str, now: Timestamp) {
    let Some(mut receipt) = storage.receipt(hash).filter(Receipt::is_outstanding) else {
        return;
    };

    receipt.completed = Some(now);

    storage.set_receipt(&receipt);
}

/// Record stake added to the delegation account, completing the receipt it came from if any
pub fn on_delegated(
    storage: &mut dyn Storage,
    hash: Option<&str>,
    validator: &str,
    amount: u128,
    now: Timestamp,
) -> Result<Outcome, Error> {
    let delegator = storage.require_account(Account::Delegation)?;

    delegations::add(storage, &delegator, validator, amount)?;

    if let Some(hash) = hash {
        complete_receipt(storage, hash, now);
    }

    let mut outcome = Outcome::default();

    outcome.push_event(
        event("delegated")
            .add_attribute("validator", validator)
            .add_attribute("amount", amount.to_string()),
    );

    Ok(outcome)
}

/// Tokenized shares redeemed back into a delegation with their validator
pub fn on_redeemed(
    storage: &mut dyn Storage,
    hash: Option<&str>,
    shares: &Coin,
    received: &Coin,
    now: Timestamp,
) -> Result<Outcome, Error> {
    let Some((validator, _)) = shares.denom.split_once('/') else {
        return Ok(Outcome::default());
    };

    let validator = validator.to_owned();

    on_delegated(storage, hash, &validator, received.amount, now)
}
