use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    amount_str, checked_sum, intent::ValidatorIntent, Address, Coin, Decimal, Epoch,
    OverflowError, Timestamp,
};

/// Completed records are kept around for this long before being garbage collected
pub const COMPLETED_RETENTION_SECS: u64 = 24 * 60 * 60;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WithdrawalStatus {
    Queued,
    Unbond,
    Tokenize,
    Send,
    Completed,
}

impl WithdrawalStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        use WithdrawalStatus::*;

        matches!(
            (self, next),
            (Queued, Unbond)
                | (Unbond, Queued)
                | (Unbond, Send)
                | (Tokenize, Queued)
                | (Tokenize, Send)
                | (Send, Completed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub validator: Address,
    #[serde(with = "amount_str")]
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRecord {
    pub hash: String,
    pub delegator: Address,
    pub recipient: Address,
    /// Base denom amount owed to the recipient
    #[serde(with = "amount_str")]
    pub amount: u128,
    /// Receipt tokens held by the contract, burned once the recipient is paid
    #[serde(with = "amount_str")]
    pub burn_amount: u128,
    /// Legs still to be unbonded or tokenized
    pub distribution: Vec<Distribution>,
    pub status: WithdrawalStatus,
    pub epoch: Epoch,
    pub completion_time: Option<Timestamp>,
    pub requeued: bool,
    pub acknowledged: bool,
    /// Set when the payout send has been issued, cleared if it fails
    pub sent: bool,
    /// Liquid staking tokens received for tokenized legs
    pub tokenized: Vec<Coin>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("redemption amount must be positive")]
    ZeroAmount,

    #[error("no intent to distribute the redemption over")]
    EmptyIntent,

    #[error("redemption of {wanted} exceeds unlocked stake of {available}")]
    InsufficientUnlocked { available: u128, wanted: u128 },

    #[error("cannot take {wanted} from {validator}, only {available} is unlocked")]
    InsufficientUnlockedValidator {
        validator: Address,
        available: u128,
        wanted: u128,
    },

    #[error("withdrawal {hash} cannot move from {from} to {to}")]
    InvalidTransition {
        hash: String,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },

    #[error(transparent)]
    Overflow(#[from] OverflowError),
}

/// Spread `amount` over the intent, sorted by validator.
///
/// Truncation dust is added to the first leg and zero legs are dropped.
pub fn distribute(amount: u128, intent: &[ValidatorIntent]) -> Result<Vec<Distribution>, Error> {
    let mut intent: Vec<&ValidatorIntent> = intent.iter().filter(|i| !i.weight.is_zero()).collect();

    if intent.is_empty() {
        return Err(Error::EmptyIntent);
    }

    intent.sort_by(|a, b| a.validator.cmp(&b.validator));

    let mut distribution = Vec::with_capacity(intent.len());

    for i in intent {
        distribution.push(Distribution {
            validator: i.validator.clone(),
            amount: i.weight.mul_floor(amount).ok_or(OverflowError)?,
        });
    }

    let distributed = checked_sum(distribution.iter().map(|d| d.amount))?;

    let dust = amount
        .checked_sub(distributed)
        .ok_or(Error::Overflow(OverflowError))?;

    distribution[0].amount += dust;

    distribution.retain(|d| d.amount != 0);

    Ok(distribution)
}

/// Ensure every leg fits into the validator's unlocked stake
pub fn check_legs(
    distribution: &[Distribution],
    unlocked: &BTreeMap<Address, u128>,
) -> Result<(), Error> {
    for leg in distribution {
        let available = unlocked.get(&leg.validator).copied().unwrap_or_default();

        if leg.amount > available {
            return Err(Error::InsufficientUnlockedValidator {
                validator: leg.validator.clone(),
                available,
                wanted: leg.amount,
            });
        }
    }

    Ok(())
}

/// Split the record's burn for `part` of its amount, returning (part's share, the rest).
///
/// The part's share is truncated so the remainder stays with the rest. Either side may end up
/// with nothing to burn, the two shares always add up to the original burn.
fn split_burn(record: &WithdrawalRecord, part: u128) -> Result<(u128, u128), Error> {
    let share = num::mul_div_floor(record.burn_amount, part, record.amount).ok_or(OverflowError)?;

    Ok((share, record.burn_amount - share))
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingBatch {
    /// Records moved to Unbond, keyed by the hash they were queued under
    pub unbond: Vec<WithdrawalRecord>,
    /// Derivative records carrying legs that could not be unbonded this epoch
    pub queued: Vec<WithdrawalRecord>,
    /// Records left untouched because none of their legs fit
    pub skipped: Vec<String>,
    /// Total to undelegate per validator, along with the sorted hashes of the records involved
    pub undelegations: BTreeMap<Address, (u128, Vec<String>)>,
}

/// Batch queued redemptions into one undelegation per validator.
///
/// Each leg is checked against the validator's unlocked stake after deducting what this batch has
/// already taken. Records where only some legs fit are split, the legs which do not fit stay
/// queued under a hash produced by `derive_hash`.
pub fn batch_unbondings(
    queued: Vec<WithdrawalRecord>,
    mut unlocked: BTreeMap<Address, u128>,
    epoch: Epoch,
    mut derive_hash: impl FnMut(&WithdrawalRecord) -> String,
) -> Result<UnbondingBatch, Error> {
    let mut batch = UnbondingBatch::default();

    for mut record in queued {
        let (fits, rest): (Vec<_>, Vec<_>) = record.distribution.iter().cloned().partition(|leg| {
            unlocked.get(&leg.validator).copied().unwrap_or_default() >= leg.amount
        });

        if fits.is_empty() {
            batch.skipped.push(record.hash);

            continue;
        }

        if !rest.is_empty() {
            let carved_amount = checked_sum(rest.iter().map(|d| d.amount))?;

            let (carved_burn, kept_burn) = split_burn(&record, carved_amount)?;

            let carved = WithdrawalRecord {
                hash: derive_hash(&record),
                amount: carved_amount,
                burn_amount: carved_burn,
                distribution: rest,
                ..record.clone()
            };

            record.amount -= carved_amount;
            record.burn_amount = kept_burn;
            record.distribution = fits;

            batch.queued.push(carved);
        }

        for leg in &record.distribution {
            let available = unlocked.entry(leg.validator.clone()).or_default();

            *available -= leg.amount;

            let (total, hashes) = batch
                .undelegations
                .entry(leg.validator.clone())
                .or_default();

            *total = total.checked_add(leg.amount).ok_or(OverflowError)?;

            hashes.push(record.hash.clone());
        }

        record.status = WithdrawalStatus::Unbond;
        record.epoch = epoch;
        record.acknowledged = false;

        batch.unbond.push(record);
    }

    batch.undelegations.retain(|_, (total, _)| *total != 0);

    for (_, hashes) in batch.undelegations.values_mut() {
        hashes.sort();
        hashes.dedup();
    }

    Ok(batch)
}

/// How a record was unwound after one of its legs failed remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unwind {
    /// The only leg failed, the whole record returns to the queue under a new hash
    Requeued(WithdrawalRecord),
    /// The failed leg was carved out into a new queued record
    Split {
        kept: WithdrawalRecord,
        carved: WithdrawalRecord,
    },
}

impl WithdrawalRecord {
    pub fn leg(&self, validator: &str) -> Option<&Distribution> {
        self.distribution.iter().find(|d| d.validator == validator)
    }

    fn take_leg(&mut self, validator: &str) -> Option<Distribution> {
        let idx = self
            .distribution
            .iter()
            .position(|d| d.validator == validator)?;

        Some(self.distribution.remove(idx))
    }

    pub fn transition(&mut self, next: WithdrawalStatus) -> Result<(), Error> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                hash: self.hash.clone(),
                from: self.status,
                to: next,
            });
        }

        self.status = next;

        Ok(())
    }

    /// Remove the validator's leg after the remote chain confirmed its undelegation.
    ///
    /// `slashed_ratio` is the share of the requested amount the remote chain actually unbonded,
    /// anything less than one reduces what the recipient is owed. Returns the leg's amount.
    pub fn confirm_unbond(
        &mut self,
        validator: &str,
        completion_time: Timestamp,
        slashed_ratio: Option<Decimal>,
    ) -> Result<Option<u128>, Error> {
        let Some(leg) = self.take_leg(validator) else {
            return Ok(None);
        };

        if let Some(ratio) = slashed_ratio.filter(|r| *r < Decimal::one()) {
            let received = ratio.mul_floor(leg.amount).ok_or(OverflowError)?;

            self.amount -= leg.amount - received;
        }

        self.completion_time = Some(
            self.completion_time
                .map_or(completion_time, |t| t.max(completion_time)),
        );

        self.acknowledged = true;

        Ok(Some(leg.amount))
    }

    /// Record the liquid staking tokens received for the validator's leg
    pub fn confirm_tokenize(&mut self, validator: &str, coin: Coin) -> Option<u128> {
        let leg = self.take_leg(validator)?;

        self.tokenized.push(coin);
        self.acknowledged = true;

        Some(leg.amount)
    }

    /// The coins which settle this withdrawal
    pub fn payout(&self, base_denom: &str) -> Vec<Coin> {
        if self.tokenized.is_empty() {
            return vec![Coin::new(self.amount, base_denom)];
        }

        let mut coins = self.tokenized.clone();

        coins.sort();

        coins
    }

    /// Whether a send of `coins` to `recipient` settles this withdrawal
    pub fn is_settled_by(&self, recipient: &str, coins: &[Coin], base_denom: &str) -> bool {
        let mut coins = coins.to_vec();

        coins.sort();

        self.status == WithdrawalStatus::Send
            && self.recipient == recipient
            && coins == self.payout(base_denom)
    }

    /// Unwind the validator's leg after it failed remotely.
    ///
    /// An unacknowledged record with a single leg goes back to the queue whole with a fresh
    /// distribution over `intent`. Otherwise the leg is carved out into a new queued record, the
    /// original keeps a burn proportional to its remaining amount and may be left without legs.
    pub fn unwind_leg(
        mut self,
        validator: &str,
        new_hash: String,
        intent: &[ValidatorIntent],
    ) -> Result<Option<Unwind>, Error> {
        let Some(leg) = self.leg(validator).cloned() else {
            return Ok(None);
        };

        if self.distribution.len() == 1 && !self.acknowledged {
            self.transition(WithdrawalStatus::Queued)?;

            let distribution = distribute(self.amount, intent)?;

            return Ok(Some(Unwind::Requeued(WithdrawalRecord {
                hash: new_hash,
                distribution,
                completion_time: None,
                acknowledged: false,
                ..self
            })));
        }

        let (kept_burn, carved_burn) = split_burn(&self, self.amount - leg.amount)?;

        self.take_leg(validator);

        let carved = WithdrawalRecord {
            hash: new_hash,
            amount: leg.amount,
            burn_amount: carved_burn,
            distribution: vec![leg.clone()],
            status: WithdrawalStatus::Queued,
            completion_time: None,
            acknowledged: false,
            sent: false,
            tokenized: vec![],
            ..self.clone()
        };

        self.amount -= leg.amount;
        self.burn_amount = kept_burn;

        Ok(Some(Unwind::Split {
            kept: self,
            carved,
        }))
    }

    /// Whether the payout send can be issued at `now`
    pub fn is_payable(&self, now: Timestamp) -> bool {
        self.status == WithdrawalStatus::Send
            && !self.sent
            && self.completion_time.map_or(true, |t| t <= now)
    }

    /// Base denom value still owed which is no longer counted as delegated
    pub fn in_flight(&self) -> Result<u128, OverflowError> {
        match self.status {
            WithdrawalStatus::Unbond | WithdrawalStatus::Tokenize | WithdrawalStatus::Send => {
                let pending = checked_sum(self.distribution.iter().map(|d| d.amount))?;

                Ok(self.amount.saturating_sub(pending))
            }

            WithdrawalStatus::Queued | WithdrawalStatus::Completed => Ok(0),
        }
    }

    pub fn is_collectable(&self, now: Timestamp) -> bool {
        self.status == WithdrawalStatus::Completed
            && self
                .completion_time
                .map_or(true, |t| t.saturating_add(COMPLETED_RETENTION_SECS) < now)
    }
}

#[cfg(test)]
mod test {
    use test_utils::{check_err, prelude::*};

    use super::*;

    fn intent(weights: &[(&str, &str)]) -> Vec<ValidatorIntent> {
        weights
            .iter()
            .map(|(validator, weight)| ValidatorIntent {
                validator: (*validator).to_owned(),
                weight: weight.parse().unwrap(),
            })
            .collect()
    }

    fn legs(amounts: &[(&str, u128)]) -> Vec<Distribution> {
        amounts
            .iter()
            .map(|(validator, amount)| Distribution {
                validator: (*validator).to_owned(),
                amount: *amount,
            })
            .collect()
    }

    fn record(hash: &str, burn_amount: u128, distribution: &[(&str, u128)]) -> WithdrawalRecord {
        let distribution = legs(distribution);

        WithdrawalRecord {
            hash: hash.to_owned(),
            delegator: "alice".to_owned(),
            recipient: "cosmos1alice".to_owned(),
            amount: distribution.iter().map(|d| d.amount).sum(),
            burn_amount,
            distribution,
            status: WithdrawalStatus::Queued,
            epoch: 1,
            completion_time: None,
            requeued: false,
            acknowledged: false,
            sent: false,
            tokenized: vec![],
        }
    }

    fn unlocked(amounts: &[(&str, u128)]) -> BTreeMap<Address, u128> {
        amounts
            .iter()
            .map(|(v, a)| ((*v).to_owned(), *a))
            .collect()
    }

    fn sum(distribution: &[Distribution]) -> u128 {
        distribution.iter().map(|d| d.amount).sum()
    }

    #[rstest]
    #[case(WithdrawalStatus::Queued, WithdrawalStatus::Unbond, true)]
    #[case(WithdrawalStatus::Unbond, WithdrawalStatus::Send, true)]
    #[case(WithdrawalStatus::Tokenize, WithdrawalStatus::Send, true)]
    #[case(WithdrawalStatus::Send, WithdrawalStatus::Completed, true)]
    #[case(WithdrawalStatus::Completed, WithdrawalStatus::Send, false)]
    #[case(WithdrawalStatus::Queued, WithdrawalStatus::Send, false)]
    #[case(WithdrawalStatus::Send, WithdrawalStatus::Queued, false)]
    fn transitions(
        #[case] from: WithdrawalStatus,
        #[case] to: WithdrawalStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(WithdrawalStatus::Tokenize.to_string(), "tokenize");
        assert_eq!("send".parse::<WithdrawalStatus>().unwrap(), WithdrawalStatus::Send);
    }

    #[test]
    fn distribute_assigns_dust_to_first_sorted_validator() {
        let distribution = distribute(
            100,
            &intent(&[("val_c", "0.333333333333333333"), ("val_a", "0.333333333333333333"), ("val_b", "0.333333333333333334")]),
        )
        .unwrap();

        check(
            &distribution,
            expect![[r#"
                [
                  (
                    validator: "val_a",
                    amount: "34",
                  ),
                  (
                    validator: "val_b",
                    amount: "33",
                  ),
                  (
                    validator: "val_c",
                    amount: "33",
                  ),
                ]"#]],
        );

        assert_eq!(sum(&distribution), 100);
    }

    #[test]
    fn distribute_requires_intent() {
        check_err(
            distribute(100, &[]).unwrap_err(),
            expect!["no intent to distribute the redemption over"],
        );
    }

    #[test]
    fn check_legs_reports_first_shortfall() {
        let distribution = legs(&[("val_a", 10), ("val_b", 20)]);

        assert!(check_legs(&distribution, &unlocked(&[("val_a", 10), ("val_b", 20)])).is_ok());

        check_err(
            check_legs(&distribution, &unlocked(&[("val_a", 10), ("val_b", 19)])).unwrap_err(),
            expect!["cannot take 20 from val_b, only 19 is unlocked"],
        );
    }

    #[test]
    fn batch_moves_fitting_records_to_unbond() {
        let batch = batch_unbondings(
            vec![
                record("h1", 100, &[("val_a", 60), ("val_b", 40)]),
                record("h2", 50, &[("val_a", 50)]),
            ],
            unlocked(&[("val_a", 1_000), ("val_b", 1_000)]),
            7,
            |_| unreachable!(),
        )
        .unwrap();

        assert!(batch.queued.is_empty());
        assert!(batch.skipped.is_empty());
        assert!(batch
            .unbond
            .iter()
            .all(|r| r.status == WithdrawalStatus::Unbond && r.epoch == 7));

        assert_eq!(
            batch.undelegations,
            BTreeMap::from([
                ("val_a".to_owned(), (110, vec!["h1".to_owned(), "h2".to_owned()])),
                ("val_b".to_owned(), (40, vec!["h1".to_owned()])),
            ])
        );
    }

    #[test]
    fn batch_splits_records_with_locked_legs() {
        let batch = batch_unbondings(
            vec![record("h1", 1_000, &[("val_a", 750), ("val_b", 250)])],
            unlocked(&[("val_a", 1_000), ("val_b", 100)]),
            2,
            |r| format!("{}/split", r.hash),
        )
        .unwrap();

        let unbond = &batch.unbond[0];
        let carved = &batch.queued[0];

        assert_eq!(unbond.hash, "h1");
        assert_eq!(unbond.amount, 750);
        assert_eq!(unbond.burn_amount, 750);
        assert_eq!(sum(&unbond.distribution), unbond.amount);

        assert_eq!(carved.hash, "h1/split");
        assert_eq!(carved.status, WithdrawalStatus::Queued);
        assert_eq!(carved.amount, 250);
        assert_eq!(carved.burn_amount, 250);
        assert_eq!(sum(&carved.distribution), carved.amount);

        assert_eq!(unbond.burn_amount + carved.burn_amount, 1_000);
        assert!(!batch.undelegations.contains_key("val_b"));
    }

    #[test]
    fn batch_deducts_earlier_allocations() {
        let batch = batch_unbondings(
            vec![record("h1", 10, &[("val_a", 80)]), record("h2", 10, &[("val_a", 80)])],
            unlocked(&[("val_a", 100)]),
            3,
            |_| unreachable!(),
        )
        .unwrap();

        assert_eq!(batch.unbond.len(), 1);
        assert_eq!(batch.skipped, vec!["h2".to_owned()]);
        assert_eq!(batch.undelegations["val_a"].0, 80);
    }

    #[test]
    fn confirm_unbond_tracks_latest_completion() {
        let mut record = record("h1", 15, &[("val_a", 5), ("val_b", 10)]);

        record.status = WithdrawalStatus::Unbond;

        assert_eq!(record.confirm_unbond("val_a", 200, None).unwrap(), Some(5));
        assert_eq!(record.confirm_unbond("val_b", 100, None).unwrap(), Some(10));
        assert_eq!(record.confirm_unbond("val_b", 300, None).unwrap(), None);

        assert!(record.distribution.is_empty());
        assert!(record.acknowledged);
        assert_eq!(record.completion_time, Some(200));
        assert_eq!(record.amount, 15);
    }

    #[test]
    fn confirm_unbond_applies_slashing() {
        let mut record = record("h1", 1_000, &[("val_a", 500), ("val_b", 500)]);

        record
            .confirm_unbond("val_a", 100, Some("0.9".parse().unwrap()))
            .unwrap();

        assert_eq!(record.amount, 950);
    }

    #[test]
    fn failed_single_leg_requeues_with_fresh_distribution() {
        let mut original = record("h1", 900, &[("val_a", 1_000)]);

        original.status = WithdrawalStatus::Unbond;

        let unwind = original
            .unwind_leg("val_a", "h1/requeue".to_owned(), &intent(&[("val_a", "0.5"), ("val_b", "0.5")]))
            .unwrap()
            .unwrap();

        let Unwind::Requeued(requeued) = unwind else {
            panic!("expected a requeue");
        };

        assert_eq!(requeued.hash, "h1/requeue");
        assert_eq!(requeued.status, WithdrawalStatus::Queued);
        assert_eq!(requeued.burn_amount, 900);
        assert_eq!(requeued.distribution, legs(&[("val_a", 500), ("val_b", 500)]));
    }

    #[test]
    fn failed_leg_is_carved_out() {
        let mut original = record(
            "h1",
            4_000_000,
            &[("val_1", 1_000_000), ("val_2", 1_000_000), ("val_3", 1_000_000), ("val_4", 1_000_000)],
        );

        original.status = WithdrawalStatus::Unbond;

        let Some(Unwind::Split { kept, carved }) = original
            .unwind_leg("val_2", "h1/requeue".to_owned(), &[])
            .unwrap()
        else {
            panic!("expected a split");
        };

        assert_eq!(kept.status, WithdrawalStatus::Unbond);
        assert_eq!(kept.amount, 3_000_000);
        assert_eq!(kept.burn_amount, 3_000_000);
        assert!(kept.leg("val_2").is_none());

        assert_eq!(carved.status, WithdrawalStatus::Queued);
        assert_eq!(carved.amount, 1_000_000);
        assert_eq!(carved.burn_amount, 1_000_000);
        assert_eq!(carved.distribution, legs(&[("val_2", 1_000_000)]));
    }

    #[test]
    fn failed_last_leg_of_acknowledged_record_is_carved_out() {
        let mut original = record("h1", 2_000, &[("val_a", 1_000), ("val_b", 1_000)]);

        original.status = WithdrawalStatus::Unbond;
        original.confirm_unbond("val_a", 100, None).unwrap();

        let Some(Unwind::Split { kept, carved }) = original
            .unwind_leg("val_b", "h1/requeue".to_owned(), &[])
            .unwrap()
        else {
            panic!("expected a split");
        };

        assert!(kept.distribution.is_empty());
        assert_eq!(kept.amount, 1_000);
        assert_eq!(kept.burn_amount, 1_000);
        assert_eq!(carved.amount, 1_000);
        assert_eq!(carved.burn_amount, 1_000);
    }

    #[test]
    fn unwinding_unknown_leg_is_a_no_op() {
        let original = record("h1", 10, &[("val_a", 10)]);

        assert_eq!(original.unwind_leg("val_z", "x".to_owned(), &[]).unwrap(), None);
    }

    #[test]
    fn tiny_burns_go_to_one_side_of_a_split() {
        let mut original = record("h1", 1, &[("val_a", 10), ("val_b", 10)]);

        original.status = WithdrawalStatus::Unbond;

        let Some(Unwind::Split { kept, carved }) = original
            .unwind_leg("val_a", "x".to_owned(), &[])
            .unwrap()
        else {
            panic!("expected a split");
        };

        assert_eq!(kept.amount, 10);
        assert_eq!(kept.burn_amount, 0);
        assert_eq!(carved.amount, 10);
        assert_eq!(carved.burn_amount, 1);
        assert_eq!(carved.distribution, legs(&[("val_a", 10)]));
    }

    #[test]
    fn batch_splits_records_with_tiny_burns() {
        let batch = batch_unbondings(
            vec![record("h1", 1, &[("val_a", 1), ("val_b", 1)])],
            unlocked(&[("val_a", 1)]),
            2,
            |r| format!("{}/split", r.hash),
        )
        .unwrap();

        assert!(batch.skipped.is_empty());
        assert_eq!(batch.unbond[0].burn_amount + batch.queued[0].burn_amount, 1);
        assert_eq!(batch.queued[0].distribution, legs(&[("val_b", 1)]));
    }

    #[test]
    fn settlement_matches_recipient_and_coins() {
        let mut record = record("h1", 10, &[]);

        record.amount = 15_000_000;
        record.status = WithdrawalStatus::Send;

        let paid = [Coin::new(15_000_000, "uatom")];

        assert!(record.is_settled_by("cosmos1alice", &paid, "uatom"));
        assert!(!record.is_settled_by("cosmos1bob", &paid, "uatom"));
        assert!(!record.is_settled_by("cosmos1alice", &[Coin::new(1, "uatom")], "uatom"));

        record.status = WithdrawalStatus::Completed;

        assert!(!record.is_settled_by("cosmos1alice", &paid, "uatom"));
    }

    #[test]
    fn tokenized_payout_uses_received_tokens() {
        let mut record = record("h1", 10, &[("val_a", 10)]);

        record.status = WithdrawalStatus::Tokenize;

        assert_eq!(record.confirm_tokenize("val_a", Coin::new(10, "val_a/1")), Some(10));
        assert_eq!(record.payout("uatom"), vec![Coin::new(10, "val_a/1")]);
    }

    #[test]
    fn payable_once_matured() {
        let mut record = record("h1", 10, &[]);

        record.status = WithdrawalStatus::Send;
        record.completion_time = Some(100);

        assert!(!record.is_payable(99));
        assert!(record.is_payable(100));

        record.sent = true;

        assert!(!record.is_payable(100));
    }

    #[test]
    fn completed_records_are_collected_after_a_day() {
        let mut record = record("h1", 10, &[]);

        record.status = WithdrawalStatus::Completed;
        record.completion_time = Some(1_000);

        assert!(!record.is_collectable(1_000 + COMPLETED_RETENTION_SECS));
        assert!(record.is_collectable(1_001 + COMPLETED_RETENTION_SECS));
    }

    #[test]
    fn in_flight_counts_confirmed_legs() {
        let mut record = record("h1", 10, &[("val_a", 40), ("val_b", 60)]);

        assert_eq!(record.in_flight().unwrap(), 0);

        record.status = WithdrawalStatus::Unbond;
        record.confirm_unbond("val_b", 1, None).unwrap();

        assert_eq!(record.in_flight().unwrap(), 60);
    }
}
