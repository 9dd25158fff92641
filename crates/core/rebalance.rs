use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{amount_str, checked_sum, intent::ValidatorIntent, Address, OverflowError};

/// The delegation account's stake with a single validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holding {
    pub validator: Address,
    pub amount: u128,
    /// Stake recently redelegated in cannot be moved again until the redelegation completes
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redelegation {
    pub source: Address,
    pub destination: Address,
    #[serde(with = "amount_str")]
    pub amount: u128,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub redelegations: Vec<Redelegation>,
    /// Validators off target which were left alone because their stake is locked
    pub skipped_locked: Vec<Address>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("aggregate intent references unknown validator: {0}")]
    UnknownValidator(Address),

    #[error(transparent)]
    Overflow(#[from] OverflowError),
}

#[derive(Debug)]
struct Delta {
    validator: Address,
    amount: u128,
}

fn sort_deltas(deltas: &mut Vec<Delta>) {
    deltas.retain(|d| d.amount != 0);
    deltas.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.validator.cmp(&b.validator)));
}

/// Compute the redelegations moving current holdings toward the aggregate intent.
///
/// At most half of the unlocked stake is moved in one go. Validators absent from the intent have a
/// zero target and validators present in `max_allocations` never receive more than their cap.
/// Validators with locked stake are neither drawn from nor redelegated to.
pub fn rebalance(
    holdings: &[Holding],
    intent: &[ValidatorIntent],
    registered: &BTreeSet<Address>,
    max_allocations: &BTreeMap<Address, u128>,
) -> Result<Plan, Error> {
    if let Some(unknown) = intent.iter().find(|i| !registered.contains(&i.validator)) {
        return Err(Error::UnknownValidator(unknown.validator.clone()));
    }

    let total = checked_sum(holdings.iter().map(|h| h.amount))?;

    let locked_total = checked_sum(holdings.iter().filter(|h| h.locked).map(|h| h.amount))?;

    let current: BTreeMap<&Address, &Holding> =
        holdings.iter().map(|h| (&h.validator, h)).collect();

    let weights: BTreeMap<&Address, &ValidatorIntent> =
        intent.iter().map(|i| (&i.validator, i)).collect();

    let validators: BTreeSet<&Address> = current.keys().chain(weights.keys()).copied().collect();

    let mut targets = vec![];
    let mut sources = vec![];
    let mut skipped_locked = vec![];

    for validator in validators {
        let target = match weights.get(validator) {
            Some(i) => i.weight.mul_floor(total).ok_or(OverflowError)?,
            None => 0,
        };

        let (amount, locked) = current
            .get(validator)
            .map(|h| (h.amount, h.locked))
            .unwrap_or_default();

        if target == amount {
            continue;
        }

        if locked {
            skipped_locked.push(validator.clone());

            continue;
        }

        if target > amount {
            let mut delta = target - amount;

            if let Some(max) = max_allocations.get(validator) {
                delta = delta.min(*max);
            }

            targets.push(Delta {
                validator: validator.clone(),
                amount: delta,
            });

            continue;
        }

        sources.push(Delta {
            validator: validator.clone(),
            amount: amount - target,
        });
    }

    sort_deltas(&mut targets);
    sort_deltas(&mut sources);

    let mut budget = (total - locked_total) / 2;

    let mut redelegations = vec![];

    for target in targets {
        let mut wanted = target.amount.min(budget);

        if wanted == 0 {
            break;
        }

        sort_deltas(&mut sources);

        for source in sources.iter_mut() {
            let amount = source.amount.min(wanted);

            redelegations.push(Redelegation {
                source: source.validator.clone(),
                destination: target.validator.clone(),
                amount,
            });

            source.amount -= amount;
            wanted -= amount;
            budget -= amount;

            if wanted == 0 || budget == 0 {
                break;
            }
        }
    }

    redelegations.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| a.destination.cmp(&b.destination))
            .then_with(|| a.amount.cmp(&b.amount))
    });

    Ok(Plan {
        redelegations,
        skipped_locked,
    })
}

#[cfg(test)]
mod test {
    use test_utils::{check_err, prelude::*};

    use super::*;
    use crate::Decimal;

    fn holdings(amounts: &[(&str, u128, bool)]) -> Vec<Holding> {
        amounts
            .iter()
            .map(|(validator, amount, locked)| Holding {
                validator: (*validator).to_owned(),
                amount: *amount,
                locked: *locked,
            })
            .collect()
    }

    fn intent(weights: &[(&str, &str)]) -> Vec<ValidatorIntent> {
        weights
            .iter()
            .map(|(validator, weight)| ValidatorIntent {
                validator: (*validator).to_owned(),
                weight: weight.parse::<Decimal>().unwrap(),
            })
            .collect()
    }

    fn registered(n: usize) -> BTreeSet<Address> {
        ["val_a", "val_b", "val_c", "val_d"][..n]
            .iter()
            .map(|v| (*v).to_owned())
            .collect()
    }

    #[test]
    fn balanced_holdings_need_nothing() {
        let plan = rebalance(
            &holdings(&[("val_a", 500, false), ("val_b", 500, false)]),
            &intent(&[("val_a", "0.5"), ("val_b", "0.5")]),
            &registered(2),
            &BTreeMap::new(),
        )
        .unwrap();

        assert_eq!(plan, Plan::default());
    }

    #[test]
    fn moves_from_overweight_to_underweight() {
        let plan = rebalance(
            &holdings(&[("val_a", 800, false), ("val_b", 200, false), ("val_c", 0, false)]),
            &intent(&[("val_a", "0.4"), ("val_b", "0.3"), ("val_c", "0.3")]),
            &registered(3),
            &BTreeMap::new(),
        )
        .unwrap();

        check(
            plan,
            expect![[r#"
                (
                  redelegations: [
                    (
                      source: "val_a",
                      destination: "val_b",
                      amount: "100",
                    ),
                    (
                      source: "val_a",
                      destination: "val_c",
                      amount: "300",
                    ),
                  ],
                  skipped_locked: [],
                )"#]],
        );
    }

    #[test]
    fn budget_limits_moves_to_half_unlocked_stake() {
        let plan = rebalance(
            &holdings(&[("val_a", 1_000, false)]),
            &intent(&[("val_b", "1")]),
            &registered(2),
            &BTreeMap::new(),
        )
        .unwrap();

        assert_eq!(plan.redelegations.len(), 1);
        assert_eq!(plan.redelegations[0].amount, 500);
    }

    #[test]
    fn locked_stake_is_never_a_source() {
        let plan = rebalance(
            &holdings(&[("val_a", 600, true), ("val_b", 300, false), ("val_c", 100, false)]),
            &intent(&[("val_a", "0.25"), ("val_b", "0.25"), ("val_c", "0.5")]),
            &registered(3),
            &BTreeMap::new(),
        )
        .unwrap();

        assert!(plan.redelegations.iter().all(|r| r.source != "val_a"));
        assert_eq!(plan.skipped_locked, vec!["val_a".to_owned()]);

        // budget is (1000 - 600) / 2
        let moved: u128 = plan.redelegations.iter().map(|r| r.amount).sum();

        assert!(moved <= 200);
        assert_eq!(
            plan.redelegations,
            vec![Redelegation {
                source: "val_b".to_owned(),
                destination: "val_c".to_owned(),
                amount: 50,
            }]
        );
    }

    #[test]
    fn locked_stake_is_never_a_destination() {
        let plan = rebalance(
            &holdings(&[("val_a", 100, true), ("val_b", 900, false)]),
            &intent(&[("val_a", "0.5"), ("val_b", "0.5")]),
            &registered(2),
            &BTreeMap::new(),
        )
        .unwrap();

        assert!(plan.redelegations.is_empty());
        assert_eq!(plan.skipped_locked, vec!["val_a".to_owned()]);
    }

    #[test]
    fn max_allocation_caps_targets() {
        let plan = rebalance(
            &holdings(&[("val_a", 1_000, false), ("val_b", 0, false)]),
            &intent(&[("val_a", "0.5"), ("val_b", "0.5")]),
            &registered(2),
            &BTreeMap::from([("val_b".to_owned(), 120)]),
        )
        .unwrap();

        assert_eq!(plan.redelegations[0].amount, 120);
    }

    #[test]
    fn unknown_validator_in_intent_fails() {
        check_err(
            rebalance(
                &holdings(&[("val_a", 1_000, false)]),
                &intent(&[("val_z", "1")]),
                &registered(1),
                &BTreeMap::new(),
            )
            .unwrap_err(),
            expect!["aggregate intent references unknown validator: val_z"],
        );
    }

    #[rstest]
    #[case(&[("val_a", 10, false)], 5)]
    #[case(&[("val_a", 1_000, false), ("val_b", 3, false)], 501)]
    #[case(&[("val_a", 7, true), ("val_b", 9, false)], 4)]
    fn never_exceeds_budget(#[case] amounts: &[(&str, u128, bool)], #[case] budget: u128) {
        let plan = rebalance(
            &holdings(amounts),
            &intent(&[("val_c", "0.5"), ("val_d", "0.5")]),
            &registered(4),
            &BTreeMap::new(),
        )
        .unwrap();

        let moved: u128 = plan.redelegations.iter().map(|r| r.amount).sum();

        assert_eq!(moved, budget);
    }
}
