use cosmwasm_std::Storage;

use ics_core::{
    ack::{Ack, AckMsg, AckOutcome, AckResponse},
    checked_sum,
    memo::{Memo, MemoKind},
    msg::Account,
    Timestamp,
};

use crate::{
    epoch, event, rebalance, receipts, withdrawals, zone::ZoneExt as _, BalanceOracle, Error,
    Outcome,
};

/// Apply the confirmed (or failed) effects of an interchain transaction, message by message.
///
/// A message whose handler fails aborts the whole acknowledgement, the caller must discard any
/// storage writes made before the error.
pub fn handle_ack(
    storage: &mut dyn Storage,
    oracle: &dyn BalanceOracle,
    ack: Ack,
    now: Timestamp,
) -> Result<Outcome, Error> {
    let memo = Memo::parse(&ack.memo);

    let mut outcome = Outcome::default();

    for (msg, result) in ack.msgs {
        let kind: &'static str = (&msg).into();

        let success = result.is_success();

        outcome.extend(handle_msg(storage, oracle, &memo, msg, result, now)?);

        outcome.push_event(
            event("ack")
                .add_attribute("msg", kind)
                .add_attribute("success", success.to_string()),
        );
    }

    Ok(outcome)
}

fn unexpected(kind: &'static str, memo: &Memo) -> Outcome {
    let mut outcome = Outcome::default();

    outcome.push_event(
        event("ack_unexpected")
            .add_attribute("msg", kind)
            .add_attribute("memo", memo.to_string()),
    );

    outcome
}

fn handle_msg(
    storage: &mut dyn Storage,
    oracle: &dyn BalanceOracle,
    memo: &Memo,
    msg: AckMsg,
    result: AckOutcome,
    now: Timestamp,
) -> Result<Outcome, Error> {
    let kind: &'static str = (&msg).into();

    let outcome = match (msg, result) {
        (AckMsg::Delegate { validator, amount, .. }, AckOutcome::Success(_)) => {
            receipts::on_delegated(storage, memo.as_hash(), &validator, amount.amount, now)?
        }

        (
            AckMsg::Undelegate { validator, .. },
            AckOutcome::Success(AckResponse::Undelegate {
                completion_time,
                amount,
            }),
        ) => match memo {
            Memo::Epoch {
                kind: MemoKind::Withdrawal,
                epoch,
            } => withdrawals::on_undelegate_success(
                storage,
                &validator,
                *epoch,
                completion_time,
                amount,
                now,
            )?,
            _ => unexpected(kind, memo),
        },

        (AckMsg::Undelegate { validator, .. }, AckOutcome::Error(_)) => match memo {
            Memo::Epoch {
                kind: MemoKind::Withdrawal,
                epoch,
            } => withdrawals::on_undelegate_failure(storage, &validator, *epoch, now)?,
            _ => unexpected(kind, memo),
        },

        (
            AckMsg::Redelegate {
                source,
                destination,
                amount,
                ..
            },
            AckOutcome::Success(AckResponse::Redelegate { completion_time }),
        ) => match memo {
            Memo::Epoch {
                kind: MemoKind::Rebalance,
                epoch,
            } => rebalance::on_redelegate_success(
                storage,
                &source,
                &destination,
                amount.amount,
                *epoch,
                completion_time,
            )?,
            _ => unexpected(kind, memo),
        },

        (
            AckMsg::Redelegate {
                source,
                destination,
                ..
            },
            AckOutcome::Error(_),
        ) => match memo {
            Memo::Epoch {
                kind: MemoKind::Rebalance,
                epoch,
            } => rebalance::on_redelegate_failure(storage, &source, &destination, *epoch),
            _ => unexpected(kind, memo),
        },

        (
            AckMsg::TokenizeShares { validator, .. },
            AckOutcome::Success(AckResponse::Tokenize { amount }),
        ) => match memo.as_hash() {
            Some(hash) => withdrawals::on_tokenize_success(storage, hash, &validator, amount, now)?,
            None => unexpected(kind, memo),
        },

        (AckMsg::TokenizeShares { validator, .. }, AckOutcome::Error(_)) => match memo.as_hash() {
            Some(hash) => withdrawals::on_tokenize_failure(storage, hash, &validator, now)?,
            None => unexpected(kind, memo),
        },

        (
            AckMsg::RedeemTokens { amount: shares, .. },
            AckOutcome::Success(AckResponse::Redeem { amount }),
        ) => receipts::on_redeemed(storage, memo.as_hash(), &shares, &amount, now)?,

        (AckMsg::Send { from, to, amount }, AckOutcome::Success(_)) => {
            on_send_success(storage, memo, &from, &to, &amount, now)?
        }

        (AckMsg::Send { from, .. }, AckOutcome::Error(_)) => {
            let from_delegation = storage.account_address(Account::Delegation) == Some(from);

            match memo.as_hash() {
                Some(hash) if from_delegation => withdrawals::on_send_failure(storage, hash),
                _ => unexpected(kind, memo),
            }
        }

        (AckMsg::WithdrawRewards { .. }, _) => match memo {
            Memo::Epoch {
                kind: MemoKind::Rewards,
                epoch,
            } => epoch::on_rewards_withdrawn(storage, oracle, *epoch)?,
            _ => unexpected(kind, memo),
        },

        (AckMsg::Unknown(type_url), _) => {
            let mut outcome = Outcome::default();

            outcome.push_event(event("ack_unknown_msg").add_attribute("type_url", type_url));

            outcome
        }

        // set withdraw address, transfers and failed delegations or redemptions need no bookkeeping
        (
            AckMsg::SetWithdrawAddress { .. }
            | AckMsg::Transfer { .. }
            | AckMsg::Delegate { .. }
            | AckMsg::RedeemTokens { .. },
            _,
        ) => Outcome::default(),

        // success without the response data the message should carry
        (
            AckMsg::Undelegate { .. } | AckMsg::Redelegate { .. } | AckMsg::TokenizeShares { .. },
            AckOutcome::Success(_),
        ) => unexpected(kind, memo),
    };

    Ok(outcome)
}

fn on_send_success(
    storage: &mut dyn Storage,
    memo: &Memo,
    from: &str,
    to: &str,
    coins: &[ics_core::Coin],
    now: Timestamp,
) -> Result<Outcome, Error> {
    let account = [Account::Deposit, Account::Delegation, Account::Withdrawal]
        .into_iter()
        .find(|account| storage.account_address(*account).as_deref() == Some(from));

    let outcome = match (account, memo) {
        (Some(Account::Deposit), Memo::Hash(hash)) => {
            receipts::on_deposit_forwarded(storage, hash, now)?
        }

        (Some(Account::Delegation), Memo::Hash(hash)) => {
            withdrawals::on_send_success(storage, hash, to, coins, now)?
        }

        (
            Some(Account::Withdrawal),
            Memo::Epoch {
                kind: MemoKind::Rewards,
                epoch,
            },
        ) => {
            let base_denom = storage.base_denom();

            let amount = checked_sum(
                coins
                    .iter()
                    .filter(|c| c.denom == base_denom)
                    .map(|c| c.amount),
            )?;

            epoch::on_rewards_forwarded(storage, *epoch, amount)?
        }

        _ => unexpected("send", memo),
    };

    Ok(outcome)
}

#[cfg(test)]
mod test {
    use cosmwasm_std::testing::MockStorage;

    use ics_core::Coin;
    use test_utils::event_kinds;

    use super::*;
    use crate::mock::{self, MockOracle};

    #[test]
    fn unknown_messages_are_reported_and_skipped() {
        let mut storage = MockStorage::default();

        mock::init_zone_with_delegations(&mut storage, &[1_000]);

        let ack = Ack::success(
            "",
            vec![
                (AckMsg::Unknown("/cosmos.gov.v1.MsgVote".to_owned()), AckResponse::None),
                (
                    AckMsg::Delegate {
                        delegator: mock::DELEGATION_ADDRESS.to_owned(),
                        validator: "val_0".to_owned(),
                        amount: Coin::new(10, mock::BASE_DENOM),
                    },
                    AckResponse::None,
                ),
            ],
        );

        let outcome = handle_ack(&mut storage, &MockOracle::default(), ack, 10).unwrap();

        assert!(event_kinds(&outcome.events).contains(&"ack_unknown_msg"));

        assert_eq!(
            crate::delegations::current(&storage, mock::DELEGATION_ADDRESS),
            [("val_0".to_owned(), 1_010)].into()
        );
    }

    #[test]
    fn failed_delegations_change_nothing() {
        let mut storage = MockStorage::default();

        mock::init_zone_with_delegations(&mut storage, &[1_000]);

        let ack = Ack::failure(
            "ABC",
            vec![AckMsg::Delegate {
                delegator: mock::DELEGATION_ADDRESS.to_owned(),
                validator: "val_0".to_owned(),
                amount: Coin::new(10, mock::BASE_DENOM),
            }],
            "timeout",
        );

        handle_ack(&mut storage, &MockOracle::default(), ack, 10).unwrap();

        assert_eq!(
            crate::delegations::current(&storage, mock::DELEGATION_ADDRESS),
            [("val_0".to_owned(), 1_000)].into()
        );
    }

    #[test]
    fn a_failing_handler_aborts_the_whole_ack() {
        let mut storage = MockStorage::default();

        mock::init_zone_with_delegations(&mut storage, &[1_000]);

        let delegate = |amount| {
            (
                AckMsg::Delegate {
                    delegator: mock::DELEGATION_ADDRESS.to_owned(),
                    validator: "val_0".to_owned(),
                    amount: Coin::new(amount, mock::BASE_DENOM),
                },
                AckResponse::None,
            )
        };

        let ack = Ack::success("", vec![delegate(10), delegate(u128::MAX)]);

        let err = handle_ack(&mut storage, &MockOracle::default(), ack, 10).unwrap_err();

        assert!(matches!(err, Error::Overflow(_)));
    }

    #[test]
    fn sends_from_strangers_are_ignored() {
        let mut storage = MockStorage::default();

        mock::init_zone_with_delegations(&mut storage, &[1_000]);

        let ack = Ack::success(
            "ABC",
            vec![(
                AckMsg::Send {
                    from: "cosmos1stranger".to_owned(),
                    to: mock::REMOTE_ALICE.to_owned(),
                    amount: vec![Coin::new(10, mock::BASE_DENOM)],
                },
                AckResponse::None,
            )],
        );

        let outcome = handle_ack(&mut storage, &MockOracle::default(), ack, 10).unwrap();

        assert!(outcome.cmds.is_empty());
    }
}
