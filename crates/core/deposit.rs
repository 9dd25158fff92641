use std::collections::{BTreeMap, BTreeSet};

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};

use crate::{
    checked_sum,
    intent::{normalize, ValidatorIntent},
    Address, Coin, Decimal, OverflowError,
};

/// A bank send found in a deposit transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub coins: Vec<Coin>,
}

/// A transaction on the remote chain which sent funds to the deposit account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositTx {
    pub hash: String,
    pub memo: String,
    pub transfers: Vec<Transfer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    None,
    Single(Address),
    Multiple,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denom {
    Base,
    /// A tokenized share of `validator`'s stake, denominated `<validator>/<record id>`
    Lsm { validator: Address },
    Unsupported,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unsupported deposit denom: {0}")]
    UnsupportedDenom(String),

    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: Address, reason: String },

    #[error(transparent)]
    Overflow(#[from] OverflowError),
}

impl DepositTx {
    /// The single account which sent funds to `deposit_address`
    pub fn sender(&self, deposit_address: &str) -> Sender {
        let senders: BTreeSet<&Address> = self
            .transfers
            .iter()
            .filter(|t| t.to == deposit_address)
            .map(|t| &t.from)
            .collect();

        let mut senders = senders.into_iter();

        match (senders.next(), senders.next()) {
            (None, _) => Sender::None,
            (Some(sender), None) => Sender::Single(sender.clone()),
            (Some(_), Some(_)) => Sender::Multiple,
        }
    }

    /// Everything sent to `deposit_address`, summed per denom
    pub fn received(&self, deposit_address: &str) -> Result<Vec<Coin>, OverflowError> {
        let mut totals: BTreeMap<&str, u128> = BTreeMap::new();

        for coin in self
            .transfers
            .iter()
            .filter(|t| t.to == deposit_address)
            .flat_map(|t| &t.coins)
        {
            let total = totals.entry(&coin.denom).or_default();

            *total = total.checked_add(coin.amount).ok_or(OverflowError)?;
        }

        Ok(totals
            .into_iter()
            .filter(|(_, amount)| *amount != 0)
            .map(|(denom, amount)| Coin::new(amount, denom))
            .collect())
    }
}

pub fn classify_denom(denom: &str, base_denom: &str, validators: &BTreeSet<Address>) -> Denom {
    if denom == base_denom {
        return Denom::Base;
    }

    let Some((validator, record)) = denom.split_once('/') else {
        return Denom::Unsupported;
    };

    if record.is_empty() || !record.bytes().all(|b| b.is_ascii_digit()) {
        return Denom::Unsupported;
    }

    if !validators.contains(validator) {
        return Denom::Unsupported;
    }

    Denom::Lsm {
        validator: validator.to_owned(),
    }
}

/// Reject any coin which is neither the base denom nor a share of a registered validator
pub fn validate_coins(
    coins: &[Coin],
    base_denom: &str,
    validators: &BTreeSet<Address>,
) -> Result<(), Error> {
    for coin in coins {
        if classify_denom(&coin.denom, base_denom, validators) == Denom::Unsupported {
            return Err(Error::UnsupportedDenom(coin.denom.clone()));
        }
    }

    Ok(())
}

/// The intent implied by the deposited coins, along with the value it carries.
///
/// Tokenized shares count toward their validator, base denom coins carry no preference.
pub fn coin_intent(
    coins: &[Coin],
    base_denom: &str,
    validators: &BTreeSet<Address>,
) -> Result<(Vec<ValidatorIntent>, u128), OverflowError> {
    let mut amounts: BTreeMap<Address, Decimal> = BTreeMap::new();
    let mut value = 0u128;

    for coin in coins {
        let Denom::Lsm { validator } = classify_denom(&coin.denom, base_denom, validators) else {
            continue;
        };

        let entry = amounts.entry(validator).or_default();

        *entry = entry
            .checked_add(Decimal::from_u128(coin.amount))
            .ok_or(OverflowError)?;

        value = value.checked_add(coin.amount).ok_or(OverflowError)?;
    }

    Ok((normalize(amounts)?, value))
}

/// The base denom value of the deposit, treating a tokenized share as worth one base token
pub fn deposit_value(coins: &[Coin]) -> Result<u128, OverflowError> {
    checked_sum(coins.iter().map(|c| c.amount))
}

/// Re-encode a bech32 address under another human readable prefix
pub fn convert_prefix(address: &str, prefix: &str) -> Result<Address, Error> {
    let invalid = |reason: String| Error::InvalidAddress {
        address: address.to_owned(),
        reason,
    };

    let (_, data) = bech32::decode(address).map_err(|err| invalid(err.to_string()))?;

    let hrp = Hrp::parse(prefix).map_err(|err| invalid(err.to_string()))?;

    bech32::encode::<Bech32>(hrp, &data).map_err(|err| invalid(err.to_string()))
}

#[cfg(test)]
mod test {
    use test_utils::{check_err, prelude::*};

    use super::*;

    const DEPOSIT: &str = "cosmos1deposit";

    fn transfer(from: &str, to: &str, coins: &[(u128, &str)]) -> Transfer {
        Transfer {
            from: from.to_owned(),
            to: to.to_owned(),
            coins: coins.iter().map(|(a, d)| Coin::new(*a, *d)).collect(),
        }
    }

    fn tx(transfers: Vec<Transfer>) -> DepositTx {
        DepositTx {
            hash: "ABC".to_owned(),
            memo: String::new(),
            transfers,
        }
    }

    fn validators() -> BTreeSet<Address> {
        ["cosmosvaloper1a", "cosmosvaloper1b"]
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn single_sender() {
        let tx = tx(vec![
            transfer("alice", DEPOSIT, &[(100, "uatom")]),
            transfer("alice", DEPOSIT, &[(50, "uatom")]),
            transfer("bob", "elsewhere", &[(1, "uatom")]),
        ]);

        assert_eq!(tx.sender(DEPOSIT), Sender::Single("alice".to_owned()));
        assert_eq!(tx.received(DEPOSIT).unwrap(), vec![Coin::new(150, "uatom")]);
    }

    #[test]
    fn multiple_senders() {
        let tx = tx(vec![
            transfer("alice", DEPOSIT, &[(100, "uatom")]),
            transfer("bob", DEPOSIT, &[(50, "uatom")]),
        ]);

        assert_eq!(tx.sender(DEPOSIT), Sender::Multiple);
    }

    #[test]
    fn no_sender() {
        let tx = tx(vec![transfer("bob", "elsewhere", &[(1, "uatom")])]);

        assert_eq!(tx.sender(DEPOSIT), Sender::None);
        assert!(tx.received(DEPOSIT).unwrap().is_empty());
    }

    #[rstest]
    #[case("uatom", Denom::Base)]
    #[case("cosmosvaloper1a/42", Denom::Lsm { validator: "cosmosvaloper1a".to_owned() })]
    #[case("cosmosvaloper1z/42", Denom::Unsupported)]
    #[case("cosmosvaloper1a/x", Denom::Unsupported)]
    #[case("cosmosvaloper1a/", Denom::Unsupported)]
    #[case("ibc/ABCDEF", Denom::Unsupported)]
    fn denoms(#[case] denom: &str, #[case] expected: Denom) {
        assert_eq!(classify_denom(denom, "uatom", &validators()), expected);
    }

    #[test]
    fn unsupported_coins_are_rejected() {
        let coins = [Coin::new(1, "uatom"), Coin::new(1, "uosmo")];

        check_err(
            validate_coins(&coins, "uatom", &validators()).unwrap_err(),
            expect!["unsupported deposit denom: uosmo"],
        );
    }

    #[test]
    fn lsm_coins_imply_intent() {
        let coins = [
            Coin::new(300, "cosmosvaloper1a/1"),
            Coin::new(100, "cosmosvaloper1b/7"),
            Coin::new(1_000, "uatom"),
        ];

        let (intent, value) = coin_intent(&coins, "uatom", &validators()).unwrap();

        assert_eq!(value, 400);

        check(
            intent,
            expect![[r#"
                [
                  (
                    validator: "cosmosvaloper1a",
                    weight: "0.75",
                  ),
                  (
                    validator: "cosmosvaloper1b",
                    weight: "0.25",
                  ),
                ]"#]],
        );
    }

    #[test]
    fn prefix_conversion_keeps_account_bytes() {
        let hrp = Hrp::parse("cosmos").unwrap();
        let remote = bech32::encode::<Bech32>(hrp, &[7; 20]).unwrap();

        let local = convert_prefix(&remote, "neutron").unwrap();

        assert!(local.starts_with("neutron1"));
        assert_eq!(bech32::decode(&local).unwrap().1, vec![7; 20]);
        assert!(convert_prefix("not an address", "neutron").is_err());
    }
}
