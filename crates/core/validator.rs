use serde::{Deserialize, Serialize};

use crate::{amount_str, Address, Decimal};

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BondStatus {
    #[default]
    Unspecified,
    Unbonded,
    Unbonding,
    Bonded,
}

impl BondStatus {
    /// Maps the staking module's `BondStatus` enum value
    pub fn from_proto(status: i32) -> Self {
        match status {
            1 => Self::Unbonded,
            2 => Self::Unbonding,
            3 => Self::Bonded,
            _ => Self::Unspecified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    #[serde(with = "amount_str")]
    pub voting_power: u128,
    pub delegator_shares: Decimal,
    pub commission_rate: Decimal,
    pub status: BondStatus,
    pub jailed: bool,
    pub liquid_shares: Decimal,
    pub validator_bond_shares: Decimal,
    pub score: Decimal,
}

/// A validator's state as observed on the remote chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorReport {
    pub address: Address,
    pub tokens: u128,
    pub delegator_shares: Decimal,
    pub commission_rate: Decimal,
    pub status: BondStatus,
    pub jailed: bool,
}

impl Validator {
    pub fn new(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            voting_power: 0,
            delegator_shares: Decimal::zero(),
            commission_rate: Decimal::zero(),
            status: BondStatus::Unspecified,
            jailed: false,
            liquid_shares: Decimal::zero(),
            validator_bond_shares: Decimal::zero(),
            score: Decimal::zero(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BondStatus::Bonded && !self.jailed
    }

    /// Apply a remote report, keeping the liquid staking fields which the report does not carry
    pub fn apply_report(&mut self, report: ValidatorReport) {
        self.voting_power = report.tokens;
        self.delegator_shares = report.delegator_shares;
        self.commission_rate = report.commission_rate;
        self.status = report.status;
        self.jailed = report.jailed;
        self.score = self.compute_score();
    }

    /// Inactive validators score zero, active ones score by the commission they leave to delegators
    pub fn compute_score(&self) -> Decimal {
        if !self.is_active() {
            return Decimal::zero();
        }

        Decimal::one().saturating_sub(self.commission_rate)
    }

    /// Convert delegator shares into tokens at the validator's current exchange rate
    pub fn shares_to_tokens(&self, shares: Decimal) -> Option<u128> {
        if self.delegator_shares.is_zero() {
            return Some(0);
        }

        shares
            .checked_mul(Decimal::from_u128(self.voting_power))?
            .checked_div(self.delegator_shares)?
            .floor()
    }
}
