use std::{fmt, str::FromStr};

use crate::Epoch;

/// Remote transactions issued for epoch processing carry `<kind>/<epoch>` as their memo
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum MemoKind {
    Rebalance,
    Withdrawal,
    Rewards,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Memo {
    Epoch { kind: MemoKind, epoch: Epoch },
    /// A deposit or withdrawal hash
    Hash(String),
    Empty,
}

impl Memo {
    pub fn epoch(kind: MemoKind, epoch: Epoch) -> Self {
        Self::Epoch { kind, epoch }
    }

    pub fn hash(hash: impl Into<String>) -> Self {
        Self::Hash(hash.into())
    }

    pub fn parse(memo: &str) -> Self {
        if memo.is_empty() {
            return Self::Empty;
        }

        let epoch_memo = memo.split_once('/').and_then(|(kind, epoch)| {
            let kind = MemoKind::from_str(kind).ok()?;
            let epoch = epoch.parse().ok()?;

            Some(Self::Epoch { kind, epoch })
        });

        epoch_memo.unwrap_or_else(|| Self::Hash(memo.to_owned()))
    }

    pub fn as_hash(&self) -> Option<&str> {
        match self {
            Self::Hash(hash) => Some(hash),
            _ => None,
        }
    }
}

impl fmt::Display for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epoch { kind, epoch } => write!(f, "{kind}/{epoch}"),
            Self::Hash(hash) => f.write_str(hash),
            Self::Empty => Ok(()),
        }
    }
}
