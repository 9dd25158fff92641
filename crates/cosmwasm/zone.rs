use std::collections::BTreeMap;

use cosmwasm_schema::cw_serde;
use cosmwasm_std::Storage;

use ics_core::{
    intent::ValidatorIntent,
    lsm::LsmCaps,
    memo::Memo,
    msg::{Account, RemoteMsg, RemoteTx},
    rates::{MaxRateDecrease, MaxRateIncrease},
    Address, Decimal, Epoch, Timestamp,
};

use crate::{event, Error, Outcome, StorageExt as _};

#[rustfmt::skip]
mod key {
    use crate::MapKey;

    macro_rules! key {
        ($k:literal) => {
            concat!("zone::", $k)
        };
    }

    macro_rules! map_key {
        ($k:literal) => {
            crate::MapKey::new(key!($k))
        };
    }

    pub const ACCOUNT_ADDRESS          : MapKey = map_key!("account_address");
    pub const ACCOUNT_PREFIX           : &str   = key!("account_prefix");
    pub const AGGREGATE_INTENT         : &str   = key!("aggregate_intent");
    pub const BASE_DENOM               : &str   = key!("base_denom");
    pub const CHAIN_ID                 : &str   = key!("chain_id");
    pub const CONNECTION_ID            : &str   = key!("connection_id");
    pub const EPOCH                    : &str   = key!("epoch");
    pub const EPOCH_DURATION           : &str   = key!("epoch_duration");
    pub const ICQ_UPDATE_PERIOD        : &str   = key!("icq_update_period");
    pub const INTERCHAIN_TX_TIMEOUT    : &str   = key!("interchain_tx_timeout");
    pub const LAST_EPOCH_TIME          : &str   = key!("last_epoch_time");
    pub const LAST_REDEMPTION_RATE     : &str   = key!("last_redemption_rate");
    pub const LOCAL_DENOM              : &str   = key!("local_denom");
    pub const LOCAL_PREFIX             : &str   = key!("local_prefix");
    pub const LSM_CAPS                 : &str   = key!("lsm_caps");
    pub const LSM_ENABLED              : &str   = key!("lsm_enabled");
    pub const MAX_ALLOCATIONS          : &str   = key!("max_allocations");
    pub const MAX_RATE_DECREASE        : &str   = key!("max_rate_decrease");
    pub const MAX_RATE_INCREASE        : &str   = key!("max_rate_increase");
    pub const QUERY_ID                 : MapKey = map_key!("query_id");
    pub const QUERY_KIND               : MapKey = map_key!("query_kind");
    pub const REDEMPTION_RATE          : &str   = key!("redemption_rate");
    pub const REDEMPTION_SEQUENCE      : &str   = key!("redemption_sequence");
    pub const REWARDS_BALANCE          : &str   = key!("rewards_balance");
    pub const REWARDS_SWEEP_EPOCH      : &str   = key!("rewards_sweep_epoch");
    pub const UNBONDING_PERIOD         : &str   = key!("unbonding_period");
    pub const WITHDRAWAL_WAITGROUP     : &str   = key!("withdrawal_waitgroup");
}

/// Interchain queries the contract keeps registered
#[cw_serde]
#[derive(Copy, Eq, PartialOrd, Ord, strum::IntoStaticStr, strum::EnumString, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Icq {
    DepositTransfers,
    Delegations,
    Validators,
    WithdrawalBalance,
}

impl Icq {
    pub fn id(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneParams {
    pub chain_id: String,
    pub connection_id: String,
    pub base_denom: String,
    pub local_denom: String,
    pub account_prefix: String,
    pub local_prefix: String,
    pub unbonding_period: u64,
    pub epoch_duration: u64,
    pub interchain_tx_timeout: u64,
    pub icq_update_period: u64,
    pub lsm_enabled: bool,
    pub max_rate_increase: MaxRateIncrease,
    pub max_rate_decrease: MaxRateDecrease,
}

pub fn init(storage: &mut dyn Storage, params: &ZoneParams, now: Timestamp) {
    storage.set_string(key::CHAIN_ID, &params.chain_id);
    storage.set_string(key::CONNECTION_ID, &params.connection_id);
    storage.set_string(key::BASE_DENOM, &params.base_denom);
    storage.set_string(key::LOCAL_DENOM, &params.local_denom);
    storage.set_string(key::ACCOUNT_PREFIX, &params.account_prefix);
    storage.set_string(key::LOCAL_PREFIX, &params.local_prefix);
    storage.set_u64(key::UNBONDING_PERIOD, params.unbonding_period);
    storage.set_u64(key::EPOCH_DURATION, params.epoch_duration);
    storage.set_u64(key::INTERCHAIN_TX_TIMEOUT, params.interchain_tx_timeout);
    storage.set_u64(key::ICQ_UPDATE_PERIOD, params.icq_update_period);
    storage.set_bool(key::LSM_ENABLED, params.lsm_enabled);
    storage.set_max_rate_increase(params.max_rate_increase);
    storage.set_max_rate_decrease(params.max_rate_decrease);
    storage.set_u64(key::EPOCH, 0);
    storage.set_u64(key::LAST_EPOCH_TIME, now);
    storage.set_decimal(key::REDEMPTION_RATE, Decimal::one());
    storage.set_decimal(key::LAST_REDEMPTION_RATE, Decimal::one());
}

pub trait ZoneExt: Storage {
    fn is_initialised(&self) -> bool {
        self.has_key(key::CHAIN_ID)
    }

    fn chain_id(&self) -> String {
        self.string_at(key::CHAIN_ID)
            .expect("set during initialisation")
    }

    fn connection_id(&self) -> String {
        self.string_at(key::CONNECTION_ID)
            .expect("set during initialisation")
    }

    fn base_denom(&self) -> String {
        self.string_at(key::BASE_DENOM)
            .expect("set during initialisation")
    }

    fn local_denom(&self) -> String {
        self.string_at(key::LOCAL_DENOM)
            .expect("set during initialisation")
    }

    /// Bech32 prefix of remote account addresses
    fn account_prefix(&self) -> String {
        self.string_at(key::ACCOUNT_PREFIX)
            .expect("set during initialisation")
    }

    /// Bech32 prefix of remote validator operator addresses
    fn valoper_prefix(&self) -> String {
        format!("{}valoper", self.account_prefix())
    }

    fn local_prefix(&self) -> String {
        self.string_at(key::LOCAL_PREFIX)
            .expect("set during initialisation")
    }

    fn unbonding_period(&self) -> u64 {
        self.u64_at(key::UNBONDING_PERIOD)
            .expect("set during initialisation")
    }

    fn set_unbonding_period(&mut self, secs: u64) {
        self.set_u64(key::UNBONDING_PERIOD, secs)
    }

    fn epoch_duration(&self) -> u64 {
        self.u64_at(key::EPOCH_DURATION)
            .expect("set during initialisation")
    }

    fn set_epoch_duration(&mut self, secs: u64) {
        self.set_u64(key::EPOCH_DURATION, secs)
    }

    fn interchain_tx_timeout(&self) -> u64 {
        self.u64_at(key::INTERCHAIN_TX_TIMEOUT)
            .expect("set during initialisation")
    }

    fn set_interchain_tx_timeout(&mut self, secs: u64) {
        self.set_u64(key::INTERCHAIN_TX_TIMEOUT, secs)
    }

    fn icq_update_period(&self) -> u64 {
        self.u64_at(key::ICQ_UPDATE_PERIOD)
            .expect("set during initialisation")
    }

    fn set_icq_update_period(&mut self, blocks: u64) {
        self.set_u64(key::ICQ_UPDATE_PERIOD, blocks)
    }

    fn lsm_enabled(&self) -> bool {
        self.bool_at(key::LSM_ENABLED).unwrap_or_default()
    }

    fn set_lsm_enabled(&mut self, enabled: bool) {
        self.set_bool(key::LSM_ENABLED, enabled)
    }

    fn max_rate_increase(&self) -> MaxRateIncrease {
        self.u32_at(key::MAX_RATE_INCREASE)
            .and_then(MaxRateIncrease::new)
            .unwrap_or_default()
    }

    fn set_max_rate_increase(&mut self, rate: MaxRateIncrease) {
        self.set_u32(key::MAX_RATE_INCREASE, rate.raw())
    }

    fn max_rate_decrease(&self) -> MaxRateDecrease {
        self.u32_at(key::MAX_RATE_DECREASE)
            .and_then(MaxRateDecrease::new)
            .unwrap_or_default()
    }

    fn set_max_rate_decrease(&mut self, rate: MaxRateDecrease) {
        self.set_u32(key::MAX_RATE_DECREASE, rate.raw())
    }

    fn epoch(&self) -> Epoch {
        self.u64_at(key::EPOCH).unwrap_or_default()
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.set_u64(key::EPOCH, epoch)
    }

    fn last_epoch_time(&self) -> Timestamp {
        self.u64_at(key::LAST_EPOCH_TIME).unwrap_or_default()
    }

    fn set_last_epoch_time(&mut self, time: Timestamp) {
        self.set_u64(key::LAST_EPOCH_TIME, time)
    }

    fn redemption_rate(&self) -> Decimal {
        self.decimal_at(key::REDEMPTION_RATE)
            .expect("set during initialisation")
    }

    fn last_redemption_rate(&self) -> Decimal {
        self.decimal_at(key::LAST_REDEMPTION_RATE)
            .expect("set during initialisation")
    }

    /// The current rate becomes the last rate
    fn push_redemption_rate(&mut self, rate: Decimal) {
        let previous = self.redemption_rate();

        self.set_decimal(key::LAST_REDEMPTION_RATE, previous);
        self.set_decimal(key::REDEMPTION_RATE, rate);
    }

    fn aggregate_intent(&self) -> Vec<ValidatorIntent> {
        self.json_at(key::AGGREGATE_INTENT).unwrap_or_default()
    }

    fn set_aggregate_intent(&mut self, intent: &[ValidatorIntent]) {
        self.set_json(key::AGGREGATE_INTENT, &intent)
    }

    fn account_address(&self, account: Account) -> Option<Address> {
        self.string_at(key::ACCOUNT_ADDRESS.with(account.id()))
    }

    fn set_account_address(&mut self, account: Account, address: &str) {
        self.set_string(key::ACCOUNT_ADDRESS.with(account.id()), address)
    }

    fn require_account(&self, account: Account) -> Result<Address, Error> {
        self.account_address(account)
            .ok_or(Error::AccountNotRegistered(account.id()))
    }

    fn lsm_caps(&self) -> Option<LsmCaps> {
        self.json_at(key::LSM_CAPS)
    }

    fn set_lsm_caps(&mut self, caps: Option<LsmCaps>) {
        match caps {
            Some(caps) => self.set_json(key::LSM_CAPS, &caps),
            None => self.remove_key(key::LSM_CAPS),
        }
    }

    fn max_allocations(&self) -> BTreeMap<Address, u128> {
        self.json_at(key::MAX_ALLOCATIONS).unwrap_or_default()
    }

    fn set_max_allocations(&mut self, allocations: &BTreeMap<Address, u128>) {
        self.set_json(key::MAX_ALLOCATIONS, allocations)
    }

    fn withdrawal_waitgroup(&self) -> u32 {
        self.u32_at(key::WITHDRAWAL_WAITGROUP).unwrap_or_default()
    }

    fn set_withdrawal_waitgroup(&mut self, count: u32) {
        self.set_u32(key::WITHDRAWAL_WAITGROUP, count)
    }

    /// Epoch whose rewards sweep the waitgroup is counting down
    fn rewards_sweep_epoch(&self) -> Option<Epoch> {
        self.u64_at(key::REWARDS_SWEEP_EPOCH)
    }

    fn set_rewards_sweep_epoch(&mut self, epoch: Epoch) {
        self.set_u64(key::REWARDS_SWEEP_EPOCH, epoch)
    }

    /// Last observed balance of the withdrawal account
    fn rewards_balance(&self) -> u128 {
        self.u128_at(key::REWARDS_BALANCE).unwrap_or_default()
    }

    fn set_rewards_balance(&mut self, amount: u128) {
        self.set_u128(key::REWARDS_BALANCE, amount)
    }

    /// Returns the next redemption sequence number, used to derive unique withdrawal hashes
    fn next_redemption_sequence(&mut self) -> u64 {
        let sequence = self.u64_at(key::REDEMPTION_SEQUENCE).unwrap_or_default();

        self.set_u64(key::REDEMPTION_SEQUENCE, sequence + 1);

        sequence
    }

    fn query_id(&self, icq: Icq) -> Option<u64> {
        self.u64_at(key::QUERY_ID.with(icq.id()))
    }

    fn set_query_id(&mut self, icq: Icq, id: u64) {
        self.set_u64(key::QUERY_ID.with(icq.id()), id);
        self.set_string(key::QUERY_KIND.with(id), icq.id());
    }

    /// Which registered query `id` belongs to
    fn query_kind(&self, id: u64) -> Option<Icq> {
        self.string_at(key::QUERY_KIND.with(id))
            .and_then(|kind| kind.parse().ok())
    }
}

impl<T> ZoneExt for T where T: Storage + ?Sized {}

/// Record the address of a newly opened interchain account.
///
/// Rewards of the delegation account are directed to the withdrawal account once both are open.
pub fn on_account_opened(storage: &mut dyn Storage, account: Account, address: &str) -> Outcome {
    storage.set_account_address(account, address);

    let mut outcome = Outcome::default();

    outcome.push_event(
        event("account_opened")
            .add_attribute("account", account.id())
            .add_attribute("address", address),
    );

    if !matches!(account, Account::Delegation | Account::Withdrawal) {
        return outcome;
    }

    let accounts = (
        storage.account_address(Account::Delegation),
        storage.account_address(Account::Withdrawal),
    );

    if let (Some(delegator), Some(withdraw_address)) = accounts {
        outcome.push_cmd(RemoteTx::new(
            Account::Delegation,
            vec![RemoteMsg::SetWithdrawAddress {
                delegator,
                withdraw_address,
            }],
            Memo::Empty,
        ));
    }

    outcome
}
