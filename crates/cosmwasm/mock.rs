use std::collections::BTreeMap;

use cosmwasm_std::{StdError, Storage};

use ics_core::{
    admin::{self, AdminRole, Repository},
    delegation::Delegation,
    msg::Account,
    rates::{MaxRateDecrease, MaxRateIncrease},
    Address,
};

use crate::{
    delegations::DelegationsExt as _,
    validators,
    zone::{self, ZoneExt as _, ZoneParams},
    BalanceOracle,
};

pub const BASE_DENOM: &str = "uatom";
pub const LOCAL_DENOM: &str = "factory/neutron1contract/qatom";
pub const EPOCH_DURATION: u64 = 21_600;
pub const UNBONDING_PERIOD: u64 = 1_814_400;

pub const DEPOSIT_ADDRESS: &str = "cosmos1deposit";
pub const DELEGATION_ADDRESS: &str = "cosmos1delegate";
pub const WITHDRAWAL_ADDRESS: &str = "cosmos1withdrawal";
pub const PERFORMANCE_ADDRESS: &str = "cosmos1performance";

pub const REMOTE_ALICE: &str = "cosmos1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7xu";
pub const LOCAL_ALICE: &str = "neutron1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5ma9uum";

pub const REMOTE_BOB: &str = "cosmos1z5tpwxqergd3c8g7ruszzg3rysjjvfegg8csw2";
pub const LOCAL_BOB: &str = "neutron1z5tpwxqergd3c8g7ruszzg3rysjjvfegvc3j5d";

pub fn params() -> ZoneParams {
    ZoneParams {
        chain_id: "cosmoshub-4".to_owned(),
        connection_id: "connection-0".to_owned(),
        base_denom: BASE_DENOM.to_owned(),
        local_denom: LOCAL_DENOM.to_owned(),
        account_prefix: "cosmos".to_owned(),
        local_prefix: "neutron".to_owned(),
        unbonding_period: UNBONDING_PERIOD,
        epoch_duration: EPOCH_DURATION,
        interchain_tx_timeout: 3_600,
        icq_update_period: 100,
        lsm_enabled: false,
        max_rate_increase: MaxRateIncrease::new(200).unwrap(),
        max_rate_decrease: MaxRateDecrease::new(500).unwrap(),
    }
}

pub fn init_zone(storage: &mut dyn Storage) {
    zone::init(storage, &params(), 0);
}

/// An initialised zone with every account registered and validators `val_0..val_n`
pub fn init_zone_with_validators(storage: &mut dyn Storage, n: usize) {
    init_zone(storage);

    for (account, address) in [
        (Account::Deposit, DEPOSIT_ADDRESS),
        (Account::Delegation, DELEGATION_ADDRESS),
        (Account::Withdrawal, WITHDRAWAL_ADDRESS),
        (Account::Performance, PERFORMANCE_ADDRESS),
    ] {
        storage.set_account_address(account, address);
    }

    for i in 0..n {
        validators::add_validator(storage, &format!("val_{i}")).unwrap();
    }
}

/// One validator per amount, each holding that much unlocked stake of the delegation account
pub fn init_zone_with_delegations(storage: &mut dyn Storage, amounts: &[u128]) {
    init_zone_with_validators(storage, amounts.len());

    for (i, amount) in amounts.iter().enumerate() {
        storage.set_delegation(&Delegation::new(
            DELEGATION_ADDRESS,
            format!("val_{i}"),
            *amount,
        ));
    }
}

struct Creator;

impl Repository for Creator {
    fn creator(&self) -> Address {
        "admin".to_owned()
    }

    fn current_admin(&self) -> Option<Address> {
        None
    }

    fn pending_admin(&self) -> Option<Address> {
        None
    }
}

pub fn admin_role() -> AdminRole {
    admin::authorize(&Creator, "admin").unwrap()
}

#[derive(Default)]
pub struct MockOracle {
    balances: BTreeMap<(Address, String), u128>,
    supplies: BTreeMap<String, u128>,
}

impl MockOracle {
    pub fn with_balance(mut self, address: &str, denom: &str, amount: u128) -> Self {
        self.balances
            .insert((address.to_owned(), denom.to_owned()), amount);
        self
    }

    pub fn with_supply(mut self, denom: &str, amount: u128) -> Self {
        self.supplies.insert(denom.to_owned(), amount);
        self
    }
}

impl BalanceOracle for MockOracle {
    fn balance_of(&self, address: &str, denom: &str) -> Result<u128, StdError> {
        Ok(self
            .balances
            .get(&(address.to_owned(), denom.to_owned()))
            .copied()
            .unwrap_or_default())
    }

    fn supply_of(&self, denom: &str) -> Result<u128, StdError> {
        Ok(self.supplies.get(denom).copied().unwrap_or_default())
    }
}
