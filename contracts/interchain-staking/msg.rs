use cosmwasm_schema::{cw_serde, QueryResponses};
use strum::IntoStaticStr;

use ics_cw::{
    admin::{ExecuteMsg as AdminExecuteMsg, QueryMsg as AdminQueryMsg},
    staking::{ExecuteMsg as StakingExecuteMsg, QueryMsg as StakingQueryMsg},
};

#[cw_serde]
pub struct Config {
    pub chain_id: String,
    pub connection_id: String,
    /// The staked asset on the remote chain
    pub base_denom: String,
    /// Subdenom of the receipt token created through the token factory
    pub subdenom: String,
    pub account_prefix: String,
    pub local_prefix: String,
    pub unbonding_period: u64,
    pub epoch_duration: u64,
    pub interchain_tx_timeout: u64,
    pub icq_update_period: u64,
    pub lsm_enabled: bool,
    pub max_rate_increase_bps: u32,
    pub max_rate_decrease_bps: u32,
}

#[cw_serde]
pub struct InstantiateMsg {
    #[serde(flatten)]
    pub config: Config,
    pub initial_validators: Vec<String>,
}

#[cw_serde]
pub struct LsmCapsConfig {
    pub global_cap_bps: u32,
    pub validator_cap_bps: u32,
    pub validator_bond_cap_bps: u32,
}

#[cw_serde]
#[derive(IntoStaticStr)]
pub enum ZoneExecuteMsg {
    /// Admin role required
    DenyValidator { validator: String },
    /// Re-register an interchain account after its channel closed, requires the registration fee
    RestoreIca { id: String },
    /// Admin role required
    UpdateConfig {
        epoch_duration: Option<u64>,
        unbonding_period: Option<u64>,
        interchain_tx_timeout: Option<u64>,
        icq_update_period: Option<u64>,
        lsm_enabled: Option<bool>,
        max_rate_increase_bps: Option<u32>,
        max_rate_decrease_bps: Option<u32>,
        lsm_caps: Option<LsmCapsConfig>,
    },
}

impl ZoneExecuteMsg {
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

#[cw_serde]
#[serde(untagged)]
pub enum ExecuteMsg {
    Admin(AdminExecuteMsg),
    Staking(StakingExecuteMsg),
    Zone(ZoneExecuteMsg),
}

#[cw_serde]
pub struct QueryIdsResponse {
    pub deposit_transfers: Option<u64>,
    pub delegations: Option<u64>,
    pub validators: Option<u64>,
    pub withdrawal_balance: Option<u64>,
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum ZoneQueryMsg {
    #[returns(Config)]
    Config {},
    #[returns(Option<LsmCapsConfig>)]
    LsmCaps {},
    #[returns(QueryIdsResponse)]
    QueryIds {},
}

#[cw_serde]
#[derive(QueryResponses)]
#[serde(untagged)]
#[query_responses(nested)]
pub enum QueryMsg {
    Admin(AdminQueryMsg),
    Staking(StakingQueryMsg),
    Zone(ZoneQueryMsg),
}

#[cw_serde]
pub struct MigrateMsg {}
