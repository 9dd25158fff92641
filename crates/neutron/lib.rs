use cosmwasm_std::{CustomQuery, QuerierWrapper, StdError};
use neutron_sdk::bindings::msg::IbcFee;

use ics_cw::BalanceOracle;

pub mod token_factory;

pub mod query {
    use cosmwasm_schema::cw_serde;
    use cosmwasm_std::{Binary, Coin, CustomQuery, QuerierWrapper, QueryRequest, StdError, Uint64};

    #[cw_serde]
    pub struct InterchainTxsParams {
        pub msg_submit_tx_max_messages: Uint64,
        pub register_fee: Vec<Coin>,
    }

    impl InterchainTxsParams {
        pub const QUERY_PATH: &'static str = "/neutron.interchaintxs.v1.Query/Params";
    }

    #[cw_serde]
    pub struct QueryInterchainTxParamsResponse {
        pub params: InterchainTxsParams,
    }

    #[cw_serde]
    pub struct IcqParams {
        pub query_submit_timeout: String,
        pub query_deposit: Vec<Coin>,
        pub tx_query_removal_limit: String,
    }

    impl IcqParams {
        pub const QUERY_PATH: &'static str = "/neutron.interchainqueries.Query/Params";
    }

    #[cw_serde]
    pub struct QueryIcqParamsResponse {
        pub params: IcqParams,
    }

    pub trait QuerierExt {
        fn interchain_tx_max_msg_count(&self) -> Result<usize, StdError>;

        fn interchain_account_register_fee(&self) -> Result<Option<Coin>, StdError>;

        fn interchain_query_deposit(&self) -> Result<Option<Coin>, StdError>;
    }

    impl<'a, C: CustomQuery> QuerierExt for QuerierWrapper<'a, C> {
        fn interchain_tx_max_msg_count(&self) -> Result<usize, StdError> {
            let res: QueryInterchainTxParamsResponse = self.query(&QueryRequest::Stargate {
                path: InterchainTxsParams::QUERY_PATH.to_owned(),
                data: Binary(vec![]),
            })?;

            res.params
                .msg_submit_tx_max_messages
                .u64()
                .try_into()
                .map_err(|_| StdError::generic_err("max msg count exceeds usize::MAX"))
        }

        fn interchain_account_register_fee(&self) -> Result<Option<Coin>, StdError> {
            let res: QueryInterchainTxParamsResponse = self.query(&QueryRequest::Stargate {
                path: InterchainTxsParams::QUERY_PATH.to_owned(),
                data: Binary(vec![]),
            })?;

            Ok(res.params.register_fee.into_iter().next())
        }

        fn interchain_query_deposit(&self) -> Result<Option<Coin>, StdError> {
            let res: QueryIcqParamsResponse = self.query(&QueryRequest::Stargate {
                path: IcqParams::QUERY_PATH.to_owned(),
                data: Binary(vec![]),
            })?;

            Ok(res.params.query_deposit.into_iter().next())
        }
    }
}

pub static IBC_FEE_DENOM: &str = "untrn";

pub trait IbcFeeExt {
    fn total_fee_per_tx(&self) -> u128;
}

impl IbcFeeExt for IbcFee {
    fn total_fee_per_tx(&self) -> u128 {
        self.timeout_fee
            .iter()
            .chain(self.ack_fee.iter())
            .filter_map(|c| (c.denom == IBC_FEE_DENOM).then_some(c.amount.u128()))
            .sum()
    }
}

/// Receipt token holdings, read from the local bank module
pub struct BankOracle<'a, C: CustomQuery>(QuerierWrapper<'a, C>);

impl<'a, C: CustomQuery> BankOracle<'a, C> {
    pub fn new(querier: QuerierWrapper<'a, C>) -> Self {
        Self(querier)
    }
}

impl<'a, C: CustomQuery> BalanceOracle for BankOracle<'a, C> {
    fn balance_of(&self, address: &str, denom: &str) -> Result<u128, StdError> {
        self.0
            .query_balance(address, denom)
            .map(|coin| coin.amount.u128())
    }

    fn supply_of(&self, denom: &str) -> Result<u128, StdError> {
        self.0.query_supply(denom).map(|coin| coin.amount.u128())
    }
}
