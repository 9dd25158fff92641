use cosmwasm_std::{CosmosMsg, Env};
use neutron_sdk::bindings::msg::NeutronMsg;

use ics_core::msg::Cmd;

/// The receipt token, created by this contract through Neutron's token factory
pub struct TokenFactory<'a>(&'a Env);

impl<'a> TokenFactory<'a> {
    pub fn new(env: &'a Env) -> Self {
        Self(env)
    }

    pub fn denom(&self, subdenom: &str) -> String {
        format!("factory/{}/{subdenom}", self.0.contract.address)
    }

    pub fn create(&self, subdenom: &str) -> CosmosMsg<NeutronMsg> {
        NeutronMsg::submit_create_denom(subdenom).into()
    }

    pub fn mint(&self, denom: &str, amount: u128, recipient: &str) -> CosmosMsg<NeutronMsg> {
        NeutronMsg::submit_mint_tokens(denom, amount.into(), recipient).into()
    }

    /// Burns from the contract's own balance
    pub fn burn(&self, denom: &str, amount: u128) -> CosmosMsg<NeutronMsg> {
        NeutronMsg::submit_burn_tokens(denom, amount.into()).into()
    }

    /// The local message for a mint or burn command, remote submissions are not handled here
    pub fn handle_cmd(&self, denom: &str, cmd: &Cmd) -> Option<CosmosMsg<NeutronMsg>> {
        match cmd {
            Cmd::Mint { amount, recipient } => Some(self.mint(denom, *amount, recipient)),
            Cmd::Burn { amount } => Some(self.burn(denom, *amount)),
            Cmd::Submit(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use cosmwasm_std::testing::mock_env;
    use ics_core::msg::{Account, RemoteTx};
    use test_utils::prelude::*;

    use super::*;

    const DENOM: &str = "factory/cosmos2contract/qatom";

    #[test]
    fn denom() {
        check(
            TokenFactory::new(&mock_env()).denom("qatom"),
            expect![[r#""factory/cosmos2contract/qatom""#]],
        );
    }

    #[test]
    fn create() {
        check(
            TokenFactory::new(&mock_env()).create("qatom"),
            expect![[r#"
                custom(create_denom(
                  subdenom: "qatom",
                ))"#]],
        );
    }

    #[test]
    fn mint_cmd() {
        let cmd = Cmd::Mint {
            amount: 833_333,
            recipient: "neutron1alice".to_owned(),
        };

        check(
            TokenFactory::new(&mock_env())
                .handle_cmd(DENOM, &cmd)
                .unwrap(),
            expect![[r#"
                custom(mint_tokens(
                  denom: "factory/cosmos2contract/qatom",
                  amount: "833333",
                  mint_to_address: "neutron1alice",
                ))"#]],
        );
    }

    #[test]
    fn burn_cmd() {
        check(
            TokenFactory::new(&mock_env())
                .handle_cmd(DENOM, &Cmd::Burn { amount: 1_000_000 })
                .unwrap(),
            expect![[r#"
                custom(burn_tokens(
                  denom: "factory/cosmos2contract/qatom",
                  amount: "1000000",
                  burn_from_address: "",
                ))"#]],
        );
    }

    #[test]
    fn submissions_are_not_local() {
        let cmd = Cmd::Submit(RemoteTx::new(Account::Delegation, vec![], "rewards/1"));

        assert!(TokenFactory::new(&mock_env()).handle_cmd(DENOM, &cmd).is_none());
    }
}
