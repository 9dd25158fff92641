use cosmwasm_schema::cw_serde;
use cosmwasm_std::{to_json_binary, Api, Binary, MessageInfo, StdError};

use ics_core::admin::{self, AdminRole, Repository as CoreRepository, RoleCmd};

use crate::Error;

#[cw_serde]
pub enum ExecuteMsg {
    /// Nominate the next admin, they must claim the role to hold it
    TransferAdminRole { next_admin: String },

    /// Complete admin role transferral
    ClaimAdminRole {},

    /// Cancel admin role transferral
    CancelRoleTransfer {},
}

#[cw_serde]
pub struct CurrentAdminResponse {
    /// The current admin, if None the contract creator is the admin
    pub current_admin: Option<String>,
}

#[cw_serde]
pub struct PendingAdminResponse {
    /// The pending admin, they will become admin if they claim the role
    pub pending_admin: Option<String>,
}

#[cw_serde]
#[derive(cosmwasm_schema::QueryResponses)]
pub enum QueryMsg {
    /// Returns the current admin role holder
    #[returns(CurrentAdminResponse)]
    CurrentAdmin {},

    /// Returns the pending admin role holder
    #[returns(PendingAdminResponse)]
    PendingAdmin {},
}

pub fn handle_execute_msg(
    api: &dyn Api,
    repository: &dyn CoreRepository,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<Vec<RoleCmd>, Error> {
    let sender = info.sender.as_str();

    let cmds = match msg {
        ExecuteMsg::TransferAdminRole { next_admin } => {
            let role = admin::authorize(repository, sender)?;

            api.addr_validate(&next_admin)?;

            vec![admin::transfer(role, next_admin)]
        }

        ExecuteMsg::ClaimAdminRole {} => admin::claim(repository, sender)?,

        ExecuteMsg::CancelRoleTransfer {} => {
            let role = admin::authorize(repository, sender)?;

            vec![admin::cancel(role)]
        }
    };

    Ok(cmds)
}

pub fn handle_query_msg(repository: &dyn CoreRepository, msg: QueryMsg) -> Result<Binary, StdError> {
    match msg {
        QueryMsg::CurrentAdmin {} => to_json_binary(&CurrentAdminResponse {
            current_admin: repository.current_admin(),
        }),

        QueryMsg::PendingAdmin {} => to_json_binary(&PendingAdminResponse {
            pending_admin: repository.pending_admin(),
        }),
    }
}

pub fn get_admin_role(repository: &dyn CoreRepository, info: &MessageInfo) -> Result<AdminRole, Error> {
    admin::authorize(repository, info.sender.as_str()).map_err(Error::from)
}

pub mod repository {
    use cosmwasm_std::{MessageInfo, Storage};

    use ics_core::{
        admin::{Repository as CoreRepository, RoleCmd},
        Address,
    };

    use crate::StorageExt as _;

    pub struct Repository<'a>(&'a dyn Storage);

    impl<'a> Repository<'a> {
        pub fn new(storage: &'a dyn Storage) -> Self {
            Self(storage)
        }
    }

    #[rustfmt::skip]
    mod key {
        macro_rules! key {
            ($k:literal) => {
                concat!("admin::", $k)
            };
        }

        pub const CREATOR       : &str = key!("creator");
        pub const CURRENT_ADMIN : &str = key!("current_admin");
        pub const PENDING_ADMIN : &str = key!("pending_admin");
    }

    impl<'a> CoreRepository for Repository<'a> {
        fn creator(&self) -> Address {
            self.0
                .string_at(key::CREATOR)
                .expect("creator set during initialisation")
        }

        fn current_admin(&self) -> Option<Address> {
            self.0.string_at(key::CURRENT_ADMIN)
        }

        fn pending_admin(&self) -> Option<Address> {
            self.0.string_at(key::PENDING_ADMIN)
        }
    }

    pub fn init(storage: &mut dyn Storage, info: &MessageInfo) {
        storage.set_string(key::CREATOR, info.sender.as_str())
    }

    pub fn handle_cmd(storage: &mut dyn Storage, cmd: RoleCmd) {
        match cmd {
            RoleCmd::SetAdmin(admin) => storage.set_string(key::CURRENT_ADMIN, &admin),

            RoleCmd::SetPendingAdmin(Some(pending)) => {
                storage.set_string(key::PENDING_ADMIN, &pending)
            }

            RoleCmd::SetPendingAdmin(None) => storage.remove_key(key::PENDING_ADMIN),
        }
    }
}

pub use repository::{handle_cmd, init, Repository};

#[cfg(test)]
mod test {
    use cosmwasm_std::{
        from_json,
        testing::{mock_dependencies, mock_info, MockApi, MockQuerier, MockStorage},
        OwnedDeps,
    };

    use super::*;

    type Deps = OwnedDeps<MockStorage, MockApi, MockQuerier>;

    fn execute(deps: &mut Deps, sender: &str, msg: ExecuteMsg) -> Result<(), Error> {
        let cmds = handle_execute_msg(
            &deps.api,
            &Repository::new(&deps.storage),
            mock_info(sender, &[]),
            msg,
        )?;

        for cmd in cmds {
            handle_cmd(&mut deps.storage, cmd);
        }

        Ok(())
    }

    #[test]
    fn two_step_transfer() {
        let mut deps = mock_dependencies();

        init(&mut deps.storage, &mock_info("creator", &[]));

        let next_admin = deps.api.addr_make("next").into_string();

        execute(
            &mut deps,
            "creator",
            ExecuteMsg::TransferAdminRole {
                next_admin: next_admin.clone(),
            },
        )
        .unwrap();

        let pending: PendingAdminResponse = from_json(
            handle_query_msg(&Repository::new(&deps.storage), QueryMsg::PendingAdmin {}).unwrap(),
        )
        .unwrap();

        assert_eq!(pending.pending_admin.as_deref(), Some(next_admin.as_str()));

        assert!(execute(&mut deps, "rando", ExecuteMsg::ClaimAdminRole {}).is_err());

        execute(&mut deps, &next_admin, ExecuteMsg::ClaimAdminRole {}).unwrap();

        let repository = Repository::new(&deps.storage);

        assert_eq!(repository.current_admin(), Some(next_admin.clone()));
        assert_eq!(repository.pending_admin(), None);
        assert!(get_admin_role(&repository, &mock_info("creator", &[])).is_err());
        assert!(get_admin_role(&repository, &mock_info(&next_admin, &[])).is_ok());
    }

    #[test]
    fn only_admin_can_cancel() {
        let mut deps = mock_dependencies();

        init(&mut deps.storage, &mock_info("creator", &[]));

        let err = execute(&mut deps, "rando", ExecuteMsg::CancelRoleTransfer {}).unwrap_err();

        assert_eq!(err.to_string(), "unauthorized");

        execute(&mut deps, "creator", ExecuteMsg::CancelRoleTransfer {}).unwrap();
    }
}
