use crate::Address;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unauthorized")]
pub struct UnauthorizedError;

/// Proof that the caller was authorized as the admin, only this module can create one
#[derive(Debug, Clone, Copy)]
pub struct AdminRole(());

impl AdminRole {
    #[cfg(test)]
    pub(crate) fn mock() -> Self {
        Self(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleCmd {
    SetAdmin(Address),
    SetPendingAdmin(Option<Address>),
}

pub trait Repository {
    /// Always set on instantiation
    fn creator(&self) -> Address;

    fn current_admin(&self) -> Option<Address>;

    fn pending_admin(&self) -> Option<Address>;

    /// The creator holds the role until it is first transferred
    fn admin(&self) -> Address {
        self.current_admin().unwrap_or_else(|| self.creator())
    }
}

pub fn authorize(repository: &dyn Repository, sender: &str) -> Result<AdminRole, UnauthorizedError> {
    if repository.admin() != sender {
        return Err(UnauthorizedError);
    }

    Ok(AdminRole(()))
}

/// Nominate the next admin, they only hold the role once they claim it
pub fn transfer(_: AdminRole, next_admin: Address) -> RoleCmd {
    RoleCmd::SetPendingAdmin(Some(next_admin))
}

pub fn claim(repository: &dyn Repository, sender: &str) -> Result<Vec<RoleCmd>, UnauthorizedError> {
    let pending = repository.pending_admin().ok_or(UnauthorizedError)?;

    if pending != sender {
        return Err(UnauthorizedError);
    }

    Ok(vec![RoleCmd::SetAdmin(pending), RoleCmd::SetPendingAdmin(None)])
}

pub fn cancel(_: AdminRole) -> RoleCmd {
    RoleCmd::SetPendingAdmin(None)
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct Roles {
        current: Option<Address>,
        pending: Option<Address>,
    }

    impl Repository for Roles {
        fn creator(&self) -> Address {
            "creator".to_owned()
        }

        fn current_admin(&self) -> Option<Address> {
            self.current.clone()
        }

        fn pending_admin(&self) -> Option<Address> {
            self.pending.clone()
        }
    }

    #[test]
    fn creator_is_admin_until_transferred() {
        let roles = Roles::default();

        assert!(authorize(&roles, "creator").is_ok());
        assert!(authorize(&roles, "rando").is_err());

        let roles = Roles {
            current: Some("admin".to_owned()),
            pending: Some("next".to_owned()),
        };

        assert!(authorize(&roles, "creator").is_err());
        assert!(authorize(&roles, "admin").is_ok());
        assert!(authorize(&roles, "next").is_err(), "pending admin must claim first");
    }

    #[test]
    fn claim_requires_nomination() {
        assert_eq!(claim(&Roles::default(), "next"), Err(UnauthorizedError));

        let roles = Roles {
            pending: Some("next".to_owned()),
            ..Default::default()
        };

        assert_eq!(claim(&roles, "rando"), Err(UnauthorizedError));

        assert_eq!(
            claim(&roles, "next").unwrap(),
            vec![
                RoleCmd::SetAdmin("next".to_owned()),
                RoleCmd::SetPendingAdmin(None)
            ]
        );
    }

    #[test]
    fn transfer_and_cancel() {
        assert_eq!(
            transfer(AdminRole::mock(), "next".to_owned()),
            RoleCmd::SetPendingAdmin(Some("next".to_owned()))
        );

        assert_eq!(cancel(AdminRole::mock()), RoleCmd::SetPendingAdmin(None));
    }
}
