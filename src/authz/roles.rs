use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The closed set of roles.
///
/// Roles widen *scope*, not permissions: an Admin reaches every resource, a
/// CompanyManager reaches what it owns through companies and departments, a
/// BudgetUser reaches what it created plus what its supervisor lets it see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Role {
    Admin,
    CompanyManager,
    BudgetUser,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::CompanyManager, Role::BudgetUser];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::CompanyManager => "CompanyManager",
            Role::BudgetUser => "BudgetUser",
        }
    }

    fn scope_rank(self) -> u8 {
        match self {
            Role::Admin => 2,
            Role::CompanyManager => 1,
            Role::BudgetUser => 0,
        }
    }

    /// Whether this role's scope includes everything `other` can reach.
    pub fn covers(self, other: Role) -> bool {
        self.scope_rank() >= other.scope_rank()
    }

    /// Roles granted at sign-up. Managers are budget users too.
    pub fn for_registration(as_manager: bool) -> Vec<Role> {
        if as_manager {
            vec![Role::BudgetUser, Role::CompanyManager]
        } else {
            vec![Role::BudgetUser]
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn scope_is_ordered() {
        assert!(Role::Admin.covers(Role::CompanyManager));
        assert!(Role::Admin.covers(Role::BudgetUser));
        assert!(Role::CompanyManager.covers(Role::BudgetUser));
        assert!(!Role::BudgetUser.covers(Role::CompanyManager));
        assert!(!Role::CompanyManager.covers(Role::Admin));
    }

    #[test]
    fn registration_roles() {
        assert_eq!(Role::for_registration(false), vec![Role::BudgetUser]);
        assert_eq!(Role::for_registration(true), vec![Role::BudgetUser, Role::CompanyManager]);
    }

    #[test]
    fn serializes_with_wire_names() {
        assert_eq!(serde_json::to_string(&Role::CompanyManager).unwrap(), "\"CompanyManager\"");
    }
}
