use std::collections::HashSet;
use uuid::Uuid;

use super::roles::Role;

/// Principal represents the authenticated user as seen by the policy evaluator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub user_name: String,
    pub roles: HashSet<Role>,
    pub supervisor_id: Option<Uuid>,
}

impl Principal {
    pub fn new(user_id: Uuid, user_name: impl Into<String>) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            roles: HashSet::new(),
            supervisor_id: None,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_supervisor(mut self, supervisor_id: Option<Uuid>) -> Self {
        self.supervisor_id = supervisor_id;
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// True when any held role reaches at least as far as `role`.
    pub fn has_scope_of(&self, role: Role) -> bool {
        self.roles.iter().any(|held| held.covers(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_supervised_by(&self, user_id: Uuid) -> bool {
        self.supervisor_id == Some(user_id)
    }

    /// Roles in a stable order, for responses and tokens.
    pub fn sorted_roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.roles.iter().copied().collect();
        roles.sort();
        roles
    }
}

/// What the resource routes expose to the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Company,
    Department,
    Purchase,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Company => "company",
            ResourceKind::Department => "department",
            ResourceKind::Purchase => "purchase",
        }
    }
}

/// A stored resource reduced to the fields that matter for ownership.
///
/// `owner_user_id` is the creator and never changes after insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnedResource {
    pub kind: ResourceKind,
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub parent_id: Option<Uuid>,
}

impl OwnedResource {
    pub fn company(id: Uuid, owner_user_id: Uuid) -> Self {
        Self { kind: ResourceKind::Company, id, owner_user_id, parent_id: None }
    }

    pub fn department(id: Uuid, owner_user_id: Uuid, company_id: Uuid) -> Self {
        Self { kind: ResourceKind::Department, id, owner_user_id, parent_id: Some(company_id) }
    }

    pub fn purchase(id: Uuid, owner_user_id: Uuid, department_id: Uuid) -> Self {
        Self { kind: ResourceKind::Purchase, id, owner_user_id, parent_id: Some(department_id) }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_user_id == user_id
    }
}

/// Creator ids from a resource up through its ancestors.
///
/// Levels below the addressed resource are `None`; a chain for a department
/// collection holds only the company.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnershipChain {
    pub company: Option<OwnedResource>,
    pub department: Option<OwnedResource>,
    pub purchase: Option<OwnedResource>,
}

impl OwnershipChain {
    pub fn company_owned_by(&self, user_id: Uuid) -> bool {
        self.company.is_some_and(|company| company.is_owned_by(user_id))
    }

    pub fn department_owned_by(&self, user_id: Uuid) -> bool {
        self.department.is_some_and(|department| department.is_owned_by(user_id))
    }

    pub fn purchase_owned_by(&self, user_id: Uuid) -> bool {
        self.purchase.is_some_and(|purchase| purchase.is_owned_by(user_id))
    }

    pub fn department_owner(&self) -> Option<Uuid> {
        self.department.map(|department| department.owner_user_id)
    }
}

/// What an action is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// An existing resource, with its full chain resolved.
    Item(ResourceKind, OwnershipChain),
    /// A collection of `kind` under the chain's deepest resolved level.
    /// Creation is always aimed at a collection.
    Collection(ResourceKind, OwnershipChain),
    /// The supervisor-assignment operation.
    Supervision,
}

impl Target {
    pub fn companies() -> Self {
        Target::Collection(ResourceKind::Company, OwnershipChain::default())
    }

    pub fn company(chain: OwnershipChain) -> Self {
        Target::Item(ResourceKind::Company, chain)
    }

    pub fn departments(chain: OwnershipChain) -> Self {
        Target::Collection(ResourceKind::Department, chain)
    }

    pub fn department(chain: OwnershipChain) -> Self {
        Target::Item(ResourceKind::Department, chain)
    }

    pub fn purchases(chain: OwnershipChain) -> Self {
        Target::Collection(ResourceKind::Purchase, chain)
    }

    pub fn purchase(chain: OwnershipChain) -> Self {
        Target::Item(ResourceKind::Purchase, chain)
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Target::Item(kind, _) | Target::Collection(kind, _) => kind.as_str(),
            Target::Supervision => "supervision",
        }
    }
}
