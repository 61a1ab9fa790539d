use super::principal::{OwnershipChain, Principal, ResourceKind, Target};
use super::roles::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// The rule of the decision table that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Admin,
    ManagerOwnsCompany,
    ManagerCreatesCompany,
    ManagerOwnsDepartment,
    PurchaseCreator,
    SupervisedCreate,
    SupervisedRead,
    NoMatch,
}

impl Rule {
    fn decision(self) -> Decision {
        match self {
            Rule::NoMatch => Decision::Deny,
            _ => Decision::Allow,
        }
    }
}

/// Policy evaluator trait for pluggable authorization logic
pub trait PolicyEvaluator: Send + Sync {
    fn decide(&self, principal: &Principal, action: Action, target: &Target) -> Decision;
}

/// Ownership-based policy.
///
/// Evaluation order (first match wins):
/// 1. Admin -> allow
/// 2. company/department owned by a CompanyManager caller -> allow
///    (a department is also reachable through its company's owner)
/// 3. purchase creator -> allow read/update/delete
/// 4. purchase under a department the CompanyManager caller owns -> allow
/// 5. create purchase when the caller's supervisor owns the department -> allow
/// 6. read purchases when the caller's supervisor owns the department -> allow
/// 7. deny
#[derive(Debug, Clone, Default)]
pub struct DefaultPolicyEvaluator;

impl DefaultPolicyEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, principal: &Principal, action: Action, target: &Target) -> Rule {
        if principal.is_admin() {
            return Rule::Admin;
        }

        let user_id = principal.user_id;
        let manager = principal.has_scope_of(Role::CompanyManager);

        match *target {
            Target::Supervision => Rule::NoMatch,

            // Listing every company is admin-only; any manager may found a new one.
            Target::Collection(ResourceKind::Company, _) => {
                if action == Action::Create && manager {
                    Rule::ManagerCreatesCompany
                } else {
                    Rule::NoMatch
                }
            }

            Target::Item(ResourceKind::Company, chain) | Target::Collection(ResourceKind::Department, chain) => {
                if manager && chain.company_owned_by(user_id) {
                    Rule::ManagerOwnsCompany
                } else {
                    Rule::NoMatch
                }
            }

            Target::Item(ResourceKind::Department, chain) => {
                if manager && chain.department_owned_by(user_id) {
                    Rule::ManagerOwnsDepartment
                } else if manager && chain.company_owned_by(user_id) {
                    Rule::ManagerOwnsCompany
                } else {
                    Rule::NoMatch
                }
            }

            Target::Item(ResourceKind::Purchase, chain) => {
                if action != Action::Create && chain.purchase_owned_by(user_id) {
                    Rule::PurchaseCreator
                } else {
                    Self::delegated_purchase_rule(principal, action, &chain, manager)
                }
            }

            Target::Collection(ResourceKind::Purchase, chain) => {
                Self::delegated_purchase_rule(principal, action, &chain, manager)
            }
        }
    }

    fn delegated_purchase_rule(principal: &Principal, action: Action, chain: &OwnershipChain, manager: bool) -> Rule {
        let user_id = principal.user_id;
        if manager && (chain.department_owned_by(user_id) || chain.company_owned_by(user_id)) {
            return Rule::ManagerOwnsDepartment;
        }

        let supervisor_owns_department = chain
            .department_owner()
            .is_some_and(|owner| principal.is_supervised_by(owner));

        match action {
            Action::Create if supervisor_owns_department && principal.has_role(Role::BudgetUser) => {
                Rule::SupervisedCreate
            }
            Action::Read if supervisor_owns_department => Rule::SupervisedRead,
            _ => Rule::NoMatch,
        }
    }
}

impl PolicyEvaluator for DefaultPolicyEvaluator {
    fn decide(&self, principal: &Principal, action: Action, target: &Target) -> Decision {
        let rule = self.evaluate(principal, action, target);
        let decision = rule.decision();

        tracing::debug!(
            user_id = %principal.user_id,
            action = action.as_str(),
            target = target.kind_label(),
            rule = ?rule,
            decision = ?decision,
            "authorization decision"
        );

        decision
    }
}

/// Whether a purchase written by `principal` is stored as approved.
pub fn purchase_approved(principal: &Principal) -> bool {
    principal.has_role(Role::CompanyManager)
}
