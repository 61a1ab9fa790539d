//! Authorization module - roles, ownership resolution and the policy evaluator
//!
//! Every resource route resolves its ownership chain first (404 when any level
//! is missing) and only then asks the evaluator, so a denial is always a 403 on
//! a resource that exists.

mod evaluator;
mod ownership;
mod principal;
mod roles;

pub use evaluator::{purchase_approved, Action, Decision, DefaultPolicyEvaluator, PolicyEvaluator, Rule};
pub use ownership::OwnershipResolver;
pub use principal::{OwnedResource, OwnershipChain, Principal, ResourceKind, Target};
pub use roles::{Role, UnknownRole};

use crate::errors::{AppError, AppResult};

/// Turn a denial into a 403.
pub fn require(
    evaluator: &dyn PolicyEvaluator,
    principal: &Principal,
    action: Action,
    target: &Target,
) -> AppResult<()> {
    match evaluator.decide(principal, action, target) {
        Decision::Allow => Ok(()),
        Decision::Deny => Err(AppError::forbidden(format!(
            "{} on {} is not permitted",
            action.as_str(),
            target.kind_label()
        ))),
    }
}
