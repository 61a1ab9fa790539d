use uuid::Uuid;

use super::principal::{OwnedResource, OwnershipChain, ResourceKind};
use crate::store::{OwnershipSource, StoreError, StoreResult};

/// Resolves the ownership chain for a resource addressed by its path ids.
///
/// Read-only. A child whose parent id does not match the path is reported as
/// not found, the same as a missing row.
pub struct OwnershipResolver<'a> {
    source: &'a dyn OwnershipSource,
}

impl<'a> OwnershipResolver<'a> {
    pub fn new(source: &'a dyn OwnershipSource) -> Self {
        Self { source }
    }

    pub async fn company(&self, company_id: Uuid) -> StoreResult<OwnershipChain> {
        let company = self.fetch(ResourceKind::Company, company_id, None).await?;
        Ok(OwnershipChain {
            company: Some(company),
            ..OwnershipChain::default()
        })
    }

    pub async fn department(&self, company_id: Uuid, department_id: Uuid) -> StoreResult<OwnershipChain> {
        let mut chain = self.company(company_id).await?;
        chain.department = Some(
            self.fetch(ResourceKind::Department, department_id, Some(company_id))
                .await?,
        );
        Ok(chain)
    }

    pub async fn purchase(
        &self,
        company_id: Uuid,
        department_id: Uuid,
        purchase_id: Uuid,
    ) -> StoreResult<OwnershipChain> {
        let mut chain = self.department(company_id, department_id).await?;
        chain.purchase = Some(
            self.fetch(ResourceKind::Purchase, purchase_id, Some(department_id))
                .await?,
        );
        Ok(chain)
    }

    async fn fetch(&self, kind: ResourceKind, id: Uuid, parent_id: Option<Uuid>) -> StoreResult<OwnedResource> {
        self.source
            .find_owned(kind, id)
            .await?
            .filter(|resource| resource.parent_id == parent_id)
            .ok_or_else(|| StoreError::NotFound(format!("{} not found", kind.as_str())))
    }
}
