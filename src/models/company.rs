use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppResult;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub established_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyWriteRequest {
    #[schema(example = "Acme Logistics")]
    pub name: String,
    pub established_date: DateTime<Utc>,
}

impl CompanyWriteRequest {
    pub fn validate(&self) -> AppResult<()> {
        super::validate_name("name", &self.name)
    }
}
