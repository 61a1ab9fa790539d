use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: Uuid,
    pub department_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// Set when the last writer held the CompanyManager role.
    pub approved: bool,
    pub amount: i64,
    pub cost: f64,
    pub purchase_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseWriteRequest {
    #[schema(example = "Standing desks")]
    pub name: String,
    #[schema(example = 4)]
    pub amount: i64,
    #[schema(example = 349.99)]
    pub cost: f64,
    pub purchase_date: DateTime<Utc>,
}

impl PurchaseWriteRequest {
    pub fn validate(&self) -> AppResult<()> {
        super::validate_name("name", &self.name)?;
        if self.amount <= 0 {
            return Err(AppError::validation("amount must be greater than 0"));
        }
        if !(self.cost.is_finite() && self.cost > 0.0) {
            return Err(AppError::validation("cost must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, amount: i64, cost: f64) -> PurchaseWriteRequest {
        PurchaseWriteRequest {
            name: name.to_string(),
            amount,
            cost,
            purchase_date: Utc::now(),
        }
    }

    #[test]
    fn validation_rules() {
        assert!(request("Chairs", 2, 10.0).validate().is_ok());
        assert!(request("C", 2, 10.0).validate().is_err());
        assert!(request("Chairs", 0, 10.0).validate().is_err());
        assert!(request("Chairs", 2, 0.0).validate().is_err());
        assert!(request("Chairs", 2, f64::NAN).validate().is_err());
    }
}
