pub mod company;
pub mod department;
pub mod purchase;
pub mod user;

use crate::errors::{AppError, AppResult};

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 255;

pub(crate) fn validate_name(field: &str, value: &str) -> AppResult<()> {
    let len = value.trim().chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        return Err(AppError::validation(format!(
            "{field} must be between {NAME_MIN} and {NAME_MAX} characters"
        )));
    }
    Ok(())
}
