pub mod auth;
pub mod companies;
pub mod departments;
pub mod health;
pub mod purchases;
