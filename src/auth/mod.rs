//! Authentication: credentials, token issuance, session invalidation and
//! supervisor assignment.

mod credentials;
mod error;
pub mod seed;
mod service;
mod supervisor;

pub use credentials::{CredentialStore, PasswordCredentials, MIN_PASSWORD_LENGTH};
pub use error::AuthError;
pub use service::AuthService;
pub use supervisor::{Assignment, SupervisorDirectory};
