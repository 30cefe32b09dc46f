//! Caller authentication: credential lookup, signed tokens and roles.

pub mod credentials;
pub mod jwt;
pub mod rbac;

pub use credentials::{Credential, CredentialStore, StaticCredentials};
pub use jwt::{Claims, TokenService};
pub use rbac::Role;
