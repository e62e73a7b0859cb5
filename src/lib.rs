//! Authentication and authorization edge of the data-lake storage client:
//! delegation-token acquire/renew/cancel under proxy-user impersonation, and a
//! pluggable per-path authorization gate.

pub mod config;
pub mod error;
pub mod identity;
pub mod token;
pub mod authz;

pub use error::{AuthError, AuthResult};
