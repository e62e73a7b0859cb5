//! Pluggable authorization gate and its provisioning by configured name.

mod authorizer;
mod path_policy;
mod factory;

pub use authorizer::{authorize_each, AccessType, Authorizer};
pub use path_policy::{PathPolicyAuthorizer, PATH_POLICY_AUTHORIZER};
pub use factory::{create_authorizer, register_authorizer, AuthorizerCtor, AuthorizerRegistry};

#[cfg(test)]
mod tests;
