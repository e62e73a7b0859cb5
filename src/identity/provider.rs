use std::sync::Arc;

use super::principal::Identity;
use crate::error::AuthResult;

/// Host environment hook that answers "who is calling right now".
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> AuthResult<Arc<Identity>>;
}

/// Provider that always returns the same identity.
pub struct StaticIdentityProvider {
    identity: Arc<Identity>,
}

impl StaticIdentityProvider {
    pub fn new(identity: Arc<Identity>) -> Self { Self { identity } }
}

impl IdentityProvider for StaticIdentityProvider {
    fn current_user(&self) -> AuthResult<Arc<Identity>> { Ok(Arc::clone(&self.identity)) }
}

impl<F> IdentityProvider for F
where
    F: Fn() -> AuthResult<Arc<Identity>> + Send + Sync,
{
    fn current_user(&self) -> AuthResult<Arc<Identity>> { self() }
}
