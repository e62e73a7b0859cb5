//! Registration point for a generic token-renewal facility.

use std::sync::Arc;

use tracing::debug;

use super::coordinator::TokenLifecycleCoordinator;
use super::model::{Token, TokenKind};
use crate::config::Configuration;
use crate::error::{AuthError, AuthResult};

/// What a renewal facility needs from a token implementation.
pub trait TokenRenewer: Send + Sync {
    fn handle_kind(&self, kind: &TokenKind) -> bool;

    /// Whether tokens handed to this renewer are subject to periodic renewal.
    fn is_managed(&self, token: &Token) -> bool;

    fn renew(&self, token: &Token, conf: &Configuration) -> AuthResult<i64>;

    fn cancel(&self, token: &Token, conf: &Configuration) -> AuthResult<()>;
}

/// Renewer for delegation tokens; a stateless shim over the coordinator.
#[derive(Clone)]
pub struct DelegationTokenRenewer {
    coordinator: Arc<TokenLifecycleCoordinator>,
}

impl DelegationTokenRenewer {
    pub fn new(coordinator: Arc<TokenLifecycleCoordinator>) -> Self { Self { coordinator } }
}

impl TokenRenewer for DelegationTokenRenewer {
    fn handle_kind(&self, kind: &TokenKind) -> bool { *kind == TokenKind::delegation() }

    fn is_managed(&self, _token: &Token) -> bool { true }

    fn renew(&self, token: &Token, conf: &Configuration) -> AuthResult<i64> {
        debug!(target: "adl_auth::token", "Renewing the delegation token");
        self.coordinator.renew(token, conf)
    }

    fn cancel(&self, token: &Token, conf: &Configuration) -> AuthResult<()> {
        debug!(target: "adl_auth::token", "Cancelling the delegation token");
        self.coordinator.cancel(token, conf)
    }
}

/// Renewers discovered by kind. The first renewer that claims a kind wins.
#[derive(Default, Clone)]
pub struct RenewerRegistry {
    renewers: Vec<Arc<dyn TokenRenewer>>,
}

impl RenewerRegistry {
    pub fn new() -> Self { Self::default() }

    /// Registry with the delegation-token renewer installed.
    pub fn with_delegation_renewer(coordinator: Arc<TokenLifecycleCoordinator>) -> Self {
        let mut reg = Self::new();
        reg.register(Arc::new(DelegationTokenRenewer::new(coordinator)));
        reg
    }

    pub fn register(&mut self, renewer: Arc<dyn TokenRenewer>) -> &mut Self {
        self.renewers.push(renewer);
        self
    }

    pub fn renewer_for(&self, kind: &TokenKind) -> Option<Arc<dyn TokenRenewer>> {
        self.renewers.iter().find(|r| r.handle_kind(kind)).cloned()
    }

    fn require(&self, kind: &TokenKind) -> AuthResult<Arc<dyn TokenRenewer>> {
        self.renewer_for(kind)
            .ok_or_else(|| AuthError::config(format!("no renewer registered for token kind '{kind}'")))
    }
}

impl Token {
    pub fn is_managed(&self, registry: &RenewerRegistry) -> bool {
        registry.renewer_for(self.kind()).is_some_and(|r| r.is_managed(self))
    }

    pub fn renew(&self, registry: &RenewerRegistry, conf: &Configuration) -> AuthResult<i64> {
        registry.require(self.kind())?.renew(self, conf)
    }

    pub fn cancel(&self, registry: &RenewerRegistry, conf: &Configuration) -> AuthResult<()> {
        registry.require(self.kind())?.cancel(self, conf)
    }
}
