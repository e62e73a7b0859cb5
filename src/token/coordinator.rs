use std::sync::Arc;

use super::client::{AuthenticatedTokenClient, AuthenticatedUrlToken, ConnectContext};
use super::endpoint::EndpointResolver;
use super::model::Token;
use crate::config::Configuration;
use crate::error::AuthResult;
use crate::identity::{resolve_connect_context, IdentityProvider};

/// Retrieve, renew and cancel delegation tokens for whoever is calling.
///
/// Each operation resolves the caller, the connect identity (refreshing its
/// credential) and the endpoint, then performs one exchange as the connect
/// identity. Calls share no mutable state, so one coordinator can serve
/// concurrent callers.
#[derive(Clone)]
pub struct TokenLifecycleCoordinator {
    identities: Arc<dyn IdentityProvider>,
    endpoint: EndpointResolver,
    client: AuthenticatedTokenClient,
}

impl TokenLifecycleCoordinator {
    pub fn new(identities: Arc<dyn IdentityProvider>, client: AuthenticatedTokenClient) -> Self {
        Self { identities, endpoint: EndpointResolver::default(), client }
    }

    pub fn with_endpoint_resolver(mut self, endpoint: EndpointResolver) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn retrieve(&self, renewer: &str, conf: &Configuration) -> AuthResult<Token> {
        self.do_connected(conf, AuthenticatedUrlToken::new(), |cc| self.client.acquire(cc, renewer))
    }

    /// Returns the new expiry in milliseconds since the epoch.
    pub fn renew(&self, token: &Token, conf: &Configuration) -> AuthResult<i64> {
        self.do_connected(conf, AuthenticatedUrlToken::for_token(token), |cc| self.client.renew(cc))
    }

    pub fn cancel(&self, token: &Token, conf: &Configuration) -> AuthResult<()> {
        self.do_connected(conf, AuthenticatedUrlToken::for_token(token), |cc| self.client.cancel(cc))
    }

    fn do_connected<T, F>(&self, conf: &Configuration, auth_token: AuthenticatedUrlToken, action: F) -> AuthResult<T>
    where
        F: FnOnce(&ConnectContext) -> AuthResult<T>,
    {
        let acting = self.identities.current_user()?;
        let connect = resolve_connect_context(&acting)?;
        let service_url = self.endpoint.resolve_service_url(conf)?;
        let cc = ConnectContext { connect, auth_token, service_url };
        action(&cc)
    }
}
