//! Authenticated acquire/renew/cancel against the token-management service.
//!
//! [`AuthenticatedTokenClient`] owns the run-as boundary; a [`TokenTransport`]
//! performs exactly one round-trip per call and never retries.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, Url};
use serde_json::Value;
use tracing::debug;

use super::model::Token;
use crate::config::{Configuration, DEFAULT_CRED_SERVICE_TIMEOUT_MS, KEY_CRED_SERVICE_TIMEOUT_MS};
use crate::error::{AuthError, AuthResult, TokenOp, TransportError};
use crate::identity::{run_as, AuthMaterial, ConnectIdentity};

/// Per-call authentication state for the service. Empty for an acquire;
/// carries the token being renewed or cancelled otherwise.
#[derive(Debug, Clone, Default)]
pub struct AuthenticatedUrlToken {
    delegation_token: Option<Token>,
}

impl AuthenticatedUrlToken {
    pub fn new() -> Self { Self::default() }

    pub fn for_token(token: &Token) -> Self { Self { delegation_token: Some(token.clone()) } }

    pub fn delegation_token(&self) -> Option<&Token> { self.delegation_token.as_ref() }
}

/// Everything one call needs. Built fresh per call and dropped with it.
#[derive(Debug, Clone)]
pub struct ConnectContext {
    pub connect: ConnectIdentity,
    pub auth_token: AuthenticatedUrlToken,
    pub service_url: String,
}

impl ConnectContext {
    pub fn proxy_user(&self) -> Option<&str> { self.connect.proxy_user.as_deref() }
}

/// Wire-level token exchange. Implementations do one blocking round-trip.
pub trait TokenTransport: Send + Sync {
    fn get_delegation_token(
        &self,
        url: &str,
        auth: &AuthMaterial,
        token: &AuthenticatedUrlToken,
        renewer: &str,
        proxy_user: Option<&str>,
    ) -> Result<Token, TransportError>;

    /// Returns the new expiry in milliseconds since the epoch.
    fn renew_delegation_token(
        &self,
        url: &str,
        auth: &AuthMaterial,
        token: &AuthenticatedUrlToken,
        proxy_user: Option<&str>,
    ) -> Result<i64, TransportError>;

    fn cancel_delegation_token(
        &self,
        url: &str,
        auth: &AuthMaterial,
        token: &AuthenticatedUrlToken,
        proxy_user: Option<&str>,
    ) -> Result<(), TransportError>;
}

#[derive(Clone)]
pub struct AuthenticatedTokenClient {
    transport: Arc<dyn TokenTransport>,
}

impl AuthenticatedTokenClient {
    pub fn new(transport: Arc<dyn TokenTransport>) -> Self { Self { transport } }

    /// HTTP client with the configured timeout.
    pub fn from_config(conf: &Configuration) -> AuthResult<Self> {
        Ok(Self::new(Arc::new(HttpTokenTransport::from_config(conf)?)))
    }

    pub fn acquire(&self, cc: &ConnectContext, renewer: &str) -> AuthResult<Token> {
        self.call(cc, TokenOp::Acquire, |auth| {
            self.transport.get_delegation_token(&cc.service_url, auth, &cc.auth_token, renewer, cc.proxy_user())
        })
    }

    pub fn renew(&self, cc: &ConnectContext) -> AuthResult<i64> {
        self.call(cc, TokenOp::Renew, |auth| {
            self.transport.renew_delegation_token(&cc.service_url, auth, &cc.auth_token, cc.proxy_user())
        })
    }

    pub fn cancel(&self, cc: &ConnectContext) -> AuthResult<()> {
        self.call(cc, TokenOp::Cancel, |auth| {
            self.transport.cancel_delegation_token(&cc.service_url, auth, &cc.auth_token, cc.proxy_user())
        })
    }

    fn call<T, F>(&self, cc: &ConnectContext, op: TokenOp, exchange: F) -> AuthResult<T>
    where
        F: FnOnce(&AuthMaterial) -> Result<T, TransportError>,
    {
        run_as(&cc.connect.identity, cc.proxy_user(), |sc| {
            let auth = sc.auth_material()?;
            debug!(target: "adl_auth::token", "{} via {}", op, cc.service_url);
            exchange(&auth).map_err(|e| AuthError::transport(op, cc.service_url.clone(), e))
        })
    }
}

/// HTTP transport speaking the delegation-token operations:
/// `GET ?op=GETDELEGATIONTOKEN&renewer=R`, `PUT ?op=RENEWDELEGATIONTOKEN&token=T`,
/// `PUT ?op=CANCELDELEGATIONTOKEN&token=T`, each with an optional `doas`.
pub struct HttpTokenTransport {
    client: Client,
}

impl HttpTokenTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn from_config(conf: &Configuration) -> AuthResult<Self> {
        let ms = conf.get_u64(KEY_CRED_SERVICE_TIMEOUT_MS, DEFAULT_CRED_SERVICE_TIMEOUT_MS)?;
        Self::new(Duration::from_millis(ms)).map_err(|e| AuthError::config(format!("cannot build http client: {e}")))
    }

    fn build_url(
        base: &str,
        op: TokenOp,
        params: &[(&str, &str)],
        auth: &AuthMaterial,
        proxy_user: Option<&str>,
    ) -> Result<Url, TransportError> {
        let mut url = Url::parse(base).map_err(|e| TransportError::Url { url: base.to_string(), message: e.to_string() })?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("op", op.wire_name());
            for (k, v) in params {
                q.append_pair(k, v);
            }
            if let Some(p) = proxy_user {
                q.append_pair("doas", p);
            }
            if let AuthMaterial::Simple(user) = auth {
                q.append_pair("user.name", user);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, auth: &AuthMaterial) -> RequestBuilder {
        let req = self.client.request(method, url).header(reqwest::header::ACCEPT, "application/json");
        match auth {
            AuthMaterial::Header(h) => req.header(reqwest::header::AUTHORIZATION, h.as_str()),
            AuthMaterial::Simple(_) | AuthMaterial::Anonymous => req,
        }
    }

    fn send(&self, req: RequestBuilder, parse_body: bool) -> Result<Value, TransportError> {
        let resp = req.send()?;
        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            return Err(TransportError::Status { status: status.as_u16(), message: remote_message(&text, status) });
        }
        if !parse_body {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| TransportError::Malformed(format!("{e}: {}", truncate(&text))))
    }

    fn token_param(token: &AuthenticatedUrlToken) -> Result<String, TransportError> {
        let t = token
            .delegation_token()
            .ok_or_else(|| TransportError::Other("no delegation token supplied".into()))?;
        t.encode_to_url_string().map_err(|e| TransportError::Other(e.to_string()))
    }
}

impl TokenTransport for HttpTokenTransport {
    fn get_delegation_token(
        &self,
        url: &str,
        auth: &AuthMaterial,
        _token: &AuthenticatedUrlToken,
        renewer: &str,
        proxy_user: Option<&str>,
    ) -> Result<Token, TransportError> {
        let url = Self::build_url(url, TokenOp::Acquire, &[("renewer", renewer)], auth, proxy_user)?;
        let body = self.send(self.request(Method::GET, url, auth), true)?;
        let url_string = body
            .get("Token")
            .and_then(|t| t.get("urlString"))
            .and_then(|s| s.as_str())
            .ok_or_else(|| TransportError::Malformed("missing Token.urlString".into()))?;
        Token::decode_from_url_string(url_string).map_err(|e| TransportError::Malformed(e.to_string()))
    }

    fn renew_delegation_token(
        &self,
        url: &str,
        auth: &AuthMaterial,
        token: &AuthenticatedUrlToken,
        proxy_user: Option<&str>,
    ) -> Result<i64, TransportError> {
        let t = Self::token_param(token)?;
        let url = Self::build_url(url, TokenOp::Renew, &[("token", t.as_str())], auth, proxy_user)?;
        let body = self.send(self.request(Method::PUT, url, auth), true)?;
        body.get("long")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| TransportError::Malformed("missing 'long' expiry".into()))
    }

    fn cancel_delegation_token(
        &self,
        url: &str,
        auth: &AuthMaterial,
        token: &AuthenticatedUrlToken,
        proxy_user: Option<&str>,
    ) -> Result<(), TransportError> {
        let t = Self::token_param(token)?;
        let url = Self::build_url(url, TokenOp::Cancel, &[("token", t.as_str())], auth, proxy_user)?;
        self.send(self.request(Method::PUT, url, auth), false).map(|_| ())
    }
}

// Prefer the server's RemoteException message over the bare status line.
fn remote_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("RemoteException").and_then(|r| r.get("message")).and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string())
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(120) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
