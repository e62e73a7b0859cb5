//! Unified error model for token lifecycle and authorization calls.
//! One tagged enum flows through every layer; wrapping variants keep the
//! original failure as their `source()` so nothing is lost across the
//! run-as boundary.

use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Boxed cause carried by variants whose failure comes from a collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The three remote token operations. Used to tag transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenOp {
    Acquire,
    Renew,
    Cancel,
}

impl TokenOp {
    /// Operation name as sent to the token-management service.
    pub fn wire_name(&self) -> &'static str {
        match self {
            TokenOp::Acquire => "GETDELEGATIONTOKEN",
            TokenOp::Renew => "RENEWDELEGATIONTOKEN",
            TokenOp::Cancel => "CANCELDELEGATIONTOKEN",
        }
    }
}

impl Display for TokenOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TokenOp::Acquire => "acquire",
            TokenOp::Renew => "renew",
            TokenOp::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

/// Failure of a single round-trip to the token-management service.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid service url '{url}': {message}")]
    Url { url: String, message: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// True when the server rejected the caller's credentials.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, TransportError::Status { status: 401 | 403, .. })
    }
}

/// Why an authorizer could not be provisioned. Callers only ever see
/// `AuthError::Provisioning`; the cause is kept for diagnostics.
#[derive(Debug, Error)]
pub enum ProvisioningCause {
    #[error("no authorizer registered under this name")]
    NotFound,
    #[error("construction failed")]
    Construction(#[source] Box<AuthError>),
    #[error("initialization failed")]
    Init(#[source] Box<AuthError>),
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Acting or connect identity's credentials could not be validated or refreshed.
    #[error("credential refresh failed for '{user}': {message}")]
    Identity {
        user: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    /// No explicit endpoint configured and the local host name is unknown.
    #[error("cannot resolve token service endpoint")]
    EndpointResolution(#[source] std::io::Error),
    /// Remote token-management call failed.
    #[error("token {op} against {url} failed")]
    Transport {
        op: TokenOp,
        url: String,
        #[source]
        source: TransportError,
    },
    /// Authorizer not registered, or failed to construct/initialize.
    #[error("failed to provision authorizer '{name}'")]
    Provisioning {
        name: String,
        #[source]
        source: ProvisioningCause,
    },
    /// The gate could not determine a decision. Not the same as a denial.
    #[error("authorization could not be determined: {message}")]
    Authorization {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl AuthError {
    pub fn identity<S: Into<String>, M: Into<String>>(user: S, message: M) -> Self {
        AuthError::Identity { user: user.into(), message: message.into(), source: None }
    }

    pub fn identity_with<S: Into<String>, M: Into<String>>(user: S, message: M, source: BoxError) -> Self {
        AuthError::Identity { user: user.into(), message: message.into(), source: Some(source) }
    }

    pub fn transport<U: Into<String>>(op: TokenOp, url: U, source: TransportError) -> Self {
        AuthError::Transport { op, url: url.into(), source }
    }

    pub fn authorization<M: Into<String>>(message: M) -> Self {
        AuthError::Authorization { message: message.into(), source: None }
    }

    pub fn authorization_with<M: Into<String>>(message: M, source: BoxError) -> Self {
        AuthError::Authorization { message: message.into(), source: Some(source) }
    }

    pub fn config<M: Into<String>>(message: M) -> Self { AuthError::Config(message.into()) }

    pub fn invalid_token<M: Into<String>>(message: M) -> Self { AuthError::InvalidToken(message.into()) }

    /// Stable machine-readable code.
    pub fn code_str(&self) -> &'static str {
        match self {
            AuthError::Identity { .. } => "identity_error",
            AuthError::EndpointResolution(_) => "endpoint_resolution_error",
            AuthError::Transport { .. } => "transport_error",
            AuthError::Provisioning { .. } => "provisioning_error",
            AuthError::Authorization { .. } => "authorization_error",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::Config(_) => "config_error",
        }
    }

    /// Whether a renewal facility may reasonably retry the call later.
    /// Only network round-trips are transient; everything else is fatal
    /// until the environment changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthError::Transport { source, .. } => !source.is_auth_rejected(),
            _ => false,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn code_mapping() {
        assert_eq!(AuthError::identity("alice", "no ticket").code_str(), "identity_error");
        assert_eq!(
            AuthError::EndpointResolution(std::io::Error::other("no host")).code_str(),
            "endpoint_resolution_error"
        );
        assert_eq!(
            AuthError::transport(TokenOp::Renew, "http://h", TransportError::Other("x".into())).code_str(),
            "transport_error"
        );
        assert_eq!(
            AuthError::Provisioning { name: "a.B".into(), source: ProvisioningCause::NotFound }.code_str(),
            "provisioning_error"
        );
        assert_eq!(AuthError::authorization("backend down").code_str(), "authorization_error");
        assert_eq!(AuthError::invalid_token("bad").code_str(), "invalid_token");
        assert_eq!(AuthError::config("bad").code_str(), "config_error");
    }

    #[test]
    fn transport_retry_excludes_auth_rejection() {
        let refused = AuthError::transport(TokenOp::Acquire, "u", TransportError::Other("connection refused".into()));
        assert!(refused.is_retryable());
        let rejected = AuthError::transport(
            TokenOp::Acquire,
            "u",
            TransportError::Status { status: 401, message: "Unauthorized".into() },
        );
        assert!(!rejected.is_retryable());
        assert!(!AuthError::identity("bob", "stale").is_retryable());
    }

    #[test]
    fn provisioning_keeps_init_cause() {
        let err = AuthError::Provisioning {
            name: "x.Y".into(),
            source: ProvisioningCause::Init(Box::new(AuthError::authorization("policy backend unreachable"))),
        };
        let cause = err.source().expect("provisioning cause");
        let inner = cause.source().expect("init cause");
        assert!(inner.to_string().contains("policy backend unreachable"));
    }

    #[test]
    fn wire_names() {
        assert_eq!(TokenOp::Acquire.wire_name(), "GETDELEGATIONTOKEN");
        assert_eq!(TokenOp::Renew.wire_name(), "RENEWDELEGATIONTOKEN");
        assert_eq!(TokenOp::Cancel.wire_name(), "CANCELDELEGATIONTOKEN");
        assert_eq!(TokenOp::Cancel.to_string(), "cancel");
    }
}
