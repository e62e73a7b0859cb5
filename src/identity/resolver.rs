use std::sync::Arc;

use tracing::debug;

use super::principal::Identity;
use crate::error::AuthResult;

/// Who performs the network call, and on whose behalf.
#[derive(Debug, Clone)]
pub struct ConnectIdentity {
    pub identity: Arc<Identity>,
    /// Short name of the impersonated caller; `None` when not impersonating.
    pub proxy_user: Option<String>,
}

/// Pick the identity that connects for `acting` and make sure its credential
/// is usable before returning.
///
/// An impersonated caller connects as its real user and is named as the proxy
/// user; anyone else connects as themselves. A refresh failure is returned
/// here rather than surfacing later as an opaque network error.
pub fn resolve_connect_context(acting: &Arc<Identity>) -> AuthResult<ConnectIdentity> {
    let (identity, proxy_user) = match acting.real_user() {
        Some(real) => (Arc::clone(real), Some(acting.short_name().to_string())),
        None => (Arc::clone(acting), None),
    };
    identity.credential().check_and_relogin()?;
    debug!(
        target: "adl_auth::identity",
        "connect as {} proxy_user={:?}",
        identity.user_name(),
        proxy_user
    );
    Ok(ConnectIdentity { identity, proxy_user })
}
