//! Scoped "run as" for outgoing calls.
//!
//! The security context is an explicit value handed to the operation, not
//! ambient thread state. The tracing span entered here is the only scoped
//! effect and is exited on every return path, including unwinding.

use tracing::debug_span;
use uuid::Uuid;

use super::credential::AuthMaterial;
use super::principal::Identity;
use crate::error::AuthResult;

/// Credentials an operation runs under.
#[derive(Debug)]
pub struct SecurityContext<'a> {
    identity: &'a Identity,
    call_id: Uuid,
}

impl<'a> SecurityContext<'a> {
    pub fn identity(&self) -> &'a Identity { self.identity }

    pub fn call_id(&self) -> Uuid { self.call_id }

    /// Material to authenticate the outgoing request as this context's identity.
    pub fn auth_material(&self) -> AuthResult<AuthMaterial> { self.identity.credential().auth_material() }
}

/// Run `op` with `identity`'s credentials.
pub fn run_as<T, F>(identity: &Identity, proxy_user: Option<&str>, op: F) -> AuthResult<T>
where
    F: FnOnce(&SecurityContext<'_>) -> AuthResult<T>,
{
    let call_id = Uuid::new_v4();
    let span = debug_span!(
        target: "adl_auth::identity",
        "run_as",
        user = identity.user_name(),
        proxy_user = proxy_user.unwrap_or("-"),
        %call_id
    );
    let _entered = span.enter();
    let ctx = SecurityContext { identity, call_id };
    op(&ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::identity::StaticCredential;
    use std::sync::Arc;

    #[test]
    fn operation_sees_connect_identity() {
        let svc = Identity::new("svc@EXAMPLE.COM", Arc::new(StaticCredential::header("svc", "Negotiate t")));
        let seen = run_as(&svc, Some("alice"), |ctx| {
            Ok((ctx.identity().user_name().to_string(), ctx.auth_material()?))
        })
        .unwrap();
        assert_eq!(seen.0, "svc@EXAMPLE.COM");
        assert_eq!(seen.1, AuthMaterial::Header("Negotiate t".into()));
    }

    #[test]
    fn errors_pass_through_untouched() {
        let svc = Identity::new("svc", Arc::new(StaticCredential::simple("svc")));
        let err = run_as::<(), _>(&svc, None, |_| Err(AuthError::invalid_token("bad bytes"))).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(ref m) if m == "bad bytes"));
    }

    #[test]
    fn each_call_gets_its_own_id() {
        let svc = Identity::new("svc", Arc::new(StaticCredential::simple("svc")));
        let a = run_as(&svc, None, |ctx| Ok(ctx.call_id())).unwrap();
        let b = run_as(&svc, None, |ctx| Ok(ctx.call_id())).unwrap();
        assert_ne!(a, b);
    }
}
