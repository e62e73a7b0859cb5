use std::fmt;
use std::sync::Arc;

use super::credential::Credential;

/// A principal plus, when impersonated, the real identity standing behind it.
///
/// The real-user relation is a single level: a proxy identity points at the
/// service identity that authenticates on its behalf, never further.
#[derive(Clone)]
pub struct Identity {
    user_name: String,
    real_user: Option<Arc<Identity>>,
    credential: Arc<dyn Credential>,
}

impl Identity {
    /// An identity that authenticates with its own credential.
    pub fn new<S: Into<String>>(user_name: S, credential: Arc<dyn Credential>) -> Self {
        Self { user_name: user_name.into(), real_user: None, credential }
    }

    /// An identity that `real` acts on behalf of. The proxy has no credential
    /// of its own; calls authenticate as `real`.
    pub fn proxy_for<S: Into<String>>(user_name: S, real: Arc<Identity>) -> Self {
        let real = match &real.real_user {
            Some(inner) => Arc::clone(inner),
            None => real,
        };
        let credential = Arc::clone(&real.credential);
        Self { user_name: user_name.into(), real_user: Some(real), credential }
    }

    /// Full principal name, e.g. `svc/host.example.com@EXAMPLE.COM`.
    pub fn user_name(&self) -> &str { &self.user_name }

    /// Principal with host and realm components stripped.
    pub fn short_name(&self) -> &str {
        let no_realm = self.user_name.split('@').next().unwrap_or(&self.user_name);
        no_realm.split('/').next().unwrap_or(no_realm)
    }

    pub fn real_user(&self) -> Option<&Arc<Identity>> { self.real_user.as_ref() }

    pub fn credential(&self) -> &Arc<dyn Credential> { &self.credential }
}

// Identities compare by full principal (and real user), never by short name.
impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.user_name == other.user_name && self.real_user == other.real_user
    }
}

impl Eq for Identity {}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_name", &self.user_name)
            .field("real_user", &self.real_user.as_ref().map(|r| r.user_name()))
            .finish()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.real_user {
            Some(real) => write!(f, "{} (via {})", self.user_name, real.user_name),
            None => f.write_str(&self.user_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticCredential;

    fn ident(name: &str) -> Identity {
        Identity::new(name, Arc::new(StaticCredential::simple(name)))
    }

    #[test]
    fn short_name_strips_host_and_realm() {
        assert_eq!(ident("svc/host.example.com@EXAMPLE.COM").short_name(), "svc");
        assert_eq!(ident("alice@EXAMPLE.COM").short_name(), "alice");
        assert_eq!(ident("bob").short_name(), "bob");
    }

    #[test]
    fn same_short_name_is_still_distinct() {
        assert_ne!(ident("alice@A.COM"), ident("alice@B.COM"));
        assert_eq!(ident("alice@A.COM"), ident("alice@A.COM"));
    }

    #[test]
    fn proxy_shares_real_credential_and_flattens_chain() {
        let svc = Arc::new(ident("svc@EXAMPLE.COM"));
        let alice = Arc::new(Identity::proxy_for("alice", Arc::clone(&svc)));
        assert!(Arc::ptr_eq(alice.credential(), svc.credential()));

        let carol = Identity::proxy_for("carol", Arc::clone(&alice));
        assert_eq!(carol.real_user().map(|r| r.user_name()), Some("svc@EXAMPLE.COM"));
        assert_eq!(carol.to_string(), "carol (via svc@EXAMPLE.COM)");
    }
}
