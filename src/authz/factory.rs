//! Named construction of the configured authorizer.
//!
//! A registry maps the configured name to a no-argument constructor. The
//! process-wide registry is seeded with the built-in authorizers; hosts add
//! their own with [`register_authorizer`] before the filesystem client starts.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::info;

use super::authorizer::Authorizer;
use super::path_policy::{PathPolicyAuthorizer, PATH_POLICY_AUTHORIZER};
use crate::config::{Configuration, KEY_EXTERNAL_AUTHORIZATION_CLASS};
use crate::error::{AuthError, AuthResult, ProvisioningCause};

pub type AuthorizerCtor = fn() -> AuthResult<Box<dyn Authorizer>>;

#[derive(Clone, Default)]
pub struct AuthorizerRegistry {
    ctors: HashMap<String, AuthorizerCtor>,
}

impl AuthorizerRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(PATH_POLICY_AUTHORIZER, path_policy_ctor);
        reg
    }

    pub fn register<S: Into<String>>(&mut self, name: S, ctor: AuthorizerCtor) -> &mut Self {
        self.ctors.insert(name.into(), ctor);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<AuthorizerCtor> { self.ctors.get(name).copied() }

    /// Build and initialize the authorizer named in `conf`, or `None` when no
    /// name is configured. Every failure is a single `Provisioning` error.
    pub fn create(&self, conf: &Configuration) -> AuthResult<Option<Arc<dyn Authorizer>>> {
        let Some(name) = configured_name(conf) else { return Ok(None) };
        provision(name, self.lookup(name), conf).map(Some)
    }
}

fn path_policy_ctor() -> AuthResult<Box<dyn Authorizer>> { Ok(Box::new(PathPolicyAuthorizer::new())) }

fn configured_name(conf: &Configuration) -> Option<&str> {
    conf.get(KEY_EXTERNAL_AUTHORIZATION_CLASS).map(str::trim)
}

fn provision(name: &str, ctor: Option<AuthorizerCtor>, conf: &Configuration) -> AuthResult<Arc<dyn Authorizer>> {
    let fail = |source| AuthError::Provisioning { name: name.to_string(), source };
    let ctor = ctor.ok_or_else(|| fail(ProvisioningCause::NotFound))?;
    let mut auth = ctor().map_err(|e| fail(ProvisioningCause::Construction(Box::new(e))))?;
    auth.init(conf).map_err(|e| fail(ProvisioningCause::Init(Box::new(e))))?;
    info!(target: "adl_auth::authz", "authorizer '{}' installed", name);
    Ok(Arc::from(auth))
}

static GLOBAL: Lazy<RwLock<AuthorizerRegistry>> = Lazy::new(|| RwLock::new(AuthorizerRegistry::with_builtins()));

/// Make `name` constructible through [`create_authorizer`].
pub fn register_authorizer<S: Into<String>>(name: S, ctor: AuthorizerCtor) {
    GLOBAL.write().register(name, ctor);
}

/// [`AuthorizerRegistry::create`] against the process-wide registry.
pub fn create_authorizer(conf: &Configuration) -> AuthResult<Option<Arc<dyn Authorizer>>> {
    let Some(name) = configured_name(conf) else { return Ok(None) };
    // Copy the constructor out so init runs without the registry lock held.
    let ctor = GLOBAL.read().lookup(name);
    provision(name, ctor, conf).map(Some)
}
