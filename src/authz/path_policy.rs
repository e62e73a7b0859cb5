//! Built-in authorizer: per-access glob allow-lists read from configuration.
//!
//! `adl.authorizer.path.policy.<access> = "/data/**;/tmp/*"`; the access
//! `*` applies to every operation. Paths matching no glob are denied.

use std::collections::HashMap;

use regex::Regex;
use tracing::{debug, info};

use super::authorizer::{authorize_each, AccessType, Authorizer};
use crate::config::{Configuration, KEY_PATH_POLICY_PREFIX};
use crate::error::{AuthError, AuthResult};

pub const PATH_POLICY_AUTHORIZER: &str = "adl.authz.PathPolicyAuthorizer";

/// Convert a glob (`*` within a segment, `**` across segments) to an anchored regex.
fn glob_to_regex(pattern: &str) -> AuthResult<Regex> {
    let mut s = regex::escape(pattern);
    s = s.replace("\\*\\*", ".*");
    s = s.replace("\\*", "[^/]*");
    Regex::new(&format!("^{s}$")).map_err(|e| AuthError::config(format!("bad path glob '{pattern}': {e}")))
}

#[derive(Debug, Default)]
pub struct PathPolicyAuthorizer {
    rules: HashMap<AccessType, Vec<Regex>>,
    any: Vec<Regex>,
}

impl PathPolicyAuthorizer {
    pub fn new() -> Self { Self::default() }

    fn allows(&self, access: AccessType, path: &str) -> bool {
        let specific = self.rules.get(&access).into_iter().flatten();
        let hit = specific.chain(self.any.iter()).any(|rx| rx.is_match(path));
        debug!(target: "adl_auth::authz", "path policy {} {} -> {}", access, path, hit);
        hit
    }
}

impl Authorizer for PathPolicyAuthorizer {
    fn init(&mut self, conf: &Configuration) -> AuthResult<()> {
        let mut rules: HashMap<AccessType, Vec<Regex>> = HashMap::new();
        let mut any = Vec::new();
        for (suffix, globs) in conf.with_prefix(KEY_PATH_POLICY_PREFIX) {
            let compiled = globs
                .split(';')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(glob_to_regex)
                .collect::<AuthResult<Vec<_>>>()?;
            if suffix == "*" {
                any.extend(compiled);
            } else {
                rules.entry(suffix.parse::<AccessType>()?).or_default().extend(compiled);
            }
        }
        info!(
            target: "adl_auth::authz",
            "path policy loaded: {} access rules, {} wildcard globs",
            rules.values().map(Vec::len).sum::<usize>(),
            any.len()
        );
        self.rules = rules;
        self.any = any;
        Ok(())
    }

    fn is_authorized(&self, access: AccessType, paths: &[&str]) -> AuthResult<bool> {
        authorize_each(paths, |p| Ok(self.allows(access, p)))
    }
}
