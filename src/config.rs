//! Key/value configuration consumed by the token and authorization layers.
//! Values are plain strings; typed accessors parse on read so that a
//! long-lived process sees edits between calls.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Explicit base URL of the credential service, e.g. `http://creds.local:50911`.
pub const KEY_CRED_SERVICE_URL: &str = "adl.feature.override.cred.service.url";
/// Registered name of the external authorizer to install.
pub const KEY_EXTERNAL_AUTHORIZATION_CLASS: &str = "adl.external.authorization.class";
/// Transport timeout for token-management calls.
pub const KEY_CRED_SERVICE_TIMEOUT_MS: &str = "adl.cred.service.timeout.ms";
/// Prefix for per-access glob lists read by the path-policy authorizer.
pub const KEY_PATH_POLICY_PREFIX: &str = "adl.authorizer.path.policy.";

pub const DEFAULT_CRED_SERVICE_PORT: u16 = 50911;
pub const DEFAULT_DELEGATION_MANAGER_ENDPOINT: &str = "/tokenmanager/v1";
pub const DEFAULT_CRED_SERVICE_TIMEOUT_MS: u64 = 60_000;

/// Environment variables that override individual keys.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("ADL_CRED_SERVICE_URL", KEY_CRED_SERVICE_URL),
    ("ADL_EXTERNAL_AUTHORIZATION_CLASS", KEY_EXTERNAL_AUTHORIZATION_CLASS),
    ("ADL_CRED_SERVICE_TIMEOUT_MS", KEY_CRED_SERVICE_TIMEOUT_MS),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Configuration {
    entries: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str()).filter(|s| !s.trim().is_empty())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> AuthResult<u64> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map_err(|e| AuthError::config(format!("{key}='{v}' is not an unsigned integer: {e}"))),
        }
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Keys starting with `prefix`, with the prefix stripped.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.entries
            .iter()
            .filter_map(move |(k, v)| k.strip_prefix(prefix).map(|rest| (rest, v.as_str())))
    }

    /// Layer `other` on top of `self`; keys present in `other` win.
    pub fn overlay(&self, other: &Configuration) -> Configuration {
        let mut out = self.clone();
        for (k, v) in other.entries.iter() {
            out.entries.insert(k.clone(), v.clone());
        }
        out
    }

    /// Load a flat JSON object of string (or scalar) values.
    pub fn load_json(path: &Path) -> AuthResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AuthError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> AuthResult<Self> {
        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(text).map_err(|e| AuthError::config(format!("invalid configuration json: {e}")))?;
        let mut conf = Configuration::new();
        for (k, v) in raw {
            let s = match v {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null => continue,
                other => return Err(AuthError::config(format!("{k}: expected a scalar, got {other}"))),
            };
            conf.entries.insert(k, s);
        }
        Ok(conf)
    }

    /// Apply `ADL_*` environment overrides for the keys this crate reads.
    pub fn with_env_overrides(mut self) -> Self {
        for (var, key) in ENV_OVERRIDES {
            if let Ok(v) = std::env::var(var) {
                self.entries.insert((*key).to_string(), v);
            }
        }
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut conf = Configuration::new();
        for (k, v) in iter {
            conf.entries.insert(k.into(), v.into());
        }
        conf
    }
}
