use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::error::{AuthError, AuthResult};

/// Storage operation being authorized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Read,
    Write,
    Create,
    Append,
    Delete,
    Rename,
    List,
    Mkdirs,
    SetPermission,
    SetOwner,
    ModifyAcl,
}

impl AccessType {
    pub const ALL: [AccessType; 11] = [
        AccessType::Read,
        AccessType::Write,
        AccessType::Create,
        AccessType::Append,
        AccessType::Delete,
        AccessType::Rename,
        AccessType::List,
        AccessType::Mkdirs,
        AccessType::SetPermission,
        AccessType::SetOwner,
        AccessType::ModifyAcl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Read => "read",
            AccessType::Write => "write",
            AccessType::Create => "create",
            AccessType::Append => "append",
            AccessType::Delete => "delete",
            AccessType::Rename => "rename",
            AccessType::List => "list",
            AccessType::Mkdirs => "mkdirs",
            AccessType::SetPermission => "set_permission",
            AccessType::SetOwner => "set_owner",
            AccessType::ModifyAcl => "modify_acl",
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for AccessType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace('-', "_");
        AccessType::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == norm)
            .ok_or_else(|| AuthError::config(format!("unknown access type '{s}'")))
    }
}

/// Pluggable gate consulted before sensitive storage operations.
///
/// `init` runs exactly once, before any `is_authorized`. After that the
/// instance is shared across callers, so `is_authorized` takes `&self`.
pub trait Authorizer: Send + Sync {
    fn init(&mut self, conf: &Configuration) -> AuthResult<()>;

    /// True only if every path is authorized for `access`. `Ok(false)` is a
    /// denial; an error means no decision could be made.
    fn is_authorized(&self, access: AccessType, paths: &[&str]) -> AuthResult<bool>;
}

/// AND over `paths` with a per-path check, in order, stopping at the first
/// denial or error. An empty path set is denied.
pub fn authorize_each<F>(paths: &[&str], mut check: F) -> AuthResult<bool>
where
    F: FnMut(&str) -> AuthResult<bool>,
{
    if paths.is_empty() {
        return Ok(false);
    }
    for p in paths {
        if !check(p)? {
            return Ok(false);
        }
    }
    Ok(true)
}
