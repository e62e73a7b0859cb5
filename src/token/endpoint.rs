use std::net::IpAddr;

use tracing::debug;

use crate::config::{Configuration, DEFAULT_CRED_SERVICE_PORT, DEFAULT_DELEGATION_MANAGER_ENDPOINT, KEY_CRED_SERVICE_URL};
use crate::error::{AuthError, AuthResult};

/// Source of the local host name used for the default endpoint.
pub type HostLookup = fn() -> std::io::Result<String>;

fn normalize_host(name: &str) -> String { name.trim().trim_end_matches('.').to_ascii_lowercase() }

/// Fully qualified name of `host`: forward lookup, then reverse lookup of the
/// first address. Falls back to `host` when either lookup yields nothing
/// better, so a node without reverse DNS still gets an endpoint.
fn canonical_name(host: &str) -> String {
    let resolved = dns_lookup::lookup_host(host)
        .ok()
        .and_then(|addrs| addrs.into_iter().next())
        .and_then(|addr| dns_lookup::lookup_addr(&addr).ok())
        .map(|name| normalize_host(&name))
        .filter(|name| !name.is_empty() && name.parse::<IpAddr>().is_err());
    match resolved {
        Some(name) => name,
        None => {
            debug!(target: "adl_auth::token", "no canonical name for {}, using it as is", host);
            host.to_string()
        }
    }
}

fn canonical_local_host() -> std::io::Result<String> {
    let host = normalize_host(&whoami::fallible::hostname()?);
    if host.is_empty() {
        return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "local host name is empty"));
    }
    Ok(canonical_name(&host))
}

/// Computes the token-management URL. Resolved on every call; configuration
/// can change under a long-lived process.
#[derive(Debug, Clone, Copy)]
pub struct EndpointResolver {
    local_host: HostLookup,
}

impl Default for EndpointResolver {
    fn default() -> Self { Self { local_host: canonical_local_host } }
}

impl EndpointResolver {
    pub fn with_host_lookup(local_host: HostLookup) -> Self { Self { local_host } }

    /// `<base>/tokenmanager/v1`, where base is the configured URL or
    /// `http://<local-host>:50911`. The host is only looked up when no base
    /// is configured.
    pub fn resolve_service_url(&self, conf: &Configuration) -> AuthResult<String> {
        let base = match conf.get(KEY_CRED_SERVICE_URL) {
            Some(explicit) => explicit.to_string(),
            None => {
                let host = (self.local_host)().map_err(AuthError::EndpointResolution)?;
                format!("http://{host}:{DEFAULT_CRED_SERVICE_PORT}")
            }
        };
        Ok(format!("{base}{DEFAULT_DELEGATION_MANAGER_ENDPOINT}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broken() -> std::io::Result<String> { Err(std::io::Error::other("resolver unavailable")) }
    fn fixed() -> std::io::Result<String> { Ok("node7.example.com".into()) }

    #[test]
    fn explicit_base_wins_and_skips_lookup() {
        let conf: Configuration = [(KEY_CRED_SERVICE_URL, "https://creds.example.com:8443")].into_iter().collect();
        let url = EndpointResolver::with_host_lookup(broken).resolve_service_url(&conf).unwrap();
        assert_eq!(url, "https://creds.example.com:8443/tokenmanager/v1");
    }

    #[test]
    fn default_uses_local_host_and_port() {
        let url = EndpointResolver::with_host_lookup(fixed).resolve_service_url(&Configuration::new()).unwrap();
        assert_eq!(url, "http://node7.example.com:50911/tokenmanager/v1");
    }

    #[test]
    fn canonical_name_falls_back_to_plain_host() {
        assert_eq!(canonical_name("no-such-node.invalid"), "no-such-node.invalid");
    }

    #[test]
    fn canonical_name_resolves_loopback() {
        let name = canonical_name("localhost");
        assert!(!name.is_empty());
        assert_eq!(name, name.to_ascii_lowercase());
        assert!(name.parse::<IpAddr>().is_err());
    }

    #[test]
    fn default_lookup_yields_a_usable_host() {
        let url = EndpointResolver::default().resolve_service_url(&Configuration::new()).unwrap();
        let host = url.strip_prefix("http://").and_then(|r| r.strip_suffix(":50911/tokenmanager/v1")).unwrap();
        assert!(!host.is_empty() && !host.contains(char::is_whitespace));
        assert_eq!(host, host.to_ascii_lowercase());
    }

    #[test]
    fn unknown_host_is_resolution_error() {
        let err = EndpointResolver::with_host_lookup(broken).resolve_service_url(&Configuration::new()).unwrap_err();
        assert!(matches!(err, AuthError::EndpointResolution(_)));
    }
}
