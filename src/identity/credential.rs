//! Credential material behind an identity and the refresh step that must run
//! before every network call.
//!
//! Kerberos negotiation itself lives behind [`TicketSource`]; this module only
//! decides *when* to log in again and serializes that decision so concurrent
//! calls for the same identity never race on the shared ticket.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{AuthError, AuthResult, BoxError};

/// How a request proves who it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMaterial {
    /// Value for the `Authorization` header, e.g. `Negotiate <token>`.
    Header(String),
    /// Pseudo authentication: the user name is sent as `user.name`.
    Simple(String),
    Anonymous,
}

pub trait Credential: Send + Sync {
    /// Principal this credential authenticates.
    fn principal(&self) -> &str;

    /// Validate the held credential and re-acquire it if stale or close to
    /// expiry. Must be safe to call from several threads at once.
    fn check_and_relogin(&self) -> AuthResult<()>;

    /// Material to attach to an outgoing request.
    fn auth_material(&self) -> AuthResult<AuthMaterial>;
}

/// Credential that never expires: a fixed header, a simple user name, or nothing.
#[derive(Debug, Clone)]
pub struct StaticCredential {
    principal: String,
    material: AuthMaterial,
}

impl StaticCredential {
    pub fn header<P: Into<String>, H: Into<String>>(principal: P, header: H) -> Self {
        Self { principal: principal.into(), material: AuthMaterial::Header(header.into()) }
    }

    pub fn simple<P: Into<String>>(principal: P) -> Self {
        let principal = principal.into();
        Self { material: AuthMaterial::Simple(principal.clone()), principal }
    }

    pub fn anonymous<P: Into<String>>(principal: P) -> Self {
        Self { principal: principal.into(), material: AuthMaterial::Anonymous }
    }
}

impl Credential for StaticCredential {
    fn principal(&self) -> &str { &self.principal }

    fn check_and_relogin(&self) -> AuthResult<()> { Ok(()) }

    fn auth_material(&self) -> AuthResult<AuthMaterial> { Ok(self.material.clone()) }
}

/// A ticket obtained from a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Negotiation token presented to the service.
    pub token: String,
}

impl Ticket {
    /// Point after which the ticket is refreshed: 80% of its lifetime.
    pub fn refresh_time(&self) -> DateTime<Utc> {
        let lifetime = self.end - self.start;
        self.start + lifetime * 4 / 5
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool { now < self.end }
}

/// External login facility (keytab, password, ticket cache...).
pub trait TicketSource: Send + Sync {
    fn login(&self, principal: &str) -> Result<Ticket, BoxError>;
}

impl<F> TicketSource for F
where
    F: Fn(&str) -> Result<Ticket, BoxError> + Send + Sync,
{
    fn login(&self, principal: &str) -> Result<Ticket, BoxError> { self(principal) }
}

#[derive(Debug, Default)]
struct TicketState {
    ticket: Option<Ticket>,
    last_login: Option<DateTime<Utc>>,
}

pub const DEFAULT_MIN_RELOGIN_INTERVAL_SECS: i64 = 60;

/// Ticket-backed credential that logs in again from its source when needed.
pub struct KeytabCredential<S: TicketSource> {
    principal: String,
    source: S,
    min_relogin_interval: Duration,
    state: Mutex<TicketState>,
}

impl<S: TicketSource> KeytabCredential<S> {
    pub fn new<P: Into<String>>(principal: P, source: S) -> Self {
        Self {
            principal: principal.into(),
            source,
            min_relogin_interval: Duration::seconds(DEFAULT_MIN_RELOGIN_INTERVAL_SECS),
            state: Mutex::new(TicketState::default()),
        }
    }

    pub fn with_min_relogin_interval(mut self, interval: Duration) -> Self {
        self.min_relogin_interval = interval;
        self
    }

    pub fn current_ticket(&self) -> Option<Ticket> { self.state.lock().ticket.clone() }

    /// Refresh decision evaluated at `now`. Returns whether a login happened.
    pub fn check_and_relogin_at(&self, now: DateTime<Utc>) -> AuthResult<bool> {
        // Held across the login so a second caller sees the fresh ticket.
        let mut state = self.state.lock();
        if let Some(t) = &state.ticket {
            if now < t.refresh_time() {
                return Ok(false);
            }
            let too_soon = state.last_login.is_some_and(|at| now - at < self.min_relogin_interval);
            if too_soon && t.is_valid_at(now) {
                debug!(target: "adl_auth::identity", "skipping relogin for {}: last login too recent", self.principal);
                return Ok(false);
            }
        }
        info!(target: "adl_auth::identity", "logging in again for {}", self.principal);
        let ticket = self
            .source
            .login(&self.principal)
            .map_err(|e| AuthError::identity_with(self.principal.clone(), "login failed", e))?;
        if !ticket.is_valid_at(now) {
            return Err(AuthError::identity(self.principal.clone(), "login returned an expired ticket"));
        }
        state.ticket = Some(ticket);
        state.last_login = Some(now);
        Ok(true)
    }
}

impl<S: TicketSource> Credential for KeytabCredential<S> {
    fn principal(&self) -> &str { &self.principal }

    fn check_and_relogin(&self) -> AuthResult<()> { self.check_and_relogin_at(Utc::now()).map(|_| ()) }

    fn auth_material(&self) -> AuthResult<AuthMaterial> {
        let state = self.state.lock();
        match &state.ticket {
            Some(t) if t.is_valid_at(Utc::now()) => Ok(AuthMaterial::Header(format!("Negotiate {}", t.token))),
            Some(_) => Err(AuthError::identity(self.principal.clone(), "ticket expired")),
            None => Err(AuthError::identity(self.principal.clone(), "no ticket held")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> { DateTime::from_timestamp(1_700_000_000, 0).unwrap() }

    struct CountingSource {
        logins: AtomicUsize,
        lifetime: Duration,
        base: DateTime<Utc>,
    }

    impl TicketSource for CountingSource {
        fn login(&self, _principal: &str) -> Result<Ticket, BoxError> {
            let n = self.logins.fetch_add(1, Ordering::SeqCst) as i64;
            let start = self.base + Duration::minutes(n * 30);
            Ok(Ticket { start, end: start + self.lifetime, token: format!("tkt-{n}") })
        }
    }

    fn source(lifetime_hours: i64) -> CountingSource {
        CountingSource { logins: AtomicUsize::new(0), lifetime: Duration::hours(lifetime_hours), base: t0() }
    }

    #[test]
    fn first_check_logs_in() {
        let cred = KeytabCredential::new("svc@EXAMPLE.COM", source(10));
        assert!(cred.auth_material().is_err());
        assert!(cred.check_and_relogin_at(t0()).unwrap());
        assert_eq!(cred.current_ticket().unwrap().token, "tkt-0");
    }

    #[test]
    fn fresh_ticket_is_kept_until_eighty_percent() {
        let cred = KeytabCredential::new("svc", source(10));
        cred.check_and_relogin_at(t0()).unwrap();
        assert!(!cred.check_and_relogin_at(t0() + Duration::hours(7)).unwrap());
        assert!(cred.check_and_relogin_at(t0() + Duration::hours(8)).unwrap());
        assert_eq!(cred.source.logins.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn min_interval_only_throttles_valid_tickets() {
        let cred = KeytabCredential::new("svc", source(1)).with_min_relogin_interval(Duration::hours(2));
        cred.check_and_relogin_at(t0()).unwrap();
        // Past refresh point but still valid: throttled.
        assert!(!cred.check_and_relogin_at(t0() + Duration::minutes(50)).unwrap());
        // Expired: must log in regardless of the interval.
        assert!(cred.check_and_relogin_at(t0() + Duration::minutes(61)).unwrap());
    }

    #[test]
    fn login_failure_is_identity_error_with_cause() {
        let failing = |_: &str| -> Result<Ticket, BoxError> { Err("keytab missing".into()) };
        let cred = KeytabCredential::new("svc", failing);
        let err = cred.check_and_relogin_at(t0()).unwrap_err();
        assert_eq!(err.code_str(), "identity_error");
        let cause = std::error::Error::source(&err).unwrap();
        assert_eq!(cause.to_string(), "keytab missing");
    }

    #[test]
    fn concurrent_refresh_logs_in_once() {
        let cred = Arc::new(KeytabCredential::new("svc", source(10)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&cred);
                std::thread::spawn(move || c.check_and_relogin_at(t0()).unwrap())
            })
            .collect();
        let logged_in = handles.into_iter().map(|h| h.join().unwrap()).filter(|b| *b).count();
        assert_eq!(logged_in, 1);
        assert_eq!(cred.source.logins.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn static_credentials_never_refresh() {
        let c = StaticCredential::header("svc", "Negotiate abc");
        c.check_and_relogin().unwrap();
        assert_eq!(c.auth_material().unwrap(), AuthMaterial::Header("Negotiate abc".into()));
        assert_eq!(StaticCredential::simple("bob").auth_material().unwrap(), AuthMaterial::Simple("bob".into()));
    }
}
