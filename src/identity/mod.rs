//! Identities, their credentials, and the rules for who connects on whose behalf.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod credential;
mod provider;
mod resolver;
mod run_as;

pub use principal::Identity;
pub use credential::{
    AuthMaterial, Credential, KeytabCredential, StaticCredential, Ticket, TicketSource,
    DEFAULT_MIN_RELOGIN_INTERVAL_SECS,
};
pub use provider::{IdentityProvider, StaticIdentityProvider};
pub use resolver::{resolve_connect_context, ConnectIdentity};
pub use run_as::{run_as, SecurityContext};
