//! Delegation-token lifecycle: model, endpoint, transport, orchestration and
//! the renewal-facility shim.

mod model;
mod endpoint;
mod client;
mod coordinator;
mod renewer;

pub use model::{Token, TokenIdentifier, TokenKind, DELEGATION_TOKEN_KIND};
pub use endpoint::{EndpointResolver, HostLookup};
pub use client::{
    AuthenticatedTokenClient, AuthenticatedUrlToken, ConnectContext, HttpTokenTransport, TokenTransport,
};
pub use coordinator::TokenLifecycleCoordinator;
pub use renewer::{DelegationTokenRenewer, RenewerRegistry, TokenRenewer};
