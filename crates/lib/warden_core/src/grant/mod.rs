//! OAuth2/OIDC grant-artifact storage.
//!
//! The protocol engine decides when artifacts are issued or consumed; this
//! module only stores, fetches and invalidates them.

pub mod hasher;
pub mod kind;
pub mod record;
pub mod revocation;
pub mod store;

pub use kind::TokenKind;
pub use record::{GrantRequest, GrantSession, SessionPayload, TokenRecord};
