//! Client for the upstream OAuth2 identity provider.
//!
//! This crate provides:
//! - `ProviderConfig`: endpoints, client credentials and the resource to check
//! - `OAuthClient`: authorization URL construction and code exchange
//! - `ApiClient`: user info and resource-membership queries
//! - `IdentityProvider`: the trait the login flow is written against, with
//!   `OAuthProvider` as the production implementation
//!
//! # Authorization model
//!
//! The gateway grants access to exactly one resource. Whether that resource
//! is a workspace or a project is a deployment decision expressed through
//! [`ResourceKind`]; the flow only ever asks "is this caller a member".

pub mod api;
pub mod config;
pub mod error;
pub mod oauth;
pub mod provider;

pub use api::{ApiClient, UserInfo, Workspace};
pub use config::{ProviderConfig, ResourceKind};
pub use error::ProviderError;
pub use oauth::{OAuthClient, TokenSet, new_state_token};
pub use provider::{IdentityProvider, OAuthProvider};
