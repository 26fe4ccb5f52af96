//! Core types shared across the portcullis authentication gateway.
//!
//! This crate provides the foundational pieces every other crate depends on:
//! the `Result` alias used for layered error reporting, the verified
//! [`Identity`] that the gate attaches to a request, and the redirect-target
//! safety check used by the login flow.

pub mod error;
pub mod identity;
pub mod redirect;

pub use error::Result;
pub use identity::Identity;
pub use redirect::{DEFAULT_REDIRECT, is_safe_redirect, safe_redirect_or_default};
