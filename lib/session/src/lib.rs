//! Session handling for the portcullis gateway.
//!
//! This crate provides:
//! - The `Session` type bound to one browser after a completed login
//! - `SessionCodec`: stateless AES-256-GCM sealed session tokens
//! - `SessionBackend`: the issue/load/revoke seam the server talks to
//! - `SessionStore` and `StoredSessions`: the server-side degraded mode
//!
//! # Session modes
//!
//! The stateless codec is the default. The token *is* the session, so any
//! gateway replica holding the same secret can read it and nothing is lost
//! on restart. The stored mode keeps sessions in an injected `SessionStore`
//! keyed by a random token. It allows revocation on logout, but an in-memory
//! store does not survive restarts and is not shared between replicas.
//!
//! # Example
//!
//! ```
//! use portcullis_core::Identity;
//! use portcullis_session::{Session, SessionCodec, SessionSecret};
//!
//! let secret = SessionSecret::new("a-very-long-session-secret-of-32-bytes").unwrap();
//! let codec = SessionCodec::new(&secret);
//!
//! let identity = Identity::new("u1".into(), "a@b.com".into(), "A".into());
//! let session = Session::new(identity, "upstream-token".into());
//!
//! let token = codec.issue(&session).unwrap();
//! assert_eq!(codec.parse(&token).unwrap(), Some(session));
//! ```

pub mod backend;
pub mod codec;
pub mod error;
pub mod secret;
pub mod session;
pub mod store;

pub use backend::SessionBackend;
pub use codec::SessionCodec;
pub use error::{InvalidReason, SessionError};
pub use secret::{MIN_SECRET_LEN, SessionSecret};
pub use session::{SESSION_DURATION_SECONDS, Session};
pub use store::{MemorySessionStore, SessionStore, StoredSessions};
