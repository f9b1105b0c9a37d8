//! Credentials and bearer tokens.
//!
//! - [`token`]: HS256 JWT issuance and verification
//! - [`password`]: bcrypt hashing, executed on the blocking thread pool
//!
//! The request-side extractors that enforce authentication live in
//! [`crate::middleware::auth`].

pub mod password;
pub mod token;

pub use token::{Claims, TokenError, TokenService};
