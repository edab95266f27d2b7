//! JWT tokens, roles, and credential hashing.
//!
//! The core consumes an "authenticated identity with role"; this crate
//! is that narrow interface. Access and refresh tokens are HS256 JWTs,
//! passwords hash with Argon2, and [`Role`] gates the admin surface.
mod claims;
mod credentials;
mod crypto;
mod error;
mod role;

pub use claims::*;
pub use credentials::*;
pub use crypto::*;
pub use error::*;
pub use role::*;
