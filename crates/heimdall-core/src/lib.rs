//! Shared primitives for heimdall credential presentations.
//!
//! Everything that crosses a circuit boundary is a BN254 scalar field element.
//! Hashing and signing are consumed through the [`FieldHasher`] and
//! [`ChallengeSigner`] traits so callers can plug in circuit-compatible
//! implementations.

pub mod crypto;
pub mod eddsa;
pub mod error;
pub mod field;
pub mod traits;
pub mod types;

pub use crypto::*;
pub use eddsa::*;
pub use error::*;
pub use field::*;
pub use traits::*;
pub use types::*;
