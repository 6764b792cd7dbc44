//! n-of-n aggregate Schnorr signing over secp256k1.
//!
//! Each of n cosigners holds a private key; together they produce a single
//! 64-byte signature over a 32-byte payload that verifies against the ordered
//! list of their public keys. The signature is the same size regardless of n.
pub use crypto::{
	secp256k1::{Point, Scalar},
	Rng,
};

pub use session::{NonceProgress, SigningError, SigningSession};
pub use signing::{AggregateSignature, PartialSignature, SigningPayload};
pub use verify::verify_aggregate;

/// Provides the cryptographic primitives used by the signing session
mod crypto;
/// Signing session state machine
mod session;
/// Challenge construction and signature types
mod signing;
/// Stateless verification of aggregate signatures
mod verify;
