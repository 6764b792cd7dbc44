#[macro_use]
mod helpers;
pub mod secp256k1;

/// Size of a compressed point and a scalar on the wire. Useful for
/// computing offsets into serialized signatures.
pub const POINT_SIZE: usize = 33;
pub const SCALAR_SIZE: usize = 32;

// Ideally, we want to use a concrete implementation (like ChaCha20) instead of StdRng
// to prevent it from potentially changing from under us
pub type Rng = rand::rngs::StdRng;
