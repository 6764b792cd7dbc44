use crate::crypto::{
	secp256k1::{Point, Scalar},
	SCALAR_SIZE,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The 32-byte message digest being signed
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Hash, Eq)]
pub struct SigningPayload(pub [u8; 32]);

impl std::fmt::Display for SigningPayload {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", hex::encode(self.0))
	}
}

impl AsRef<[u8]> for SigningPayload {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

/// One signer's response `s_i = e_i * x_i + k_i`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PartialSignature {
	pub(crate) response: Scalar,
}

impl PartialSignature {
	pub fn to_bytes(&self) -> [u8; 32] {
		*self.response.as_bytes()
	}

	/// Fails if the encoding overflows the group order
	pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
		Scalar::from_bytes_checked(bytes).map(|response| PartialSignature { response })
	}
}

/// The combined response scalar and the nonce commitment point, which is
/// always normalized so that its Y coordinate is a square
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSignature {
	pub s: Scalar,
	pub r: Point,
}

impl AggregateSignature {
	// An aggregate signature is a raw set of 64 bytes: the first 32 are
	// s, the next 32 are the X coordinate of R. The Y coordinate of R is
	// recoverable from X because of the square-Y convention.
	pub fn to_raw(&self) -> [u8; 64] {
		let mut result: [u8; 64] = [0; 64];
		result[..SCALAR_SIZE].copy_from_slice(self.s.as_bytes());
		result[SCALAR_SIZE..].copy_from_slice(&self.r.x_bytes());
		result
	}

	/// Parse a 64-byte signature, reconstructing R from its X coordinate.
	/// Fails on scalar overflow or if X does not belong to a curve point.
	pub fn from_raw(raw: &[u8; 64]) -> Option<Self> {
		let s_bytes: &[u8; 32] = raw[..SCALAR_SIZE].try_into().expect("correct size");
		let x_bytes: &[u8; 32] = raw[SCALAR_SIZE..].try_into().expect("correct size");

		let s = Scalar::from_bytes_checked(s_bytes)?;
		let r = Point::from_x_with_square_y(x_bytes)?;

		Some(AggregateSignature { s, r })
	}
}

impl std::fmt::Display for AggregateSignature {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", hex::encode(self.to_raw()))
	}
}

/// Shared prehash over the full signing context: every public key in list
/// order, the aggregate nonce point (with the square-Y convention already
/// applied by the caller), and the payload, all points compressed.
/// Computed once per session and shared by every per-signer challenge.
pub(crate) fn build_prehash(
	pubkeys: &[Point],
	nonce_commitment: Point,
	payload: &SigningPayload,
) -> [u8; 32] {
	let mut hasher = Sha256::new();

	// This needs to be processed in list order!
	for pubkey in pubkeys {
		hasher.update(pubkey.as_bytes());
	}
	hasher.update(nonce_commitment.as_bytes());
	hasher.update(payload.0);

	hasher.finalize().into()
}

/// Per-signer challenge `e_i`, binding each response to the signer's
/// position in the key list. The index is hashed as a little-endian
/// base-128 sequence, which is empty for index 0 and grows by one byte
/// every factor of 128. Fails (rather than reducing) if the digest
/// overflows the group order, which is cryptographically unreachable.
pub(crate) fn build_challenge(prehash: &[u8; 32], signer_index: usize) -> Option<Scalar> {
	let mut hasher = Sha256::new();

	let mut index = signer_index;
	while index > 0 {
		hasher.update([(index & 0x7f) as u8]);
		index >>= 7;
	}
	hasher.update(prehash);

	Scalar::from_bytes_checked(&hasher.finalize().into())
}

/// Build the challenge response using our secret key and nonce share
pub(crate) fn build_response(challenge: Scalar, secret_key: &Scalar, nonce: &Scalar) -> Scalar {
	challenge * secret_key + nonce
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::crypto::Rng;
	use rand::SeedableRng;

	fn challenge_over(bytes: &[u8]) -> Scalar {
		Scalar::from_bytes_checked(&Sha256::digest(bytes).into())
			.expect("test digests stay below the group order")
	}

	#[test]
	fn index_zero_hashes_the_bare_prehash() {
		// The base-128 encoding of index 0 is empty, so the challenge
		// is just the hash of the prehash
		let prehash = Sha256::digest(b"prehash").into();

		assert_eq!(build_challenge(&prehash, 0).unwrap(), challenge_over(&prehash));
	}

	#[test]
	fn index_encoding_is_little_endian_base_128() {
		let prehash: [u8; 32] = Sha256::digest(b"prehash").into();

		let prefixed = |prefix: &[u8]| {
			let mut bytes = prefix.to_vec();
			bytes.extend_from_slice(&prehash);
			challenge_over(&bytes)
		};

		assert_eq!(build_challenge(&prehash, 1).unwrap(), prefixed(&[1]));
		assert_eq!(build_challenge(&prehash, 127).unwrap(), prefixed(&[127]));
		// 128 = 0 + 1 * 128
		assert_eq!(build_challenge(&prehash, 128).unwrap(), prefixed(&[0, 1]));
		// 300 = 44 + 2 * 128
		assert_eq!(build_challenge(&prehash, 300).unwrap(), prefixed(&[44, 2]));
	}

	#[test]
	fn partial_signature_codec_round_trip() {
		let mut rng = Rng::from_seed([4; 32]);

		let partial = PartialSignature { response: Scalar::random(&mut rng) };
		assert_eq!(PartialSignature::from_bytes(&partial.to_bytes()).unwrap(), partial);

		// An encoding past the group order must not parse
		assert!(PartialSignature::from_bytes(&[0xFF; 32]).is_none());
	}

	#[test]
	fn aggregate_signature_codec_round_trip() {
		let mut rng = Rng::from_seed([5; 32]);

		let s = Scalar::random(&mut rng);
		let r = {
			let r = Point::random(&mut rng);
			if r.has_square_y() {
				r
			} else {
				r.negate()
			}
		};

		let signature = AggregateSignature { s, r };
		assert_eq!(AggregateSignature::from_raw(&signature.to_raw()).unwrap(), signature);
	}
}
