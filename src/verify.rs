use anyhow::anyhow;

use crate::{
	crypto::secp256k1::{Point, Scalar},
	signing::{build_challenge, build_prehash, AggregateSignature, SigningPayload},
};

/// The verification equation is evaluated as multi-scalar products of
/// bounded width, so scratch space stays fixed as the signer count grows.
const MULTI_EXP_BATCH_WIDTH: usize = 32;

/// Verify a 64-byte aggregate signature over `payload` against the ordered
/// list of cosigner public keys. Stateless: no session is involved. The
/// error is deliberately opaque and reveals nothing about *why* a
/// signature failed to verify.
pub fn verify_aggregate(
	signature: &[u8; 64],
	payload: &SigningPayload,
	pubkeys: &[Point],
) -> anyhow::Result<()> {
	if is_valid_aggregate(signature, payload, pubkeys) {
		Ok(())
	} else {
		Err(anyhow!("invalid aggregate signature"))
	}
}

fn is_valid_aggregate(signature: &[u8; 64], payload: &SigningPayload, pubkeys: &[Point]) -> bool {
	if pubkeys.is_empty() || pubkeys.iter().any(Point::is_point_at_infinity) {
		return false
	}

	// Parsing reconstructs R under the square-Y convention
	let signature = match AggregateSignature::from_raw(signature) {
		Some(signature) => signature,
		None => return false,
	};

	let prehash = build_prehash(pubkeys, signature.r, payload);

	// The signature is valid iff s*G - sum(e_i * P_i) - R is the point
	// at infinity. The first slot of the first batch is reserved for
	// (s, G); every other slot holds (-e_i, P_i).
	let mut batch: Vec<(Scalar, Point)> = Vec::with_capacity(MULTI_EXP_BATCH_WIDTH);
	batch.push((signature.s.clone(), *Point::generator()));

	let mut sum = Point::point_at_infinity();
	for (index, pubkey) in pubkeys.iter().enumerate() {
		if batch.len() == MULTI_EXP_BATCH_WIDTH {
			sum = sum + multi_scalar_mul(&batch);
			batch.clear();
		}

		let challenge = match build_challenge(&prehash, index) {
			Some(challenge) => challenge,
			None => return false,
		};
		batch.push((challenge.negate(), *pubkey));
	}
	sum = sum + multi_scalar_mul(&batch);

	(sum - signature.r).is_point_at_infinity()
}

/// Bounded-width multi-scalar multiplication. The bindings expose no
/// batched primitive, so each batch is an accumulated sum of products.
/// Everything here operates on public inputs, so variable time is
/// acceptable.
fn multi_scalar_mul(terms: &[(Scalar, Point)]) -> Point {
	terms.iter().map(|(scalar, point)| *point * scalar).sum()
}
