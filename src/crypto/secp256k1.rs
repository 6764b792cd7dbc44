use super::{Rng, POINT_SIZE};
use num_bigint::BigUint;
use secp256k1::constants::{CURVE_ORDER, SECRET_KEY_SIZE};
use serde::{Deserialize, Serialize};

type SK = secp256k1::SecretKey;
type PK = secp256k1::PublicKey;

// Wrapping in `Option` to make it easier to keep track
// of "zero" scalars which often need special treatment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scalar(Option<SK>);

// None if it is a "point at infinity"
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point(Option<PK>);

const GENERATOR_COMPRESSED: [u8; 33] = [
	0x02, 0x79, 0xBE, 0x66, 0x7E, 0xF9, 0xDC, 0xBB, 0xAC, 0x55, 0xA0, 0x62, 0x95, 0xCE, 0x87, 0x0B,
	0x07, 0x02, 0x9B, 0xFC, 0xDB, 0x2D, 0xCE, 0x28, 0xD9, 0x59, 0xF2, 0x81, 0x5B, 0x16, 0xF8, 0x17,
	0x98,
];

// The prime of the field that secp256k1 is defined over (2^256 - 2^32 - 977).
// Note that this is distinct from the group order used for scalars.
const FIELD_ORDER: [u8; 32] = [
	0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
	0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 0xFF, 0xFF, 0xFC, 0x2F,
];

lazy_static::lazy_static! {
	static ref GENERATOR: Point = Point(Some(PK::from_slice(&GENERATOR_COMPRESSED).unwrap()));
	static ref GROUP_ORDER_BIG_UINT: BigUint = BigUint::from_bytes_be(&CURVE_ORDER);
	static ref FIELD_ORDER_BIG_UINT: BigUint = BigUint::from_bytes_be(&FIELD_ORDER);
}

/// Euler's criterion: a non-zero field element is a square iff
/// it is 1 when raised to the power of (p - 1) / 2
fn is_field_square(x: &BigUint) -> bool {
	use num_traits::One;

	let p = &*FIELD_ORDER_BIG_UINT;
	x.modpow(&(p >> 1u32), p).is_one()
}

mod point_impls {

	use super::*;

	const POINT_AT_INFINITY_COMPRESSED: [u8; 33] = [0; 33];

	derive_point_impls!(Point, Scalar);

	impl<B: std::borrow::Borrow<Scalar>> std::ops::Mul<B> for Point {
		type Output = Self;

		fn mul(self, scalar: B) -> Self::Output {
			let inner = match (self.0, scalar.borrow().0) {
				(None, _) | (_, None) => {
					// multiplication by 0 creates a "point at infinity"
					None
				},
				(Some(point), Some(scalar)) => Some(
					point
						.mul_tweak(secp256k1::SECP256K1, &scalar.into())
						.expect("scalar must be valid and non-zero"),
				),
			};

			Point(inner)
		}
	}

	impl std::ops::Add for Point {
		type Output = Self;

		fn add(self, rhs: Self) -> Self::Output {
			let inner = match (self.0, rhs.0) {
				(None, rhs) => rhs,
				(lhs, None) => lhs,
				(Some(lhs), Some(rhs)) => {
					// this can only fail if the result is
					// a point at infinity which we represent
					// with `None`
					lhs.combine(&rhs).ok()
				},
			};
			Point(inner)
		}
	}

	impl std::ops::Sub for Point {
		type Output = Self;

		// Silence clippy as addition is here by design
		// (note that we negate the right operand first)
		#[allow(clippy::suspicious_arithmetic_impl)]
		fn sub(self, rhs: Self) -> Self::Output {
			self + rhs.negate()
		}
	}

	impl Point {
		pub(crate) fn generator() -> &'static Point {
			&GENERATOR
		}

		pub fn from_scalar(scalar: &Scalar) -> Self {
			*Self::generator() * scalar
		}

		pub fn as_bytes(&self) -> [u8; POINT_SIZE] {
			match self.0 {
				Some(pk) => pk.serialize(),
				None => POINT_AT_INFINITY_COMPRESSED,
			}
		}

		pub fn point_at_infinity() -> Self {
			Point(None)
		}

		pub fn is_point_at_infinity(&self) -> bool {
			self.0.is_none()
		}

		/// Negation is a no-op on the point at infinity
		pub fn negate(&self) -> Self {
			Point(self.0.map(|pk| pk.negate(secp256k1::SECP256K1)))
		}

		pub fn x_bytes(&self) -> [u8; 32] {
			let mut result: [u8; 32] = Default::default();
			result.copy_from_slice(self.as_bytes()[1..33].as_ref());
			result
		}

		/// Whether the point's Y coordinate is a square in the underlying
		/// field. This is the criterion used to canonicalize the Y of a
		/// nonce point without transmitting its sign (false for the point
		/// at infinity, which has no Y).
		pub fn has_square_y(&self) -> bool {
			match self.0 {
				None => false,
				Some(pk) => {
					let uncompressed = pk.serialize_uncompressed();
					is_field_square(&BigUint::from_bytes_be(&uncompressed[33..65]))
				},
			}
		}

		/// Reconstruct the unique curve point with the given X coordinate
		/// whose Y coordinate is a square. Returns `None` if `x` is not a
		/// canonical field element or not the X coordinate of a curve point.
		pub fn from_x_with_square_y(x_bytes: &[u8; 32]) -> Option<Self> {
			let p = &*FIELD_ORDER_BIG_UINT;

			let x = BigUint::from_bytes_be(x_bytes);
			if &x >= p {
				return None
			}

			// Because p = 3 (mod 4), a square root of x^3 + 7 (if one
			// exists) is obtained by raising it to the power of (p + 1) / 4
			let y_squared = (x.modpow(&BigUint::from(3u32), p) + 7u32) % p;
			let y = y_squared.modpow(&((p + 1u32) >> 2u32), p);
			if (&y * &y) % p != y_squared {
				// x^3 + 7 is not a square, so there is no point
				// with this X coordinate
				return None
			}

			// Exactly one of y and p - y is a square (p = 3 (mod 4)
			// makes -1 a non-square)
			let y = if is_field_square(&y) { y } else { p - &y };

			let mut compressed = [0u8; POINT_SIZE];
			compressed[0] = if y.bit(0) { 0x03 } else { 0x02 };
			compressed[1..].copy_from_slice(x_bytes);

			// Cannot fail: we have just established that x is on the curve
			PK::from_slice(&compressed).ok().map(|pk| Point(Some(pk)))
		}
	}

	impl Serialize for Point {
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: serde::Serializer,
		{
			// Serde does not handle arrays past 32 elements, so the
			// 33 compressed bytes travel as a (tag, x) pair
			let bytes = self.as_bytes();
			let mut x: [u8; 32] = [0; 32];
			x.copy_from_slice(&bytes[1..]);
			(bytes[0], x).serialize(serializer)
		}
	}

	impl<'de> Deserialize<'de> for Point {
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: serde::Deserializer<'de>,
		{
			let (tag, x) = <(u8, [u8; 32])>::deserialize(deserializer)?;

			let mut bytes = [0u8; POINT_SIZE];
			bytes[0] = tag;
			bytes[1..].copy_from_slice(&x);

			if bytes == POINT_AT_INFINITY_COMPRESSED {
				Ok(Point::point_at_infinity())
			} else {
				PK::from_slice(&bytes)
					.map(|pk| Point(Some(pk)))
					.map_err(serde::de::Error::custom)
			}
		}
	}

	#[cfg(test)]
	impl Point {
		pub fn random(rng: &mut Rng) -> Self {
			Point::from_scalar(&Scalar::random(rng))
		}
	}
}

mod scalar_impls {

	use super::*;

	derive_scalar_impls!(Scalar);

	impl Scalar {
		pub fn zero() -> Self {
			Scalar(None)
		}

		pub fn random(rng: &mut Rng) -> Self {
			// The key is guaranteed to be non-zero by
			// the implementation of SK::new
			Scalar(Some(SK::new(rng)))
		}

		/// Parse a 32-byte big-endian scalar. Returns `None` if the value
		/// overflows the group order; the all-zero encoding is the zero
		/// scalar.
		pub fn from_bytes_checked(x: &[u8; 32]) -> Option<Self> {
			use num_traits::identities::Zero;

			let x_int = BigUint::from_bytes_be(x);
			if x_int >= *GROUP_ORDER_BIG_UINT {
				return None
			}

			if x_int.is_zero() {
				Some(Scalar(None))
			} else {
				// Within the group and non-zero, so this cannot fail
				Some(Scalar(Some(SK::from_slice(x).unwrap())))
			}
		}

		pub fn is_zero(&self) -> bool {
			self.0.is_none()
		}

		/// Negation is a no-op on the zero scalar
		/// (`SecretKey::negate` expects a valid non-zero scalar)
		pub fn negate(&self) -> Self {
			Scalar(self.0.map(|x| x.negate()))
		}

		pub fn as_bytes(&self) -> &[u8; SECRET_KEY_SIZE] {
			match self.0.as_ref() {
				Some(sk) => sk.as_ref(),
				None => &ZERO_SCALAR_BYTES,
			}
		}
	}

	impl std::ops::Mul for &Scalar {
		type Output = Scalar;

		fn mul(self, rhs: Self) -> Self::Output {
			let inner = match (self.0, rhs.0) {
				(None, _) | (_, None) => None,
				(Some(lhs), Some(rhs)) => {
					// implementation of mul_tweak never returns
					// a zero scalar
					Some(lhs.mul_tweak(&rhs.into()).expect("can't fail if both operands are valid"))
				},
			};
			Scalar(inner)
		}
	}

	impl std::ops::Add for &Scalar {
		type Output = Scalar;

		fn add(self, rhs: Self) -> Self::Output {
			let inner = match (self.0, rhs.0) {
				(None, rhs) => rhs,
				(lhs, None) => lhs,
				(Some(lhs), Some(rhs)) => {
					// Both lhs and rhs are considered "valid" (i.e.
					// non-zero and belong to the group). Further,
					// the addition is done modulo group order, so
					// this function can only fail if the result
					// itself is zero
					lhs.add_tweak(&rhs.into()).ok()
				},
			};

			Scalar(inner)
		}
	}

	const ZERO_SCALAR_BYTES: [u8; 32] = [0; 32];

	impl zeroize::Zeroize for Scalar {
		fn zeroize(&mut self) {
			use core::sync::atomic;
			unsafe { std::ptr::write_volatile(self, Scalar::zero()) };
			atomic::compiler_fence(atomic::Ordering::SeqCst);
		}
	}

	impl Serialize for Scalar {
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: serde::Serializer,
		{
			self.as_bytes().serialize(serializer)
		}
	}

	impl<'de> Deserialize<'de> for Scalar {
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: serde::Deserializer<'de>,
		{
			let bytes = <[u8; 32]>::deserialize(deserializer)?;

			Scalar::from_bytes_checked(&bytes)
				.ok_or_else(|| serde::de::Error::custom("scalar overflow"))
		}
	}

	#[cfg(test)]
	impl Scalar {
		pub fn from_hex(sk_hex: &str) -> Self {
			let bytes = hex::decode(sk_hex).expect("input must be hex encoded");
			// `from_slice` never returns 0
			Scalar(Some(SK::from_slice(&bytes).expect("invalid scalar")))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;

	#[test]
	fn ensure_serialization_is_consistent() {
		// Test against pre-computed values to ensure that
		// serialization does not change unintentionally
		let mut rng = Rng::from_seed([0; 32]);

		let scalar = Scalar::random(&mut rng);

		let scalar_bytes = bincode::serialize(&scalar).unwrap();

		let expected_scalar_bytes = [
			155, 244, 154, 106, 7, 85, 249, 83, 129, 31, 206, 18, 95, 38, 131, 213, 4, 41, 195, 187,
			73, 224, 116, 20, 126, 0, 137, 165, 46, 174, 21, 95,
		];

		assert_eq!(scalar_bytes, expected_scalar_bytes);

		let scalar_recovered: Scalar = bincode::deserialize(&scalar_bytes).unwrap();

		assert_eq!(scalar, scalar_recovered);

		let point = Point::from_scalar(&scalar);
		let point_bytes = bincode::serialize(&point).unwrap();

		let expected_point_bytes = [
			2, 155, 239, 141, 85, 109, 128, 228, 58, 231, 224, 190, 203, 58, 126, 104, 56, 185, 93,
			239, 228, 88, 150, 237, 96, 117, 187, 144, 53, 208, 108, 153, 100,
		];

		assert_eq!(point_bytes, expected_point_bytes);

		let point_recovered: Point = bincode::deserialize(&point_bytes).unwrap();

		assert_eq!(point, point_recovered);
	}

	#[test]
	fn exactly_one_of_point_and_negation_has_square_y() {
		let mut rng = Rng::from_seed([1; 32]);

		for _ in 0..20 {
			let point = Point::random(&mut rng);
			assert_ne!(point.has_square_y(), point.negate().has_square_y());
			// Negation preserves the X coordinate
			assert_eq!(point.x_bytes(), point.negate().x_bytes());
		}
	}

	#[test]
	fn x_coordinate_recovery_round_trip() {
		let mut rng = Rng::from_seed([2; 32]);

		for _ in 0..20 {
			let point = Point::random(&mut rng);
			let recovered = Point::from_x_with_square_y(&point.x_bytes())
				.expect("x comes from a curve point");

			assert!(recovered.has_square_y());
			assert_eq!(
				recovered,
				if point.has_square_y() { point } else { point.negate() }
			);
		}
	}

	#[test]
	fn x_coordinate_recovery_matches_library_decompression() {
		// The library accepts a compressed encoding iff its X coordinate
		// is on the curve, which is exactly when recovery must succeed
		let mut rng = Rng::from_seed([3; 32]);

		for _ in 0..20 {
			let x: [u8; 32] = {
				use rand::RngCore;
				let mut x = [0u8; 32];
				rng.fill_bytes(&mut x);
				x
			};

			let mut compressed = [0u8; POINT_SIZE];
			compressed[0] = 0x02;
			compressed[1..].copy_from_slice(&x);

			assert_eq!(
				Point::from_x_with_square_y(&x).is_some(),
				PK::from_slice(&compressed).is_ok()
			);
		}
	}

	#[test]
	fn x_coordinate_recovery_rejects_field_overflow() {
		// The field prime itself is not a canonical field element
		assert!(Point::from_x_with_square_y(&FIELD_ORDER).is_none());
		assert!(Point::from_x_with_square_y(&[0xFF; 32]).is_none());
	}

	#[test]
	fn scalar_parsing_rejects_group_overflow() {
		assert!(Scalar::from_bytes_checked(&CURVE_ORDER).is_none());
		assert!(Scalar::from_bytes_checked(&[0xFF; 32]).is_none());

		let one = {
			let mut bytes = [0u8; 32];
			bytes[31] = 1;
			bytes
		};
		assert_eq!(Scalar::from_bytes_checked(&one).unwrap(), Scalar::from_hex(&hex::encode(one)));
		assert!(Scalar::from_bytes_checked(&[0; 32]).unwrap().is_zero());
	}
}
