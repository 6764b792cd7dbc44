// Copyright 2025 Chainflip Labs GmbH
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! A signing session coordinates one aggregate signing attempt: every
//! participant contributes a nonce, then a partial signature, and the
//! partials collapse into a single 64-byte signature. The per-index
//! progress values enforce the sequencing that prevents nonce reuse.


use rand::{RngCore, SeedableRng};
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroize;

use crate::{
	crypto::{
		secp256k1::{Point, Scalar},
		Rng,
	},
	signing::{
		build_challenge, build_prehash, build_response, AggregateSignature, PartialSignature,
		SigningPayload,
	},
};

/// Progress of a single participant slot within a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NonceProgress {
	/// No nonce has been contributed for this index yet
	Unknown,
	/// A nonce was contributed by an external party. Reserved for
	/// sessions that accept externally supplied public nonces; nothing
	/// in this crate sets it. It satisfies the "all nonces known"
	/// requirement of [SigningSession::sign] but is never ours to sign
	/// with.
	Other,
	/// The nonce for this index was generated locally and has not been
	/// used to sign yet
	Ours,
	/// The nonce for this index has produced a partial signature and
	/// must never be used again
	Signed,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SigningError {
	#[error("Invalid Participants")]
	InvalidParticipants,
	#[error("Participant Index Out Of Range")]
	IndexOutOfRange,
	#[error("Nonce Already Contributed")]
	NonceAlreadyContributed,
	#[error("Missing Nonce Contributions")]
	MissingNonces,
	#[error("No Unused Local Nonce")]
	NonceUnavailable,
	#[error("Invalid Secret Key")]
	InvalidSecretKey,
	#[error("Challenge Overflow")]
	ChallengeOverflow,
	#[error("Invalid Number of Partial Signatures")]
	InvalidNumberOfPartialSignatures,
}

/// State for one signing attempt over a fixed ordered list of cosigner
/// public keys. The session exclusively owns its secret nonces and its
/// (deterministic, seed-derived) nonce RNG; all of its arrays are wiped
/// on drop whether or not the protocol ran to completion.
pub struct SigningSession {
	pubkeys: Vec<Point>,
	secnonces: Vec<Scalar>,
	progress: Vec<NonceProgress>,
	pubnonce_sum: Point,
	rng: Rng,
}

impl SigningSession {
	/// Create a session for the given cosigners. The seed fully
	/// determines the nonces this session will generate.
	pub fn new(pubkeys: Vec<Point>, seed: [u8; 32]) -> Result<Self, SigningError> {
		if pubkeys.is_empty() || pubkeys.iter().any(Point::is_point_at_infinity) {
			return Err(SigningError::InvalidParticipants)
		}

		debug!("creating signing session for {} cosigners", pubkeys.len());

		let count = pubkeys.len();

		Ok(SigningSession {
			pubkeys,
			secnonces: vec![Scalar::zero(); count],
			progress: vec![NonceProgress::Unknown; count],
			pubnonce_sum: Point::point_at_infinity(),
			rng: Rng::from_seed(seed),
		})
	}

	/// Generate the secret nonce for `index` and fold its public
	/// counterpart into the running nonce sum. Each index can contribute
	/// exactly once.
	pub fn generate_nonce(&mut self, index: usize) -> Result<(), SigningError> {
		match self.progress.get(index) {
			None => return Err(SigningError::IndexOutOfRange),
			Some(NonceProgress::Unknown) => {},
			Some(_) => {
				warn!("nonce generation requested twice for index {}", index);
				return Err(SigningError::NonceAlreadyContributed)
			},
		}

		let nonce = loop {
			let mut buf = [0u8; 32];
			self.rng.fill_bytes(&mut buf);
			let candidate = Scalar::from_bytes_checked(&buf);
			buf.zeroize();

			// Overflow and zero are resampled rather than reduced
			// (neither is reachable with a functioning RNG)
			match candidate {
				Some(nonce) if !nonce.is_zero() => break nonce,
				_ => continue,
			}
		};

		// Normalize the public nonce to a square Y, compensating in the
		// secret nonce, so that no Y sign ever needs to be transmitted
		let (nonce, public_nonce) = {
			let public_nonce = Point::from_scalar(&nonce);
			if public_nonce.has_square_y() {
				(nonce, public_nonce)
			} else {
				(nonce.negate(), public_nonce.negate())
			}
		};

		self.pubnonce_sum = self.pubnonce_sum + public_nonce;
		self.secnonces[index] = nonce;
		self.progress[index] = NonceProgress::Ours;

		Ok(())
	}

	/// Produce our partial signature for `index`. Requires that every
	/// index has contributed a nonce (signing any earlier would allow an
	/// adversary to adapt their nonce to ours) and that our nonce for
	/// `index` has not already signed.
	pub fn sign(
		&mut self,
		payload: &SigningPayload,
		seckey: &[u8; 32],
		index: usize,
	) -> Result<PartialSignature, SigningError> {
		if index >= self.progress.len() {
			return Err(SigningError::IndexOutOfRange)
		}

		if self.progress.iter().any(|progress| *progress == NonceProgress::Unknown) {
			warn!("attempt to sign for index {} before all nonces are known", index);
			return Err(SigningError::MissingNonces)
		}

		if self.progress[index] != NonceProgress::Ours {
			warn!("no unused local nonce for index {}", index);
			return Err(SigningError::NonceUnavailable)
		}

		// The aggregate nonce is normalized to a square Y on a local
		// copy, compensating in (a local copy of) our secret nonce.
		// Every signer flips the same way, so this is equivalent to
		// flipping the final R.
		let (nonce, group_commitment) = if self.pubnonce_sum.has_square_y() {
			(self.secnonces[index].clone(), self.pubnonce_sum)
		} else {
			(self.secnonces[index].negate(), self.pubnonce_sum.negate())
		};

		let prehash = build_prehash(&self.pubkeys, group_commitment, payload);
		let challenge =
			build_challenge(&prehash, index).ok_or(SigningError::ChallengeOverflow)?;

		let secret_key =
			Scalar::from_bytes_checked(seckey).ok_or(SigningError::InvalidSecretKey)?;

		let response = build_response(challenge, &secret_key, &nonce);

		self.progress[index] = NonceProgress::Signed;

		Ok(PartialSignature { response })
	}

	/// Combine the partial signatures of all cosigners into the final
	/// aggregate signature. Partials are summed as scalars; no attempt is
	/// made to identify which partial is at fault if the result does not
	/// verify.
	pub fn combine(
		&self,
		partials: &[PartialSignature],
	) -> Result<AggregateSignature, SigningError> {
		if partials.len() != self.pubkeys.len() {
			return Err(SigningError::InvalidNumberOfPartialSignatures)
		}

		// Responses are additive, so the aggregate response is their sum
		let s: Scalar = partials.iter().map(|partial| partial.response.clone()).sum();

		// Publish R under the same square-Y convention the signers
		// applied when hashing
		let r = if self.pubnonce_sum.has_square_y() {
			self.pubnonce_sum
		} else {
			self.pubnonce_sum.negate()
		};

		debug!("combined {} partial signatures", partials.len());

		Ok(AggregateSignature { s, r })
	}

	/// Whether every index has produced a partial signature
	pub fn is_complete(&self) -> bool {
		self.progress.iter().all(|progress| *progress == NonceProgress::Signed)
	}
}

impl Drop for SigningSession {
	fn drop(&mut self) {
		// Secret nonces survive in memory between the two signing phases
		// and must be wiped on teardown no matter how far the protocol
		// got. Public keys and progress are wiped along with them.
		for nonce in &mut self.secnonces {
			nonce.zeroize();
		}
		for pubkey in &mut self.pubkeys {
			pubkey.zeroize();
		}
		self.progress.fill(NonceProgress::Unknown);
	}
}
