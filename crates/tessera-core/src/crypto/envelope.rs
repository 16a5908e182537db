// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Envelope encryption primitives.
//!
//! AES-256-GCM with associated data, used both for attribute values under a
//! per-item data key and for wrapping data keys under a master key.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng, Payload},
	Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{TesseraError, TesseraResult};

/// Size of encryption keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Ciphertext with the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
	pub nonce: [u8; NONCE_SIZE],
	pub ciphertext: Vec<u8>,
}

impl Sealed {
	/// `nonce || ciphertext`, the stored form.
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
		out.extend_from_slice(&self.nonce);
		out.extend_from_slice(&self.ciphertext);
		out
	}

	pub fn from_bytes(bytes: &[u8]) -> TesseraResult<Self> {
		if bytes.len() < NONCE_SIZE {
			return Err(TesseraError::Integrity(format!(
				"sealed value is {} bytes, shorter than its nonce",
				bytes.len()
			)));
		}
		let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
		let mut nonce_bytes = [0u8; NONCE_SIZE];
		nonce_bytes.copy_from_slice(nonce);
		Ok(Self {
			nonce: nonce_bytes,
			ciphertext: ciphertext.to_vec(),
		})
	}
}

/// Generate a random 256-bit key.
pub fn generate_key() -> Zeroizing<[u8; KEY_SIZE]> {
	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	OsRng.fill_bytes(key.as_mut());
	key
}

/// Generate a random 96-bit nonce. A (key, nonce) pair must never repeat;
/// data keys are per item, so random nonces stay far from the collision bound.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
	let mut nonce = [0u8; NONCE_SIZE];
	OsRng.fill_bytes(&mut nonce);
	nonce
}

/// Seal `plaintext` under `key`, authenticating `aad` alongside it.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8], aad: &[u8]) -> TesseraResult<Sealed> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
	let nonce_bytes = generate_nonce();

	let ciphertext = cipher
		.encrypt(
			Nonce::from_slice(&nonce_bytes),
			Payload {
				msg: plaintext,
				aad,
			},
		)
		.map_err(|e| TesseraError::Integrity(format!("encryption failed: {e}")))?;

	Ok(Sealed {
		nonce: nonce_bytes,
		ciphertext,
	})
}

/// Open a sealed value. Fails if the key, the ciphertext or `aad` differ from
/// what was sealed.
pub fn open(key: &[u8; KEY_SIZE], sealed: &Sealed, aad: &[u8]) -> TesseraResult<Zeroizing<Vec<u8>>> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

	let plaintext = cipher
		.decrypt(
			Nonce::from_slice(&sealed.nonce),
			Payload {
				msg: sealed.ciphertext.as_slice(),
				aad,
			},
		)
		.map_err(|e| TesseraError::Integrity(format!("decryption failed: {e}")))?;

	Ok(Zeroizing::new(plaintext))
}

/// Copy unwrapped key material into a fixed-size key, checking its length.
pub fn key_from_slice(bytes: &[u8]) -> TesseraResult<Zeroizing<[u8; KEY_SIZE]>> {
	if bytes.len() != KEY_SIZE {
		return Err(TesseraError::Integrity(format!(
			"data key is {} bytes, expected {KEY_SIZE}",
			bytes.len()
		)));
	}
	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	key.copy_from_slice(bytes);
	Ok(key)
}
