// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Secret wrapper for credential material.
//!
//! [`Secret<T>`] holds a value that must never reach a log line, a debug dump
//! or a serialized response: temporary secret access keys, session tokens and
//! plaintext data keys. The wrapped value is zeroized when the wrapper drops.
//!
//! ```
//! use tessera_common_secret::SecretString;
//!
//! let token = SecretString::new("FwoGZXIvYXdzE...".to_string());
//! assert_eq!(format!("{token:?}"), "Secret([REDACTED])");
//! assert_eq!(token.expose(), "FwoGZXIvYXdzE...");
//! ```

use std::fmt;

use zeroize::Zeroize;

/// Placeholder emitted wherever a secret would otherwise be rendered.
pub const REDACTED: &str = "[REDACTED]";

/// A value that is redacted from `Debug`, `Display` and `Serialize` output.
pub struct Secret<T: Zeroize> {
	inner: T,
}

/// Convenience alias for the common string case.
pub type SecretString = Secret<String>;

impl<T: Zeroize> Secret<T> {
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Borrow the underlying value.
	///
	/// Every call site is a place where the secret leaves its wrapper; keep
	/// them at the edge where the value is handed to a client library.
	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl<T: Zeroize> Drop for Secret<T> {
	fn drop(&mut self) {
		self.inner.zeroize();
	}
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
	}
}

impl<T: Zeroize> From<T> for Secret<T> {
	fn from(inner: T) -> Self {
		Self::new(inner)
	}
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Secret({REDACTED})")
	}
}

impl<T: Zeroize> fmt::Display for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T: Zeroize + PartialEq> PartialEq for Secret<T> {
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T: Zeroize + Eq> Eq for Secret<T> {}

#[cfg(feature = "serde")]
impl<T: Zeroize> serde::Serialize for Secret<T> {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(REDACTED)
	}
}

#[cfg(feature = "serde")]
impl<'de, T: Zeroize + serde::Deserialize<'de>> serde::Deserialize<'de> for Secret<T> {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		T::deserialize(deserializer).map(Secret::new)
	}
}
