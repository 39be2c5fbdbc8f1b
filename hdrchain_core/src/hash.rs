// Copyright 2016 The Grin Developers
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

//! Hash types used pervasively to identify headers and miner addresses.

use std::fmt;

use blake2::blake2b::blake2b;

/// A 256-bit hash, used to identify headers.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

/// A 160-bit hash, used to identify a miner's payout address.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash160(pub [u8; 20]);

/// The all-zero hash, used as `prev_hash` of the genesis header and as
/// `hash_stop` meaning "as many headers as fit".
pub const ZERO_HASH: Hash256 = Hash256([0u8; 32]);

impl Hash256 {
	/// Builds a hash from a byte slice, panicking if the slice isn't 32 bytes.
	pub fn from_slice(s: &[u8]) -> Hash256 {
		let mut a = [0u8; 32];
		a.copy_from_slice(s);
		Hash256(a)
	}

	pub fn as_bytes(&self) -> &[u8; 32] {
		&self.0
	}

	pub fn to_hex(&self) -> String {
		let mut s = String::with_capacity(64);
		for b in self.0.iter() {
			s.push_str(&format!("{:02x}", b));
		}
		s
	}
}

impl Hash160 {
	pub fn from_slice(s: &[u8]) -> Hash160 {
		let mut a = [0u8; 20];
		a.copy_from_slice(s);
		Hash160(a)
	}

	pub fn as_bytes(&self) -> &[u8; 20] {
		&self.0
	}
}

impl fmt::Debug for Hash256 {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", &self.to_hex()[..16])
	}
}

impl fmt::Display for Hash256 {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.to_hex())
	}
}

impl fmt::Debug for Hash160 {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for b in self.0.iter() {
			write!(f, "{:02x}", b)?;
		}
		Ok(())
	}
}

/// Trait for types that derive their identity from a domain-separated
/// digest of their own serialization. Mirrors the teacher's `Hashed` trait
/// but uses a keyed/domain-separated Blake2b instead of a bare hash so that
/// headers can never collide with other serialized constructs that happen
/// to share a byte encoding.
pub trait Hashed {
	/// Bytes fed to the digest function, in wire order.
	fn hash_bytes(&self) -> Vec<u8>;

	/// Domain tag mixed into the digest (`b"hdrchain.header"` for headers).
	fn domain_tag() -> &'static [u8];

	fn hash(&self) -> Hash256 {
		let mut preimage = Vec::with_capacity(Self::domain_tag().len() + 96);
		preimage.extend_from_slice(Self::domain_tag());
		preimage.extend_from_slice(&self.hash_bytes());
		let digest = blake2b(32, &[], &preimage);
		Hash256::from_slice(digest.as_bytes())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn zero_hash_is_all_zero() {
		assert_eq!(ZERO_HASH.as_bytes(), &[0u8; 32]);
	}

	#[test]
	fn hex_roundtrip_length() {
		let h = Hash256([7u8; 32]);
		assert_eq!(h.to_hex().len(), 64);
	}
}
