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

//! The block header: the single consensus-critical unit this crate
//! validates, indexes and relays. Immutable once constructed.

use byteorder::{LittleEndian, WriteBytesExt};

use hash::{Hash160, Hash256, Hashed};

/// A block header, as announced over the wire and stored in the block
/// index. `pow_hash` is the miner-chosen commitment; it is only as good as
/// the `PoWVerifier` that checked it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
	pub version: i32,
	pub prev_hash: Hash256,
	pub miner_address: Hash160,
	pub time: u32,
	pub bits: u32,
	pub nonce: u32,
	pub pow_hash: Hash256,
}

impl Header {
	/// Whether this header's `prev_hash` marks it as a genesis header (i.e.
	/// it has no parent in the index).
	pub fn is_genesis_prev(&self) -> bool {
		self.prev_hash == Hash256([0u8; 32])
	}
}

impl Hashed for Header {
	fn domain_tag() -> &'static [u8] {
		b"hdrchain.header.v1"
	}

	fn hash_bytes(&self) -> Vec<u8> {
		// Fixed 88-byte preimage: version | prev_hash | miner_address | time
		// | bits | nonce | pow_hash. Deliberately excludes nothing -- the
		// PoW commitment itself is part of the hashed identity, matching
		// this spec's "hash(header) is a domain-separated digest of all
		// fields" requirement.
		let mut buf = Vec::with_capacity(88);
		buf.write_i32::<LittleEndian>(self.version).unwrap();
		buf.extend_from_slice(&self.prev_hash.0);
		buf.extend_from_slice(&self.miner_address.0);
		buf.write_u32::<LittleEndian>(self.time).unwrap();
		buf.write_u32::<LittleEndian>(self.bits).unwrap();
		buf.write_u32::<LittleEndian>(self.nonce).unwrap();
		buf.extend_from_slice(&self.pow_hash.0);
		buf
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn sample() -> Header {
		Header {
			version: 1,
			prev_hash: Hash256([1u8; 32]),
			miner_address: Hash160([2u8; 20]),
			time: 1_600_000_000,
			bits: 0x1d00_ffff,
			nonce: 42,
			pow_hash: Hash256([3u8; 32]),
		}
	}

	#[test]
	fn hash_is_deterministic() {
		let h = sample();
		assert_eq!(h.hash(), h.hash());
	}

	#[test]
	fn hash_changes_with_nonce() {
		let mut h = sample();
		let h0 = h.hash();
		h.nonce += 1;
		assert_ne!(h0, h.hash());
	}

	#[test]
	fn preimage_is_88_bytes() {
		assert_eq!(sample().hash_bytes().len(), 88);
	}
}
