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

//! Headers whose parent hasn't been seen yet, kept around in case the
//! parent shows up later (spec §4.3 OrphanPool). Grounded on the teacher's
//! `OrphanBlockPool` in `chain/src/chain.rs`, which keeps the same
//! dual-indexed (`orphans`/`prev_idx`) shape, generalized from full blocks
//! to bare headers and from a single global cap to a per-peer + global
//! cap pair (spec §4.3 "bounded per submitting peer and in aggregate").

use std::collections::HashMap;

use hdrchain_core::hash::{Hash256, Hashed};
use hdrchain_core::header::Header;

/// Opaque peer handle; the sync layer hands these out, the orphan pool
/// just uses them as a bookkeeping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub u64);

#[derive(Debug, Clone)]
struct OrphanEntry {
	header: Header,
	from_peer: PeerId,
	received_time: i64,
	/// Strictly increasing insertion order, used to find the globally
	/// oldest entry in O(n) when the global cap is hit (spec §4.3:
	/// "Exceeding the global cap evicts the oldest entry irrespective of
	/// peer" -- ties in `received_time` alone can't express "oldest").
	seq: u64,
}

/// Per-peer cap (spec §4.3: "no single peer may occupy more than a small
/// fixed share"); global cap bounds aggregate memory regardless of how
/// many distinct peers are sending orphans.
pub const MAX_ORPHANS_PER_PEER: usize = 50;
pub const MAX_ORPHANS_TOTAL: usize = 1000;

#[derive(Debug, Default)]
pub struct OrphanPool {
	by_hash: HashMap<Hash256, OrphanEntry>,
	/// prev_hash -> set of orphan hashes waiting on it, for O(children)
	/// recovery once the parent arrives.
	by_prev_hash: HashMap<Hash256, Vec<Hash256>>,
	per_peer_count: HashMap<PeerId, usize>,
	next_seq: u64,
}

/// Outcome of attempting to add a header to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
	Added,
	/// Added, but only after the globally oldest entry was evicted to make
	/// room (spec §4.3: the global cap evicts, it never refuses an insert).
	AddedEvictedOldest,
	AlreadyPresent,
	PeerOverCap,
}

impl OrphanPool {
	pub fn new() -> OrphanPool {
		OrphanPool::default()
	}

	pub fn len(&self) -> usize {
		self.by_hash.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_hash.is_empty()
	}

	pub fn contains(&self, hash: &Hash256) -> bool {
		self.by_hash.contains_key(hash)
	}

	/// Adds `header` to the pool, attributed to `from_peer`, enforcing
	/// both caps before insertion (spec §4.3 "too-many-orphans").
	pub fn add(&mut self, header: Header, from_peer: PeerId, now: i64) -> AddOutcome {
		let hash = header.hash();
		if self.by_hash.contains_key(&hash) {
			return AddOutcome::AlreadyPresent;
		}
		let peer_count = *self.per_peer_count.get(&from_peer).unwrap_or(&0);
		if peer_count >= MAX_ORPHANS_PER_PEER {
			return AddOutcome::PeerOverCap;
		}

		let mut evicted_oldest = false;
		if self.by_hash.len() >= MAX_ORPHANS_TOTAL {
			if let Some(oldest) = self
				.by_hash
				.iter()
				.min_by_key(|(_, e)| e.seq)
				.map(|(h, _)| *h)
			{
				self.remove(&oldest);
				evicted_oldest = true;
			}
		}

		let seq = self.next_seq;
		self.next_seq += 1;
		let prev_hash = header.prev_hash;
		self.by_prev_hash
			.entry(prev_hash)
			.or_insert_with(Vec::new)
			.push(hash);
		self.by_hash.insert(
			hash,
			OrphanEntry {
				header,
				from_peer,
				received_time: now,
				seq,
			},
		);
		*self.per_peer_count.entry(from_peer).or_insert(0) += 1;
		if evicted_oldest {
			AddOutcome::AddedEvictedOldest
		} else {
			AddOutcome::Added
		}
	}

	/// Removes and returns the orphan with this hash, if present.
	pub fn remove(&mut self, hash: &Hash256) -> Option<Header> {
		let entry = self.by_hash.remove(hash)?;
		if let Some(siblings) = self.by_prev_hash.get_mut(&entry.header.prev_hash) {
			siblings.retain(|h| h != hash);
			if siblings.is_empty() {
				self.by_prev_hash.remove(&entry.header.prev_hash);
			}
		}
		if let Some(count) = self.per_peer_count.get_mut(&entry.from_peer) {
			*count -= 1;
		}
		Some(entry.header)
	}

	/// Direct children of `hash` waiting in the pool -- the set to
	/// reprocess once `hash` is connected (spec §4.3 recovery on parent
	/// arrival).
	pub fn children_of(&self, hash: &Hash256) -> Vec<Header> {
		self.by_prev_hash
			.get(hash)
			.map(|hashes| {
				hashes
					.iter()
					.filter_map(|h| self.by_hash.get(h))
					.map(|e| e.header.clone())
					.collect()
			})
			.unwrap_or_default()
	}

	/// Evicts every orphan received before `cutoff` (spec §4.3 time-horizon
	/// eviction; `cutoff = now - orphan_horizon_secs`). Returns the number
	/// evicted.
	pub fn evict_older_than(&mut self, cutoff: i64) -> usize {
		let stale: Vec<Hash256> = self
			.by_hash
			.iter()
			.filter(|(_, e)| e.received_time < cutoff)
			.map(|(h, _)| *h)
			.collect();
		let count = stale.len();
		for hash in stale {
			self.remove(&hash);
		}
		count
	}

	/// Removes every orphan attributed to `peer` -- called on peer
	/// disconnect so stale attributions don't linger.
	pub fn remove_all_from(&mut self, peer: PeerId) -> usize {
		let theirs: Vec<Hash256> = self
			.by_hash
			.iter()
			.filter(|(_, e)| e.from_peer == peer)
			.map(|(h, _)| *h)
			.collect();
		let count = theirs.len();
		for hash in theirs {
			self.remove(&hash);
		}
		self.per_peer_count.remove(&peer);
		count
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use hdrchain_core::hash::Hash160;

	fn header_with(prev: Hash256, pow_hash: Hash256) -> Header {
		Header {
			version: 1,
			prev_hash: prev,
			miner_address: Hash160([0u8; 20]),
			time: 0,
			bits: 0x1d00_ffff,
			nonce: 0,
			pow_hash,
		}
	}

	#[test]
	fn add_then_lookup_children_of_parent() {
		let mut pool = OrphanPool::new();
		let parent = Hash256([1u8; 32]);
		let child = header_with(parent, Hash256([2u8; 32]));
		assert_eq!(pool.add(child.clone(), PeerId(1), 0), AddOutcome::Added);
        assert_eq!(pool.children_of(&parent).len(), 1);
	}

	#[test]
	fn duplicate_add_is_rejected() {
		let mut pool = OrphanPool::new();
		let child = header_with(Hash256([1u8; 32]), Hash256([2u8; 32]));
		assert_eq!(pool.add(child.clone(), PeerId(1), 0), AddOutcome::Added);
		assert_eq!(pool.add(child, PeerId(1), 0), AddOutcome::AlreadyPresent);
	}

	#[test]
	fn per_peer_cap_is_enforced() {
		let mut pool = OrphanPool::new();
		for i in 0..MAX_ORPHANS_PER_PEER {
			let h = header_with(Hash256([0u8; 32]), Hash256([i as u8; 32]));
			assert_eq!(pool.add(h, PeerId(1), 0), AddOutcome::Added);
		}
		let overflow = header_with(Hash256([0u8; 32]), Hash256([250u8; 32]));
		assert_eq!(pool.add(overflow, PeerId(1), 0), AddOutcome::PeerOverCap);
	}

	#[test]
	fn a_second_peer_is_unaffected_by_the_first_peers_cap() {
		let mut pool = OrphanPool::new();
		for i in 0..MAX_ORPHANS_PER_PEER {
			let h = header_with(Hash256([0u8; 32]), Hash256([i as u8; 32]));
			pool.add(h, PeerId(1), 0);
		}
		let h = header_with(Hash256([0u8; 32]), Hash256([251u8; 32]));
		assert_eq!(pool.add(h, PeerId(2), 0), AddOutcome::Added);
	}

	#[test]
	fn global_cap_evicts_oldest_instead_of_refusing() {
		let mut pool = OrphanPool::new();
		let mut first_hash = None;
		// Spread MAX_ORPHANS_TOTAL entries across enough distinct peers that
		// no single one hits the per-peer cap.
		let peers_needed = MAX_ORPHANS_TOTAL / MAX_ORPHANS_PER_PEER;
		for p in 0..peers_needed {
			for i in 0..MAX_ORPHANS_PER_PEER {
				let idx = (p * MAX_ORPHANS_PER_PEER + i) as u32;
				let h = header_with(Hash256([0u8; 32]), Hash256::from_slice(&idx.to_be_bytes().repeat(8)));
				if first_hash.is_none() {
					first_hash = Some(h.hash());
				}
				assert_eq!(pool.add(h, PeerId(p as u64), 0), AddOutcome::Added);
			}
		}
		assert_eq!(pool.len(), MAX_ORPHANS_TOTAL);

		let one_more = header_with(Hash256([0u8; 32]), Hash256([0xffu8; 32]));
		assert_eq!(
			pool.add(one_more, PeerId(9999), 0),
			AddOutcome::AddedEvictedOldest
		);
		assert_eq!(pool.len(), MAX_ORPHANS_TOTAL);
		assert!(!pool.contains(&first_hash.unwrap()));
	}

	#[test]
	fn eviction_removes_only_stale_entries() {
		let mut pool = OrphanPool::new();
		let old = header_with(Hash256([0u8; 32]), Hash256([1u8; 32]));
		let fresh = header_with(Hash256([0u8; 32]), Hash256([2u8; 32]));
		pool.add(old, PeerId(1), 100);
		pool.add(fresh, PeerId(1), 2000);
		let evicted = pool.evict_older_than(1000);
		assert_eq!(evicted, 1);
		assert_eq!(pool.len(), 1);
	}

	#[test]
	fn remove_all_from_clears_peer_attribution() {
		let mut pool = OrphanPool::new();
		let h = header_with(Hash256([0u8; 32]), Hash256([1u8; 32]));
		pool.add(h, PeerId(1), 0);
		assert_eq!(pool.remove_all_from(PeerId(1)), 1);
		assert!(pool.is_empty());
	}
}
