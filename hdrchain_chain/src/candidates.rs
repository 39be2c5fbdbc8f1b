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

//! The set of headers-valid, ancestor-valid tips eligible to become the
//! active chain tip, and the deterministic rule for picking the best one
//! (spec §4.3 CandidateSet / §4.4 step 1).

use std::collections::BTreeSet;

use hdrchain_core::work::Work;

use index::{Arena, NodeId, Status};

/// Ordered by `(chain_work, Reverse(seq))` so that `BTreeSet`'s natural
/// ascending order, read from the back (`next_back`), gives us "most work,
/// breaking ties by earliest insertion" in O(log n) -- comparing on `seq`
/// directly (ascending) would instead break ties toward the *latest*
/// insertion, the opposite of spec §4.4 step 1's "tie-breaker is
/// first-seen."
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct CandidateKey {
	chain_work: Work,
	rev_seq: std::cmp::Reverse<u64>,
	id: NodeId,
}

/// Tracks every node that is (a) `HEADER_VALID` with no failed ancestor,
/// and (b) not known to be worse than the current tip, without having to
/// rescan the whole arena on each header (spec §4.3).
#[derive(Debug, Default)]
pub struct CandidateSet {
	keys: BTreeSet<CandidateKey>,
}

impl CandidateSet {
	pub fn new() -> CandidateSet {
		CandidateSet::default()
	}

	/// Admits `id` as a candidate if its status allows it (spec §4.3
	/// admission rule). Safe to call redundantly.
	pub fn insert(&mut self, arena: &Arena, id: NodeId) {
		let node = arena.get(id);
		if !node.status.is_admissible() {
			return;
		}
		self.keys.insert(CandidateKey {
			chain_work: node.chain_work.clone(),
			rev_seq: std::cmp::Reverse(node.seq),
			id,
		});
	}

	/// Drops `id` from the set -- called when a node is found to be
	/// invalid, or to be an ancestor of one (spec §4.3 "removed once
	/// found to be an ancestor of an invalid node, or once its own
	/// `VALIDATION_FAILED` bit is set").
	pub fn remove(&mut self, arena: &Arena, id: NodeId) {
		let node = arena.get(id);
		self.keys.remove(&CandidateKey {
			chain_work: node.chain_work.clone(),
			rev_seq: std::cmp::Reverse(node.seq),
			id,
		});
	}

	/// The candidate with the most chain work, ties broken by earliest
	/// insertion order (spec §4.4 step 1).
	pub fn best(&self) -> Option<NodeId> {
		self.keys.iter().next_back().map(|k| k.id)
	}

	pub fn len(&self) -> usize {
		self.keys.len()
	}

	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}

	/// Every candidate currently tracked, in no particular order -- used by
	/// the facade's post-activation pruning pass.
	pub fn ids(&self) -> Vec<NodeId> {
		self.keys.iter().map(|k| k.id).collect()
	}

	/// Removes every candidate whose status is no longer admissible --
	/// used after an invalidation has propagated `ANCESTOR_FAILED` down a
	/// subtree, to sweep candidates that silently went stale.
	pub fn retain_admissible(&mut self, arena: &Arena) {
		self.keys
			.retain(|k| arena.get(k.id).status.is_admissible());
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use hdrchain_core::hash::Hash256;

	fn insert_node(arena: &mut Arena, height: u64, work: u64, status: Status) -> NodeId {
		arena.insert(
			Hash256([height as u8; 32]),
			height,
			height as u32,
			0x1d00_ffff,
			None,
			Work::from_be_bytes(&work.to_be_bytes()),
			status,
			0,
		)
	}

	#[test]
	fn best_picks_highest_work() {
		let mut arena = Arena::new();
		let a = insert_node(&mut arena, 1, 10, Status::HEADER_VALID);
		let b = insert_node(&mut arena, 2, 20, Status::HEADER_VALID);
		let mut candidates = CandidateSet::new();
		candidates.insert(&arena, a);
		candidates.insert(&arena, b);
		assert_eq!(candidates.best(), Some(b));
	}

	#[test]
	fn ties_broken_by_earliest_insertion() {
		let mut arena = Arena::new();
		let a = insert_node(&mut arena, 1, 10, Status::HEADER_VALID);
		let b = insert_node(&mut arena, 2, 10, Status::HEADER_VALID);
		let mut candidates = CandidateSet::new();
		candidates.insert(&arena, a);
		candidates.insert(&arena, b);
		assert_eq!(candidates.best(), Some(a));
	}

	#[test]
	fn invalid_nodes_are_not_admitted() {
		let mut arena = Arena::new();
		let a = insert_node(&mut arena, 1, 10, Status::VALIDATION_FAILED);
		let mut candidates = CandidateSet::new();
		candidates.insert(&arena, a);
		assert!(candidates.is_empty());
	}

	#[test]
	fn remove_drops_a_candidate() {
		let mut arena = Arena::new();
		let a = insert_node(&mut arena, 1, 10, Status::HEADER_VALID);
		let mut candidates = CandidateSet::new();
		candidates.insert(&arena, a);
		candidates.remove(&arena, a);
		assert!(candidates.is_empty());
	}

	#[test]
	fn retain_admissible_sweeps_stale_entries() {
		let mut arena = Arena::new();
		let a = insert_node(&mut arena, 1, 10, Status::HEADER_VALID);
		let mut candidates = CandidateSet::new();
		candidates.insert(&arena, a);
		arena.get_mut(a).status.insert(Status::ANCESTOR_FAILED);
		candidates.retain_admissible(&arena);
		assert!(candidates.is_empty());
	}
}
