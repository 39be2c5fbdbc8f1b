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

//! The block-index arena: one node per known header, addressed by a
//! stable `NodeId` rather than a pointer (spec §9 design note -- "use an
//! arena with stable indices ... no `Rc`-style sharing is required").

use std::collections::HashMap;

use bitflags::bitflags;

use hdrchain_core::hash::Hash256;
use hdrchain_core::work::Work;
use hdrchain_validator::PrevContext;

/// An index into the arena. Never reused, never invalidated: nodes are
/// append-only for the lifetime of the process (spec §3 invariant (d)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

bitflags! {
	/// Validity bits tracked per node (spec §3 BlockIndex.status).
	pub struct Status: u8 {
		const HEADER_VALID      = 0b0000_0001;
		const VALIDATION_FAILED = 0b0000_0010;
		const ANCESTOR_FAILED   = 0b0000_0100;
	}
}

impl Status {
	/// Whether a node with this status may still become, or remain, a
	/// chain-selection candidate.
	pub fn is_admissible(&self) -> bool {
		self.contains(Status::HEADER_VALID)
			&& !self.intersects(Status::VALIDATION_FAILED | Status::ANCESTOR_FAILED)
	}
}

/// One node per known header (spec §3).
#[derive(Debug, Clone)]
pub struct BlockIndex {
	pub hash: Hash256,
	pub height: u64,
	pub time: u32,
	pub bits: u32,
	pub prev: Option<NodeId>,
	pub chain_work: Work,
	pub status: Status,
	pub received_time: i64,
	/// Strictly increasing insertion order, used to break chain-work ties
	/// deterministically in the candidate set (spec §4.4 step 1).
	pub seq: u64,
}

/// Append-only arena of `BlockIndex` nodes, keyed by hash for O(1) lookup.
pub struct Arena {
	nodes: Vec<BlockIndex>,
	by_hash: HashMap<Hash256, NodeId>,
	next_seq: u64,
}

impl Arena {
	pub fn new() -> Arena {
		Arena {
			nodes: Vec::new(),
			by_hash: HashMap::new(),
			next_seq: 0,
		}
	}

	pub fn get(&self, id: NodeId) -> &BlockIndex {
		&self.nodes[id.0 as usize]
	}

	pub fn get_mut(&mut self, id: NodeId) -> &mut BlockIndex {
		&mut self.nodes[id.0 as usize]
	}

	pub fn lookup(&self, hash: &Hash256) -> Option<NodeId> {
		self.by_hash.get(hash).copied()
	}

	pub fn contains(&self, hash: &Hash256) -> bool {
		self.by_hash.contains_key(hash)
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Inserts a new node, assigning it the next `NodeId` and sequence
	/// number. Callers are responsible for the idempotence check (spec
	/// §4.4 `AddToBlockIndex`: "a second insert of the same hash returns
	/// the existing node") before calling this.
	pub fn insert(
		&mut self,
		hash: Hash256,
		height: u64,
		time: u32,
		bits: u32,
		prev: Option<NodeId>,
		chain_work: Work,
		status: Status,
		received_time: i64,
	) -> NodeId {
		let id = NodeId(self.nodes.len() as u32);
		let seq = self.next_seq;
		self.next_seq += 1;
		self.nodes.push(BlockIndex {
			hash,
			height,
			time,
			bits,
			prev,
			chain_work,
			status,
			received_time,
			seq,
		});
		self.by_hash.insert(hash, id);
		id
	}

	/// Direct children of `id`, found by a linear scan. The arena doesn't
	/// maintain a forward index since descendant-walks (invalidation
	/// propagation) are comparatively rare and O(n) here is acceptable;
	/// see DESIGN.md.
	pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
		self.nodes
			.iter()
			.enumerate()
			.filter(|(_, n)| n.prev == Some(id))
			.map(|(i, _)| NodeId(i as u32))
			.collect()
	}

	/// Ancestor times, most recent first, for up to `limit` ancestors
	/// (including `id` itself), used to compute median time past.
	pub fn ancestor_times(&self, id: NodeId, limit: usize) -> Vec<u32> {
		let mut times = Vec::with_capacity(limit);
		let mut current = Some(id);
		while let Some(cur) = current {
			if times.len() >= limit {
				break;
			}
			let node = self.get(cur);
			times.push(node.time);
			current = node.prev;
		}
		times
	}

	pub fn median_time_past(&self, id: NodeId) -> u32 {
		let times = self.ancestor_times(id, hdrchain_core::params::ChainParams::MEDIAN_TIME_SPAN);
		hdrchain_core::params::median_time_past(times)
	}

	/// Whether `ancestor` is an ancestor of (or equal to) `node`, walking
	/// back via `prev`.
	pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
		let mut current = Some(node);
		while let Some(cur) = current {
			if cur == ancestor {
				return true;
			}
			current = self.get(cur).prev;
		}
		false
	}
}

impl Default for Arena {
	fn default() -> Arena {
		Arena::new()
	}
}

/// Adapter exposing a node (plus the computed ASERT expectation for its
/// child) through the validator's narrow `PrevContext` trait.
pub struct PrevView<'a> {
	pub arena: &'a Arena,
	pub id: NodeId,
	pub expected_next_bits: u32,
}

impl<'a> PrevContext for PrevView<'a> {
	fn height(&self) -> u64 {
		self.arena.get(self.id).height
	}

	fn time(&self) -> u32 {
		self.arena.get(self.id).time
	}

	fn expected_next_bits(&self) -> u32 {
		self.expected_next_bits
	}

	fn median_time_past(&self) -> u32 {
		self.arena.median_time_past(self.id)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn insert_genesis(arena: &mut Arena) -> NodeId {
		arena.insert(
			Hash256([0u8; 32]),
			0,
			0,
			0x1d00_ffff,
			None,
			Work::zero(),
			Status::HEADER_VALID,
			0,
		)
	}

	#[test]
	fn insert_assigns_increasing_seq() {
		let mut arena = Arena::new();
		let g = insert_genesis(&mut arena);
		let a = arena.insert(
			Hash256([1u8; 32]),
			1,
			1,
			0x1d00_ffff,
			Some(g),
			Work::one(),
			Status::HEADER_VALID,
			0,
		);
		assert!(arena.get(a).seq > arena.get(g).seq);
	}

	#[test]
	fn children_of_finds_direct_descendants() {
		let mut arena = Arena::new();
		let g = insert_genesis(&mut arena);
		let a = arena.insert(
			Hash256([1u8; 32]),
			1,
			1,
			0x1d00_ffff,
			Some(g),
			Work::one(),
			Status::HEADER_VALID,
			0,
		);
		assert_eq!(arena.children_of(g), vec![a]);
	}

	#[test]
	fn is_ancestor_of_walks_prev_chain() {
		let mut arena = Arena::new();
		let g = insert_genesis(&mut arena);
		let a = arena.insert(
			Hash256([1u8; 32]),
			1,
			1,
			0x1d00_ffff,
			Some(g),
			Work::one(),
			Status::HEADER_VALID,
			0,
		);
		let b = arena.insert(
			Hash256([2u8; 32]),
			2,
			2,
			0x1d00_ffff,
			Some(a),
			Work::one() + Work::one(),
			Status::HEADER_VALID,
			0,
		);
		assert!(arena.is_ancestor_of(g, b));
		assert!(arena.is_ancestor_of(a, b));
		assert!(!arena.is_ancestor_of(b, a));
	}
}
