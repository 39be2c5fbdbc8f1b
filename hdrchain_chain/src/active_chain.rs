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

//! The dense, height-indexed view of the canonical chain, plus the two
//! operations peers actually need of it: finding a fork point and
//! building a locator (spec §4.2).

use hdrchain_core::hash::Hash256;

use index::{Arena, NodeId};

/// `active[i].height == i` for all `i`; `tip()` is `active.last()` (spec
/// §3 ActiveChain).
#[derive(Debug, Clone, Default)]
pub struct ActiveChain {
	nodes: Vec<NodeId>,
}

impl ActiveChain {
	pub fn new() -> ActiveChain {
		ActiveChain { nodes: Vec::new() }
	}

	pub fn height(&self) -> u64 {
		self.nodes.len() as u64 - 1
	}

	pub fn tip(&self) -> Option<NodeId> {
		self.nodes.last().copied()
	}

	pub fn get_at_height(&self, height: u64) -> Option<NodeId> {
		self.nodes.get(height as usize).copied()
	}

	pub fn is_on_active_chain(&self, arena: &Arena, id: NodeId) -> bool {
		let height = arena.get(id).height;
		self.get_at_height(height) == Some(id)
	}

	/// Truncates the chain back to (and including) `height`.
	pub fn truncate_to_height(&mut self, height: u64) {
		self.nodes.truncate((height + 1) as usize);
	}

	pub fn push(&mut self, id: NodeId) {
		self.nodes.push(id);
	}

	pub fn reset_to(&mut self, nodes: Vec<NodeId>) {
		self.nodes = nodes;
	}
}

/// The unique deepest ancestor of `node` that lies on the active chain.
/// Walks back from the deeper of the two until heights match, then in
/// lockstep (spec §4.2 FindFork -- O(depth difference)).
pub fn find_fork(arena: &Arena, active: &ActiveChain, node: NodeId) -> NodeId {
	let mut cursor = node;
	let mut cursor_height = arena.get(cursor).height;

	// Walk `cursor` down to the active chain's height, if it's deeper.
	while cursor_height > active.height() {
		cursor = arena.get(cursor).prev.expect("height > 0 implies a prev");
		cursor_height -= 1;
	}

	// `active_cursor` walks the active chain at the same height.
	let mut active_cursor = active
		.get_at_height(cursor_height)
		.expect("height within active chain bounds");

	while active_cursor != cursor {
		cursor = arena.get(cursor).prev.expect("genesis is always shared");
		active_cursor = arena
			.get(active_cursor)
			.prev
			.expect("genesis is always shared");
	}
	active_cursor
}

/// Sparse height vector (tip, tip-1, tip-2, tip-4, ...) always terminating
/// at genesis, built by walking back from `start` via `prev` links --
/// independent of the active chain, so a locator can be built from a
/// side-chain node (spec §4.2 GetLocator; doubling-step scheme grounded on
/// the teacher's `get_locator_heights`/`get_locator` in
/// `servers/src/grin/sync/header_sync.rs`).
pub fn get_locator(arena: &Arena, start: NodeId) -> Vec<Hash256> {
	let start_height = arena.get(start).height;

	let mut heights = vec![start_height];
	let mut step = 1u64;
	let mut h = start_height;
	while h > step {
		h -= step;
		heights.push(h);
		step *= 2;
	}
	if *heights.last().unwrap() != 0 {
		heights.push(0);
	}

	let mut locator = Vec::with_capacity(heights.len());
	let mut remaining = heights.into_iter().peekable();
	let mut current = Some(start);
	while let Some(id) = current {
		let node = arena.get(id);
		if remaining.peek() == Some(&node.height) {
			locator.push(node.hash);
			remaining.next();
			if remaining.peek().is_none() {
				break;
			}
		}
		current = node.prev;
	}
	locator
}

#[cfg(test)]
mod test {
	use super::*;
	use hdrchain_core::work::Work;
	use index::Status;

	fn build_chain(len: u64) -> (Arena, Vec<NodeId>) {
		let mut arena = Arena::new();
		let mut ids = Vec::new();
		let mut prev = None;
		for h in 0..len {
			let id = arena.insert(
				Hash256([h as u8; 32]),
				h,
				h as u32,
				0x1d00_ffff,
				prev,
				Work::from_be_bytes(&[h as u8]),
				Status::HEADER_VALID,
				0,
			);
			ids.push(id);
			prev = Some(id);
		}
		(arena, ids)
	}

	#[test]
	fn locator_always_ends_at_genesis() {
		let (arena, ids) = build_chain(100);
		let locator = get_locator(&arena, *ids.last().unwrap());
		assert_eq!(*locator.last().unwrap(), arena.get(ids[0]).hash);
	}

	#[test]
	fn locator_first_entry_is_start_node() {
		let (arena, ids) = build_chain(50);
		let start = ids[30];
		let locator = get_locator(&arena, start);
		assert_eq!(locator[0], arena.get(start).hash);
	}

	#[test]
	fn find_fork_on_shared_prefix() {
		let (mut arena, ids) = build_chain(5);
		let mut active = ActiveChain::new();
		for id in &ids {
			active.push(*id);
		}
		// Branch off after height 2.
		let fork = arena.insert(
			Hash256([99u8; 32]),
			3,
			3,
			0x1d00_ffff,
			Some(ids[2]),
			Work::from_be_bytes(&[9u8]),
			Status::HEADER_VALID,
			0,
		);
		assert_eq!(find_fork(&arena, &active, fork), ids[2]);
	}

	#[test]
	fn find_fork_of_tip_is_tip() {
		let (arena, ids) = build_chain(5);
		let mut active = ActiveChain::new();
		for id in &ids {
			active.push(*id);
		}
		assert_eq!(
			find_fork(&arena, &active, *ids.last().unwrap()),
			*ids.last().unwrap()
		);
	}
}
