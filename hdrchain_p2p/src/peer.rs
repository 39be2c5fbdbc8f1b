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

//! The peer layer interface the sync manager consumes (spec §4.6). No
//! concrete banlist or connection pool lives here -- that subsystem is out
//! of scope (spec §1) -- only the trait boundary and an in-memory test
//! double good enough to drive the sync-manager's own unit tests.

use std::collections::{HashMap, HashSet};

use hdrchain_core::hash::Hash256;

use bitflags::bitflags;

use hdrchain_chain::PeerId;

/// Reasons the sync manager can report a peer for (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MisbehaviorKind {
	OversizedMessage,
	InvalidPow,
	NonContinuous,
	InvalidHeader,
	TooManyOrphans,
	UnconnectingHeaders,
}

bitflags! {
	/// Peer permission flags. Only `DOWNLOAD` is consulted by this crate
	/// (spec §4.5 "Serving GETHEADERS" step 1).
	pub struct Permissions: u8 {
		const DOWNLOAD = 0b0000_0001;
	}
}

/// Per-connection state the sync manager reads and writes, normally held
/// by the peer object itself (spec §4.5 "State per connection").
#[derive(Debug, Clone)]
pub struct PeerMeta {
	pub outbound: bool,
	pub is_feeler: bool,
	pub successfully_connected: bool,
	pub sync_started: bool,
	pub permissions: Permissions,
}

impl PeerMeta {
	pub fn outbound_handshaked(permissions: Permissions) -> PeerMeta {
		PeerMeta {
			outbound: true,
			is_feeler: false,
			successfully_connected: true,
			sync_started: false,
			permissions,
		}
	}
}

/// The external peer layer's interface, as consumed by `HeaderSyncManager`
/// (spec §4.6). Implemented by the real networking stack in a full node;
/// here it is only a trait plus a test double.
pub trait PeerBook {
	fn get_outbound_peers(&self) -> Vec<PeerId>;
	fn meta(&self, peer: PeerId) -> Option<PeerMeta>;
	fn set_sync_started(&self, peer: PeerId, started: bool);

	fn report_misbehavior(&self, peer: PeerId, kind: MisbehaviorKind);
	fn should_disconnect(&self, peer: PeerId) -> bool;
	fn remove_peer(&self, peer: PeerId);
	fn get_permissions(&self, peer: PeerId) -> Permissions;

	fn has_invalid_header_hash(&self, peer: PeerId, hash: &Hash256) -> bool;
	fn note_invalid_header_hash(&self, peer: PeerId, hash: Hash256);

	fn get_unconnecting_headers_count(&self, peer: PeerId) -> u32;
	fn increment_unconnecting_headers_count(&self, peer: PeerId);
	fn reset_unconnecting_headers_count(&self, peer: PeerId);
}

/// Misbehavior score charged per report kind, loosely modeled on the
/// original implementation's DoS scoring; a peer is disconnected once its
/// accumulated score reaches `DISCONNECT_THRESHOLD`.
pub const DISCONNECT_THRESHOLD: u32 = 100;

fn score_of(kind: MisbehaviorKind) -> u32 {
	match kind {
		MisbehaviorKind::OversizedMessage => 20,
		MisbehaviorKind::InvalidPow => 100,
		MisbehaviorKind::NonContinuous => 20,
		MisbehaviorKind::InvalidHeader => 100,
		MisbehaviorKind::TooManyOrphans => 20,
		MisbehaviorKind::UnconnectingHeaders => 10,
	}
}

#[derive(Debug, Default)]
struct PeerRecord {
	meta: Option<PeerMeta>,
	score: u32,
	removed: bool,
	invalid_header_hashes: HashSet<Hash256>,
	unconnecting_headers_count: u32,
}

/// In-memory `PeerBook` double, good enough to drive the sync manager's
/// own unit tests without a real networking stack. Supplements the spec:
/// the distilled version never specifies a test double, but the sync
/// manager can't be unit-tested at all without one.
#[derive(Debug, Default)]
pub struct InMemoryPeerBook {
	peers: parking_lot::Mutex<HashMap<PeerId, PeerRecord>>,
}

impl InMemoryPeerBook {
	pub fn new() -> InMemoryPeerBook {
		InMemoryPeerBook {
			peers: parking_lot::Mutex::new(HashMap::new()),
		}
	}

	pub fn add_peer(&self, id: PeerId, meta: PeerMeta) {
		let mut peers = self.peers.lock();
		peers.entry(id).or_default().meta = Some(meta);
	}

	pub fn score(&self, id: PeerId) -> u32 {
		self.peers.lock().get(&id).map(|r| r.score).unwrap_or(0)
	}

	pub fn is_removed(&self, id: PeerId) -> bool {
		self.peers.lock().get(&id).map(|r| r.removed).unwrap_or(false)
	}
}

impl PeerBook for InMemoryPeerBook {
	fn get_outbound_peers(&self) -> Vec<PeerId> {
		let peers = self.peers.lock();
		let mut out: Vec<PeerId> = peers
			.iter()
			.filter(|(_, r)| !r.removed && r.meta.as_ref().map(|m| m.outbound).unwrap_or(false))
			.map(|(id, _)| *id)
			.collect();
		out.sort_by_key(|id| id.0);
		out
	}

	fn meta(&self, peer: PeerId) -> Option<PeerMeta> {
		self.peers.lock().get(&peer).and_then(|r| r.meta.clone())
	}

	fn set_sync_started(&self, peer: PeerId, started: bool) {
		if let Some(r) = self.peers.lock().get_mut(&peer) {
			if let Some(meta) = r.meta.as_mut() {
				meta.sync_started = started;
			}
		}
	}

	fn report_misbehavior(&self, peer: PeerId, kind: MisbehaviorKind) {
		let mut peers = self.peers.lock();
		let record = peers.entry(peer).or_default();
		record.score += score_of(kind);
		log::debug!("peer {:?} misbehavior {:?}, score now {}", peer, kind, record.score);
	}

	fn should_disconnect(&self, peer: PeerId) -> bool {
		self.peers.lock().get(&peer).map(|r| r.score >= DISCONNECT_THRESHOLD).unwrap_or(false)
	}

	fn remove_peer(&self, peer: PeerId) {
		if let Some(r) = self.peers.lock().get_mut(&peer) {
			r.removed = true;
		}
	}

	fn get_permissions(&self, peer: PeerId) -> Permissions {
		self.peers
			.lock()
			.get(&peer)
			.and_then(|r| r.meta.as_ref())
			.map(|m| m.permissions)
			.unwrap_or(Permissions::empty())
	}

	fn has_invalid_header_hash(&self, peer: PeerId, hash: &Hash256) -> bool {
		self.peers
			.lock()
			.get(&peer)
			.map(|r| r.invalid_header_hashes.contains(hash))
			.unwrap_or(false)
	}

	fn note_invalid_header_hash(&self, peer: PeerId, hash: Hash256) {
		self.peers.lock().entry(peer).or_default().invalid_header_hashes.insert(hash);
	}

	fn get_unconnecting_headers_count(&self, peer: PeerId) -> u32 {
		self.peers.lock().get(&peer).map(|r| r.unconnecting_headers_count).unwrap_or(0)
	}

	fn increment_unconnecting_headers_count(&self, peer: PeerId) {
		self.peers.lock().entry(peer).or_default().unconnecting_headers_count += 1;
	}

	fn reset_unconnecting_headers_count(&self, peer: PeerId) {
		if let Some(r) = self.peers.lock().get_mut(&peer) {
			r.unconnecting_headers_count = 0;
		}
	}
}
