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

//! A small, ordered pub-sub bus for chain-tip events, decoupling the
//! chainstate facade from whatever wants to react to it (persistence,
//! logging, RPC). Grounded on the teacher's `ChainAdapter` trait
//! (`chain/src/types.rs`), generalized from a single fixed adapter to a
//! dynamic list of listeners with RAII unsubscribe, per spec §4.6.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use hdrchain_core::hash::Hash256;
use hdrchain_core::work::Work;

/// An immutable snapshot of a block-index node, handed to listeners so
/// they never need to reach back into the (possibly locked) arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
	pub hash: Hash256,
	pub height: u64,
	pub time: u32,
	pub chain_work: Work,
}

/// Callbacks a listener may implement; every method has a no-op default
/// so listeners only override what they care about (spec §4.6).
pub trait ChainListener: Send + Sync {
	fn block_connected(&self, _node: &NodeSnapshot) {}
	fn block_disconnected(&self, _node: &NodeSnapshot) {}
	/// Fired once per `ActivateBestChain` call, after all connects and
	/// disconnects, carrying the final tip.
	fn chain_tip(&self, _node: &NodeSnapshot) {}
	/// Fired instead of activating a reorg deeper than
	/// `suspicious_reorg_depth` (spec §4.4 step 4).
	fn suspicious_reorg(&self, _depth: u64, _candidate: &NodeSnapshot) {}
	fn network_expired(&self, _height: u64) {}
}

struct Entry {
	id: u64,
	listener: Arc<dyn ChainListener>,
}

/// Ordered multicast bus. Listeners are invoked oldest-subscribed-first
/// for connect/tip/expiry events, and newest-subscribed-first for
/// disconnect events, matching spec §4.6's ordering guarantee (a listener
/// that subscribed early sees a disconnect only after listeners that
/// subscribed later have already seen it, mirroring stack-like teardown).
#[derive(Default)]
pub struct Notifier {
	listeners: RwLock<Vec<Entry>>,
	next_id: AtomicU64,
}

/// RAII handle: dropping it unsubscribes the listener. Cloning the
/// `Notifier` it came from keeps the bus alive independently.
pub struct Subscription {
	notifier: Arc<Notifier>,
	id: u64,
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.notifier.unsubscribe(self.id);
	}
}

impl Notifier {
	pub fn new() -> Arc<Notifier> {
		Arc::new(Notifier {
			listeners: RwLock::new(Vec::new()),
			next_id: AtomicU64::new(0),
		})
	}

	pub fn subscribe(self: &Arc<Self>, listener: Arc<dyn ChainListener>) -> Subscription {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		self.listeners.write().push(Entry { id, listener });
		Subscription {
			notifier: self.clone(),
			id,
		}
	}

	fn unsubscribe(&self, id: u64) {
		self.listeners.write().retain(|e| e.id != id);
	}

	pub fn notify_connected(&self, node: &NodeSnapshot) {
		for entry in self.listeners.read().iter() {
			entry.listener.block_connected(node);
		}
	}

	pub fn notify_disconnected(&self, node: &NodeSnapshot) {
		for entry in self.listeners.read().iter().rev() {
			entry.listener.block_disconnected(node);
		}
	}

	pub fn notify_tip(&self, node: &NodeSnapshot) {
		for entry in self.listeners.read().iter() {
			entry.listener.chain_tip(node);
		}
	}

	pub fn notify_suspicious_reorg(&self, depth: u64, candidate: &NodeSnapshot) {
		for entry in self.listeners.read().iter() {
			entry.listener.suspicious_reorg(depth, candidate);
		}
	}

	pub fn notify_network_expired(&self, height: u64) {
		for entry in self.listeners.read().iter() {
			entry.listener.network_expired(height);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::sync::Mutex;

	struct RecordingListener {
		name: &'static str,
		log: Arc<Mutex<Vec<String>>>,
	}

	impl ChainListener for RecordingListener {
		fn block_connected(&self, node: &NodeSnapshot) {
			self.log
				.lock()
				.unwrap()
				.push(format!("{}:connected:{}", self.name, node.height));
		}
		fn block_disconnected(&self, node: &NodeSnapshot) {
			self.log
				.lock()
				.unwrap()
				.push(format!("{}:disconnected:{}", self.name, node.height));
		}
	}

	fn snapshot(height: u64) -> NodeSnapshot {
		NodeSnapshot {
			hash: Hash256([height as u8; 32]),
			height,
			time: height as u32,
			chain_work: Work::zero(),
		}
	}

	#[test]
	fn connect_notifications_are_oldest_subscriber_first() {
		let notifier = Notifier::new();
		let log = Arc::new(Mutex::new(Vec::new()));
		let _a = notifier.subscribe(Arc::new(RecordingListener {
			name: "a",
			log: log.clone(),
		}));
		let _b = notifier.subscribe(Arc::new(RecordingListener {
			name: "b",
			log: log.clone(),
		}));
		notifier.notify_connected(&snapshot(1));
		let entries = log.lock().unwrap();
		assert_eq!(*entries, vec!["a:connected:1", "b:connected:1"]);
	}

	#[test]
	fn disconnect_notifications_are_newest_subscriber_first() {
		let notifier = Notifier::new();
		let log = Arc::new(Mutex::new(Vec::new()));
		let _a = notifier.subscribe(Arc::new(RecordingListener {
			name: "a",
			log: log.clone(),
		}));
		let _b = notifier.subscribe(Arc::new(RecordingListener {
			name: "b",
			log: log.clone(),
		}));
		notifier.notify_disconnected(&snapshot(1));
		let entries = log.lock().unwrap();
		assert_eq!(*entries, vec!["b:disconnected:1", "a:disconnected:1"]);
	}

	#[test]
	fn dropping_the_subscription_unsubscribes() {
		let notifier = Notifier::new();
		let log = Arc::new(Mutex::new(Vec::new()));
		let sub = notifier.subscribe(Arc::new(RecordingListener {
			name: "a",
			log: log.clone(),
		}));
		drop(sub);
		notifier.notify_connected(&snapshot(1));
		assert!(log.lock().unwrap().is_empty());
	}
}
