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

//! The persisted header snapshot (spec §4.7 / §6): a single JSON file
//! holding every known header-index node. Written atomically --
//! `path.tmp.<rand>`, fsync the file, fsync the parent directory, rename
//! over the target -- so a crash mid-write never leaves a corrupt
//! `headers.json` behind. Grounded on the teacher's rename-into-place
//! pattern (`store/src/flatfile.rs`, `store/src/types.rs` `fs::rename`),
//! generalized to add the fsync-before-rename step this spec calls for.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde_derive::{Deserialize, Serialize};

use hdrchain_chain::chainstate::SnapshotNode;
use hdrchain_chain::index::Status;
use hdrchain_core::hash::Hash256;
use hdrchain_core::work::Work;

use crate::error::{Error, ErrorKind};

/// Only schema version this binary understands. Bumped whenever the wire
/// shape of `Snapshot` changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

const SNAPSHOT_FILE_NAME: &str = "headers.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireNode {
	hash: String,
	prev: String,
	height: u64,
	time: u32,
	bits: u32,
	status: u8,
	work: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireSnapshot {
	version: u32,
	tip: String,
	nodes: Vec<WireNode>,
}

/// All-zero hash, used on the wire to mean "no parent" (the genesis node).
fn zero_hash_hex() -> String {
	Hash256([0u8; 32]).to_hex()
}

fn hash_to_hex(h: &Hash256) -> String {
	h.to_hex()
}

fn hash_from_hex(s: &str) -> Result<Hash256, Error> {
	if s.len() != 64 {
		return Err(ErrorKind::Corrupt(format!("bad hash length: {}", s.len())).into());
	}
	let mut bytes = [0u8; 32];
	for i in 0..32 {
		bytes[i] = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
			.map_err(|e| ErrorKind::Corrupt(format!("bad hash hex: {}", e)))?;
	}
	Ok(Hash256(bytes))
}

/// Writes `nodes`/`tip` to `<datadir>/headers.json` atomically (spec §4.7):
/// serialize to a temp file in the same directory, fsync it, fsync the
/// parent directory, then rename over the target. Permissions are set to
/// 0600 on Unix (spec §6 "Atomically written ... with permissions 0600").
pub fn save(datadir: &Path, nodes: &[SnapshotNode], tip: &Hash256) -> Result<(), Error> {
	fs::create_dir_all(datadir)?;

	let wire = WireSnapshot {
		version: SCHEMA_VERSION,
		tip: hash_to_hex(tip),
		nodes: nodes
			.iter()
			.map(|n| WireNode {
				hash: hash_to_hex(&n.hash),
				prev: n.prev.as_ref().map(hash_to_hex).unwrap_or_else(zero_hash_hex),
				height: n.height,
				time: n.time,
				bits: n.bits,
				status: n.status.bits(),
				work: n.work.to_hex(),
			})
			.collect(),
	};
	let json = serde_json::to_vec_pretty(&wire)
		.map_err(|e| ErrorKind::Corrupt(format!("failed to serialize snapshot: {}", e)))?;

	let suffix: u32 = rand::thread_rng().gen();
	let tmp_path = datadir.join(format!("{}.tmp.{:08x}", SNAPSHOT_FILE_NAME, suffix));
	{
		let mut tmp_file = open_with_owner_only_perms(&tmp_path)?;
		tmp_file.write_all(&json)?;
		tmp_file.sync_all()?;
	}

	let final_path = datadir.join(SNAPSHOT_FILE_NAME);
	fsync_dir(datadir)?;
	fs::rename(&tmp_path, &final_path)?;

	Ok(())
}

/// Loads `<datadir>/headers.json`. Per spec §4.7 ("Reader tolerates
/// missing/corrupt files by reinitializing from genesis"), a missing or
/// unparseable file is reported as `Ok(None)` rather than an error -- only
/// genuine I/O failures (permission denied, disk errors) propagate as
/// `Err`.
pub fn load(datadir: &Path) -> Result<Option<(Vec<SnapshotNode>, Hash256)>, Error> {
	let path = datadir.join(SNAPSHOT_FILE_NAME);
	let bytes = match fs::read(&path) {
		Ok(b) => b,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(e.into()),
	};

	let wire: WireSnapshot = match serde_json::from_slice(&bytes) {
		Ok(w) => w,
		Err(e) => {
			log::warn!("ignoring corrupt header snapshot at {:?}: {}", path, e);
			return Ok(None);
		}
	};

	if wire.version != SCHEMA_VERSION {
		log::warn!(
			"ignoring header snapshot with unsupported schema version {} (expected {})",
			wire.version,
			SCHEMA_VERSION
		);
		return Ok(None);
	}

	let zero = zero_hash_hex();
	let mut nodes = Vec::with_capacity(wire.nodes.len());
	for n in &wire.nodes {
		let hash = hash_from_hex(&n.hash)?;
		let prev = if n.prev == zero {
			None
		} else {
			Some(hash_from_hex(&n.prev)?)
		};
		let work = Work::from_be_bytes(&hex_decode(&n.work)?);
		nodes.push(SnapshotNode {
			hash,
			prev,
			height: n.height,
			time: n.time,
			bits: n.bits,
			status: Status::from_bits_truncate(n.status),
			work,
		});
	}
	let tip = hash_from_hex(&wire.tip)?;
	Ok(Some((nodes, tip)))
}

fn hex_decode(s: &str) -> Result<Vec<u8>, Error> {
	if s.len() % 2 != 0 {
		return Err(ErrorKind::Corrupt(format!("odd-length hex: {}", s)).into());
	}
	(0..s.len())
		.step_by(2)
		.map(|i| {
			u8::from_str_radix(&s[i..i + 2], 16)
				.map_err(|e| ErrorKind::Corrupt(format!("bad hex: {}", e)).into())
		})
		.collect()
}

#[cfg(unix)]
fn open_with_owner_only_perms(path: &PathBuf) -> Result<File, Error> {
	use std::os::unix::fs::OpenOptionsExt;
	Ok(OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(true)
		.mode(0o600)
		.open(path)?)
}

#[cfg(not(unix))]
fn open_with_owner_only_perms(path: &PathBuf) -> Result<File, Error> {
	Ok(OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(true)
		.open(path)?)
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> Result<(), Error> {
	let dir_file = File::open(dir)?;
	dir_file.sync_all()?;
	Ok(())
}

#[cfg(not(unix))]
fn fsync_dir(_dir: &Path) -> Result<(), Error> {
	// Directory fsync isn't meaningful on Windows; the rename itself is
	// already atomic there.
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use hdrchain_core::hash::Hashed;
	use hdrchain_core::header::Header;
	use hdrchain_core::hash::Hash160;

	fn sample_nodes() -> (Vec<SnapshotNode>, Hash256) {
		let genesis = Header {
			version: 1,
			prev_hash: Hash256([0u8; 32]),
			miner_address: Hash160([0u8; 20]),
			time: 0,
			bits: 0x207f_ffff,
			nonce: 0,
			pow_hash: Hash256([0u8; 32]),
		};
		let genesis_hash = genesis.hash();
		let child = Header {
			version: 1,
			prev_hash: genesis_hash,
			miner_address: Hash160([0u8; 20]),
			time: 120,
			bits: 0x207f_ffff,
			nonce: 1,
			pow_hash: Hash256([1u8; 32]),
		};
		let child_hash = child.hash();
		let nodes = vec![
			SnapshotNode {
				hash: genesis_hash,
				prev: None,
				height: 0,
				time: 0,
				bits: 0x207f_ffff,
				status: Status::HEADER_VALID,
				work: Work::zero(),
			},
			SnapshotNode {
				hash: child_hash,
				prev: Some(genesis_hash),
				height: 1,
				time: 120,
				bits: 0x207f_ffff,
				status: Status::HEADER_VALID,
				work: Work::one(),
			},
		];
		(nodes, child_hash)
	}

	#[test]
	fn save_then_load_round_trips_tip_and_nodes() {
		let dir = tempfile::tempdir().unwrap();
		let (nodes, tip) = sample_nodes();
		save(dir.path(), &nodes, &tip).unwrap();

		let (loaded_nodes, loaded_tip) = load(dir.path()).unwrap().unwrap();
		assert_eq!(loaded_tip, tip);
		assert_eq!(loaded_nodes.len(), nodes.len());
		assert_eq!(loaded_nodes[0].hash, nodes[0].hash);
		assert!(loaded_nodes[0].prev.is_none());
		assert_eq!(loaded_nodes[1].prev, Some(nodes[0].hash));
	}

	#[test]
	fn missing_file_loads_as_none() {
		let dir = tempfile::tempdir().unwrap();
		assert!(load(dir.path()).unwrap().is_none());
	}

	#[test]
	fn corrupt_file_loads_as_none() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join(SNAPSHOT_FILE_NAME), b"not json").unwrap();
		assert!(load(dir.path()).unwrap().is_none());
	}

	#[test]
	fn no_tmp_file_survives_a_successful_save() {
		let dir = tempfile::tempdir().unwrap();
		let (nodes, tip) = sample_nodes();
		save(dir.path(), &nodes, &tip).unwrap();
		let leftovers: Vec<_> = fs::read_dir(dir.path())
			.unwrap()
			.filter_map(|e| e.ok())
			.filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
			.collect();
		assert!(leftovers.is_empty());
	}
}
