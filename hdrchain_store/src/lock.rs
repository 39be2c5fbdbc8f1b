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

//! Cooperative datadir lock (spec §5 "Data-directory lock: acquired at
//! startup via a cooperative file-lock ... released only at shutdown. A
//! second process on the same directory fails fast."). Grounded on the
//! teacher's `Server::one_grin_at_a_time` (`servers/src/grin/server.rs`),
//! which takes an advisory exclusive lock on `grin.lock` via `fs2`;
//! supplements it with the original C++ implementation's `LockDirectory`
//! (`include/util/fs_lock.hpp`) shape of returning a typed result instead
//! of bailing out through a generic I/O error.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Error, ErrorKind};

/// Holds the advisory lock on `<datadir>/.lock` for as long as it's alive.
/// Dropping it releases the lock (the OS releases an `flock` automatically
/// when the last file descriptor referencing it closes).
pub struct DatadirLock {
	_file: File,
	path: PathBuf,
}

impl DatadirLock {
	pub fn path(&self) -> &Path {
		&self.path
	}
}

/// Acquires the exclusive lock on `<datadir>/.lock`, creating the
/// directory and lock file if needed. Returns `Err(ErrorKind::DatadirLocked)`
/// immediately if another process already holds it -- never blocks.
pub fn lock_datadir(datadir: &Path) -> Result<DatadirLock, Error> {
	fs::create_dir_all(datadir)?;
	let path = datadir.join(".lock");
	let file = OpenOptions::new()
		.read(true)
		.write(true)
		.create(true)
		.open(&path)?;
	file.try_lock_exclusive()
		.map_err(|_| Error::from(ErrorKind::DatadirLocked))?;
	Ok(DatadirLock { _file: file, path })
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn second_lock_on_same_dir_fails() {
		let dir = tempfile::tempdir().unwrap();
		let first = lock_datadir(dir.path()).unwrap();
		let second = lock_datadir(dir.path());
		assert!(second.is_err());
		drop(first);
		// Once released, a fresh lock attempt succeeds.
		assert!(lock_datadir(dir.path()).is_ok());
	}

	#[test]
	fn lock_path_is_datadir_dot_lock() {
		let dir = tempfile::tempdir().unwrap();
		let lock = lock_datadir(dir.path()).unwrap();
		assert_eq!(lock.path(), dir.path().join(".lock"));
	}
}
