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

//! TOML-loadable node configuration (spec §3 "Configuration" ambient
//! section). Flattened into one struct rather than the teacher's nested
//! `GlobalConfig`/`ConfigMembers` split, since this node has only the one
//! logical section worth configuring.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hdrchain_core::params::Network;

/// Error loading or parsing a node config file.
#[derive(Debug)]
pub enum ConfigError {
	ParseError(String, String),
	FileIOError(String, String),
}

impl fmt::Display for ConfigError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConfigError::ParseError(file, msg) => {
				write!(f, "error parsing configuration file at {} - {}", file, msg)
			}
			ConfigError::FileIOError(file, msg) => write!(f, "{} {}", msg, file),
		}
	}
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
	fn from(e: io::Error) -> ConfigError {
		ConfigError::FileIOError(String::new(), format!("error loading config file: {}", e))
	}
}

/// Default listening port and peer-count knobs a node is willing to take
/// from a config file -- the transport/peer-multiplex subsystem itself is
/// out of scope (spec §1 Non-goals), so these exist only to be handed to
/// whatever does implement it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
	/// Directory holding `.lock` and `headers.json`.
	pub datadir: PathBuf,
	pub network: Network,
	#[serde(default = "default_max_peers")]
	pub max_peers: u32,
	#[serde(default = "default_save_interval_secs")]
	pub save_interval_secs: u64,
}

fn default_max_peers() -> u32 {
	8
}

fn default_save_interval_secs() -> u64 {
	60
}

impl Default for NodeConfig {
	fn default() -> NodeConfig {
		NodeConfig {
			datadir: default_datadir(),
			network: Network::Mainnet,
			max_peers: default_max_peers(),
			save_interval_secs: default_save_interval_secs(),
		}
	}
}

fn default_datadir() -> PathBuf {
	let mut dir = dirs_home();
	dir.push(".hdrchain");
	dir
}

fn dirs_home() -> PathBuf {
	std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

impl NodeConfig {
	/// Loads a config from `path` if it exists, falling back to
	/// `NodeConfig::default()` if it doesn't -- matching the teacher
	/// binary's "config file is optional" behavior (`src/bin/grin.rs`).
	pub fn load_or_default(path: &Path) -> Result<NodeConfig, ConfigError> {
		if !path.exists() {
			return Ok(NodeConfig::default());
		}
		let content = fs::read_to_string(path)?;
		toml::from_str(&content)
			.map_err(|e| ConfigError::ParseError(path.display().to_string(), e.to_string()))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn missing_file_falls_back_to_default() {
		let cfg = NodeConfig::load_or_default(Path::new("/nonexistent/hdrchain.toml")).unwrap();
		assert_eq!(cfg.network, Network::Mainnet);
	}

	#[test]
	fn parses_a_minimal_toml_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("hdrchain.toml");
		fs::write(&path, "datadir = \"/tmp/hdrchain-test\"\nnetwork = \"Testnet\"\n").unwrap();
		let cfg = NodeConfig::load_or_default(&path).unwrap();
		assert_eq!(cfg.network, Network::Testnet);
		assert_eq!(cfg.max_peers, default_max_peers());
	}

	#[test]
	fn rejects_malformed_toml() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("hdrchain.toml");
		fs::write(&path, "not = [valid").unwrap();
		assert!(NodeConfig::load_or_default(&path).is_err());
	}
}
