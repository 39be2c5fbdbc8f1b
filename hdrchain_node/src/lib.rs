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

//! Wires the chain core, persistence and sync crates together into a
//! runnable node (spec §2 "hdrchain_node"). Grounded on `src/bin/grin.rs`
//! for the main-loop shape and `config/` for config loading.

#[macro_use]
extern crate serde_derive;
extern crate log;
extern crate serde;
extern crate toml;

extern crate hdrchain_chain;
extern crate hdrchain_core;
extern crate hdrchain_p2p;
extern crate hdrchain_store;
extern crate hdrchain_util;

#[cfg(test)]
extern crate tempfile;

pub mod config;
pub mod control;

pub use config::{ConfigError, NodeConfig};
pub use control::{ControlInterface, NullControlInterface};
