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

//! Header-graph persistence: an atomically-written JSON snapshot (spec
//! §4.7) plus the cooperative datadir lock (spec §5). No block bodies are
//! ever stored here -- just the index this crate's sibling `hdrchain_chain`
//! needs to rebuild itself on restart.

#[macro_use]
extern crate failure_derive;
extern crate failure;

pub mod error;
pub mod lock;
pub mod snapshot;

pub use error::{Error, ErrorKind};
pub use lock::{lock_datadir, DatadirLock};
pub use snapshot::{load, save, SCHEMA_VERSION};
