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

//! Header-sync manager, peer-misbehavior adapter and wire codec (spec
//! §4.5, §4.6, §6). This crate knows how bytes become `GETHEADERS`/
//! `HEADERS` and how the sync state machine reacts to them; it never
//! touches a socket itself.

extern crate bitflags;
extern crate byteorder;
extern crate log;
extern crate parking_lot;

extern crate hdrchain_chain;
extern crate hdrchain_core;
extern crate hdrchain_util;
extern crate hdrchain_validator;

pub mod peer;
pub mod sync;
pub mod wire;

pub use peer::{InMemoryPeerBook, MisbehaviorKind, PeerBook, PeerMeta, Permissions};
pub use sync::{HeaderSyncManager, HeadersOutcome};
pub use wire::{GetHeaders, Headers, MAX_HEADERS_SIZE};
