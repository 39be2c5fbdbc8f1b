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

//! Consensus-level building blocks shared by every other crate in the
//! workspace: the header type, hash types, 256-bit chain work, chain
//! parameters and the difficulty rule. Nothing in here depends on a
//! network, a store, or a peer.

#[macro_use]
extern crate serde_derive;
extern crate blake2_rfc as blake2;
extern crate byteorder;
extern crate failure;
#[macro_use]
extern crate failure_derive;
extern crate num_bigint;
extern crate num_traits;
extern crate serde;

pub mod hash;
pub mod header;
pub mod params;
pub mod pow;
pub mod work;

pub use hash::{Hash160, Hash256};
pub use header::Header;
pub use params::{ChainParams, Network};
pub use work::Work;
