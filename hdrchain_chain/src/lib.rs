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

//! The block-index DAG, active chain, candidate set, orphan pool and the
//! chainstate facade that ties them together. This is the teacher's
//! `Chain`/`ChainStore`/`OrphanBlockPool` (`chain/src/chain.rs`,
//! `chain/src/types.rs`) generalized from a UTXO chain to a pure header
//! chain.

extern crate bitflags;
extern crate log;
extern crate parking_lot;

extern crate hdrchain_core;
extern crate hdrchain_util;
extern crate hdrchain_validator;

pub mod active_chain;
pub mod candidates;
pub mod chainstate;
pub mod index;
pub mod notify;
pub mod orphans;

pub use active_chain::ActiveChain;
pub use chainstate::{AcceptOutcome, ChainState};
pub use index::{BlockIndex, NodeId, Status};
pub use notify::{ChainListener, NodeSnapshot, Notifier, Subscription};
pub use orphans::{OrphanPool, PeerId};

pub use hdrchain_validator::{RejectReason, ValidationState};
