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

//! Two-layer header validation discipline: context-free PoW checks and
//! contextual (difficulty/time/version) checks. Mirrors the teacher's
//! block acceptance pipeline (`chain/src/pipe.rs`) split into pure,
//! independently testable functions instead of one procedural sequence.

extern crate hdrchain_core;

pub mod state;
pub mod validator;

pub use state::{RejectReason, ValidationState};
pub use validator::{
	check_header, check_header_commitment, contextual_check_header, PrevContext,
};
