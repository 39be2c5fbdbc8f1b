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

//! The PoW hash oracle, treated as an external, pluggable capability. The
//! actual hash algorithm (RandomX, Cuckoo Cycle, ...) is out of scope for
//! this crate; validation code only ever talks to this trait.

use header::Header;

/// Capability a validator needs to check proof of work. `commitment_ok` is
/// the cheap pre-filter (checks only the announced `pow_hash` against
/// `bits`); `full_ok` recomputes/verifies the full digest.
pub trait PoWVerifier: Send + Sync {
	/// Cheap commitment-only check, ~50x faster than `full_ok`. Used only
	/// during batch pre-filtering, never as a substitute for `full_ok`.
	fn commitment_ok(&self, header: &Header, bits: u32) -> bool;

	/// Full verification. Must be called before a header is ever admitted
	/// to the block index.
	fn full_ok(&self, header: &Header, bits: u32) -> bool;
}

/// A verifier that accepts everything. Used on regtest and in unit tests,
/// where PoW bypass is explicitly permitted (see this spec's testable
/// scenarios).
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughVerifier;

impl PoWVerifier for PassThroughVerifier {
	fn commitment_ok(&self, _header: &Header, _bits: u32) -> bool {
		true
	}

	fn full_ok(&self, _header: &Header, _bits: u32) -> bool {
		true
	}
}
