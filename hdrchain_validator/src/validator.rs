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

use hdrchain_core::header::Header;
use hdrchain_core::pow::PoWVerifier;

use state::{RejectReason, ValidationState};

/// Everything `contextual_check_header` needs to know about the header's
/// parent, without the validator depending on the block-index crate.
/// Implemented by the chain crate's index node; the ASERT computation
/// itself happens on the caller's side (`expected_next_bits`) so this
/// crate can treat the difficulty rule purely as a parameter, as the spec
/// requires.
pub trait PrevContext {
	fn height(&self) -> u64;
	fn time(&self) -> u32;
	fn expected_next_bits(&self) -> u32;
	fn median_time_past(&self) -> u32;
}

/// Context-free check: does `pow_hash` satisfy `bits` under full PoW
/// verification? No other checks -- in particular this does NOT verify
/// that `bits` is the correct difficulty for this chain position (that's
/// `contextual_check_header`'s job).
pub fn check_header(header: &Header, verifier: &dyn PoWVerifier) -> ValidationState {
	if verifier.full_ok(header, header.bits) {
		ValidationState::Valid
	} else {
		ValidationState::invalid(RejectReason::HighHash, "pow hash above target")
	}
}

/// Same as `check_header` but using the ~50x cheaper commitment-only mode.
/// Used only during batch pre-filtering (spec §4.1).
pub fn check_header_commitment(header: &Header, verifier: &dyn PoWVerifier) -> ValidationState {
	if verifier.commitment_ok(header, header.bits) {
		ValidationState::Valid
	} else {
		ValidationState::invalid(RejectReason::HighHash, "pow commitment above target")
	}
}

/// Contextual check, requiring the parent node and the peer-adjusted wall
/// clock. Runs the four ordered checks from spec §4.1.
pub fn contextual_check_header(
	header: &Header,
	prev: &dyn PrevContext,
	adjusted_time: i64,
) -> ValidationState {
	if header.bits != prev.expected_next_bits() {
		return ValidationState::invalid(
			RejectReason::BadDiffbits,
			format!(
				"bits {:#x} != expected {:#x}",
				header.bits,
				prev.expected_next_bits()
			),
		);
	}

	if header.time <= prev.median_time_past() {
		return ValidationState::invalid(
			RejectReason::TimeTooOld,
			format!(
				"time {} <= median time past {}",
				header.time,
				prev.median_time_past()
			),
		);
	}

	const MAX_FUTURE_BLOCK_TIME: i64 = 2 * 60 * 60;
	if i64::from(header.time) > adjusted_time + MAX_FUTURE_BLOCK_TIME {
		return ValidationState::invalid(
			RejectReason::TimeTooNew,
			format!(
				"time {} more than 2h ahead of adjusted time {}",
				header.time, adjusted_time
			),
		);
	}

	if header.version < 1 {
		return ValidationState::invalid(
			RejectReason::BadVersion,
			format!("version {} < 1", header.version),
		);
	}

	ValidationState::Valid
}

#[cfg(test)]
mod test {
	use super::*;
	use hdrchain_core::hash::{Hash160, Hash256};
	use hdrchain_core::pow::PassThroughVerifier;

	struct FakePrev {
		height: u64,
		time: u32,
		expected_bits: u32,
		mtp: u32,
	}

	impl PrevContext for FakePrev {
		fn height(&self) -> u64 {
			self.height
		}
		fn time(&self) -> u32 {
			self.time
		}
		fn expected_next_bits(&self) -> u32 {
			self.expected_bits
		}
		fn median_time_past(&self) -> u32 {
			self.mtp
		}
	}

	fn header(time: u32, bits: u32, version: i32) -> Header {
		Header {
			version,
			prev_hash: Hash256([1u8; 32]),
			miner_address: Hash160([0u8; 20]),
			time,
			bits,
			nonce: 0,
			pow_hash: Hash256([0u8; 32]),
		}
	}

	#[test]
	fn check_header_uses_full_verification() {
		let h = header(100, 0x1d00_ffff, 1);
		assert!(check_header(&h, &PassThroughVerifier).is_valid());
	}

	#[test]
	fn contextual_check_rejects_bad_diffbits() {
		let prev = FakePrev {
			height: 10,
			time: 1000,
			expected_bits: 0x1d00_ffff,
			mtp: 900,
		};
		let h = header(1100, 0x1c00_ffff, 1);
		let state = contextual_check_header(&h, &prev, 2000);
		assert_eq!(state.reject_reason(), Some(RejectReason::BadDiffbits));
	}

	#[test]
	fn contextual_check_rejects_time_too_old() {
		let prev = FakePrev {
			height: 10,
			time: 1000,
			expected_bits: 0x1d00_ffff,
			mtp: 900,
		};
		let h = header(900, 0x1d00_ffff, 1);
		let state = contextual_check_header(&h, &prev, 2000);
		assert_eq!(state.reject_reason(), Some(RejectReason::TimeTooOld));
	}

	#[test]
	fn contextual_check_rejects_time_too_new() {
		let prev = FakePrev {
			height: 10,
			time: 1000,
			expected_bits: 0x1d00_ffff,
			mtp: 900,
		};
		let h = header(100_000, 0x1d00_ffff, 1);
		let state = contextual_check_header(&h, &prev, 2000);
		assert_eq!(state.reject_reason(), Some(RejectReason::TimeTooNew));
	}

	#[test]
	fn contextual_check_rejects_bad_version() {
		let prev = FakePrev {
			height: 10,
			time: 1000,
			expected_bits: 0x1d00_ffff,
			mtp: 900,
		};
		let h = header(1100, 0x1d00_ffff, 0);
		let state = contextual_check_header(&h, &prev, 2000);
		assert_eq!(state.reject_reason(), Some(RejectReason::BadVersion));
	}

	#[test]
	fn contextual_check_accepts_good_header() {
		let prev = FakePrev {
			height: 10,
			time: 1000,
			expected_bits: 0x1d00_ffff,
			mtp: 900,
		};
		let h = header(1100, 0x1d00_ffff, 1);
		let state = contextual_check_header(&h, &prev, 2000);
		assert!(state.is_valid());
	}
}
