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

//! The outcome sum type this spec's error-handling design calls for
//! (`Valid | Invalid{reason,msg} | Error{msg}`), replacing what the
//! original C++ implementation did with exceptions for malformed input.

use std::fmt;

/// The fixed, machine-readable set of reasons a header can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
	HighHash,
	BadDiffbits,
	TimeTooOld,
	TimeTooNew,
	BadVersion,
	BadPrevblk,
	BadGenesis,
	PrevBlkNotFound,
	Duplicate,
	DuplicateInvalid,
	GenesisViaAccept,
}

impl RejectReason {
	pub fn as_str(&self) -> &'static str {
		match *self {
			RejectReason::HighHash => "high-hash",
			RejectReason::BadDiffbits => "bad-diffbits",
			RejectReason::TimeTooOld => "time-too-old",
			RejectReason::TimeTooNew => "time-too-new",
			RejectReason::BadVersion => "bad-version",
			RejectReason::BadPrevblk => "bad-prevblk",
			RejectReason::BadGenesis => "bad-genesis",
			RejectReason::PrevBlkNotFound => "prev-blk-not-found",
			RejectReason::Duplicate => "duplicate",
			RejectReason::DuplicateInvalid => "duplicate-invalid",
			RejectReason::GenesisViaAccept => "genesis-via-accept",
		}
	}

	/// Whether this reason reflects a hard consensus violation in the
	/// header itself (as opposed to a bookkeeping outcome like
	/// `duplicate` or `prev-blk-not-found`). Used by the sync manager to
	/// decide whether a peer should be penalized (spec §4.5 step 8).
	pub fn is_hard_invalid(&self) -> bool {
		matches!(
			self,
			RejectReason::HighHash
				| RejectReason::BadDiffbits
				| RejectReason::TimeTooOld
				| RejectReason::TimeTooNew
				| RejectReason::BadVersion
				| RejectReason::BadPrevblk
				| RejectReason::BadGenesis
		)
	}
}

impl fmt::Display for RejectReason {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// The three possible outcomes of validating peer-supplied input (spec
/// §7): a benign success, a consensus/protocol violation attributable to
/// the peer, or an operational failure attributable to no one.
#[derive(Debug, Clone)]
pub enum ValidationState {
	Valid,
	Invalid { reason: RejectReason, msg: String },
	Error { msg: String },
}

impl ValidationState {
	pub fn invalid(reason: RejectReason, msg: impl Into<String>) -> ValidationState {
		ValidationState::Invalid {
			reason,
			msg: msg.into(),
		}
	}

	pub fn error(msg: impl Into<String>) -> ValidationState {
		ValidationState::Error { msg: msg.into() }
	}

	pub fn is_valid(&self) -> bool {
		matches!(self, ValidationState::Valid)
	}

	pub fn is_invalid(&self) -> bool {
		matches!(self, ValidationState::Invalid { .. })
	}

	pub fn reject_reason(&self) -> Option<RejectReason> {
		match self {
			ValidationState::Invalid { reason, .. } => Some(*reason),
			_ => None,
		}
	}
}
