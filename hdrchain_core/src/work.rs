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

//! Cumulative proof-of-work, as a 256-bit unsigned integer. Mirrors the
//! teacher's `Difficulty` (`core/src/core/target.rs`), which wraps a
//! `BigUint`, but is named `Work` to match this spec's vocabulary and
//! carries a compact `bits -> Work` conversion instead of `Work -> Hash`.

use std::fmt;
use std::ops::Add;

use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Cumulative chain work, expressed as a 256-bit unsigned integer. Ordered
/// numerically; `Work::zero() < Work::one() < ...`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Work(BigUint);

impl Work {
	pub fn zero() -> Work {
		Work(BigUint::zero())
	}

	pub fn one() -> Work {
		Work(BigUint::one())
	}

	/// 32-byte big-endian encoding, for the persisted snapshot's `work` field.
	pub fn to_be_bytes32(&self) -> [u8; 32] {
		let raw = self.0.to_bytes_be();
		let mut out = [0u8; 32];
		let start = 32 - raw.len().min(32);
		out[start..].copy_from_slice(&raw[raw.len().saturating_sub(32)..]);
		out
	}

	pub fn from_be_bytes(bytes: &[u8]) -> Work {
		Work(BigUint::from_bytes_be(bytes))
	}

	pub fn to_hex(&self) -> String {
		let bytes = self.to_be_bytes32();
		let mut s = String::with_capacity(64);
		for b in bytes.iter() {
			s.push_str(&format!("{:02x}", b));
		}
		s
	}

	/// `self * n`, used to price the anti-DoS work buffer in blocks-at-a-
	/// given-difficulty.
	pub fn saturating_mul(&self, n: u64) -> Work {
		Work(&self.0 * BigUint::from(n))
	}

	/// `self - other`, floored at zero rather than panicking on underflow.
	pub fn saturating_sub(&self, other: &Work) -> Work {
		if self.0 > other.0 {
			Work(&self.0 - &other.0)
		} else {
			Work::zero()
		}
	}
}

impl Add for Work {
	type Output = Work;
	fn add(self, other: Work) -> Work {
		Work(self.0 + other.0)
	}
}

impl<'a> Add<&'a Work> for Work {
	type Output = Work;
	fn add(self, other: &'a Work) -> Work {
		Work(self.0 + &other.0)
	}
}

impl fmt::Display for Work {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// The target a header hash must be numerically below to satisfy `bits`,
/// using the compact (Bitcoin-style) encoding: a one-byte exponent followed
/// by a three-byte mantissa.
pub fn bits_to_target(bits: u32) -> BigUint {
	let exponent = (bits >> 24) as usize;
	let mantissa = bits & 0x00ff_ffff;
	let mantissa = BigUint::from(mantissa);
	if exponent <= 3 {
		mantissa >> (8 * (3 - exponent))
	} else {
		mantissa << (8 * (exponent - 3))
	}
}

/// Expected work to produce one block at the given compact difficulty,
/// `work = 2^256 / (target + 1)`, the standard Bitcoin-style conversion
/// from a target to an expected-hash-count.
pub fn work_from_bits(bits: u32) -> Work {
	let target = bits_to_target(bits);
	if target.is_zero() {
		return Work::zero();
	}
	let two_256 = BigUint::one() << 256;
	Work(two_256 / (target + BigUint::one()))
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn work_increases_as_target_shrinks() {
		// A smaller target (harder difficulty) must yield more work.
		let easy = work_from_bits(0x1f00_ffff);
		let hard = work_from_bits(0x1e00_ffff);
		assert!(hard > easy);
	}

	#[test]
	fn work_accumulates() {
		let a = work_from_bits(0x1d00_ffff);
		let b = work_from_bits(0x1d00_ffff);
		let sum = a.clone() + b.clone();
		assert!(sum > a);
	}

	#[test]
	fn round_trip_be_bytes() {
		let w = work_from_bits(0x1d00_ffff);
		let bytes = w.to_be_bytes32();
		let back = Work::from_be_bytes(&bytes);
		assert_eq!(w, back);
	}
}
