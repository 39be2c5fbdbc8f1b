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

//! Static per-network constants, and the ASERT difficulty rule that is
//! parameterized by them. Values here are developer-set, not user-tweakable
//! -- mirrors the teacher's `global.rs` disclaimer ("should be used
//! sparingly").

use num_bigint::BigUint;
use num_traits::One;

use hash::{Hash160, Hash256};
use header::Header;
use work::bits_to_target;

/// Which network a node is configured for. Affects genesis, anti-DoS
/// buffer size and minimum chain work (spec §4.5 step 7: 6 blocks on
/// mainnet, 144 elsewhere).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
	Mainnet,
	Testnet,
	Regtest,
}

/// Static, per-network chain parameters.
#[derive(Debug, Clone)]
pub struct ChainParams {
	pub network: Network,
	pub genesis: Header,

	/// Compact target below which no chain may ever fall (easiest allowed
	/// difficulty).
	pub pow_limit_bits: u32,

	/// Desired average seconds between blocks.
	pub target_spacing_secs: u32,
	/// ASERT exponential-decay half-life, in seconds.
	pub asert_half_life_secs: i64,
	/// Height of the ASERT anchor block.
	pub asert_anchor_height: u64,
	/// Compact bits of the ASERT anchor block.
	pub asert_anchor_bits: u32,
	/// Wall-clock time of the ASERT anchor block.
	pub asert_anchor_time: u32,

	/// Below this cumulative work, `IsInitialBlockDownload` always reports
	/// true.
	pub minimum_chain_work: BigUint,
	/// Width, in blocks, of the anti-DoS low-work buffer window (spec
	/// §4.5 step 7).
	pub anti_dos_work_buffer_blocks: u64,
	/// Reorg depth at or beyond which `ActivateBestChain` refuses to
	/// switch and instead emits `SuspiciousReorg`.
	pub suspicious_reorg_depth: u64,
	/// Headers older than this (relative to `now`) are evicted from the
	/// orphan pool.
	pub orphan_horizon_secs: i64,
	/// Height past which the network is considered expired (spec §4.4
	/// step 6).
	pub network_expiration_height: u64,
	/// Blocks of runway past `network_expiration_height` a node is still
	/// willing to stay connected for, giving operators (and the process
	/// supervisor watching for `NetworkExpired`) time to shut down
	/// gracefully before the latch becomes unconditional. Not consulted by
	/// `ActivateBestChain` itself -- see DESIGN.md.
	pub network_expiration_grace_blocks: u64,

	pub magic: [u8; 4],
	pub default_port: u16,
}

impl ChainParams {
	/// Width, in blocks, of the 11-header median-time-past window.
	pub const MEDIAN_TIME_SPAN: usize = 11;

	fn dummy_genesis(time: u32) -> Header {
		Header {
			version: 1,
			prev_hash: Hash256([0u8; 32]),
			miner_address: Hash160([0u8; 20]),
			time,
			bits: 0x1d00_ffff,
			nonce: 0,
			pow_hash: Hash256([0u8; 32]),
		}
	}

	pub fn mainnet() -> ChainParams {
		ChainParams {
			network: Network::Mainnet,
			genesis: Self::dummy_genesis(1_600_000_000),
			pow_limit_bits: 0x1d00_ffff,
			target_spacing_secs: 600,
			asert_half_life_secs: 2 * 24 * 3600,
			asert_anchor_height: 0,
			asert_anchor_bits: 0x1d00_ffff,
			asert_anchor_time: 1_600_000_000,
			minimum_chain_work: BigUint::one() << 80,
			anti_dos_work_buffer_blocks: 6,
			suspicious_reorg_depth: 100,
			orphan_horizon_secs: 20 * 60,
			network_expiration_height: u64::max_value(),
			network_expiration_grace_blocks: 1000,
			magic: *b"HDR1",
			default_port: 8733,
		}
	}

	pub fn testnet() -> ChainParams {
		let mut p = ChainParams::mainnet();
		p.network = Network::Testnet;
		p.minimum_chain_work = BigUint::one();
		p.anti_dos_work_buffer_blocks = 144;
		p.magic = *b"HDRT";
		p.default_port = 18733;
		p
	}

	/// Easy-PoW, small-buffer parameters for deterministic tests (spec §8
	/// "regtest parameters, PoW bypass permitted for headers").
	pub fn regtest() -> ChainParams {
		let mut p = ChainParams::mainnet();
		p.network = Network::Regtest;
		p.pow_limit_bits = 0x207f_ffff;
		p.asert_anchor_bits = 0x207f_ffff;
		p.minimum_chain_work = BigUint::one();
		p.anti_dos_work_buffer_blocks = 144;
		p.suspicious_reorg_depth = 7;
		p.orphan_horizon_secs = 3600;
		p.network_expiration_height = u64::max_value();
		p.magic = *b"HDRR";
		p.default_port = 28733;
		p
	}

	/// Whether `height` is past the configured network expiration point
	/// (spec §4.4 step 6).
	pub fn is_past_expiration(&self, height: u64) -> bool {
		height > self.network_expiration_height
	}
}

/// floor division, needed because the ASERT exponent can be negative and
/// Rust's integer division truncates toward zero.
fn floor_div(a: i128, b: i128) -> i128 {
	let q = a / b;
	let r = a % b;
	if (r != 0) && ((r < 0) != (b < 0)) {
		q - 1
	} else {
		q
	}
}

/// The ASERT ("absolutely scheduled exponentially rising targets")
/// difficulty rule: given an anchor block and the immediately preceding
/// block, returns the compact `bits` a new header must satisfy. Computed
/// via fixed-point (1/65536 unit) exponent arithmetic over the anchor's
/// target, the standard approach for implementing `target * 2^x` without
/// floating point. Pure function of its inputs, as required by this
/// spec's validator (§4.1: "its precise form belongs to the chain-params
/// module; the validator treats it as a pure function").
pub fn asert_next_bits(params: &ChainParams, prev_height: u64, prev_time: u32) -> u32 {
	let height_diff = (prev_height + 1) as i128 - params.asert_anchor_height as i128;
	let time_diff = prev_time as i128 - params.asert_anchor_time as i128;

	let anchor_target = bits_to_target(params.asert_anchor_bits);
	let pow_limit = bits_to_target(params.pow_limit_bits);

	// exponent = (time_diff - target_spacing * height_diff) / halflife,
	// in units of 1/65536.
	let numerator = (time_diff - params.target_spacing_secs as i128 * height_diff) << 16;
	let exponent = floor_div(numerator, params.asert_half_life_secs as i128);

	let shifts = exponent >> 16;
	let frac = exponent - (shifts << 16); // 0 <= frac < 65536

	// cubic approximation of 2^(frac/65536) scaled by 2^16, accurate to
	// within 0.1% -- the reference aserti3-2d polynomial.
	let frac_i64 = frac as i64;
	let factor: i64 = 65536
		+ ((195_766_423_245_049i64 * frac_i64
			+ 971_821_376i64 * frac_i64 * frac_i64
			+ 5_127i64 * frac_i64 * frac_i64 * frac_i64
			+ (1i64 << 47))
			>> 48);

	let mut next_target = anchor_target * BigUint::from(factor as u64);
	if shifts < 0 {
		next_target >>= (-shifts) as usize;
	} else {
		next_target <<= shifts as usize;
	}
	next_target >>= 16;

	if next_target > pow_limit || next_target == BigUint::from(0u32) {
		return params.pow_limit_bits;
	}
	target_to_bits(&next_target)
}

/// Inverse of `bits_to_target`: compacts a target back to the
/// exponent+mantissa encoding.
fn target_to_bits(target: &BigUint) -> u32 {
	let bytes = target.to_bytes_be();
	let mut exponent = bytes.len() as u32;
	let mut mantissa_bytes = [0u8; 3];
	if bytes.len() >= 3 {
		mantissa_bytes.copy_from_slice(&bytes[..3]);
	} else {
		mantissa_bytes[(3 - bytes.len())..].copy_from_slice(&bytes);
	}
	let mut mantissa = ((mantissa_bytes[0] as u32) << 16)
		| ((mantissa_bytes[1] as u32) << 8)
		| (mantissa_bytes[2] as u32);
	// if the high bit of the mantissa is set it would be read as a sign
	// bit by consensus clients; shift right and bump the exponent.
	if mantissa & 0x0080_0000 != 0 {
		mantissa >>= 8;
		exponent += 1;
	}
	(exponent << 24) | mantissa
}

/// Median of the previous `MEDIAN_TIME_SPAN` ancestors' timestamps, as
/// required by the contextual header check (spec §4.1 step 2). Callers
/// supply the ancestor times, most-recent first.
pub fn median_time_past(mut ancestor_times: Vec<u32>) -> u32 {
	ancestor_times.sort_unstable();
	ancestor_times[ancestor_times.len() / 2]
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn bits_round_trip_through_target() {
		for bits in [0x1d00_ffff, 0x1b0f_ffff, 0x207f_ffff].iter() {
			let t = bits_to_target(*bits);
			assert_eq!(target_to_bits(&t), *bits);
		}
	}

	#[test]
	fn asert_holds_steady_when_on_schedule() {
		let params = ChainParams::mainnet();
		// exactly on schedule: height 1 at anchor_time + spacing
		let bits = asert_next_bits(
			&params,
			params.asert_anchor_height,
			params.asert_anchor_time + params.target_spacing_secs,
		);
		assert_eq!(bits, params.asert_anchor_bits);
	}

	#[test]
	fn asert_loosens_when_blocks_are_slow() {
		let params = ChainParams::mainnet();
		// Way behind schedule: difficulty should drop (target grows).
		let slow_bits = asert_next_bits(
			&params,
			params.asert_anchor_height,
			params.asert_anchor_time + params.target_spacing_secs * 20,
		);
		let on_time_target = bits_to_target(params.asert_anchor_bits);
		let slow_target = bits_to_target(slow_bits);
		assert!(slow_target > on_time_target);
	}

	#[test]
	fn asert_tightens_when_blocks_are_fast() {
		let params = ChainParams::mainnet();
		let fast_bits = asert_next_bits(
			&params,
			params.asert_anchor_height + 20,
			params.asert_anchor_time + params.target_spacing_secs,
		);
		let on_time_target = bits_to_target(params.asert_anchor_bits);
		let fast_target = bits_to_target(fast_bits);
		assert!(fast_target < on_time_target);
	}

	#[test]
	fn median_time_past_picks_middle_value() {
		let times: Vec<u32> = (0..11).collect();
		assert_eq!(median_time_past(times), 5);
	}
}
