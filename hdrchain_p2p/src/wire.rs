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

//! `GETHEADERS`/`HEADERS` payload framing (spec §6). Every multi-byte
//! integer is little-endian; counts are Bitcoin-style varints. Grounded on
//! the teacher's length-prefixed message framing (`p2p/src/msg.rs`)
//! adapted to this header's 88-byte layout.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use hdrchain_core::hash::{Hash160, Hash256};
use hdrchain_core::header::Header;

/// Hard cap on headers per `HEADERS` message (spec §4.5 step 3).
pub const MAX_HEADERS_SIZE: usize = 2000;

fn read_exact_vec(r: &mut dyn Read, len: usize) -> io::Result<Vec<u8>> {
	let mut buf = vec![0u8; len];
	r.read_exact(&mut buf)?;
	Ok(buf)
}

fn write_varint(w: &mut dyn Write, n: u64) -> io::Result<()> {
	if n < 0xfd {
		w.write_u8(n as u8)
	} else if n <= 0xffff {
		w.write_u8(0xfd)?;
		w.write_u16::<LittleEndian>(n as u16)
	} else if n <= 0xffff_ffff {
		w.write_u8(0xfe)?;
		w.write_u32::<LittleEndian>(n as u32)
	} else {
		w.write_u8(0xff)?;
		w.write_u64::<LittleEndian>(n)
	}
}

fn read_varint(r: &mut dyn Read) -> io::Result<u64> {
	let first = r.read_u8()?;
	match first {
		0xfd => Ok(u64::from(r.read_u16::<LittleEndian>()?)),
		0xfe => Ok(u64::from(r.read_u32::<LittleEndian>()?)),
		0xff => r.read_u64::<LittleEndian>(),
		n => Ok(u64::from(n)),
	}
}

fn write_hash256(w: &mut dyn Write, h: &Hash256) -> io::Result<()> {
	w.write_all(&h.0)
}

fn read_hash256(r: &mut dyn Read) -> io::Result<Hash256> {
	Ok(Hash256::from_slice(&read_exact_vec(r, 32)?))
}

/// Encodes a single header's 88-byte wire form (spec §6): version |
/// prev_hash | miner_address | time | bits | nonce | pow_hash.
pub fn write_header(w: &mut dyn Write, h: &Header) -> io::Result<()> {
	w.write_i32::<LittleEndian>(h.version)?;
	write_hash256(w, &h.prev_hash)?;
	w.write_all(&h.miner_address.0)?;
	w.write_u32::<LittleEndian>(h.time)?;
	w.write_u32::<LittleEndian>(h.bits)?;
	w.write_u32::<LittleEndian>(h.nonce)?;
	write_hash256(w, &h.pow_hash)?;
	Ok(())
}

pub fn read_header(r: &mut dyn Read) -> io::Result<Header> {
	let version = r.read_i32::<LittleEndian>()?;
	let prev_hash = read_hash256(r)?;
	let miner_address = Hash160::from_slice(&read_exact_vec(r, 20)?);
	let time = r.read_u32::<LittleEndian>()?;
	let bits = r.read_u32::<LittleEndian>()?;
	let nonce = r.read_u32::<LittleEndian>()?;
	let pow_hash = read_hash256(r)?;
	Ok(Header {
		version,
		prev_hash,
		miner_address,
		time,
		bits,
		nonce,
		pow_hash,
	})
}

/// A `GETHEADERS` request (spec §6): protocol version, a sparse locator
/// and an optional stop hash (all-zero means "as many as fit").
#[derive(Debug, Clone)]
pub struct GetHeaders {
	pub version: u32,
	pub locator: Vec<Hash256>,
	pub hash_stop: Hash256,
}

impl GetHeaders {
	pub fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
		w.write_u32::<LittleEndian>(self.version)?;
		write_varint(w, self.locator.len() as u64)?;
		for h in &self.locator {
			write_hash256(w, h)?;
		}
		write_hash256(w, &self.hash_stop)
	}

	pub fn decode(r: &mut dyn Read) -> io::Result<GetHeaders> {
		let version = r.read_u32::<LittleEndian>()?;
		let count = read_varint(r)? as usize;
		let mut locator = Vec::with_capacity(count);
		for _ in 0..count {
			locator.push(read_hash256(r)?);
		}
		let hash_stop = read_hash256(r)?;
		Ok(GetHeaders {
			version,
			locator,
			hash_stop,
		})
	}
}

/// A `HEADERS` response (spec §6): each header on the wire is followed by
/// a `tx_count` varint, always `0` here since block bodies are out of
/// scope (spec §1 Non-goals).
#[derive(Debug, Clone)]
pub struct Headers {
	pub headers: Vec<Header>,
}

impl Headers {
	pub fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
		write_varint(w, self.headers.len() as u64)?;
		for h in &self.headers {
			write_header(w, h)?;
			write_varint(w, 0)?;
		}
		Ok(())
	}

	/// Decodes a `HEADERS` payload, rejecting (with an `io::Error`) any
	/// message claiming more than `MAX_HEADERS_SIZE` headers before
	/// attempting to read them -- a peer cannot force an unbounded
	/// allocation by lying about the count.
	pub fn decode(r: &mut dyn Read) -> io::Result<Headers> {
		let count = read_varint(r)? as usize;
		if count > MAX_HEADERS_SIZE {
			return Err(io::Error::new(
				io::ErrorKind::InvalidData,
				format!("HEADERS count {} exceeds MAX_HEADERS_SIZE", count),
			));
		}
		let mut headers = Vec::with_capacity(count);
		for _ in 0..count {
			let h = read_header(r)?;
			let tx_count = read_varint(r)?;
			if tx_count != 0 {
				return Err(io::Error::new(
					io::ErrorKind::InvalidData,
					"non-zero tx_count on a header-only message",
				));
			}
			headers.push(h);
		}
		Ok(Headers { headers })
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use hdrchain_core::hash::Hashed;

	fn sample_header(nonce: u32) -> Header {
		Header {
			version: 1,
			prev_hash: Hash256([3u8; 32]),
			miner_address: Hash160([4u8; 20]),
			time: 1_700_000_000,
			bits: 0x1d00_ffff,
			nonce,
			pow_hash: Hash256([5u8; 32]),
		}
	}

	#[test]
	fn header_round_trips_in_88_bytes() {
		let h = sample_header(7);
		let mut buf = Vec::new();
		write_header(&mut buf, &h).unwrap();
		assert_eq!(buf.len(), 88);
		let back = read_header(&mut &buf[..]).unwrap();
		assert_eq!(back, h);
		assert_eq!(back.hash(), h.hash());
	}

	#[test]
	fn getheaders_round_trips() {
		let msg = GetHeaders {
			version: 70015,
			locator: vec![Hash256([1u8; 32]), Hash256([2u8; 32])],
			hash_stop: Hash256([0u8; 32]),
		};
		let mut buf = Vec::new();
		msg.encode(&mut buf).unwrap();
		let back = GetHeaders::decode(&mut &buf[..]).unwrap();
		assert_eq!(back.version, msg.version);
		assert_eq!(back.locator, msg.locator);
		assert_eq!(back.hash_stop, msg.hash_stop);
	}

	#[test]
	fn headers_round_trips_and_caps_size() {
		let headers: Vec<_> = (0..5).map(sample_header).collect();
		let msg = Headers { headers: headers.clone() };
		let mut buf = Vec::new();
		msg.encode(&mut buf).unwrap();
		let back = Headers::decode(&mut &buf[..]).unwrap();
		assert_eq!(back.headers, headers);
	}

	#[test]
	fn headers_decode_rejects_oversized_count_claim() {
		let mut buf = Vec::new();
		write_varint(&mut buf, (MAX_HEADERS_SIZE + 1) as u64).unwrap();
		assert!(Headers::decode(&mut &buf[..]).is_err());
	}

	#[test]
	fn varint_round_trips_across_encoding_widths() {
		for n in &[0u64, 0xfc, 0xfd, 0xffff, 0x1_0000, 0xffff_ffff, 0x1_0000_0000] {
			let mut buf = Vec::new();
			write_varint(&mut buf, *n).unwrap();
			assert_eq!(read_varint(&mut &buf[..]).unwrap(), *n);
		}
	}
}
