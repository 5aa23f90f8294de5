// Copyright 2023 Strixpyrr
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

//! The segmented byte buffer at the center of the crate: a deque of
//! [`Segment`]s, claimed from and recycled into a thread-local [`Pool`],
//! with large transfers between buffers done by relinking whole segments
//! instead of copying.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::mem;
use log::trace;
use crate::pool::{DefaultPool, LocalPool, Pool};
use crate::segment::Segment;
use crate::streams::{
	BufSink, BufSource, BufStream, Error, OperationKind, Result, Sink, Source,
};
use crate::streams::OffsetUtf8Error;
use crate::{ByteString};

/// A growable, segmented byte buffer. The core in-memory [`Source`]/[`Sink`]
/// that every stream reads from or writes to. Cloning shares segment memory
/// copy-on-write rather than copying bytes.
#[derive(Default, Clone)]
pub struct Buffer {
	segments: VecDeque<Segment>,
	size: usize,
}

impl Buffer {
	/// Returns a new, empty buffer.
	pub fn new() -> Self { Self::default() }

	/// Returns the number of bytes currently buffered.
	pub fn len(&self) -> usize { self.size }

	/// Returns `true` if the buffer holds no bytes.
	pub fn is_empty(&self) -> bool { self.size == 0 }

	fn pool() -> DefaultPool { LocalPool::get() }

	/// Returns the tail segment, claiming a fresh one from the pool if the
	/// current tail is full or there is none.
	fn tail_with_room(&mut self) -> &mut Segment {
		let needs_new = self.segments.back().map_or(true, Segment::is_full);
		if needs_new {
			self.segments.push_back(Self::pool().claim_one());
		}
		self.segments.back_mut().unwrap()
	}

	fn recycle_front_if_empty(&mut self) {
		if self.segments.front().is_some_and(Segment::is_empty) {
			let seg = self.segments.pop_front().unwrap();
			Self::pool().recycle_one(seg);
		}
	}

	/// Appends a segment directly, claimed from elsewhere (used when
	/// relinking segments between buffers).
	fn push_segment(&mut self, segment: Segment) {
		self.size += segment.len();
		self.segments.push_back(segment);
	}

	/// Moves every segment of `other` to the front of `self`, preserving
	/// order. Used to put back data read ahead of a seek.
	pub(crate) fn prepend(&mut self, other: &mut Buffer) {
		while let Some(seg) = other.segments.pop_back() {
			self.size += seg.len();
			self.segments.push_front(seg);
		}
		other.size = 0;
	}

	/// Writes as much of `data` as fits, claiming new segments as needed.
	/// Returns the number of bytes written (always `data.len()`, since the
	/// pool grows without bound up to its own cap).
	pub fn write_from_slice(&mut self, mut data: &[u8]) -> usize {
		let total = data.len();
		while !data.is_empty() {
			let seg = self.tail_with_room();
			let n = seg.push_slice(data);
			data = &data[n..];
			self.size += n;
		}
		total
	}

	/// Writes a single byte.
	pub fn write_byte(&mut self, byte: u8) {
		self.tail_with_room().push(byte);
		self.size += 1;
	}

	/// Reads bytes into `dst`, returning the number of bytes read, recycling
	/// any head segments left empty.
	pub fn read_into_slice(&mut self, mut dst: &mut [u8]) -> usize {
		let total = dst.len();
		while !dst.is_empty() {
			let Some(seg) = self.segments.front_mut() else { break };
			let n = seg.pop_into_slice(dst);
			if n == 0 { break }
			dst = &mut dst[n..];
			self.size -= n;
			self.recycle_front_if_empty();
		}
		total - dst.len()
	}

	/// Reads a single byte, if any remain.
	pub fn read_byte(&mut self) -> Option<u8> {
		let seg = self.segments.front_mut()?;
		let byte = seg.pop();
		if byte.is_some() {
			self.size -= 1;
			self.recycle_front_if_empty();
		}
		byte
	}

	fn read_exact_buffered(&mut self, dst: &mut [u8]) -> Result {
		if self.size < dst.len() {
			return Err(Error::eos(OperationKind::BufRead));
		}
		self.read_into_slice(dst);
		Ok(())
	}

	/// Removes up to `byte_count` bytes without copying them anywhere,
	/// returning the number actually skipped.
	pub fn skip(&mut self, byte_count: usize) -> usize {
		let mut remaining = byte_count.min(self.size);
		let total = remaining;
		while remaining > 0 {
			let Some(seg) = self.segments.front_mut() else { break };
			let n = remaining.min(seg.len());
			seg.consume(n);
			self.size -= n;
			remaining -= n;
			self.recycle_front_if_empty();
		}
		total - remaining
	}

	/// Drops every buffered byte, recycling all segments.
	pub fn clear(&mut self) {
		self.skip(self.size);
	}

	/// Moves up to `byte_count` bytes from `self` into `dst`. Whole segments
	/// are relinked without copying; a boundary segment is split, sharing
	/// memory copy-on-write when the split is large enough (see
	/// [`crate::segment::SHARE_MINIMUM`]).
	pub fn transfer_to(&mut self, dst: &mut Buffer, byte_count: usize) -> usize {
		let mut remaining = byte_count.min(self.size);
		let total = remaining;
		while remaining > 0 {
			let Some(front) = self.segments.front() else { break };
			let len = front.len();
			if len <= remaining {
				let seg = self.segments.pop_front().unwrap();
				self.size -= len;
				remaining -= len;
				dst.push_segment(seg);
			} else {
				let front = self.segments.front_mut().unwrap();
				let head = front.split(remaining);
				self.size -= remaining;
				dst.push_segment(head);
				remaining = 0;
			}
			self.recycle_front_if_empty();
		}
		total - remaining
	}

	/// Returns an owned copy of the first `byte_count` bytes, without
	/// consuming them.
	pub fn snapshot(&self, byte_count: usize) -> ByteString {
		let mut out = Vec::with_capacity(byte_count.min(self.size));
		let mut remaining = byte_count.min(self.size);
		for seg in &self.segments {
			if remaining == 0 { break }
			let data = seg.data();
			let n = remaining.min(data.len());
			out.extend_from_slice(&data[..n]);
			remaining -= n;
		}
		out.into()
	}

	/// Reads up to `byte_count` bytes into an owned [`ByteString`].
	pub fn read_byte_str(&mut self, byte_count: usize) -> Result<ByteString> {
		let n = byte_count.min(self.size);
		let out = self.snapshot(n);
		self.skip(n);
		Ok(out)
	}

	/// Returns the byte at absolute offset `index` within the buffered data,
	/// without materializing a copy.
	pub(crate) fn byte_at(&self, mut index: usize) -> Option<u8> {
		for seg in &self.segments {
			let data = seg.data();
			if index < data.len() {
				return Some(data[index]);
			}
			index -= data.len();
		}
		None
	}

	/// Returns the offset of `needle`'s first occurrence at or after `from`
	/// within the currently-buffered bytes.
	pub fn index_of(&self, needle: &[u8], from: usize) -> Option<usize> {
		if needle.is_empty() || from >= self.size {
			return None;
		}
		self.snapshot(self.size).index_of(needle, from)
	}

	/// Reads at most `byte_count` buffered bytes, decoding them as UTF-8 into
	/// `out`. Returns the number of bytes consumed. If the buffered data ends
	/// mid-sequence, only the valid prefix is consumed, leaving the rest for
	/// a subsequent call once more bytes have arrived.
	pub fn read_utf8(&mut self, out: &mut String, byte_count: usize) -> Result<usize> {
		let n = byte_count.min(self.size);
		if n == 0 {
			return Ok(0);
		}
		let snapshot = self.snapshot(n);
		let bytes = snapshot.as_slice();
		match simdutf8::compat::from_utf8(bytes) {
			Ok(s) => {
				out.push_str(s);
				self.skip(n);
				Ok(n)
			}
			Err(e) if e.error_len().is_some() => {
				Err(Error::invalid_utf8(OperationKind::BufRead, OffsetUtf8Error::new(e, 0)))
			}
			Err(e) => {
				let valid = e.valid_up_to();
				if valid == 0 {
					return Ok(0);
				}
				// `valid_up_to` is the longest UTF-8-valid prefix of `bytes`.
				let s = std::str::from_utf8(&bytes[..valid]).unwrap();
				out.push_str(s);
				self.skip(valid);
				Ok(valid)
			}
		}
	}

	/// Writes `value` as UTF-8.
	pub fn write_utf8(&mut self, value: &str) {
		self.write_from_slice(value.as_bytes());
	}

	/// Attempts to decode one Unicode code point from the head of the
	/// buffer. Returns `Ok(None)` if fewer bytes than the sequence's encoded
	/// length are currently buffered. Rejects overlong encodings, encoded
	/// surrogate halves, and values beyond `U+10FFFF`.
	pub fn read_utf8_code_point(&mut self) -> Result<Option<char>> {
		let Some(lead) = self.byte_at(0) else { return Ok(None) };
		let len = utf8_sequence_len(lead).unwrap_or(1);
		if self.size < len {
			return Ok(None);
		}
		let snapshot = self.snapshot(len);
		match simdutf8::compat::from_utf8(snapshot.as_slice()) {
			Ok(s) => {
				let ch = s.chars().next().unwrap();
				self.skip(len);
				Ok(Some(ch))
			}
			Err(e) => Err(Error::invalid_utf8(OperationKind::BufRead, OffsetUtf8Error::new(e, 0))),
		}
	}

	/// Reads UTF-8 text up to and including a line terminator (`\n` or
	/// `\r\n`), which is consumed but not written to `out`. Returns `true` if
	/// a terminator was found in the currently-buffered data; `false` (with
	/// nothing consumed) if more data is needed.
	pub fn read_utf8_line(&mut self, out: &mut String) -> Result<bool> {
		let Some(nl) = self.index_of(b"\n", 0) else { return Ok(false) };
		let mut line_len = nl;
		if line_len > 0 && self.byte_at(line_len - 1) == Some(b'\r') {
			line_len -= 1;
		}
		self.read_utf8(out, line_len)?;
		self.skip(nl - line_len); // the `\r`, if any
		self.skip(1); // the `\n`
		Ok(true)
	}

	/// Decodes every remaining buffered byte as the final, unterminated line
	/// at end-of-stream. Trailing bytes that don't form valid UTF-8 are
	/// dropped.
	pub fn read_utf8_line_final(&mut self, out: &mut String) -> Result {
		self.read_utf8(out, self.size)?;
		self.clear();
		Ok(())
	}

	/// Reads a decimal-text signed integer (an optional `-` then ASCII
	/// digits) from the head of the buffer.
	pub fn read_decimal_long(&mut self) -> Result<i64> {
		let neg = self.byte_at(0) == Some(b'-');
		let mut idx = usize::from(neg);
		let mut value: i64 = 0;
		let mut digits = 0;
		while let Some(b) = self.byte_at(idx) {
			if !b.is_ascii_digit() { break }
			value = value.checked_mul(10)
				.and_then(|v| v.checked_add((b - b'0') as i64))
				.ok_or_else(|| Error::new(
					OperationKind::BufRead,
					crate::streams::ErrorKind::Other("decimal overflow"),
				))?;
			idx += 1;
			digits += 1;
		}
		if digits == 0 {
			return Err(Error::new(
				OperationKind::BufRead,
				crate::streams::ErrorKind::Other("no decimal digits"),
			));
		}
		self.skip(idx);
		Ok(if neg { -value } else { value })
	}

	/// Reads a hexadecimal-text unsigned integer (up to 16 ASCII hex digits)
	/// from the head of the buffer.
	pub fn read_hex_unsigned_long(&mut self) -> Result<u64> {
		let mut idx = 0;
		let mut value: u64 = 0;
		while idx < 16 {
			let Some(digit) = self.byte_at(idx).and_then(|b| (b as char).to_digit(16)) else { break };
			value = (value << 4) | digit as u64;
			idx += 1;
		}
		if idx == 0 {
			return Err(Error::new(
				OperationKind::BufRead,
				crate::streams::ErrorKind::Other("no hex digits"),
			));
		}
		self.skip(idx);
		Ok(value)
	}

	/// Writes a signed integer in decimal text.
	pub fn write_decimal_long(&mut self, value: i64) {
		self.write_from_slice(value.to_string().as_bytes());
	}

	/// Writes an unsigned integer in lowercase hexadecimal text.
	pub fn write_hex_unsigned_long(&mut self, value: u64) {
		self.write_from_slice(format!("{value:x}").as_bytes());
	}

	/// Reads bytes from `reader` directly into buffer segments, returning the
	/// number read (`0` at end-of-stream).
	pub(crate) fn read_std(&mut self, reader: &mut impl Read, count: usize) -> std::io::Result<usize> {
		let mut remaining = count;
		let mut total = 0;
		while remaining > 0 {
			let seg = self.tail_with_room();
			let limit = remaining.min(seg.lim());
			if limit == 0 { break }
			let mut scratch = vec![0u8; limit];
			let n = reader.read(&mut scratch)?;
			if n == 0 { break }
			seg.push_slice(&scratch[..n]);
			self.size += n;
			total += n;
			remaining -= n;
		}
		trace!("read_std: read {total} of {count} requested bytes");
		Ok(total)
	}

	/// Writes up to `count` buffered bytes directly to `writer`, returning
	/// the number written.
	pub(crate) fn write_std(&mut self, writer: &mut impl Write, count: usize) -> std::io::Result<usize> {
		let mut remaining = count.min(self.size);
		let total = remaining;
		while remaining > 0 {
			let n = {
				let Some(seg) = self.segments.front() else { break };
				let data = seg.data();
				let n = remaining.min(data.len());
				writer.write(&data[..n])?
			};
			if n == 0 { break }
			let seg = self.segments.front_mut().unwrap();
			seg.consume(n);
			self.size -= n;
			remaining -= n;
			self.recycle_front_if_empty();
		}
		Ok(total - remaining)
	}
}

macro_rules! gen_num_rw {
	($($rfn:ident $wfn:ident $rfn_le:ident $wfn_le:ident $ty:ident)+) => {
		$(
		#[doc = concat!(" Reads one big-endian [`", stringify!($ty), "`].")]
		pub fn $rfn(&mut self) -> Result<$ty> {
			let mut b = [0u8; mem::size_of::<$ty>()];
			self.read_exact_buffered(&mut b)?;
			Ok($ty::from_be_bytes(b))
		}
		#[doc = concat!(" Reads one little-endian [`", stringify!($ty), "`].")]
		pub fn $rfn_le(&mut self) -> Result<$ty> {
			let mut b = [0u8; mem::size_of::<$ty>()];
			self.read_exact_buffered(&mut b)?;
			Ok($ty::from_le_bytes(b))
		}
		#[doc = concat!(" Writes one big-endian [`", stringify!($ty), "`].")]
		pub fn $wfn(&mut self, value: $ty) -> Result {
			self.write_from_slice(&value.to_be_bytes());
			Ok(())
		}
		#[doc = concat!(" Writes one little-endian [`", stringify!($ty), "`].")]
		pub fn $wfn_le(&mut self, value: $ty) -> Result {
			self.write_from_slice(&value.to_le_bytes());
			Ok(())
		}
		)+
	};
}

impl Buffer {
	pub fn read_i8(&mut self) -> Result<i8> {
		let mut b = [0u8; 1];
		self.read_exact_buffered(&mut b)?;
		Ok(b[0] as i8)
	}

	pub fn read_u8(&mut self) -> Result<u8> {
		let mut b = [0u8; 1];
		self.read_exact_buffered(&mut b)?;
		Ok(b[0])
	}

	pub fn write_i8(&mut self, value: i8) -> Result {
		self.write_from_slice(&[value as u8]);
		Ok(())
	}

	pub fn write_u8(&mut self, value: u8) -> Result {
		self.write_from_slice(&[value]);
		Ok(())
	}

	gen_num_rw! {
		read_i16 write_i16 read_i16_le write_i16_le i16
		read_u16 write_u16 read_u16_le write_u16_le u16
		read_i32 write_i32 read_i32_le write_i32_le i32
		read_u32 write_u32 read_u32_le write_u32_le u32
		read_i64 write_i64 read_i64_le write_i64_le i64
		read_u64 write_u64 read_u64_le write_u64_le u64
		read_isize write_isize read_isize_le write_isize_le isize
		read_usize write_usize read_usize_le write_usize_le usize
	}
}

/// Returns the encoded length of the UTF-8 sequence starting with `lead`,
/// or `None` if `lead` can't start a sequence (a continuation byte or one
/// of the bytes UTF-8 never uses). Doesn't validate the sequence itself;
/// overlong encodings and the like are caught by decoding.
fn utf8_sequence_len(lead: u8) -> Option<usize> {
	if lead & 0x80 == 0x00 { Some(1) }
	else if lead & 0xE0 == 0xC0 { Some(2) }
	else if lead & 0xF0 == 0xE0 { Some(3) }
	else if lead & 0xF8 == 0xF0 { Some(4) }
	else { None }
}

impl Source for Buffer {
	fn read(&mut self, sink: &mut Buffer, count: usize) -> Result<usize> {
		Ok(self.transfer_to(sink, count))
	}
}

impl Sink for Buffer {
	fn write(&mut self, source: &mut Buffer, count: usize) -> Result<usize> {
		Ok(source.transfer_to(self, count))
	}
}

impl BufStream for Buffer {
	fn buf(&self) -> &Buffer { self }
	fn buf_mut(&mut self) -> &mut Buffer { self }
}

impl BufSource for Buffer {
	fn request(&mut self, byte_count: usize) -> Result<bool> {
		Ok(self.size >= byte_count)
	}

	fn read_all(&mut self, sink: &mut impl Sink) -> Result<usize> {
		sink.write_all(self)
	}
}

impl BufSink for Buffer {
	fn write_all(&mut self, source: &mut impl Source) -> Result<usize> {
		source.read_all(self)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn write_then_read_roundtrip() {
		let mut buf = Buffer::new();
		buf.write_from_slice(b"hello, world");
		assert_eq!(buf.len(), 12);
		let mut out = [0u8; 12];
		assert_eq!(buf.read_into_slice(&mut out), 12);
		assert_eq!(&out, b"hello, world");
		assert!(buf.is_empty());
	}

	#[test]
	fn transfer_relinks_whole_segments() {
		let mut a = Buffer::new();
		let data = vec![7u8; crate::segment::SIZE * 3];
		a.write_from_slice(&data);
		let mut b = Buffer::new();
		let moved = a.transfer_to(&mut b, data.len());
		assert_eq!(moved, data.len());
		assert_eq!(a.len(), 0);
		assert_eq!(b.len(), data.len());
	}

	#[test]
	fn transfer_splits_partial_segment() {
		let mut a = Buffer::new();
		a.write_from_slice(b"0123456789");
		let mut b = Buffer::new();
		assert_eq!(a.transfer_to(&mut b, 4), 4);
		assert_eq!(a.len(), 6);
		assert_eq!(b.len(), 4);
		let mut out = vec![0u8; 4];
		b.read_into_slice(&mut out);
		assert_eq!(&out, b"0123");
	}

	#[test]
	fn read_utf8_line_splits_on_newline() {
		let mut buf = Buffer::new();
		buf.write_utf8("first\r\nsecond\nthird");
		let mut line = String::new();
		assert!(buf.read_utf8_line(&mut line).unwrap());
		assert_eq!(line, "first");
		line.clear();
		assert!(buf.read_utf8_line(&mut line).unwrap());
		assert_eq!(line, "second");
		line.clear();
		assert!(!buf.read_utf8_line(&mut line).unwrap());
		buf.read_utf8_line_final(&mut line).unwrap();
		assert_eq!(line, "third");
	}

	#[test]
	fn decimal_and_hex_roundtrip() {
		let mut buf = Buffer::new();
		buf.write_decimal_long(-4201);
		assert_eq!(buf.read_decimal_long().unwrap(), -4201);

		let mut buf = Buffer::new();
		buf.write_hex_unsigned_long(0xdead_beef);
		assert_eq!(buf.read_hex_unsigned_long().unwrap(), 0xdead_beef);
	}

	#[test]
	fn index_of_finds_needle_across_segments() {
		let mut buf = Buffer::new();
		buf.write_from_slice(&vec![0u8; crate::segment::SIZE]);
		buf.write_from_slice(b"needle");
		assert_eq!(buf.index_of(b"needle", 0), Some(crate::segment::SIZE));
	}

	#[test]
	fn code_point_decodes_across_width() {
		let mut buf = Buffer::new();
		buf.write_utf8("a\u{1F600}");
		assert_eq!(buf.read_utf8_code_point().unwrap(), Some('a'));
		assert_eq!(buf.read_utf8_code_point().unwrap(), Some('\u{1F600}'));
		assert_eq!(buf.read_utf8_code_point().unwrap(), None);
	}

	#[test]
	fn code_point_waits_for_more_bytes() {
		let mut buf = Buffer::new();
		buf.write_from_slice(&"\u{1F600}".as_bytes()[..2]);
		assert_eq!(buf.read_utf8_code_point().unwrap(), None);
		assert_eq!(buf.len(), 2);
	}

	#[test]
	fn code_point_rejects_overlong_encoding() {
		let mut buf = Buffer::new();
		// An overlong two-byte encoding of NUL.
		buf.write_from_slice(&[0xC0, 0x80]);
		assert!(buf.read_utf8_code_point().is_err());
	}

	#[test]
	fn code_point_rejects_encoded_surrogate() {
		let mut buf = Buffer::new();
		// U+D800, a lone surrogate half, encoded as three bytes.
		buf.write_from_slice(&[0xED, 0xA0, 0x80]);
		assert!(buf.read_utf8_code_point().is_err());
	}
}
