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

use std::error::Error as StdError;
use std::{fmt, io, mem, result};
use std::cmp::min;
use std::fmt::{Display, Formatter};
use amplify_derive::Display;
use simdutf8::compat::Utf8Error;
use OperationKind::{BufRead, BufWrite};
use crate::{error, Buffer, ByteStr, ByteString, SEGMENT_SIZE};
use crate::buffered_wrappers::{buffer_sink, buffer_source, BufferedSink, BufferedSource};
use crate::streams::ErrorKind::{Closed, Eos, InvalidUTF8, Io};
use crate::streams::OperationKind::{BufClear, BufCompact, BufCopy, BufFlush, Seek};

mod file;
mod seeking;
pub use seeking::*;
pub use file::*;

pub type Error = error::Error<OperationKind, ErrorKind>;
pub type Result<T = ()> = result::Result<T, Error>;

#[derive(Copy, Clone, Debug, Default, Display)]
pub enum OperationKind {
	#[default]
	#[display("unknown operation")]
	Unknown,
	#[display("read from buffer")]
	BufRead,
	#[display("write to buffer")]
	BufWrite,
	#[display("copy buffer")]
	BufCopy,
	#[display("clear buffer")]
	BufClear,
	#[display("flush buffer")]
	BufFlush,
	#[display("compact buffer")]
	BufCompact,
	#[display("seek")]
	Seek,
	#[display("{0}")]
	Other(&'static str)
}

impl error::Operation for OperationKind {
	fn unknown() -> Self { Self::Unknown }
	fn other(name: &'static str) -> Self { Self::Other(name) }
}

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum ErrorKind {
	#[display("premature end-of-stream")]
	Eos,
	#[display("IO error")]
	Io,
	#[display("invalid UTF-8")]
	InvalidUTF8,
	#[display("stream closed")]
	Closed,
	#[display("timed out")]
	TimedOut,
	#[display("cancelled")]
	Cancelled,
	#[display("{0}")]
	Other(&'static str),
}

impl error::Kind for ErrorKind { }

impl From<io::Error> for Error {
	fn from(value: io::Error) -> Self {
		if let io::ErrorKind::UnexpectedEof = value.kind() {
			Error::eos(OperationKind::Unknown)
		} else {
			Error::io(OperationKind::Unknown, value)
		}
	}
}

impl Error {
	/// Creates a new "end-of-stream" error.
	pub fn eos(op: OperationKind) -> Self { Self::new(op, Eos) }

	/// Creates a new IO error.
	pub fn io(op: OperationKind, error: io::Error) -> Self {
		Self::with_source(op, Io, error)
	}

	/// Creates a new "closed" error.
	pub fn closed(op: OperationKind) -> Self { Self::new(op, Closed) }

	/// Creates a new UTF-8 error.
	pub fn invalid_utf8(op: OperationKind, error: OffsetUtf8Error) -> Self {
		Self::with_source(op, InvalidUTF8, error)
	}

	/// Returns the source downcast into an IO error, if any.
	pub fn io_source(&self) -> Option<&io::Error> {
		StdError::source(self)?.downcast_ref()
	}

	/// Convenience shorthand for `with_operation(OperationKind::BufRead)`.
	pub fn with_op_buf_read(self) -> Self { self.with_operation(BufRead) }
	/// Convenience shorthand for `with_operation(OperationKind::BufWrite)`.
	pub fn with_op_buf_write(self) -> Self { self.with_operation(BufWrite) }
	/// Convenience shorthand for `with_operation(OperationKind::BufCopy)`.
	pub fn with_op_buf_copy(self) -> Self { self.with_operation(BufCopy) }
	/// Convenience shorthand for `with_operation(OperationKind::BufClear)`.
	pub fn with_op_buf_clear(self) -> Self { self.with_operation(BufClear) }
	/// Convenience shorthand for `with_operation(OperationKind::BufFlush)`.
	pub fn with_op_buf_flush(self) -> Self { self.with_operation(BufFlush) }
	/// Convenience shorthand for `with_operation(OperationKind::BufCompact)`.
	pub fn with_op_buf_compact(self) -> Self { self.with_operation(BufCompact) }
	/// Convenience shorthand for `with_operation(OperationKind::Seek)`.
	pub fn with_op_seek(self) -> Self { self.with_operation(Seek) }

	pub(crate) fn into_io(self) -> io::Error {
		match self.kind() {
			Eos => io::Error::new(io::ErrorKind::UnexpectedEof, self),
			Io  => {
				let Some(src) = self.io_source() else {
					return io::Error::other(self)
				};
				io::Error::new(src.kind(), self)
			}
			_ => io::Error::other(self)
		}
	}
}

/// A data source.
pub trait Source {
	/// Reads `count` bytes from the source into `sink`.
	fn read(&mut self, sink: &mut Buffer, count: usize) -> Result<usize>;

	/// Reads all bytes from the source into `sink`.
	#[inline]
	fn read_all(&mut self, sink: &mut Buffer) -> Result<usize> {
		self.read(sink, usize::MAX)
	}

	/// Closes the source. All default streams close automatically when
	/// dropped; closing is idempotent.
	fn close_source(&mut self) -> Result { Ok(()) }
}

pub trait SourceBuffer: Source + Sized {
	/// Wraps the source in a [`BufferedSource`].
	fn buffer(self) -> BufferedSource<Self> { buffer_source(self) }
}

impl<S: Source> SourceBuffer for S { }

/// A data sink.
pub trait Sink {
	/// Writes `count` bytes from `source` into the sink.
	fn write(&mut self, source: &mut Buffer, count: usize) -> Result<usize>;

	/// Writes all bytes from `source` into the sink.
	#[inline]
	fn write_all(&mut self, source: &mut Buffer) -> Result<usize> {
		self.write(source, source.len())
	}

	/// Writes all buffered data to its final target.
	fn flush(&mut self) -> Result { Ok(()) }

	/// Flushes and closes the sink. Idempotent.
	fn close_sink(&mut self) -> Result { self.flush() }
}

pub trait SinkBuffer: Sink + Sized {
	/// Wraps the sink in a [`BufferedSink`].
	fn buffer(self) -> BufferedSink<Self> { buffer_sink(self) }
}

impl<S: Sink> SinkBuffer for S { }

pub trait BufStream {
	fn buf(&self) -> &Buffer;
	fn buf_mut(&mut self) -> &mut Buffer;
}

macro_rules! gen_int_reads {
    ($($be_name:ident$($le_name:ident)?->$ty:ident,)+) => {
		$(gen_int_reads! { $be_name$($le_name)?->$ty })+
	};
	($be_name:ident$le_name:ident->$ty:ident) => {
		gen_int_reads! { $be_name->$ty "big-endian " }
		gen_int_reads! { $le_name->$ty "little-endian " }
	};
	($name:ident->$ty:ident$($endian:literal)?) => {
		#[doc = concat!(" Reads one ",$($endian,)?"[`",stringify!($ty),"`] from the source.")]
		fn $name(&mut self) -> Result<$ty> {
			self.require(mem::size_of::<$ty>())?;
			self.buf_mut().$name()
		}
	}
}

pub trait BufSource: BufStream + Source {
	/// Reads up to `byte_count` bytes into the buffer, returning whether the
	/// requested count is available. To return an end-of-stream error, use
	/// [`Self::require`].
	fn request(&mut self, byte_count: usize) -> Result<bool>;

	/// Reads at least `byte_count` bytes into the buffer, returning an
	/// end-of-stream error if not successful.
	fn require(&mut self, byte_count: usize) -> Result {
		if self.request(byte_count)? {
			Ok(())
		} else {
			Err(Error::eos(BufRead))
		}
	}

	/// Returns `true` if the source has no more bytes buffered or available.
	fn exhausted(&mut self) -> Result<bool> { Ok(!self.request(1)?) }

	fn read_all(&mut self, sink: &mut impl Sink) -> Result<usize>;

	gen_int_reads! {
		read_i8 -> i8,
		read_u8 -> u8,
		read_i16 read_i16_le -> i16,
		read_u16 read_u16_le -> u16,
		read_i32 read_i32_le -> i32,
		read_u32 read_u32_le -> u32,
		read_i64 read_i64_le -> i64,
		read_u64 read_u64_le -> u64,
		read_isize read_isize_le -> isize,
		read_usize read_usize_le -> usize,
	}

	/// Reads a decimal-text signed integer (an optional `-` then ASCII digits).
	fn read_decimal_long(&mut self) -> Result<i64> {
		self.require(1)?;
		self.buf_mut().read_decimal_long()
	}

	/// Reads a hexadecimal-text unsigned integer (ASCII hex digits, up to 16).
	fn read_hex_unsigned_long(&mut self) -> Result<u64> {
		self.require(1)?;
		self.buf_mut().read_hex_unsigned_long()
	}

	/// Reads up to `byte_count` bytes into a [`ByteString`].
	fn read_byte_str(&mut self, byte_count: usize) -> Result<ByteString> {
		self.request(byte_count)?;
		self.buf_mut().read_byte_str(byte_count)
	}

	/// Removes `byte_count` bytes from the source.
	fn skip(&mut self, mut byte_count: usize) -> Result<usize> {
		let mut n = 0;
		while byte_count > 0 && self.request(calc_read_count(byte_count, self.buf()))? {
			let skipped = self.buf_mut().skip(byte_count);
			if skipped == 0 { break }
			n += skipped;
			byte_count -= skipped;
		}
		Ok(n)
	}

	/// Reads bytes into a slice, returning the number of bytes read.
	fn read_into_slice(&mut self, mut dst: &mut [u8]) -> Result<usize> {
		let mut n = 0;
		while !dst.is_empty() && self.request(calc_read_count(dst.len(), self.buf()))? {
			let read = self.buf_mut().read_into_slice(dst);
			if read == 0 { break }
			n += read;
			dst = &mut dst[read..];
		}
		Ok(n)
	}

	/// Reads the exact length of bytes into a slice, returning an
	/// end-of-stream error if the slice could not be filled.
	fn read_into_slice_exact(&mut self, dst: &mut [u8]) -> Result {
		let len = dst.len();
		self.require(len)?;
		self.buf_mut().read_into_slice(dst);
		Ok(())
	}

	fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
		let mut array = [0; N];
		self.read_into_slice_exact(&mut array)?;
		Ok(array)
	}

	/// Reads all bytes from the source, decoding them into `str` as UTF-8.
	fn read_all_utf8(&mut self, str: &mut String) -> Result {
		while self.read_utf8(str, usize::MAX)? > 0 { }
		Ok(())
	}

	/// Reads at most `byte_count` bytes from the source, decoding them into
	/// `str` as UTF-8. Returns the number of bytes read.
	fn read_utf8(&mut self, str: &mut String, mut byte_count: usize) -> Result<usize> {
		let mut n = 0;
		while byte_count > 0 && self.request(calc_read_count(byte_count, self.buf()))? {
			let read = self.buf_mut().read_utf8(str, byte_count)?;
			if read == 0 { break }
			n += read;
			byte_count -= read;
		}
		Ok(n)
	}

	/// Reads UTF-8 text into `str` until a line terminator (`\n` or `\r\n`),
	/// returning whether the terminator was encountered. The terminator
	/// itself is not written to the string.
	fn read_utf8_line(&mut self, str: &mut String) -> Result<bool> {
		loop {
			if self.buf_mut().read_utf8_line(str)? {
				return Ok(true)
			}
			if !self.request(calc_read_count(usize::MAX, self.buf()))? {
				self.buf_mut().read_utf8_line_final(str)?;
				return Ok(false)
			}
		}
	}

	/// Reads UTF-8 text into `str` up to and including a line terminator
	/// (`\n` or `\r\n`), failing instead of returning a partial line. Unlike
	/// [`Self::read_utf8_line`], the source reaching end-of-stream before a
	/// terminator appears is an end-of-stream error, and a line (excluding
	/// its terminator) longer than `limit` bytes is a protocol error.
	fn read_utf8_line_strict(&mut self, str: &mut String, limit: usize) -> Result {
		loop {
			if let Some(nl) = self.buf().index_of(b"\n", 0) {
				if nl > limit {
					return Err(Error::new(BufRead, ErrorKind::Other("line exceeds limit")));
				}
				self.buf_mut().read_utf8_line(str)?;
				return Ok(());
			}
			if self.buf().len() > limit {
				return Err(Error::new(BufRead, ErrorKind::Other("line exceeds limit")));
			}
			if !self.request(calc_read_count(usize::MAX, self.buf()))? {
				return Err(Error::eos(BufRead));
			}
		}
	}

	/// Reads a single Unicode code point, requesting more bytes as needed.
	/// Fails with an end-of-stream error if the source is exhausted before
	/// the full sequence is available, and with an invalid-UTF-8 error for
	/// overlong encodings, encoded surrogate halves, or values beyond
	/// `U+10FFFF`.
	fn read_utf8_code_point(&mut self) -> Result<char> {
		loop {
			if let Some(ch) = self.buf_mut().read_utf8_code_point()? {
				return Ok(ch)
			}
			if !self.request(self.buf().len() + SEGMENT_SIZE)? {
				return Err(Error::eos(BufRead));
			}
		}
	}

	/// Returns the byte offset of `needle`'s first occurrence at or after
	/// `from` within currently-buffered bytes, requesting more as needed.
	fn index_of(&mut self, needle: &[u8], mut from: usize) -> Result<Option<usize>> {
		loop {
			if let Some(i) = self.buf().index_of(needle, from) {
				return Ok(Some(i))
			}
			from = self.buf().len().saturating_sub(needle.len().saturating_sub(1));
			if !self.request(self.buf().len() + SEGMENT_SIZE)? {
				return Ok(None)
			}
		}
	}
}

fn calc_read_count(byte_count: usize, buf: &Buffer) -> usize {
	min(byte_count, SEGMENT_SIZE.saturating_sub(buf.len()))
}

macro_rules! gen_int_writes {
    ($($be_name:ident$($le_name:ident)?->$ty:ident,)+) => {
		$(gen_int_writes! { $be_name$($le_name)?->$ty })+
	};
	($be_name:ident$le_name:ident->$ty:ident) => {
		gen_int_writes! { $be_name->$ty "big-endian " }
		gen_int_writes! { $le_name->$ty "little-endian " }
	};
	($name:ident->$ty:ident$($endian:literal)?) => {
		#[doc = concat!(" Writes one ",$($endian,)?"[`",stringify!($ty),"`] to the sink.")]
		fn $name(&mut self, value: $ty) -> Result {
			self.buf_mut().$name(value)
		}
	}
}

pub trait BufSink: BufStream + Sink {
	fn write_all(&mut self, source: &mut impl Source) -> Result<usize>;

	gen_int_writes! {
		write_i8 -> i8,
		write_u8 -> u8,
		write_i16 write_i16_le -> i16,
		write_u16 write_u16_le -> u16,
		write_i32 write_i32_le -> i32,
		write_u32 write_u32_le -> u32,
		write_i64 write_i64_le -> i64,
		write_u64 write_u64_le -> u64,
		write_isize write_isize_le -> isize,
		write_usize write_usize_le -> usize,
	}

	/// Writes a signed integer in decimal text.
	fn write_decimal_long(&mut self, value: i64) -> Result {
		self.buf_mut().write_decimal_long(value)
	}

	/// Writes an unsigned integer in lowercase hexadecimal text.
	fn write_hex_unsigned_long(&mut self, value: u64) -> Result {
		self.buf_mut().write_hex_unsigned_long(value)
	}

	fn write_byte_str(&mut self, value: &ByteStr) -> Result {
		for slice in value.iter() {
			self.write_from_slice(slice)?;
		}
		Ok(())
	}

	fn write_byte_string(&mut self, value: &ByteString) -> Result {
		self.write_from_slice(value.as_slice())
	}

	fn write_from_slice(&mut self, value: &[u8]) -> Result {
		self.buf_mut().write_from_slice(value);
		Ok(())
	}

	fn write_utf8(&mut self, value: &str) -> Result {
		self.buf_mut().write_utf8(value);
		Ok(())
	}
}

// Impls

impl Source for &[u8] {
	fn read(&mut self, sink: &mut Buffer, mut count: usize) -> Result<usize> {
		count = min(count, self.len());
		sink.write_from_slice(&self[..count]);
		*self = &self[count..];
		Ok(count)
	}
}

// Into

/// Converts some type into a [`Source`].
pub trait IntoSource<S: Source> {
	fn into_source(self) -> S;
}

/// Converts some type into a [`Sink`].
pub trait IntoSink<S: Sink> {
	fn into_sink(self) -> S;
}

impl<S: Source, T: Into<S>> IntoSource<S> for T {
	fn into_source(self) -> S { self.into() }
}

impl<S: Sink, T: Into<S>> IntoSink<S> for T {
	fn into_sink(self) -> S { self.into() }
}

#[derive(Copy, Clone, Debug)]
pub struct OffsetUtf8Error {
	inner: Utf8Error,
	offset: usize
}

impl OffsetUtf8Error {
	pub(crate) fn new(inner: Utf8Error, offset: usize) -> Self {
		Self { inner, offset }
	}

	pub fn into_inner(self) -> Utf8Error { self.inner }

	pub fn valid_up_to(&self) -> usize {
		self.offset + self.inner.valid_up_to()
	}

	pub fn error_len(&self) -> Option<usize> {
		self.inner.error_len()
	}
}

impl Display for OffsetUtf8Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		if let Some(error_len) = self.error_len() {
			write!(
				f,
				"invalid utf-8 sequence of {error_len} bytes from index {}",
				self.valid_up_to()
			)
		} else {
			write!(
				f,
				"incomplete utf-8 byte sequence from index {}",
				self.valid_up_to()
			)
		}
	}
}

impl StdError for OffsetUtf8Error {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		Some(&self.inner)
	}
}
