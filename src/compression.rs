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

//! DEFLATE and gzip adapters built on `flate2`'s raw `Decompress`/`Compress`
//! state machines, feeding and draining segment-sized chunks directly
//! between buffers with no intermediate heap copy beyond what `flate2`
//! itself requires.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use log::{debug, trace};
use crate::segment::SIZE;
use crate::streams::{Error, OperationKind, Result, Sink, Source};
use crate::Buffer;

/// A [`Source`] that inflates raw DEFLATE data read from an inner source.
pub struct InflaterSource<S> {
	inner: S,
	state: Decompress,
	input: Buffer,
	finished: bool,
}

impl<S: Source> InflaterSource<S> {
	pub fn new(inner: S) -> Self {
		Self { inner, state: Decompress::new(false), input: Buffer::new(), finished: false }
	}

	fn raw(inner: S, state: Decompress) -> Self {
		Self { inner, state, input: Buffer::new(), finished: false }
	}

	/// Returns `true` once the DEFLATE stream has reported its end.
	fn is_finished(&self) -> bool { self.finished }
}

impl<S: Source> Source for InflaterSource<S> {
	fn read(&mut self, sink: &mut Buffer, count: usize) -> Result<usize> {
		let mut produced = 0;
		while produced < count {
			if self.input.is_empty() {
				let read = self.inner.read(&mut self.input, SIZE)?;
				if read == 0 && self.input.is_empty() {
					break;
				}
			}

			let in_bytes = self.input.snapshot(self.input.len());
			let mut out = vec![0u8; SIZE.min(count - produced).max(1)];
			let before_in = self.state.total_in();
			let before_out = self.state.total_out();
			let status = self.state
				.decompress(in_bytes.as_slice(), &mut out, FlushDecompress::None)
				.map_err(|e| Error::with_source(OperationKind::Other("inflate"), crate::streams::ErrorKind::Other("deflate stream error"), e))?;
			let consumed = (self.state.total_in() - before_in) as usize;
			let written = (self.state.total_out() - before_out) as usize;

			self.input.skip(consumed);
			sink.write_from_slice(&out[..written]);
			produced += written;

			trace!("inflate: consumed {consumed} bytes, produced {written} bytes");

			if status == Status::StreamEnd {
				self.finished = true;
				break;
			}
			if consumed == 0 && written == 0 {
				break;
			}
		}
		Ok(produced)
	}
}

/// A [`Sink`] that deflates data into raw DEFLATE, written to an inner sink.
pub struct DeflaterSink<S> {
	inner: S,
	state: Compress,
}

impl<S: Sink> DeflaterSink<S> {
	pub fn new(inner: S, level: Compression) -> Self {
		Self { inner, state: Compress::new(level, false) }
	}
}

impl<S: Sink> Sink for DeflaterSink<S> {
	fn write(&mut self, source: &mut Buffer, count: usize) -> Result<usize> {
		let n = count.min(source.len());
		let chunk = source.read_byte_str(n)?;
		let mut out = Buffer::new();
		let mut scratch = vec![0u8; SIZE];
		let before_out = self.state.total_out();
		self.state
			.compress(chunk.as_slice(), &mut scratch, FlushCompress::None)
			.map_err(|e| Error::with_source(OperationKind::Other("deflate"), crate::streams::ErrorKind::Other("deflate stream error"), e))?;
		let written = (self.state.total_out() - before_out) as usize;
		out.write_from_slice(&scratch[..written]);
		self.inner.write_all(&mut out)?;
		Ok(n)
	}

	fn flush(&mut self) -> Result {
		let mut out = Buffer::new();
		let mut scratch = vec![0u8; SIZE];
		loop {
			let before_out = self.state.total_out();
			let status = self.state
				.compress(&[], &mut scratch, FlushCompress::Finish)
				.map_err(|e| Error::with_source(OperationKind::Other("deflate"), crate::streams::ErrorKind::Other("deflate stream error"), e))?;
			let written = (self.state.total_out() - before_out) as usize;
			out.write_from_slice(&scratch[..written]);
			if status == Status::StreamEnd {
				break;
			}
		}
		self.inner.write_all(&mut out)?;
		self.inner.flush()
	}
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const GZIP_DEFLATE_METHOD: u8 = 8;

/// A [`Source`] reading gzip-framed data, verifying the trailing CRC-32 and
/// length once the stream is exhausted.
pub struct GzipSource<S> {
	inflater: InflaterSource<S>,
	header_read: bool,
	trailer_checked: bool,
	crc: crc32fast_like::Crc32,
	total_len: u32,
}

mod crc32fast_like {
	/// A small table-based CRC-32 (the same polynomial gzip uses), so the
	/// crate doesn't need a second checksum dependency alongside `flate2`.
	pub struct Crc32 {
		state: u32,
	}

	impl Crc32 {
		pub fn new() -> Self { Self { state: 0xffff_ffff } }

		pub fn update(&mut self, bytes: &[u8]) {
			for &byte in bytes {
				let idx = ((self.state ^ byte as u32) & 0xff) as usize;
				self.state = (self.state >> 8) ^ TABLE[idx];
			}
		}

		pub fn finish(&self) -> u32 { self.state ^ 0xffff_ffff }
	}

	const TABLE: [u32; 256] = build_table();

	const fn build_table() -> [u32; 256] {
		let mut table = [0u32; 256];
		let mut i = 0;
		while i < 256 {
			let mut c = i as u32;
			let mut j = 0;
			while j < 8 {
				c = if c & 1 != 0 { 0xedb8_8320 ^ (c >> 1) } else { c >> 1 };
				j += 1;
			}
			table[i] = c;
			i += 1;
		}
		table
	}
}

impl<S: Source> GzipSource<S> {
	pub fn new(inner: S) -> Self {
		Self {
			inflater: InflaterSource::raw(inner, Decompress::new(false)),
			header_read: false,
			trailer_checked: false,
			crc: crc32fast_like::Crc32::new(),
			total_len: 0,
		}
	}

	fn read_header(&mut self) -> Result {
		let mut header = Buffer::new();
		self.inflater.inner.read(&mut header, 10)?;
		if header.len() < 10 {
			return Err(Error::eos(OperationKind::Other("gzip header")));
		}
		let magic = [header.read_u8()?, header.read_u8()?];
		if magic != GZIP_MAGIC {
			return Err(Error::new(OperationKind::Other("gzip header"), crate::streams::ErrorKind::Other("bad gzip magic")));
		}
		let method = header.read_u8()?;
		if method != GZIP_DEFLATE_METHOD {
			return Err(Error::new(OperationKind::Other("gzip header"), crate::streams::ErrorKind::Other("unsupported gzip method")));
		}
		let flags = header.read_u8()?;
		header.skip(6); // mtime (4) + XFL (1) + OS (1)

		if flags & 0x04 != 0 {
			// FEXTRA
			let mut extra_len = Buffer::new();
			self.inflater.inner.read(&mut extra_len, 2)?;
			let len = extra_len.read_u16_le()? as usize;
			self.inflater.inner.read(&mut Buffer::new(), len)?;
		}
		if flags & 0x08 != 0 {
			self.skip_c_string()?;
		}
		if flags & 0x10 != 0 {
			self.skip_c_string()?;
		}
		if flags & 0x02 != 0 {
			self.inflater.inner.read(&mut Buffer::new(), 2)?; // FHCRC
		}

		debug!("gzip: header parsed, flags={flags:#x}");
		self.header_read = true;
		Ok(())
	}

	fn skip_c_string(&mut self) -> Result {
		loop {
			let mut b = Buffer::new();
			let n = self.inflater.inner.read(&mut b, 1)?;
			if n == 0 || b.read_byte() == Some(0) {
				break;
			}
		}
		Ok(())
	}

	/// Reads the 8-byte trailer (CRC-32, then length mod 2^32) and checks it
	/// against the bytes actually produced.
	fn verify_trailer(&mut self) -> Result {
		self.trailer_checked = true;
		let mut trailer = Buffer::new();
		self.inflater.inner.read(&mut trailer, 8)?;
		if trailer.len() < 8 {
			return Err(Error::eos(OperationKind::Other("gzip trailer")));
		}
		let crc = trailer.read_u32_le()?;
		let len = trailer.read_u32_le()?;
		if crc != self.crc.finish() {
			return Err(Error::new(
				OperationKind::Other("gzip trailer"),
				crate::streams::ErrorKind::Other("CRC-32 mismatch"),
			));
		}
		if len != self.total_len {
			return Err(Error::new(
				OperationKind::Other("gzip trailer"),
				crate::streams::ErrorKind::Other("length mismatch"),
			));
		}
		Ok(())
	}
}

impl<S: Source> Source for GzipSource<S> {
	fn read(&mut self, sink: &mut Buffer, count: usize) -> Result<usize> {
		if !self.header_read {
			self.read_header()?;
		}
		let before = sink.len();
		let n = self.inflater.read(sink, count)?;
		let tail = sink.snapshot(sink.len());
		let new_bytes = &tail.as_slice()[before..];
		self.crc.update(new_bytes);
		self.total_len = self.total_len.wrapping_add(new_bytes.len() as u32);

		if self.inflater.is_finished() && !self.trailer_checked {
			self.verify_trailer()?;
		}
		Ok(n)
	}
}

/// A [`Sink`] writing gzip-framed data: a minimal 10-byte header, the
/// deflated payload, then an 8-byte trailer (CRC-32, then length mod 2^32).
pub struct GzipSink<S> {
	deflater: DeflaterSink<S>,
	header_written: bool,
	crc: crc32fast_like::Crc32,
	total_len: u32,
}

impl<S: Sink> GzipSink<S> {
	pub fn new(inner: S, level: Compression) -> Self {
		Self {
			deflater: DeflaterSink::new(inner, level),
			header_written: false,
			crc: crc32fast_like::Crc32::new(),
			total_len: 0,
		}
	}

	fn write_header(&mut self) -> Result {
		let mut header = Buffer::new();
		header.write_from_slice(&GZIP_MAGIC);
		header.write_u8(GZIP_DEFLATE_METHOD)?;
		header.write_u8(0)?; // flags
		header.write_u32_le(0)?; // mtime
		header.write_u8(0)?; // XFL
		header.write_u8(0xff)?; // OS: unknown
		self.deflater.inner.write_all(&mut header)?;
		self.header_written = true;
		Ok(())
	}
}

impl<S: Sink> Sink for GzipSink<S> {
	fn write(&mut self, source: &mut Buffer, count: usize) -> Result<usize> {
		if !self.header_written {
			self.write_header()?;
		}
		let n = count.min(source.len());
		let bytes = source.snapshot(n);
		self.crc.update(bytes.as_slice());
		self.total_len = self.total_len.wrapping_add(n as u32);
		let mut chunk = Buffer::new();
		chunk.write_from_slice(bytes.as_slice());
		source.skip(n);
		self.deflater.write(&mut chunk, n)
	}

	fn flush(&mut self) -> Result {
		self.deflater.flush()?;
		let mut trailer = Buffer::new();
		trailer.write_u32_le(self.crc.finish())?;
		trailer.write_u32_le(self.total_len)?;
		self.deflater.inner.write_all(&mut trailer)?;
		self.deflater.inner.flush()
	}
}
