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

//! Buffering wrappers that sit between a raw [`Source`]/[`Sink`] and the
//! buffered reading/writing API, added by [`SourceBuffer::buffer`] and
//! [`SinkBuffer::buffer`].

use std::time::Instant;
use ErrorKind::Eos;
use crate::{Buffer, Timeout};
use crate::streams::{
	Sink, Source, Result, BufStream, BufSource, Error, BufSink, ErrorKind, Seekable,
	SeekOffset, SeekableExt,
};
use crate::streams::OperationKind::{BufFlush, BufRead};
use crate::segment::SIZE;

pub fn buffer_source<S: Source>(source: S) -> BufferedSource<S> {
	BufferedSource::new(source)
}

pub fn buffer_sink<S: Sink>(sink: S) -> BufferedSink<S> {
	BufferedSink {
		buffer: Buffer::new(),
		sink,
		closed: false,
		timeout: Timeout::none(),
		last_activity: Instant::now(),
	}
}

pub struct BufferedSource<S: Source> {
	buffer: Buffer,
	source: S,
	closed: bool,
	timeout: Timeout,
	last_activity: Instant,
}

impl<S: Source> BufferedSource<S> {
	fn new(source: S) -> Self {
		Self {
			buffer: Buffer::new(),
			source,
			closed: false,
			timeout: Timeout::none(),
			last_activity: Instant::now(),
		}
	}

	/// Sets the deadline/idle timeout checked before each segment-sized
	/// refill and before every blocking call into the underlying source.
	pub fn set_timeout(&mut self, timeout: Timeout) {
		self.timeout = timeout;
	}

	/// Returns a new `BufferedSource` over a snapshot of the bytes currently
	/// buffered here, without consuming them from `self`. Cheap: it shares
	/// the underlying segment memory copy-on-write.
	pub fn peek(&self) -> BufferedSource<Buffer> {
		BufferedSource::new(self.buffer.clone())
	}
}

impl<S: Source> BufferedSource<S> {
	/// Fills the buffer, rounding up to the nearest segment size, one
	/// segment-sized read at a time so the timeout can be checked at each
	/// step.
	fn fill_buf(&mut self, byte_count: usize) -> Result<bool> {
		let count = self.buffer.len();
		let seg_count = (count + byte_count + SIZE - 1) / SIZE;
		let mut remaining = seg_count * SIZE - count;
		let mut any = false;

		while remaining > 0 {
			self.timeout.check(self.last_activity)?;

			let chunk = remaining.min(SIZE);
			let cnt = self.source
						  .read(&mut self.buffer, chunk)
						  .map_err(Error::with_op_buf_read);
			match cnt {
				Ok(0)                      => break,
				Ok(n)                      => {
					any = true;
					self.last_activity = Instant::now();
					remaining -= n.min(remaining);
				}
				Err(e) if e.kind() == Eos => break,
				Err(error)                => return Err(error)
			}
		}
		Ok(any)
	}
}

impl<S: Source> Source for BufferedSource<S> {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		if self.closed { return Err(Error::closed(BufRead)) }

		self.request(byte_count)?;
		self.buffer.read(sink, byte_count)
	}

	fn close_source(&mut self) -> Result {
		if !self.closed {
			self.closed = true;
			self.buffer.clear();
			self.source.close_source()
		} else {
			Ok(())
		}
	}
}

impl<S: Source> BufStream for BufferedSource<S> {
	fn buf(&self) -> &Buffer { &self.buffer }
	fn buf_mut(&mut self) -> &mut Buffer { &mut self.buffer }
}

impl<S: Source> BufSource for BufferedSource<S> {
	fn request(&mut self, byte_count: usize) -> Result<bool> {
		if self.closed { return Ok(false) }

		if self.buffer.len() >= byte_count {
			return Ok(true)
		}

		self.fill_buf(byte_count)
	}

	fn read_all(&mut self, sink: &mut impl Sink) -> Result<usize> {
		sink.write_all(self.buf_mut())
			.map_err(Error::with_op_buf_read)
	}
}

impl<S: Source + Seekable> BufferedSource<S> {
	fn seek_back(&mut self, off: usize) -> Result<usize> {
		let cur_pos = self.seek_pos()?;
		let new_pos = self.source.seek_back(off)?;
		let count = cur_pos - new_pos;

		if count == 0 {
			return Ok(new_pos)
		}

		let mut seek_buf = Buffer::new();
		self.source
			.read(&mut seek_buf, count)
			.map_err(Error::with_op_seek)?;
		self.buffer.prepend(&mut seek_buf);
		Ok(new_pos)
	}

	fn seek_forward(&mut self, off: usize) -> Result<usize> {
		let skipped = self.buffer.skip(off);
		self.source.seek_forward(off - skipped)
	}
}

impl<S: Source + Seekable> Seekable for BufferedSource<S> {
	fn seek(&mut self, offset: SeekOffset) -> Result<usize> {
		match offset {
			SeekOffset::Forward(0) |
			SeekOffset::Back   (0) => self.seek_pos(),
			SeekOffset::Forward(off) => self.seek_forward(off),
			SeekOffset::Back   (off) => self.seek_back   (off),
			_ => {
				// No clever way to reuse the buffer for the rest, just
				// invalidate it and seek on the source.
				self.buffer.clear();
				self.source.seek(offset)
			}
		}
	}

	fn seek_len(&mut self) -> Result<usize> { self.source.seek_len() }

	fn seek_pos(&mut self) -> Result<usize> {
		// Offset the source position back by the buffer length to account for
		// buffering.
		Ok(self.source.seek_pos()? - self.buffer.len())
	}
}

impl<S: Source> Drop for BufferedSource<S> {
	fn drop(&mut self) {
		let _ = self.close_source();
	}
}

pub struct BufferedSink<S: Sink> {
	buffer: Buffer,
	sink: S,
	closed: bool,
	timeout: Timeout,
	last_activity: Instant,
}

impl<S: Sink> BufferedSink<S> {
	/// Sets the deadline/idle timeout checked before each segment-sized
	/// emit and before every blocking call into the underlying sink.
	pub fn set_timeout(&mut self, timeout: Timeout) {
		self.timeout = timeout;
	}

	/// Writes `byte_count` buffered bytes to the underlying sink, one
	/// segment-sized write at a time so the timeout can be checked at each
	/// step. Doesn't flush the underlying sink.
	fn write_chunks(&mut self, byte_count: usize) -> Result {
		let mut remaining = byte_count;
		while remaining > 0 {
			self.timeout.check(self.last_activity)?;

			let chunk = remaining.min(SIZE);
			self.sink
				.write(&mut self.buffer, chunk)
				.map_err(Error::with_op_buf_flush)?;
			self.last_activity = Instant::now();
			remaining -= chunk;
		}
		Ok(())
	}

	/// Writes every buffered byte, including a partial trailing segment, to
	/// the underlying sink. Doesn't flush the underlying sink; use
	/// [`Sink::flush`] for that.
	pub fn emit(&mut self) -> Result {
		let len = self.buffer.len();
		self.write_chunks(len)
	}

	/// Writes whole buffered segments to the underlying sink, leaving any
	/// partial trailing segment buffered for the next write.
	pub fn emit_complete_segments(&mut self) -> Result {
		let complete = self.buffer.len() / SIZE * SIZE;
		self.write_chunks(complete)
	}
}

impl<S: Sink> Sink for BufferedSink<S> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<usize> {
		if self.closed {
			return Err(Error::closed(BufFlush))
		}

		let cnt = self.buffer.write(source, byte_count)?;
		if self.buffer.len() >= SIZE {
			self.emit_complete_segments()?;
		}
		Ok(cnt)
	}

	fn flush(&mut self) -> Result {
		if self.closed {
			return Err(Error::closed(BufFlush))
		}

		// Both of these need a chance to run before returning an error.
		let written = self.emit();
		let flushed = self.sink
						.flush()
						.map_err(Error::with_op_buf_flush);
		written?;
		flushed?;
		Ok(())
	}

	fn close_sink(&mut self) -> Result {
		if !self.closed {
			self.closed = true;
			// Not `self.flush()`: `closed` is already set, which would
			// make it bail out without writing anything.
			let written = self.emit();
			let flushed = self.sink.flush().map_err(Error::with_op_buf_flush);
			let close = self.sink.close_sink();
			self.buffer.clear();
			written?;
			flushed?;
			close?;
			Ok(())
		} else {
			Ok(())
		}
	}
}

impl<S: Sink> BufStream for BufferedSink<S> {
	fn buf(&self) -> &Buffer { &self.buffer }
	fn buf_mut(&mut self) -> &mut Buffer { &mut self.buffer }
}

impl<S: Sink> BufSink for BufferedSink<S> {
	fn write_all(&mut self, source: &mut impl Source) -> Result<usize> {
		source.read_all(self.buf_mut())
			  .map_err(Error::with_op_buf_write)
	}
}

impl<S: Sink + Seekable> Seekable for BufferedSink<S> {
	fn seek(&mut self, offset: SeekOffset) -> Result<usize> {
		self.flush().map_err(Error::with_op_seek)?;
		self.sink.seek(offset)
	}

	fn seek_len(&mut self) -> Result<usize> {
		Ok(self.buffer.len() + self.sink.seek_len()?)
	}
}

impl<S: Sink> Drop for BufferedSink<S> {
	fn drop(&mut self) {
		let _ = self.close_sink();
	}
}
