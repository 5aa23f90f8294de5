// SPDX-License-Identifier: Apache-2.0

//! [`Source`]/[`Sink`] wrappers around [`std::fs::File`] and generic
//! [`std::io`] readers/writers, used by the native and fake
//! [`FileSystem`](crate::fs::FileSystem) implementations.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;
use crate::Buffer;
use crate::streams::{Error, OperationKind, Result, SeekOffset, Seekable, Sink, Source};

/// A [`Source`] reading from a [`File`].
pub struct FileSource {
	inner: ReaderSource<File>,
}

impl FileSource {
	pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
		File::open(path).map(Into::into)
	}
}

impl From<File> for FileSource {
	fn from(file: File) -> Self { Self { inner: ReaderSource(file) } }
}

impl Source for FileSource {
	fn read(&mut self, sink: &mut Buffer, count: usize) -> Result<usize> {
		self.inner.read(sink, count)
	}
}

/// A [`Sink`] writing to a [`File`].
pub struct FileSink {
	inner: WriterSink<File>,
}

impl FileSink {
	pub fn create<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
		File::create(path).map(Into::into)
	}
}

impl From<File> for FileSink {
	fn from(file: File) -> Self { Self { inner: WriterSink(file) } }
}

impl Sink for FileSink {
	fn write(&mut self, source: &mut Buffer, count: usize) -> Result<usize> {
		self.inner.write(source, count)
	}

	fn flush(&mut self) -> Result { self.inner.flush() }
}

/// A random-access [`File`] handle, opened for both reading and writing at
/// an independently seekable cursor.
pub struct RandomAccessFile {
	inner: File,
}

impl RandomAccessFile {
	pub fn new(file: File) -> Self { Self { inner: file } }
}

impl From<File> for RandomAccessFile {
	fn from(file: File) -> Self { Self::new(file) }
}

impl Source for RandomAccessFile {
	fn read(&mut self, sink: &mut Buffer, count: usize) -> Result<usize> {
		sink.read_std(&mut self.inner, count)
			.map_err(|e| Error::io(OperationKind::Unknown, e))
	}
}

impl Sink for RandomAccessFile {
	fn write(&mut self, source: &mut Buffer, count: usize) -> Result<usize> {
		source.write_std(&mut self.inner, count)
			.map_err(|e| Error::io(OperationKind::Unknown, e))
	}

	fn flush(&mut self) -> Result {
		self.inner.flush().map_err(|e| Error::io(OperationKind::Unknown, e))
	}
}

impl Seekable for RandomAccessFile {
	fn seek(&mut self, offset: SeekOffset) -> Result<usize> {
		self.inner.seek(offset.into_seek_from())
			.map(|pos| pos as usize)
			.map_err(|e| Error::io(OperationKind::Unknown, e))
	}
}

/// A generic [`Source`] reading from any [`Read`]er, without the seek
/// support or cached length a [`FileSource`] provides.
pub struct ReaderSource<R>(pub R);

impl<R: Read> Source for ReaderSource<R> {
	fn read(&mut self, sink: &mut Buffer, count: usize) -> Result<usize> {
		sink.read_std(&mut self.0, count)
			.map_err(|e| Error::io(OperationKind::Unknown, e))
	}
}

/// A generic [`Sink`] writing to any [`Write`]r.
pub struct WriterSink<W>(pub W);

impl<W: Write> Sink for WriterSink<W> {
	fn write(&mut self, source: &mut Buffer, count: usize) -> Result<usize> {
		source.write_std(&mut self.0, count)
			.map_err(|e| Error::io(OperationKind::Unknown, e))
	}

	fn flush(&mut self) -> Result {
		self.0.flush().map_err(|e| Error::io(OperationKind::Unknown, e))
	}
}
