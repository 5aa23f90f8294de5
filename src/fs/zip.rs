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

//! A read-only [`FileSystem`] view over a PKZIP archive's central directory.
//! Only the `STORED` and `DEFLATED` compression methods are understood;
//! entries using anything else fail to open. Zip64 and multi-disk archives
//! aren't supported.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use flate2::read::DeflateDecoder;
use crate::fs::{not_found_error, read_only_error, FileSystem, Metadata};
use crate::streams::{ReaderSource, SeekOffset, Seekable, Sink, Source, WriterSink};
use crate::streams::{Error, OperationKind, Result};
use crate::Buffer;

/// An uninhabited random-access handle: [`ZipFileSystem`] is read-only, so
/// `open_read_write` always errors before one could exist.
pub struct NoRandomAccess(Infallible);

impl Source for NoRandomAccess {
	fn read(&mut self, _sink: &mut Buffer, _count: usize) -> Result<usize> { match self.0 {} }
}

impl Sink for NoRandomAccess {
	fn write(&mut self, _source: &mut Buffer, _count: usize) -> Result<usize> { match self.0 {} }
	fn flush(&mut self) -> Result { match self.0 {} }
}

impl Seekable for NoRandomAccess {
	fn seek(&mut self, _offset: SeekOffset) -> Result<usize> { match self.0 {} }
}

const LOCAL_FILE_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_DIR_HEADER_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;

const STORED: u16 = 0;
const DEFLATED: u16 = 8;

/// General-purpose bit flag bits this reader refuses to handle: bit 0
/// (encrypted), bit 5 (compressed patched data), bit 6 (strong
/// encryption). Bit 11, the UTF-8 language-encoding flag, is fine either
/// way and isn't part of this mask.
const UNSUPPORTED_GPBF_MASK: u16 = (1 << 0) | (1 << 5) | (1 << 6);

fn u16_le(b: &[u8], off: usize) -> u16 { u16::from_le_bytes([b[off], b[off + 1]]) }
fn u32_le(b: &[u8], off: usize) -> u32 {
	u32::from_le_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}

fn archive_error(op: &'static str, detail: &'static str) -> Error {
	Error::new(OperationKind::Other(op), crate::streams::ErrorKind::Other(detail))
}

struct ZipEntry {
	local_header_offset: u32,
	compressed_size: u32,
	method: u16,
	is_directory: bool,
}

/// A read-only view over a PKZIP archive loaded fully into memory.
pub struct ZipFileSystem {
	archive: Vec<u8>,
	entries: BTreeMap<PathBuf, ZipEntry>,
}

impl ZipFileSystem {
	pub fn open(bytes: Vec<u8>) -> Result<Self> {
		let eocd = find_end_of_central_directory(&bytes)?;
		let entry_count = u16_le(&bytes, eocd + 10) as usize;
		let dir_offset = u32_le(&bytes, eocd + 16) as usize;

		let mut entries = BTreeMap::new();
		let mut cursor = dir_offset;
		for _ in 0..entry_count {
			if cursor + 46 > bytes.len() || u32_le(&bytes, cursor) != CENTRAL_DIR_HEADER_SIG {
				return Err(archive_error("zip directory", "truncated or malformed central directory"));
			}
			let flags = u16_le(&bytes, cursor + 8);
			if flags & UNSUPPORTED_GPBF_MASK != 0 {
				return Err(archive_error("zip directory", "unsupported general-purpose bit flag"));
			}
			let method = u16_le(&bytes, cursor + 10);
			let compressed_size = u32_le(&bytes, cursor + 20);
			let name_len = u16_le(&bytes, cursor + 28) as usize;
			let extra_len = u16_le(&bytes, cursor + 30) as usize;
			let comment_len = u16_le(&bytes, cursor + 32) as usize;
			let local_header_offset = u32_le(&bytes, cursor + 42);
			let name_start = cursor + 46;
			let name = std::str::from_utf8(&bytes[name_start..name_start + name_len])
				.map_err(|_| archive_error("zip directory", "non-UTF-8 entry name"))?;
			let is_directory = name.ends_with('/');
			entries.insert(PathBuf::from(name.trim_end_matches('/')), ZipEntry {
				local_header_offset,
				compressed_size,
				method,
				is_directory,
			});
			cursor = name_start + name_len + extra_len + comment_len;
		}

		Ok(Self { archive: bytes, entries })
	}

	fn entry(&self, path: &Path) -> Result<&ZipEntry> {
		self.entries.get(path).ok_or_else(|| not_found_error("zip lookup"))
	}

	fn entry_bytes(&self, entry: &ZipEntry) -> Result<Vec<u8>> {
		let offset = entry.local_header_offset as usize;
		let header = &self.archive[offset..];
		if header.len() < 30 || u32_le(header, 0) != LOCAL_FILE_HEADER_SIG {
			return Err(archive_error("zip entry", "malformed local file header"));
		}
		let name_len = u16_le(header, 26) as usize;
		let extra_len = u16_le(header, 28) as usize;
		let data_start = offset + 30 + name_len + extra_len;
		let data_end = data_start + entry.compressed_size as usize;
		let compressed = &self.archive[data_start..data_end];

		match entry.method {
			STORED => Ok(compressed.to_vec()),
			DEFLATED => {
				let mut decoder = DeflateDecoder::new(Cursor::new(compressed));
				let mut out = Vec::new();
				decoder.read_to_end(&mut out)
					.map_err(|e| Error::io(OperationKind::Other("zip inflate"), e))?;
				Ok(out)
			}
			_ => Err(archive_error("zip entry", "unsupported compression method")),
		}
	}
}

fn find_end_of_central_directory(bytes: &[u8]) -> Result<usize> {
	if bytes.len() < 22 {
		return Err(archive_error("zip directory", "file too small to be a zip archive"));
	}
	let scan_start = bytes.len().saturating_sub(22 + u16::MAX as usize);
	(scan_start..=bytes.len() - 22)
		.rev()
		.find(|&i| u32_le(bytes, i) == END_OF_CENTRAL_DIR_SIG)
		.ok_or_else(|| archive_error("zip directory", "end-of-central-directory record not found"))
}

impl FileSystem for ZipFileSystem {
	type Source = ReaderSource<Cursor<Vec<u8>>>;
	type Sink = WriterSink<Vec<u8>>;
	type RandomAccess = NoRandomAccess;

	fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
		Ok(PathBuf::from("/").join(path))
	}

	fn metadata(&self, path: &Path) -> Result<Metadata> {
		let entry = self.entry(path)?;
		Ok(Metadata {
			is_file: !entry.is_directory,
			is_directory: entry.is_directory,
			is_symlink: false,
			size: Some(entry.compressed_size as u64),
			modified: None,
		})
	}

	fn list(&self, path: &Path) -> Result<Vec<PathBuf>> {
		if !self.entry(path)?.is_directory {
			return Err(not_found_error("list"));
		}
		Ok(self.entries.keys()
			.filter(|p| p.parent() == Some(path))
			.cloned()
			.collect())
	}

	fn source(&self, path: &Path) -> Result<Self::Source> {
		let entry = self.entry(path)?;
		let bytes = self.entry_bytes(entry)?;
		Ok(ReaderSource(Cursor::new(bytes)))
	}

	fn sink(&self, _path: &Path, _must_create: bool) -> Result<Self::Sink> { Err(read_only_error("sink")) }

	fn append(&self, _path: &Path) -> Result<Self::Sink> { Err(read_only_error("append")) }

	fn open_read_write(&self, _path: &Path, _must_create: bool, _must_exist: bool) -> Result<Self::RandomAccess> {
		Err(read_only_error("open_read_write"))
	}

	fn create_directory(&self, _path: &Path, _must_create: bool) -> Result { Err(read_only_error("create_directory")) }

	fn atomic_move(&self, _from: &Path, _to: &Path) -> Result { Err(read_only_error("atomic_move")) }

	fn delete(&self, _path: &Path, _must_exist: bool) -> Result { Err(read_only_error("delete")) }

	fn create_symlink(&self, _link: &Path, _target: &Path) -> Result { Err(read_only_error("create_symlink")) }
}

#[cfg(test)]
mod test {
	use super::*;

	fn build_archive(name: &str, contents: &[u8]) -> Vec<u8> {
		build_archive_with_flags(name, contents, 0)
	}

	fn build_archive_with_flags(name: &str, contents: &[u8], flags: u16) -> Vec<u8> {
		let mut archive = Vec::new();
		let local_header_offset = 0u32;

		archive.extend_from_slice(&LOCAL_FILE_HEADER_SIG.to_le_bytes());
		archive.extend_from_slice(&[20, 0]); // version needed
		archive.extend_from_slice(&flags.to_le_bytes());
		archive.extend_from_slice(&STORED.to_le_bytes());
		archive.extend_from_slice(&[0, 0, 0, 0]); // mod time/date
		archive.extend_from_slice(&0u32.to_le_bytes()); // crc32 (unchecked by our reader)
		archive.extend_from_slice(&(contents.len() as u32).to_le_bytes()); // compressed size
		archive.extend_from_slice(&(contents.len() as u32).to_le_bytes()); // uncompressed size
		archive.extend_from_slice(&(name.len() as u16).to_le_bytes());
		archive.extend_from_slice(&0u16.to_le_bytes()); // extra len
		archive.extend_from_slice(name.as_bytes());
		archive.extend_from_slice(contents);

		let central_dir_offset = archive.len() as u32;
		archive.extend_from_slice(&CENTRAL_DIR_HEADER_SIG.to_le_bytes());
		archive.extend_from_slice(&[20, 0]); // version made by
		archive.extend_from_slice(&[20, 0]); // version needed
		archive.extend_from_slice(&flags.to_le_bytes());
		archive.extend_from_slice(&STORED.to_le_bytes());
		archive.extend_from_slice(&[0, 0, 0, 0]); // mod time/date
		archive.extend_from_slice(&0u32.to_le_bytes()); // crc32
		archive.extend_from_slice(&(contents.len() as u32).to_le_bytes());
		archive.extend_from_slice(&(contents.len() as u32).to_le_bytes());
		archive.extend_from_slice(&(name.len() as u16).to_le_bytes());
		archive.extend_from_slice(&0u16.to_le_bytes()); // extra len
		archive.extend_from_slice(&0u16.to_le_bytes()); // comment len
		archive.extend_from_slice(&0u16.to_le_bytes()); // disk number start
		archive.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
		archive.extend_from_slice(&0u32.to_le_bytes()); // external attrs
		archive.extend_from_slice(&local_header_offset.to_le_bytes());
		archive.extend_from_slice(name.as_bytes());
		let central_dir_size = archive.len() as u32 - central_dir_offset;

		archive.extend_from_slice(&END_OF_CENTRAL_DIR_SIG.to_le_bytes());
		archive.extend_from_slice(&0u16.to_le_bytes()); // disk number
		archive.extend_from_slice(&0u16.to_le_bytes()); // disk with central dir
		archive.extend_from_slice(&1u16.to_le_bytes()); // entries on this disk
		archive.extend_from_slice(&1u16.to_le_bytes()); // total entries
		archive.extend_from_slice(&central_dir_size.to_le_bytes());
		archive.extend_from_slice(&central_dir_offset.to_le_bytes());
		archive.extend_from_slice(&0u16.to_le_bytes()); // comment len

		archive
	}

	#[test]
	fn reads_stored_entry() {
		let archive = build_archive("hello.txt", b"hello zip");
		let fs = ZipFileSystem::open(archive).unwrap();
		let mut source = fs.source(Path::new("hello.txt")).unwrap();
		let mut out = crate::Buffer::new();
		source.read_all(&mut out).unwrap();
		assert_eq!(out.snapshot(out.len()).as_slice(), b"hello zip");
	}

	#[test]
	fn mutating_calls_are_read_only() {
		let archive = build_archive("a", b"x");
		let fs = ZipFileSystem::open(archive).unwrap();
		assert!(fs.delete(Path::new("a"), true).is_err());
	}

	#[test]
	fn missing_entry_is_not_found() {
		let archive = build_archive("a", b"x");
		let fs = ZipFileSystem::open(archive).unwrap();
		assert!(fs.source(Path::new("missing")).is_err());
	}

	#[test]
	fn rejects_entry_with_unsupported_gpbf_bit() {
		let archive = build_archive_with_flags("secret", b"x", 1 << 0); // encrypted
		assert!(ZipFileSystem::open(archive).is_err());
	}
}
