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

//! An in-memory [`FileSystem`], used by tests that need file-system
//! semantics without touching disk.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use crate::fs::{already_exists_error, not_found_error, FileSystem, Metadata};
use crate::streams::{ReaderSource, SeekOffset, Seekable, Sink, Source, WriterSink};
use crate::streams::Result;
use crate::Buffer;

#[derive(Clone, Default)]
struct Entry {
	contents: Rc<RefCell<Vec<u8>>>,
	is_directory: bool,
	symlink_target: Option<PathBuf>,
}

/// An in-memory tree of files, directories, and symlinks implementing the
/// full [`FileSystem`] read/write surface, for use in tests.
#[derive(Default)]
pub struct FakeFileSystem {
	entries: RefCell<BTreeMap<PathBuf, Entry>>,
}

impl FakeFileSystem {
	pub fn new() -> Self { Self::default() }
}

/// A [`Write`] handle appending directly into a fake file's shared buffer.
struct AppendingWriter(Rc<RefCell<Vec<u8>>>);

impl Write for AppendingWriter {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		self.0.borrow_mut().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
}

/// A random-access handle into a fake file's shared buffer.
pub struct FakeRandomAccess {
	contents: Rc<RefCell<Vec<u8>>>,
	pos: usize,
}

impl Source for FakeRandomAccess {
	fn read(&mut self, sink: &mut Buffer, count: usize) -> Result<usize> {
		let data = self.contents.borrow();
		let available = data.len().saturating_sub(self.pos);
		let n = count.min(available);
		sink.write_from_slice(&data[self.pos..self.pos + n]);
		self.pos += n;
		Ok(n)
	}
}

impl Sink for FakeRandomAccess {
	fn write(&mut self, source: &mut Buffer, count: usize) -> Result<usize> {
		let n = count.min(source.len());
		let bytes = source.snapshot(n);
		let mut data = self.contents.borrow_mut();
		if self.pos + n > data.len() {
			data.resize(self.pos + n, 0);
		}
		data[self.pos..self.pos + n].copy_from_slice(bytes.as_slice());
		drop(data);
		source.skip(n);
		self.pos += n;
		Ok(n)
	}

	fn flush(&mut self) -> Result { Ok(()) }
}

impl Seekable for FakeRandomAccess {
	fn seek(&mut self, offset: SeekOffset) -> Result<usize> {
		let len = self.contents.borrow().len();
		self.pos = offset.to_pos(self.pos, len);
		Ok(self.pos)
	}
}

impl FileSystem for FakeFileSystem {
	type Source = ReaderSource<Cursor<Vec<u8>>>;
	type Sink = WriterSink<AppendingWriter>;
	type RandomAccess = FakeRandomAccess;

	fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
		Ok(path.to_path_buf())
	}

	fn metadata(&self, path: &Path) -> Result<Metadata> {
		let entries = self.entries.borrow();
		let entry = entries.get(path).ok_or_else(|| not_found_error("metadata"))?;
		Ok(Metadata {
			is_file: !entry.is_directory && entry.symlink_target.is_none(),
			is_directory: entry.is_directory,
			is_symlink: entry.symlink_target.is_some(),
			size: Some(entry.contents.borrow().len() as u64),
			modified: None,
		})
	}

	fn list(&self, path: &Path) -> Result<Vec<PathBuf>> {
		let entries = self.entries.borrow();
		if !entries.get(path).is_some_and(|e| e.is_directory) {
			return Err(not_found_error("list"));
		}
		Ok(entries.keys()
			.filter(|p| p.parent() == Some(path))
			.cloned()
			.collect())
	}

	fn source(&self, path: &Path) -> Result<Self::Source> {
		let entries = self.entries.borrow();
		let entry = entries.get(path).ok_or_else(|| not_found_error("source"))?;
		let bytes = entry.contents.borrow().clone();
		Ok(ReaderSource(Cursor::new(bytes)))
	}

	fn sink(&self, path: &Path, must_create: bool) -> Result<Self::Sink> {
		let mut entries = self.entries.borrow_mut();
		if must_create && entries.contains_key(path) {
			return Err(already_exists_error("sink"));
		}
		let entry = entries.entry(path.to_path_buf()).or_default();
		entry.contents.borrow_mut().clear();
		Ok(WriterSink(AppendingWriter(entry.contents.clone())))
	}

	fn append(&self, path: &Path) -> Result<Self::Sink> {
		let mut entries = self.entries.borrow_mut();
		let entry = entries.entry(path.to_path_buf()).or_default();
		Ok(WriterSink(AppendingWriter(entry.contents.clone())))
	}

	fn open_read_write(&self, path: &Path, must_create: bool, must_exist: bool) -> Result<Self::RandomAccess> {
		let mut entries = self.entries.borrow_mut();
		let exists = entries.contains_key(path);
		if must_create && exists {
			return Err(already_exists_error("open_read_write"));
		}
		if must_exist && !exists {
			return Err(not_found_error("open_read_write"));
		}
		let entry = entries.entry(path.to_path_buf()).or_default();
		Ok(FakeRandomAccess { contents: entry.contents.clone(), pos: 0 })
	}

	fn create_directory(&self, path: &Path, must_create: bool) -> Result {
		let mut entries = self.entries.borrow_mut();
		if must_create && entries.contains_key(path) {
			return Err(already_exists_error("create_directory"));
		}
		entries.entry(path.to_path_buf()).or_insert_with(|| Entry {
			is_directory: true,
			..Entry::default()
		}).is_directory = true;
		Ok(())
	}

	fn atomic_move(&self, from: &Path, to: &Path) -> Result {
		let mut entries = self.entries.borrow_mut();
		let entry = entries.remove(from).ok_or_else(|| not_found_error("atomic_move"))?;
		entries.insert(to.to_path_buf(), entry);
		Ok(())
	}

	fn delete(&self, path: &Path, must_exist: bool) -> Result {
		match self.entries.borrow_mut().remove(path) {
			Some(_) => Ok(()),
			None if must_exist => Err(not_found_error("delete")),
			None => Ok(()),
		}
	}

	fn create_symlink(&self, link: &Path, target: &Path) -> Result {
		self.entries.borrow_mut().insert(link.to_path_buf(), Entry {
			symlink_target: Some(target.to_path_buf()),
			..Entry::default()
		});
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn write_then_read_round_trips() {
		let fs = FakeFileSystem::new();
		let path = Path::new("/greeting.txt");
		let mut sink = fs.sink(path, false).unwrap();
		let mut src = Buffer::new();
		src.write_from_slice(b"hello fake fs");
		sink.write_all(&mut src).unwrap();

		let mut source = fs.source(path).unwrap();
		let mut out = Buffer::new();
		source.read_all(&mut out).unwrap();
		assert_eq!(out.snapshot(out.len()).as_slice(), b"hello fake fs");
	}

	#[test]
	fn missing_file_reports_not_found() {
		let fs = FakeFileSystem::new();
		assert!(fs.source(Path::new("/nope")).is_err());
	}

	#[test]
	fn directory_lists_children() {
		let fs = FakeFileSystem::new();
		fs.create_directory(Path::new("/dir"), false).unwrap();
		fs.sink(Path::new("/dir/a"), false).unwrap();
		fs.sink(Path::new("/dir/b"), false).unwrap();
		let mut children = fs.list(Path::new("/dir")).unwrap();
		children.sort();
		assert_eq!(children, vec![PathBuf::from("/dir/a"), PathBuf::from("/dir/b")]);
	}

	#[test]
	fn must_create_rejects_existing_entries() {
		let fs = FakeFileSystem::new();
		fs.create_directory(Path::new("/dir"), false).unwrap();
		assert!(fs.create_directory(Path::new("/dir"), true).is_err());

		fs.sink(Path::new("/dir/a"), false).unwrap();
		assert!(fs.sink(Path::new("/dir/a"), true).is_err());
	}

	#[test]
	fn must_exist_governs_delete_as_no_op() {
		let fs = FakeFileSystem::new();
		assert!(fs.delete(Path::new("/nope"), true).is_err());
		assert!(fs.delete(Path::new("/nope"), false).is_ok());
	}

	#[test]
	fn open_read_write_seeks_and_overwrites_in_place() {
		let fs = FakeFileSystem::new();
		let path = Path::new("/data.bin");
		assert!(fs.open_read_write(path, false, true).is_err(), "must_exist on a missing file fails");

		let mut handle = fs.open_read_write(path, false, false).unwrap();
		let mut input = Buffer::new();
		input.write_from_slice(b"hello world");
		handle.write_all(&mut input).unwrap();

		handle.seek(SeekOffset::FromStart(6)).unwrap();
		let mut patch = Buffer::new();
		patch.write_from_slice(b"RUST!");
		handle.write_all(&mut patch).unwrap();

		let mut out = Buffer::new();
		fs.source(path).unwrap().read_all(&mut out).unwrap();
		assert_eq!(out.snapshot(out.len()).as_slice(), b"hello RUST!");

		assert!(fs.open_read_write(path, true, false).is_err(), "must_create on an existing file fails");
	}
}
