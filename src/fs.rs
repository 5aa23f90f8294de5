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

//! A narrow file-system abstraction: a [`FileSystem`] trait mapping paths to
//! [`Source`]/[`Sink`] streams and metadata, with a native OS implementation,
//! a read-only ZIP archive view, and an in-memory fake used by tests.

mod zip;
mod fake;

pub use zip::ZipFileSystem;
pub use fake::FakeFileSystem;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use log::{debug, warn};
use crate::streams::{Error, OperationKind, Result, Seekable};
use crate::streams::{FileSink, FileSource, RandomAccessFile};

/// Metadata for a single file-system entry.
#[derive(Clone, Debug)]
pub struct Metadata {
	pub is_file: bool,
	pub is_directory: bool,
	pub is_symlink: bool,
	pub size: Option<u64>,
	pub modified: Option<SystemTime>,
}

/// Maps paths to streams and directory/metadata operations. Implementations
/// may be read-only (see [`ZipFileSystem`]), in which case mutating calls
/// return a "read-only" error.
pub trait FileSystem {
	type Source: crate::streams::Source;
	type Sink: crate::streams::Sink;
	type RandomAccess: crate::streams::Source + crate::streams::Sink + Seekable;

	/// Resolves `path` to its canonical, absolute form.
	fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

	/// Returns metadata for `path`, erroring if it doesn't exist.
	fn metadata(&self, path: &Path) -> Result<Metadata>;

	/// Returns metadata for `path`, or `None` if it doesn't exist.
	fn metadata_or_null(&self, path: &Path) -> Result<Option<Metadata>> {
		match self.metadata(path) {
			Ok(meta) => Ok(Some(meta)),
			Err(e) if e.kind() == crate::streams::ErrorKind::Other("not found") => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Lists the immediate children of a directory.
	fn list(&self, path: &Path) -> Result<Vec<PathBuf>>;

	/// Lists the immediate children of a directory, or `None` if it doesn't
	/// exist.
	fn list_or_null(&self, path: &Path) -> Result<Option<Vec<PathBuf>>> {
		match self.list(path) {
			Ok(entries) => Ok(Some(entries)),
			Err(e) if e.kind() == crate::streams::ErrorKind::Other("not found") => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Opens `path` for reading.
	fn source(&self, path: &Path) -> Result<Self::Source>;

	/// Opens `path` for writing, truncating any existing content. If
	/// `must_create` is set, fails with an "already exists" error instead of
	/// truncating when `path` already names a file.
	fn sink(&self, path: &Path, must_create: bool) -> Result<Self::Sink>;

	/// Opens `path` for appending.
	fn append(&self, path: &Path) -> Result<Self::Sink>;

	/// Opens `path` for both reading and writing at an independent seek
	/// cursor. `must_create` and `must_exist` are mutually exclusive; when
	/// neither is set, the file is created if missing and opened as-is
	/// otherwise.
	fn open_read_write(&self, path: &Path, must_create: bool, must_exist: bool) -> Result<Self::RandomAccess>;

	/// Creates a directory at `path`, including any missing parents. If
	/// `must_create` is set, fails with an "already exists" error instead of
	/// succeeding as a no-op when `path` already names a directory.
	fn create_directory(&self, path: &Path, must_create: bool) -> Result;

	/// Atomically moves `from` to `to`.
	fn atomic_move(&self, from: &Path, to: &Path) -> Result;

	/// Deletes `path`. If `must_exist` is `false`, a missing `path` is
	/// treated as success rather than a "not found" error.
	fn delete(&self, path: &Path, must_exist: bool) -> Result;

	fn create_symlink(&self, link: &Path, target: &Path) -> Result;
}

fn read_only_error(op: &'static str) -> Error {
	Error::new(OperationKind::Other(op), crate::streams::ErrorKind::Other("file system is read-only"))
}

fn not_found_error(op: &'static str) -> Error {
	Error::new(OperationKind::Other(op), crate::streams::ErrorKind::Other("not found"))
}

fn already_exists_error(op: &'static str) -> Error {
	Error::new(OperationKind::Other(op), crate::streams::ErrorKind::Other("already exists"))
}

/// The native OS file system, backed by `std::fs`.
#[derive(Copy, Clone, Default)]
pub struct SystemFileSystem;

impl FileSystem for SystemFileSystem {
	type Source = FileSource;
	type Sink = FileSink;
	type RandomAccess = RandomAccessFile;

	fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
		fs::canonicalize(path).map_err(|e| Error::io(OperationKind::Other("canonicalize"), e))
	}

	fn metadata(&self, path: &Path) -> Result<Metadata> {
		let meta = fs::symlink_metadata(path)
			.map_err(|e| if e.kind() == std::io::ErrorKind::NotFound {
				not_found_error("metadata")
			} else {
				Error::io(OperationKind::Other("metadata"), e)
			})?;
		Ok(Metadata {
			is_file: meta.is_file(),
			is_directory: meta.is_dir(),
			is_symlink: meta.is_symlink(),
			size: Some(meta.len()),
			modified: meta.modified().ok(),
		})
	}

	fn list(&self, path: &Path) -> Result<Vec<PathBuf>> {
		let entries = fs::read_dir(path)
			.map_err(|e| Error::io(OperationKind::Other("list"), e))?;
		entries
			.map(|e| e.map(|e| e.path()).map_err(|e| Error::io(OperationKind::Other("list"), e)))
			.collect()
	}

	fn source(&self, path: &Path) -> Result<Self::Source> {
		debug!("fs: opening {} for reading", path.display());
		FileSource::open(path).map_err(|e| Error::io(OperationKind::Other("open"), e))
	}

	fn sink(&self, path: &Path, must_create: bool) -> Result<Self::Sink> {
		debug!("fs: opening {} for writing (must_create={must_create})", path.display());
		let mut options = fs::OpenOptions::new();
		options.write(true);
		if must_create {
			options.create_new(true);
		} else {
			options.create(true).truncate(true);
		}
		let file = options.open(path).map_err(|e| match e.kind() {
			std::io::ErrorKind::AlreadyExists => already_exists_error("sink"),
			_ => Error::io(OperationKind::Other("open"), e),
		})?;
		Ok(FileSink::from(file))
	}

	fn append(&self, path: &Path) -> Result<Self::Sink> {
		let file = fs::OpenOptions::new()
			.append(true)
			.create(true)
			.open(path)
			.map_err(|e| Error::io(OperationKind::Other("open"), e))?;
		Ok(FileSink::from(file))
	}

	fn open_read_write(&self, path: &Path, must_create: bool, must_exist: bool) -> Result<Self::RandomAccess> {
		if must_create && must_exist {
			return Err(Error::new(
				OperationKind::Other("open_read_write"),
				crate::streams::ErrorKind::Other("must_create and must_exist are mutually exclusive"),
			));
		}

		let mut options = fs::OpenOptions::new();
		options.read(true).write(true);
		if must_create {
			options.create_new(true);
		} else if !must_exist {
			options.create(true);
		}
		let file = options.open(path).map_err(|e| match e.kind() {
			std::io::ErrorKind::AlreadyExists => already_exists_error("open_read_write"),
			std::io::ErrorKind::NotFound => not_found_error("open_read_write"),
			_ => Error::io(OperationKind::Other("open_read_write"), e),
		})?;
		Ok(RandomAccessFile::new(file))
	}

	fn create_directory(&self, path: &Path, must_create: bool) -> Result {
		if must_create && path.exists() {
			return Err(already_exists_error("create_directory"));
		}
		fs::create_dir_all(path).map_err(|e| Error::io(OperationKind::Other("create_directory"), e))
	}

	fn atomic_move(&self, from: &Path, to: &Path) -> Result {
		fs::rename(from, to).map_err(|e| Error::io(OperationKind::Other("atomic_move"), e))
	}

	fn delete(&self, path: &Path, must_exist: bool) -> Result {
		let meta = match fs::symlink_metadata(path) {
			Ok(meta) => meta,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return if must_exist { Err(not_found_error("delete")) } else { Ok(()) };
			}
			Err(e) => return Err(Error::io(OperationKind::Other("delete"), e)),
		};
		if meta.is_dir() {
			fs::remove_dir(path)
		} else {
			fs::remove_file(path)
		}.map_err(|e| Error::io(OperationKind::Other("delete"), e))
	}

	fn create_symlink(&self, link: &Path, target: &Path) -> Result {
		#[cfg(unix)]
		{
			std::os::unix::fs::symlink(target, link)
				.map_err(|e| Error::io(OperationKind::Other("create_symlink"), e))
		}
		#[cfg(not(unix))]
		{
			warn!("fs: symlinks are not supported on this platform");
			Err(Error::new(OperationKind::Other("create_symlink"), crate::streams::ErrorKind::Other("unsupported on this platform")))
		}
	}
}

pub(crate) type DirTree = BTreeMap<PathBuf, Metadata>;
