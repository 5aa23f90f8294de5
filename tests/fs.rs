// SPDX-License-Identifier: Apache-2.0

use std::io::Write as _;
use std::path::Path;
use pretty_assertions::assert_eq;
use cordage::fs::{FakeFileSystem, FileSystem, SystemFileSystem};
use cordage::streams::{SeekOffset, Seekable, Sink, Source};
use cordage::Buffer;

#[test]
fn system_file_system_round_trips_through_tempfile() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("greeting.txt");
	std::fs::File::create(&path).unwrap().write_all(b"hello disk").unwrap();

	let fs = SystemFileSystem;
	let meta = fs.metadata(&path).unwrap();
	assert!(meta.is_file);
	assert_eq!(meta.size, Some(10));

	let mut source = fs.source(&path).unwrap();
	let mut out = Buffer::new();
	Source::read_all(&mut source, &mut out).unwrap();
	assert_eq!(out.snapshot(out.len()).as_slice(), b"hello disk");
}

#[test]
fn system_file_system_reports_missing_files() {
	let fs = SystemFileSystem;
	assert!(fs.metadata(Path::new("/no/such/path/should/exist")).is_err());
}

#[test]
fn system_file_system_honors_must_create_and_must_exist() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("report.txt");
	let fs = SystemFileSystem;

	fs.sink(&path, true).unwrap();
	assert!(fs.sink(&path, true).is_err(), "must_create fails once the file exists");
	fs.sink(&path, false).unwrap(); // truncates without complaint

	assert!(fs.open_read_write(&path, false, false).is_ok());
	assert!(fs.open_read_write(dir.path().join("missing.txt").as_path(), false, true).is_err());
	assert!(fs.open_read_write(&path, true, false).is_err(), "must_create fails once the file exists");

	assert!(fs.delete(dir.path().join("missing.txt").as_path(), true).is_err());
	fs.delete(dir.path().join("missing.txt").as_path(), false).unwrap();
	fs.delete(&path, true).unwrap();
}

#[test]
fn fake_file_system_supports_full_read_write_surface() {
	let fs = FakeFileSystem::new();
	fs.create_directory(Path::new("/docs"), false).unwrap();

	let mut sink = fs.sink(Path::new("/docs/a.txt"), false).unwrap();
	let mut input = Buffer::new();
	input.write_from_slice(b"first");
	Sink::write_all(&mut sink, &mut input).unwrap();

	let mut append = fs.append(Path::new("/docs/a.txt")).unwrap();
	let mut more = Buffer::new();
	more.write_from_slice(b" second");
	Sink::write_all(&mut append, &mut more).unwrap();

	let mut source = fs.source(Path::new("/docs/a.txt")).unwrap();
	let mut out = Buffer::new();
	Source::read_all(&mut source, &mut out).unwrap();
	assert_eq!(out.snapshot(out.len()).as_slice(), b"first second");

	fs.atomic_move(Path::new("/docs/a.txt"), Path::new("/docs/b.txt")).unwrap();
	assert!(fs.metadata(Path::new("/docs/a.txt")).is_err());
	assert!(fs.metadata(Path::new("/docs/b.txt")).is_ok());
}

#[test]
fn fake_file_system_open_read_write_overwrites_a_byte_range() {
	let fs = FakeFileSystem::new();
	let path = Path::new("/count.txt");

	let mut handle = fs.open_read_write(path, true, false).unwrap();
	let mut input = Buffer::new();
	input.write_from_slice(b"0123456789");
	handle.write_all(&mut input).unwrap();
	handle.seek(SeekOffset::FromStart(3)).unwrap();
	let mut patch = Buffer::new();
	patch.write_from_slice(b"XYZ");
	handle.write_all(&mut patch).unwrap();

	let mut out = Buffer::new();
	fs.source(path).unwrap().read_all(&mut out).unwrap();
	assert_eq!(out.snapshot(out.len()).as_slice(), b"012XYZ6789");
}
