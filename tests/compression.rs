// SPDX-License-Identifier: Apache-2.0

use std::io::Cursor;
use flate2::Compression;
use cordage::Buffer;
use cordage::compression::{DeflaterSink, GzipSink, GzipSource, InflaterSource};
use cordage::streams::{ReaderSource, Sink, Source, WriterSink};

const TEXT: &[u8] = b"the quick brown fox jumps over the lazy dog, repeated, \
the quick brown fox jumps over the lazy dog, repeated again and again";

#[test]
fn deflate_round_trips() {
	let mut deflated = Vec::new();
	{
		let mut sink = DeflaterSink::new(WriterSink(&mut deflated), Compression::default());
		let mut input = Buffer::new();
		input.write_from_slice(TEXT);
		Sink::write_all(&mut sink, &mut input).unwrap();
		sink.flush().unwrap();
	}
	assert!(!deflated.is_empty());

	let mut inflater = InflaterSource::new(ReaderSource(Cursor::new(deflated)));
	let mut out = Buffer::new();
	Source::read_all(&mut inflater, &mut out).unwrap();
	assert_eq!(out.snapshot(out.len()).as_slice(), TEXT);
}

#[test]
fn gzip_round_trips() {
	let mut gzipped = Vec::new();
	{
		let mut sink = GzipSink::new(WriterSink(&mut gzipped), Compression::best());
		let mut input = Buffer::new();
		input.write_from_slice(TEXT);
		Sink::write_all(&mut sink, &mut input).unwrap();
		sink.flush().unwrap();
	}
	assert_eq!(&gzipped[..2], &[0x1f, 0x8b]);

	let mut source = GzipSource::new(ReaderSource(Cursor::new(gzipped)));
	let mut out = Buffer::new();
	Source::read_all(&mut source, &mut out).unwrap();
	assert_eq!(out.snapshot(out.len()).as_slice(), TEXT);
}

#[test]
fn gzip_rejects_corrupted_trailer() {
	let mut gzipped = Vec::new();
	{
		let mut sink = GzipSink::new(WriterSink(&mut gzipped), Compression::default());
		let mut input = Buffer::new();
		input.write_from_slice(TEXT);
		Sink::write_all(&mut sink, &mut input).unwrap();
		sink.flush().unwrap();
	}
	let last = gzipped.len() - 1;
	gzipped[last] ^= 0xff; // corrupt a byte of the trailer's length field

	let mut source = GzipSource::new(ReaderSource(Cursor::new(gzipped)));
	let mut out = Buffer::new();
	assert!(Source::read_all(&mut source, &mut out).is_err());
}
