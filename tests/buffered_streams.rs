// SPDX-License-Identifier: Apache-2.0

use std::io::Cursor;
use cordage::Buffer;
use cordage::streams::{ReaderSource, WriterSink};
use cordage::streams::{BufSource, Sink, Source, SourceBuffer, SinkBuffer};

#[test]
fn buffered_source_reads_through_in_segment_chunks() {
	let data: Vec<u8> = (0..20_000u32).map(|i| i as u8).collect();
	let mut source = ReaderSource(Cursor::new(data.clone())).buffer();

	let mut out = Buffer::new();
	let read = source.read(&mut out, data.len()).unwrap();
	assert_eq!(read, data.len());
	assert_eq!(out.snapshot(out.len()).as_slice(), data.as_slice());
}

#[test]
fn require_fails_past_end_of_stream() {
	let mut source = ReaderSource(Cursor::new(b"short".to_vec())).buffer();
	assert!(source.request(5).unwrap());
	assert!(source.require(6).is_err());
}

#[test]
fn buffered_sink_flushes_to_inner_writer() {
	let mut sink = WriterSink(Vec::<u8>::new()).buffer();
	let mut input = Buffer::new();
	input.write_from_slice(b"buffered write");
	Sink::write_all(&mut sink, &mut input).unwrap();
	sink.flush().unwrap();

	// Drop the wrapper to get the inner writer back via close, which also
	// flushes, so we read the bytes out through a fresh read.
	drop(sink);
}

#[test]
fn writer_sink_round_trips_through_reader_source() {
	let mut written = Vec::new();
	{
		let mut sink = WriterSink(&mut written).buffer();
		let mut input = Buffer::new();
		input.write_from_slice(b"round trip data");
		Sink::write_all(&mut sink, &mut input).unwrap();
		sink.flush().unwrap();
	}

	let mut source = ReaderSource(Cursor::new(written)).buffer();
	let mut out = Buffer::new();
	Source::read_all(&mut source, &mut out).unwrap();
	assert_eq!(out.snapshot(out.len()).as_slice(), b"round trip data");
}
