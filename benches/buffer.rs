// SPDX-License-Identifier: Apache-2.0

use std::mem;
use criterion::{BatchSize, Bencher, black_box, Criterion, criterion_group, criterion_main};
use cordage::Buffer;

const DATA: &[u8] = include_bytes!("buffer.rs");
const SIZE: usize = cordage::SEGMENT_SIZE;

fn write_slice(c: &mut Criterion) {
	c.bench_function("write_slice", |b| b.iter(|| {
		let mut buf = Buffer::new();
		buf.write_from_slice(DATA);
		buf
	}));
}

fn write_numbers(c: &mut Criterion) {
	let mut group = c.benchmark_group("write_numbers");
	let mut buffer = Buffer::new();

	macro_rules! gen {
		($($fn:ident $ty:ident),+) => {
			$(
			group.bench_function(stringify!($fn), |b| b.iter(|| {
				for _ in 0..SIZE / mem::size_of::<$ty>() {
					let _ = black_box(buffer.$fn($ty::MAX));
				}
				buffer.clear();
			}));
			)+
		};
	}

	gen!(
		write_u8 u8,
		write_u16 u16,
		write_u16_le u16,
		write_u32 u32,
		write_u32_le u32,
		write_u64 u64,
		write_u64_le u64
	);
}

#[inline(always)]
fn read_loop<R>(b: &mut Bencher, buf: &Buffer, read: impl FnMut(&mut Buffer) -> R) {
	b.iter_batched_ref(|| buf.clone(), read, BatchSize::SmallInput)
}

fn read_byte_str(c: &mut Criterion) {
	let mut buffer = Buffer::new();
	buffer.write_from_slice(DATA);
	c.bench_function("read_byte_str", |b|
		read_loop(b, &buffer, |buf| buf.read_byte_str(DATA.len()))
	);
}

fn read_numbers(c: &mut Criterion) {
	let mut group = c.benchmark_group("read_numbers");
	let mut buffer = Buffer::new();
	for _ in 0..SIZE / 8 {
		let _ = buffer.write_u64(u64::MAX);
	}

	macro_rules! gen {
		($($fn:ident $ty:ident),+) => {
			$(
			group.bench_function(stringify!($fn), |b|
				read_loop(b, &buffer, |buf|
					for _ in 0..SIZE / mem::size_of::<$ty>() {
						let _ = black_box(buf.$fn());
					}
				)
			);
			)+
		};
	}

	gen!(
		read_u8 u8,
		read_u16 u16,
		read_u16_le u16,
		read_u32 u32,
		read_u32_le u32,
		read_u64 u64,
		read_u64_le u64
	);
}

fn skip(c: &mut Criterion) {
	let mut group = c.benchmark_group("skip");
	let mut buffer = Buffer::new();
	buffer.write_from_slice(DATA);

	group.bench_function("skip all", |b|
		read_loop(b, &buffer, |buf| buf.skip(DATA.len()))
	);
	group.bench_function("skip partial", |b|
		read_loop(b, &buffer, |buf| buf.skip(DATA.len() / 2))
	);
	group.finish();
}

fn index_of(c: &mut Criterion) {
	let mut buffer = Buffer::new();
	buffer.write_from_slice(DATA);
	c.bench_function("index_of byte", |b| b.iter(|| buffer.index_of(black_box(b";"), 0)));
	c.bench_function("index_of needle", |b| b.iter(|| buffer.index_of(black_box(b"fn "), 0)));
}

fn hash(c: &mut Criterion) {
	let mut buffer = Buffer::new();
	buffer.write_from_slice(DATA);
	let snapshot = buffer.snapshot(buffer.len());
	c.bench_function("hash", |b| b.iter(|| snapshot.sha256()));
}

criterion_group!(write, write_slice, write_numbers);
criterion_group!(read, read_byte_str, read_numbers, skip, index_of, hash);
criterion_main!(write, read);
