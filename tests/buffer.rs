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

#[macro_use]
mod common;

use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use cordage::Buffer;

macro_rules! round_trip_tests {
	($($test:ident $write:ident $read:ident: $ty:ty)+) => {
		$(
		#[quickcheck]
		fn $test(value: $ty) -> TestResult {
			let mut buf = Buffer::new();
			buf.$write(value).unwrap();
			let read = buf.$read().unwrap();
			qc_assert_eq!(value, read)
		}
		)+
	};
}

round_trip_tests! {
	byte write_u8 read_u8: u8
	s_byte write_i8 read_i8: i8
	short write_u16 read_u16: u16
	s_short write_i16 read_i16: i16
	int write_u32 read_u32: u32
	s_int write_i32 read_i32: i32
	long write_u64 read_u64: u64
	s_long write_i64 read_i64: i64
	size write_usize read_usize: usize
}

#[quickcheck]
fn str(value: String) -> TestResult {
	let mut buf = Buffer::new();
	buf.write_utf8(&value);
	let mut out = String::new();
	buf.read_utf8(&mut out, value.len()).unwrap();
	qc_assert_eq!(value, out)
}

#[quickcheck]
fn decimal_round_trips(value: i64) -> TestResult {
	let mut buf = Buffer::new();
	buf.write_decimal_long(value).unwrap();
	let read = buf.read_decimal_long().unwrap();
	qc_assert_eq!(value, read)
}

#[quickcheck]
fn hex_round_trips(value: u64) -> TestResult {
	let mut buf = Buffer::new();
	buf.write_hex_unsigned_long(value).unwrap();
	let read = buf.read_hex_unsigned_long().unwrap();
	qc_assert_eq!(value, read)
}

#[test]
fn size_tracks_contents() {
	let mut buf = Buffer::new();
	assert_eq!(buf.len(), 0);
	assert!(buf.is_empty());
	buf.write_from_slice(b"some bytes");
	assert_eq!(buf.len(), 10);
	buf.skip(4);
	assert_eq!(buf.len(), 6);
}
