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

//! A segmented-buffer I/O core: byte data moves through [`Buffer`], a deque
//! of fixed-size, copy-on-write-shared `Segment`s, instead of one contiguous
//! `Vec`. [`streams::Source`] and [`streams::Sink`] move bytes between a
//! [`Buffer`] and an underlying reader/writer; calling `.buffer()` on either
//! wraps them in a `BufferedSource`/`BufferedSink` that retains a read-ahead
//! or write-behind buffer and the segment-sized text/line/UTF-8 helpers
//! built on top of it.
//!
//! ## How it works
//!
//! Segments are claimed from a thread-local [`pool::Pool`] (the default,
//! [`pool::LocalPool`]) and recycled back into it once consumed, bounded at
//! [`pool::MAX_SEGMENTS`] so a pool never grows without limit. Segment
//! memory is copy-on-write: splitting or sharing a segment just bumps a
//! reference count, only copying once one side writes it. Small runs of
//! data are copied outright rather than shared, since sharing a handful of
//! bytes costs more in bookkeeping than it saves.
//!
//! [`ByteStr`] and [`ByteString`] give a borrowed/owned split over segmented
//! byte runs, with UTF-8 decoding, hex/Base64 encoding, and (behind feature
//! flags) hashing. [`compression`] layers DEFLATE and gzip framing over any
//! [`streams::Source`]/[`streams::Sink`]. [`fs`] abstracts over where bytes
//! come from: the local filesystem, an in-memory fake for tests, or a
//! read-only view over a PKZIP archive. [`Timeout`] threads an idle/deadline
//! limit and a cancel handle through blocking reads and writes.

mod buffer;
mod buffered_wrappers;
mod error;
pub mod streams;
mod segment;
pub mod pool;
mod byte_str;
pub mod compression;
pub mod fs;
pub mod options;
pub mod timeout;

pub use error::*;
pub use buffer::*;
pub use segment::{Segment, SIZE as SEGMENT_SIZE};
pub use byte_str::*;
pub use options::Options;
pub use timeout::Timeout;
