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

//! The segment pool: a bounded, thread-local free list that buffers claim
//! segments from and recycle them back into.
//!
//! Segments are backed by `Rc`-shared memory (see [`crate::segment`]), so a
//! pool cannot be shared across threads the way a `Mutex`-guarded one could;
//! each thread keeps its own bounded pool instead, claiming fresh segments
//! when its pool runs dry and dropping the excess past [`MAX_SEGMENTS`]
//! instead of growing without bound.

use std::cell::RefCell;
use crate::segment::{Segment, SIZE};

/// The maximum number of segments a single pool shard keeps on hand, chosen
/// so a fully-stocked pool holds at most `64 * SIZE` bytes.
pub const MAX_SEGMENTS: usize = 64;

/// A source and sink of recycled [`Segment`]s.
pub trait Pool {
	/// Claims a single segment, allocating a fresh one if the pool is empty.
	fn claim_one(&self) -> Segment;

	/// Claims segments totalling at least `min_size` bytes, appending them to
	/// `segments`.
	fn claim_size(&self, segments: &mut Vec<Segment>, min_size: usize) {
		let count = min_size / SIZE + usize::from(min_size % SIZE > 0);
		segments.extend((0..count).map(|_| self.claim_one()));
	}

	/// Recycles a single segment back into the pool, dropping it if the pool
	/// is already at capacity.
	fn recycle_one(&self, segment: Segment);

	/// Recycles many segments back into the pool.
	fn recycle(&self, segments: impl IntoIterator<Item = Segment>) {
		for seg in segments {
			self.recycle_one(seg);
		}
	}
}

thread_local! {
	static LOCAL_POOL: RefCell<Vec<Segment>> = const { RefCell::new(Vec::new()) };
}

/// The default pool, backed by a thread-local free list. Cheap to construct;
/// all handles for a given thread share the same underlying storage.
#[derive(Copy, Clone, Default)]
pub struct LocalPool;

impl LocalPool {
	pub fn get() -> Self { Self }
}

impl Pool for LocalPool {
	fn claim_one(&self) -> Segment {
		LOCAL_POOL.with_borrow_mut(|free| free.pop().unwrap_or_default())
	}

	fn recycle_one(&self, mut segment: Segment) {
		LOCAL_POOL.with_borrow_mut(|free| {
			if free.len() >= MAX_SEGMENTS {
				return;
			}
			if segment.is_shared() {
				// Don't fork memory we're about to hand back shared; the next
				// writer forks it lazily instead.
				segment.reset_view();
			} else {
				segment.clear();
			}
			free.push(segment);
		});
	}
}

pub type DefaultPool = LocalPool;

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn claim_reuses_recycled_segments() {
		let pool = LocalPool::get();
		let mut seg = pool.claim_one();
		seg.push_slice(b"data");
		pool.recycle_one(seg);

		let reused = pool.claim_one();
		assert!(reused.is_empty(), "recycled segments are cleared before reuse");
	}

	#[test]
	fn recycling_a_shared_segment_does_not_fork() {
		let pool = LocalPool::get();
		let mut seg = pool.claim_one();
		seg.push_slice(b"data");
		let shared = seg.share_all();
		assert!(seg.is_shared());

		pool.recycle_one(seg);
		// The recycled wrapper still shares memory with `shared`; it wasn't
		// forked just to be cleared and possibly dropped.
		let reused = pool.claim_one();
		assert!(reused.is_empty());
		assert_eq!(&*shared.data(), b"data");
	}

	#[test]
	fn pool_is_bounded() {
		let pool = LocalPool::get();
		let segments: Vec<_> = (0..MAX_SEGMENTS + 8).map(|_| pool.claim_one()).collect();
		pool.recycle(segments);
		// Draining back out must not yield more than the cap kept any.
		let mut reclaimed = 0;
		while LOCAL_POOL.with_borrow_mut(|free| free.pop()).is_some() {
			reclaimed += 1;
		}
		assert!(reclaimed <= MAX_SEGMENTS);
	}
}
