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

//! Deadlines for blocking stream operations. Checked before each
//! segment-sized refill or flush and before entering an underlying blocking
//! call, so a timeout never fires mid-syscall, only at the boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::streams::{Error, ErrorKind, OperationKind, Result};

/// A deadline composed of an optional absolute instant and an optional
/// relative idle duration, plus a shared cancellation flag.
#[derive(Clone)]
pub struct Timeout {
	deadline: Option<Instant>,
	idle: Option<Duration>,
	cancelled: Arc<AtomicBool>,
}

impl Timeout {
	/// Returns a timeout that never expires.
	pub fn none() -> Self {
		Self { deadline: None, idle: None, cancelled: Arc::new(AtomicBool::new(false)) }
	}

	/// Returns a timeout expiring after `duration` of idle time from now,
	/// reset on every successful check.
	pub fn idle(duration: Duration) -> Self {
		Self { idle: Some(duration), ..Self::none() }
	}

	/// Returns a timeout expiring at a fixed deadline `duration` from now.
	pub fn deadline(duration: Duration) -> Self {
		Self { deadline: Some(Instant::now() + duration), ..Self::none() }
	}

	/// Returns the tighter of `self` and `other`: the earlier absolute
	/// deadline, and the shorter idle duration. Used to intersect a nested
	/// operation's timeout with an ambient one.
	pub fn intersect(&self, other: &Timeout) -> Timeout {
		let deadline = match (self.deadline, other.deadline) {
			(Some(a), Some(b)) => Some(a.min(b)),
			(a, b) => a.or(b),
		};
		let idle = match (self.idle, other.idle) {
			(Some(a), Some(b)) => Some(a.min(b)),
			(a, b) => a.or(b),
		};
		Timeout { deadline, idle, cancelled: self.cancelled.clone() }
	}

	/// A handle that, when dropped is not enough: call [`Cancel::cancel`]
	/// explicitly to fail the next check.
	pub fn cancel_handle(&self) -> Cancel {
		Cancel { cancelled: self.cancelled.clone() }
	}

	/// Checks whether this timeout has expired or been cancelled, relative
	/// to `last_activity` (for idle timeouts).
	pub fn check(&self, last_activity: Instant) -> Result {
		if self.cancelled.load(Ordering::Acquire) {
			return Err(Error::new(OperationKind::Unknown, ErrorKind::Cancelled));
		}
		let now = Instant::now();
		if let Some(deadline) = self.deadline {
			if now >= deadline {
				return Err(Error::new(OperationKind::Unknown, ErrorKind::TimedOut));
			}
		}
		if let Some(idle) = self.idle {
			if now.duration_since(last_activity) >= idle {
				return Err(Error::new(OperationKind::Unknown, ErrorKind::TimedOut));
			}
		}
		Ok(())
	}

	pub fn is_none(&self) -> bool { self.deadline.is_none() && self.idle.is_none() }
}

impl Default for Timeout {
	fn default() -> Self { Self::none() }
}

/// A handle that cancels its originating [`Timeout`] on the next check.
#[derive(Clone)]
pub struct Cancel {
	cancelled: Arc<AtomicBool>,
}

impl Cancel {
	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::Release);
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::thread::sleep;

	#[test]
	fn deadline_expires() {
		let timeout = Timeout::deadline(Duration::from_millis(1));
		sleep(Duration::from_millis(5));
		assert!(timeout.check(Instant::now()).is_err());
	}

	#[test]
	fn cancel_fails_next_check() {
		let timeout = Timeout::idle(Duration::from_secs(60));
		let cancel = timeout.cancel_handle();
		assert!(timeout.check(Instant::now()).is_ok());
		cancel.cancel();
		assert!(timeout.check(Instant::now()).is_err());
	}

	#[test]
	fn intersect_picks_tighter_bound() {
		let a = Timeout::idle(Duration::from_secs(10));
		let b = Timeout::idle(Duration::from_secs(1));
		let tighter = a.intersect(&b);
		assert_eq!(tighter.idle, Some(Duration::from_secs(1)));
	}
}
