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

//! The error taxonomy shared by every fallible operation in the crate: a
//! generic [`Error`] carrying an operation tag and a kind. The streaming
//! layer (see [`crate::streams`]) instantiates this with its own
//! `OperationKind`/`ErrorKind` enums.

use std::error;
use std::fmt::{self, Debug, Display, Formatter};
use amplify_derive::Display;

/// A tag identifying which high-level operation produced an [`Error`].
pub trait Operation: Copy + Debug + Display {
	fn unknown() -> Self;
	fn other(name: &'static str) -> Self;
}

/// A tag identifying why an operation failed.
pub trait Kind: Copy + Debug + Display { }

/// The crate-wide error type, generic over an [`Operation`] tag and an error
/// [`Kind`]. Carries the failed operation, the kind of failure, and an
/// optional boxed source error for context.
pub struct Error<O: Operation, K: Kind> {
	op: O,
	kind: K,
	source: Option<Box<dyn error::Error + Send + Sync>>,
}

impl<O: Operation, K: Kind> Error<O, K> {
	pub fn new(op: O, kind: K) -> Self {
		Self { op, kind, source: None }
	}

	pub fn with_source(
		op: O,
		kind: K,
		source: impl error::Error + Send + Sync + 'static,
	) -> Self {
		Self { op, kind, source: Some(Box::new(source)) }
	}

	/// Returns this error re-tagged with a different operation, used when an
	/// inner call's error is propagated through an outer one.
	pub fn with_operation(mut self, op: O) -> Self {
		self.op = op;
		self
	}

	pub fn operation(&self) -> O { self.op }

	pub fn kind(&self) -> K { self.kind }
}

impl<O: Operation, K: Kind + 'static> Error<O, K> {
	/// Converts into a [`std::io::Error`], preserving this error as its source.
	pub fn into_io(self) -> std::io::Error {
		std::io::Error::new(std::io::ErrorKind::Other, self)
	}
}

impl<O: Operation, K: Kind> Debug for Error<O, K> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Error")
			.field("op", &self.op)
			.field("kind", &self.kind)
			.field("source", &self.source.is_some())
			.finish()
	}
}

impl<O: Operation, K: Kind> Display for Error<O, K> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{} failed: {}", self.op, self.kind)
	}
}

impl<O: Operation + 'static, K: Kind + 'static> error::Error for Error<O, K> {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		self.source.as_deref().map(|e| e as &(dyn error::Error + 'static))
	}
}
