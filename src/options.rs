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

//! [`Options`]: a precomputed set of byte-string needles arranged as a trie,
//! letting a single buffered scan find the longest matching needle instead of
//! trying each one in turn.

use crate::{Buffer, ByteString};

#[derive(Default)]
struct Node {
	children: Vec<(u8, usize)>,
	/// Index into the original (caller-supplied) option list, if a needle
	/// ends here.
	terminal: Option<usize>,
}

impl Node {
	fn child(&self, byte: u8) -> Option<usize> {
		self.children.binary_search_by_key(&byte, |&(b, _)| b)
			.ok()
			.map(|i| self.children[i].1)
	}

	fn child_or_insert(&mut self, byte: u8, nodes: &mut Vec<Node>) -> usize {
		match self.children.binary_search_by_key(&byte, |&(b, _)| b) {
			Ok(i) => self.children[i].1,
			Err(i) => {
				let idx = nodes.len();
				nodes.push(Node::default());
				self.children.insert(i, (byte, idx));
				idx
			}
		}
	}
}

/// A set of byte-string options, precomputed into a trie for a single
/// longest-prefix-match scan over buffered bytes.
pub struct Options {
	nodes: Vec<Node>,
}

impl Options {
	/// Builds a trie from `needles`. Later duplicates of an identical needle
	/// are ignored; the first occurrence's index wins, matching the order
	/// the caller supplied them in.
	pub fn new(needles: &[ByteString]) -> Self {
		let mut nodes = vec![Node::default()];
		for (i, needle) in needles.iter().enumerate() {
			let mut cur = 0;
			for &byte in needle.as_slice() {
				cur = nodes[cur].child_or_insert(byte, &mut nodes);
			}
			if nodes[cur].terminal.is_none() {
				nodes[cur].terminal = Some(i);
			}
		}
		Self { nodes }
	}

	/// Finds the longest option matching the head of `buf`'s buffered bytes,
	/// consuming it and returning its original index. Returns `None`, with
	/// nothing consumed, if no option matches.
	pub fn select(&self, buf: &mut Buffer) -> Option<usize> {
		let mut cur = 0;
		let mut offset = 0;
		let mut best: Option<(usize, usize)> = None; // (option index, byte length)
		loop {
			if let Some(i) = self.nodes[cur].terminal {
				best = Some((i, offset));
			}
			let Some(byte) = buf.byte_at(offset) else { break };
			let Some(next) = self.nodes[cur].child(byte) else { break };
			cur = next;
			offset += 1;
		}
		let (index, len) = best?;
		buf.skip(len);
		Some(index)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn opts(strs: &[&str]) -> (Options, Vec<ByteString>) {
		let needles: Vec<ByteString> = strs.iter().map(|s| ByteString::from(s.as_bytes())).collect();
		(Options::new(&needles), needles)
	}

	#[test]
	fn selects_longest_match() {
		let (options, _) = opts(&["a", "ab", "abc"]);
		let mut buf = Buffer::new();
        buf.write_from_slice(b"abcd");
		assert_eq!(options.select(&mut buf), Some(2));
		assert_eq!(buf.len(), 1);
	}

	#[test]
	fn no_match_consumes_nothing() {
		let (options, _) = opts(&["xyz"]);
		let mut buf = Buffer::new();
		buf.write_from_slice(b"abcd");
		assert_eq!(options.select(&mut buf), None);
		assert_eq!(buf.len(), 4);
	}
}
