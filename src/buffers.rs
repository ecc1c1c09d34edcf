//! Reusable buffer data structures for the chain's inner loops.
//!
//! Buffers are lightweight containers that avoid reallocation across
//! recombination steps. Fields are mutated directly by the step machinery,
//! and invariants are not strictly enforced.
use crate::graph::Graph;
use rand::rngs::SmallRng;
use rand::Rng;
use std::collections::VecDeque;
use std::num::Wrapping;

/// A reusable buffer for subgraphs of a [Graph] (the "parent graph").
pub struct SubgraphBuffer {
    /// The nodes in the subgraph (parent-graph node IDs).
    pub raw_nodes: Vec<usize>,
    /// A mapping between node IDs in the parent graph and the indices
    /// of `raw_nodes` (which are node IDs in `graph`). If a node
    /// does not appear in the subgraph, its index is -1.
    pub node_to_idx: Vec<i64>,
    /// A subgraph of the parent graph, with nodes relabeled to have
    /// consecutive node IDs.
    pub graph: Graph,
}

impl SubgraphBuffer {
    /// Creates a new [SubgraphBuffer] of size `b` for a graph of size `n`.
    pub fn new(n: usize, b: usize) -> SubgraphBuffer {
        SubgraphBuffer {
            raw_nodes: Vec::<usize>::with_capacity(b),
            node_to_idx: vec![-1 as i64; n],
            graph: Graph::new_buffer(b),
        }
    }

    /// Resets the buffer.
    pub fn clear(&mut self) {
        self.raw_nodes.clear();
        self.node_to_idx.fill(-1);
        self.graph.clear();
    }
}

/// A reusable spanning tree buffer.
pub struct SpanningTreeBuffer {
    /// The neighbors of each node in the tree (list-of-lists representation).
    pub tree: Vec<Vec<usize>>,
}

impl SpanningTreeBuffer {
    /// Creates a buffer for a spanning tree of a subgraph
    /// within a graph of size `n`.
    pub fn new(n: usize) -> SpanningTreeBuffer {
        SpanningTreeBuffer {
            tree: vec![Vec::<usize>::with_capacity(8); n],
        }
    }

    /// Resets the buffer.
    pub fn clear(&mut self) {
        for node in self.tree.iter_mut() {
            node.clear();
        }
    }
}

/// A reusable buffer for balanced splits of a spanning tree.
///
/// Finding population-balanced cuts of a spanning tree is the key step in
/// the ReCom algorithm: a BFS orients the tree, subtree populations are
/// accumulated in reverse visit order, and the nodes whose parent edge
/// roots an ε-balanced cut are collected as balance nodes.
pub struct SplitBuffer {
    /// Boolean representation of whether a node has been visited in the BFS.
    pub visited: Vec<bool>,
    /// The successors of each node in the BFS orientation.
    pub succ: Vec<Vec<usize>>,
    /// The BFS visit order (parents precede children).
    pub order: Vec<usize>,
    /// A deque used for the BFS and for extracting a cut's component.
    pub deque: VecDeque<usize>,
    /// The populations of the subtrees rooted at each node
    /// in the BFS orientation.
    pub tree_pops: Vec<u32>,
    /// The nodes that root ε-balanced splits.
    pub balance_nodes: Vec<usize>,
    /// Boolean representation of whether a node is in the `a`-half of a split.
    pub in_a: Vec<bool>,
}

impl SplitBuffer {
    /// Creates a new split buffer for a graph of size `n`.
    pub fn new(n: usize) -> SplitBuffer {
        SplitBuffer {
            visited: vec![false; n],
            succ: vec![Vec::<usize>::with_capacity(8); n],
            order: Vec::<usize>::with_capacity(n),
            deque: VecDeque::<usize>::with_capacity(n),
            tree_pops: vec![0 as u32; n],
            balance_nodes: Vec::<usize>::with_capacity(8),
            in_a: vec![false; n],
        }
    }

    /// Resets the buffer.
    pub fn clear(&mut self) {
        self.visited.fill(false);
        for node in self.succ.iter_mut() {
            node.clear();
        }
        self.order.clear();
        self.in_a.fill(false);
        self.balance_nodes.clear();

        // These don't strictly have to be cleared (they are overwritten
        // before use), but stale values make debugging harder.
        self.tree_pops.fill(0);
        self.deque.clear();
    }
}

/// Size of the reservoir of random bytes.
// (Balances refresh time against average efficiency per sample.)
const RANGE_BUF_SIZE: usize = 1 << 20;

/// A reservoir of random bytes used for uniformly sampling small ranges.
///
/// Unlike the other buffers, this buffer is opaque; values should be
/// sampled with [RandomRangeBuffer::range].
pub struct RandomRangeBuffer {
    buf: Vec<u8>,
    pos: usize,
}

impl RandomRangeBuffer {
    /// Creates a new buffer for uniformly sampling bytes.
    /// The reservoir is prepopulated with `rng`.
    pub fn new(rng: &mut SmallRng) -> RandomRangeBuffer {
        let mut buf = vec![0 as u8; RANGE_BUF_SIZE];
        rng.fill(&mut buf[..]);
        RandomRangeBuffer { buf: buf, pos: 0 }
    }

    /// Gets the next byte from the reservoir, refreshing it
    /// using `rng` if necessary.
    fn next(&mut self, rng: &mut SmallRng) -> u8 {
        let val = self.buf[self.pos];
        self.pos += 1;
        if self.pos == self.buf.len() {
            rng.fill(&mut self.buf[..]);
            self.pos = 0;
        }
        val
    }

    /// Uniformly samples a byte in the range [0, ub), refreshing the
    /// reservoir using `rng` if necessary.
    ///
    /// Uniform sampling in an arbitrary range is subtle (the standard
    /// modulus trick is both inefficient and biased); this uses Lemire's
    /// nearly-divisionless rejection method on single bytes, which is
    /// sufficient for the primary use case: choosing random neighbors of
    /// a node during Wilson's algorithm.
    ///
    /// # References
    /// * https://www.pcg-random.org/posts/bounded-rands.html
    /// * https://lemire.me/blog/2019/06/06/nearly-divisionless-random-integer-generation-on-various-systems/
    pub fn range(&mut self, rng: &mut SmallRng, ub: u8) -> u8 {
        let mut x = self.next(rng);
        let mut m = (x as u16) * (ub as u16);
        let mut l = Wrapping(m).0 as u8;
        if l < ub {
            let t = (Wrapping(0u8) - Wrapping(ub)).0 % ub;
            while l < t {
                x = self.next(rng);
                m = (x as u16) * (ub as u16);
                l = Wrapping(m).0 as u8;
            }
        }
        Wrapping(m >> 8).0 as u8
    }
}
