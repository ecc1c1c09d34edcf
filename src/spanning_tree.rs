//! Uniformly random spanning tree generation.
//!
//! Uniformity among spanning trees is the statistical property that makes
//! the chain's stationary distribution analyzable, so both samplers here
//! draw from the uniform distribution; there is deliberately no
//! fixed-weight (deterministic) tree construction in this crate.
use crate::buffers::{RandomRangeBuffer, SpanningTreeBuffer};
use crate::graph::{Edge, Graph};
use petgraph::unionfind::UnionFind;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;

pub trait SpanningTreeSampler {
    /// Samples a random spanning tree of `graph` using `rng`; inserts the
    /// tree into `buf`.
    fn random_spanning_tree(
        &mut self,
        graph: &Graph,
        buf: &mut SpanningTreeBuffer,
        rng: &mut SmallRng,
    );
}

/// Samples spanning trees from the uniform distribution via Wilson's
/// algorithm (loop-erased random walk).
pub struct UstSampler {
    /// The next node toward the tree for each walk position.
    next: Vec<i64>,
    /// Boolean representation of the subset of nodes already in the tree.
    in_tree: Vec<bool>,
    /// A reservoir of random bytes (used for quickly selecting random
    /// node neighbors).
    range_buf: RandomRangeBuffer,
}

impl UstSampler {
    /// Creates a UST sampler (and underlying buffers) for a graph of
    /// approximate size `n`. (The byte reservoir is initialized using `rng`.)
    pub fn new(n: usize, rng: &mut SmallRng) -> UstSampler {
        UstSampler {
            next: vec![-1 as i64; n],
            in_tree: vec![false; n],
            range_buf: RandomRangeBuffer::new(rng),
        }
    }
}

impl SpanningTreeSampler for UstSampler {
    /// Draws a random spanning tree of a graph from the uniform distribution.
    /// Returns nothing; the tree buffer `buf` is updated in place.
    ///
    /// # Arguments
    /// * `graph` - The graph to form a spanning tree from. The maximum
    ///   degree of the graph must be ≤255; otherwise, sampling from the
    ///   uniform distribution is not guaranteed.
    /// * `buf` - The buffer to insert the spanning tree into.
    /// * `rng` - A random number generator (used to select the tree root
    ///   and refresh the random byte reservoir).
    ///
    /// # References
    /// [1]  Wilson, David Bruce. "Generating random spanning trees more
    ///      quickly than the cover time." Proceedings of the twenty-eighth
    ///      annual ACM symposium on Theory of computing. 1996.
    fn random_spanning_tree(
        &mut self,
        graph: &Graph,
        buf: &mut SpanningTreeBuffer,
        rng: &mut SmallRng,
    ) {
        buf.clear();
        let n = graph.pops.len();
        self.next[..n].fill(-1);
        self.in_tree[..n].fill(false);

        let root = rng.gen_range(0..n);
        self.in_tree[root] = true;
        for i in 0..n {
            // Random walk from `i` until the tree is hit, erasing loops
            // by overwriting the successor pointer on revisits.
            let mut u = i;
            while !self.in_tree[u] {
                let neighbors = &graph.neighbors[u];
                let neighbor = neighbors[self.range_buf.range(rng, neighbors.len() as u8) as usize];
                self.next[u] = neighbor as i64;
                u = neighbor;
            }
            // Commit the loop-erased path.
            u = i;
            while !self.in_tree[u] {
                self.in_tree[u] = true;
                u = self.next[u] as usize;
            }
        }

        // Every committed successor pointer is a tree edge.
        let mut n_edges = 0;
        for (curr, &prev) in self.next[..n].iter().enumerate() {
            if prev >= 0 {
                buf.tree[curr].push(prev as usize);
                buf.tree[prev as usize].push(curr);
                n_edges += 1;
            }
        }
        if n_edges != n - 1 {
            panic!("expected {} edges in spanning tree, got {}", n - 1, n_edges);
        }
    }
}

/// Samples spanning trees from the uniform distribution by drawing random
/// edge weights and finding the minimum spanning tree.
pub struct RmstSampler {
    /// Buffer for randomly ordered edges.
    edges_by_weight: Vec<Edge>,
}

impl RmstSampler {
    /// Initializes a random-MST sampler for a graph of approximate size `n`.
    pub fn new(n: usize) -> RmstSampler {
        RmstSampler {
            edges_by_weight: Vec::<Edge>::with_capacity(8 * n),
        }
    }
}

/// Given an edge order (`edges_by_weight`), finds the minimum spanning tree
/// of `graph` using Kruskal's algorithm and inserts the tree into `buf`.
fn minimum_spanning_tree(graph: &Graph, buf: &mut SpanningTreeBuffer, edges_by_weight: &[Edge]) {
    buf.clear();
    let n = graph.pops.len();
    let mut uf = UnionFind::<usize>::new(n);

    // Add edges until the graph is connected.
    let mut n_unions = 0;
    for &Edge(src, dst) in edges_by_weight.iter() {
        if n_unions == n - 1 {
            break;
        }
        if uf.union(src, dst) {
            buf.tree[src].push(dst);
            buf.tree[dst].push(src);
            n_unions += 1;
        }
    }
    if n_unions != n - 1 {
        panic!(
            "expected {} edges in spanning tree, got {}",
            n - 1,
            n_unions
        );
    }
}

impl SpanningTreeSampler for RmstSampler {
    /// Draws a random spanning tree of a graph by sampling a random edge
    /// order (equivalent to i.i.d. random edge weights) and finding the
    /// minimum spanning tree with Kruskal's algorithm.
    fn random_spanning_tree(
        &mut self,
        graph: &Graph,
        buf: &mut SpanningTreeBuffer,
        rng: &mut SmallRng,
    ) {
        self.edges_by_weight.clone_from(&graph.edges);
        self.edges_by_weight.shuffle(rng);
        minimum_spanning_tree(graph, buf, &self.edges_by_weight);
    }
}
