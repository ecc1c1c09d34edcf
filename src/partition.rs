//! Data structures for partitionings (districting plans).
use crate::buffers::SubgraphBuffer;
use crate::error::MalformedGraphError;
use crate::graph::{Edge, Graph};
use crate::recom::RecomProposal;
use std::collections::VecDeque;

/// A partitioning (districting plan) on top of a [Graph].
/// The graph is referenced implicitly (we don't store a reference to it).
#[derive(Clone, Debug)]
pub struct Partition {
    /// The number of districts (parts) in the partitioning.
    /// Fixed for the lifetime of a simulation: recombination reuses
    /// labels and never changes the district count.
    pub num_dists: u32,
    /// An assignment vector mapping nodes in the graph to
    /// district labels.
    pub assignments: Vec<u32>,
    /// The cut edges (that is, edges that connect nodes in different
    /// districts) in the partitioning.
    /// This should be consistent with `dist_nodes`.
    pub cut_edges: Vec<usize>,
    /// A flattened district adjacency matrix. A district pair's entry
    /// is the number of cut edges between the pair; nonadjacency is
    /// represented by a cut edge count of 0. Recomputed after every
    /// accepted recombination.
    pub dist_adj: Vec<u32>,
    /// The population in each district.
    pub dist_pops: Vec<u32>,
    /// The nodes in each district (a list-of-lists representation).
    /// This should be consistent with `assignments`.
    pub dist_nodes: Vec<Vec<usize>>,
}

impl Partition {
    /// Updates a [Partition] with an underlying `graph` to reflect a `proposal`.
    ///
    /// This is the only mutation point of a plan: proposals are computed in
    /// buffers without touching the live partition, and a rejected proposal
    /// simply never reaches this method.
    pub fn update(&mut self, graph: &Graph, proposal: &RecomProposal) {
        self.dist_nodes[proposal.a_label] = proposal.a_nodes.clone();
        self.dist_nodes[proposal.b_label] = proposal.b_nodes.clone();
        self.dist_pops[proposal.a_label] = proposal.a_pop;
        self.dist_pops[proposal.b_label] = proposal.b_pop;
        for &node in proposal.a_nodes.iter() {
            self.assignments[node] = proposal.a_label as u32;
        }
        for &node in proposal.b_nodes.iter() {
            self.assignments[node] = proposal.b_label as u32;
        }
        self.update_derived(graph);
    }

    /// Updates properties derived from the partition's assignments
    /// (cut edges list, district adjacency matrix).
    fn update_derived(&mut self, graph: &Graph) {
        let mut dist_adj = vec![0 as u32; (self.num_dists * self.num_dists) as usize];
        let mut cut_edges = Vec::<usize>::new();
        for (index, edge) in graph.edges.iter().enumerate() {
            let dist_a = self.assignments[edge.0];
            let dist_b = self.assignments[edge.1];
            assert!(dist_a < self.num_dists);
            assert!(dist_b < self.num_dists);
            if dist_a != dist_b {
                dist_adj[((dist_a * self.num_dists) + dist_b) as usize] += 1;
                dist_adj[((dist_b * self.num_dists) + dist_a) as usize] += 1;
                cut_edges.push(index);
            }
        }
        self.dist_adj = dist_adj;
        self.cut_edges = cut_edges;
    }

    /// Returns the unordered pairs of district labels that are adjacent:
    /// at least one precinct of each district borders the other across
    /// the cut.
    pub fn adjacent_pairs(&self) -> Vec<(u32, u32)> {
        let n = self.num_dists;
        let mut pairs = Vec::new();
        for a in 0..n {
            for b in (a + 1)..n {
                if self.dist_adj[((a * n) + b) as usize] > 0 {
                    pairs.push((a, b));
                }
            }
        }
        pairs
    }

    /// Checks that `district` induces a connected subgraph: a BFS from one
    /// member precinct, restricted to edges whose both endpoints carry the
    /// district's label, must reach every member precinct.
    pub fn district_connected(&self, graph: &Graph, district: u32) -> bool {
        let nodes = &self.dist_nodes[district as usize];
        if nodes.is_empty() {
            return true; // ...vacuously.
        }
        let mut visited = vec![false; graph.pops.len()];
        let mut queue = VecDeque::new();
        visited[nodes[0]] = true;
        queue.push_back(nodes[0]);
        let mut reached = 0;
        while let Some(next) = queue.pop_front() {
            reached += 1;
            for &neighbor in graph.neighbors[next].iter() {
                if self.assignments[neighbor] == district && !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
        reached == nodes.len()
    }

    /// Copies the subgraph induced by the union of districts `a` and `b`
    /// into a buffer.
    ///
    /// The resulting subgraph has relabeled node IDs: nodes
    /// [0..# of nodes in district `a`] are from district `a`, and the
    /// remaining nodes are from district `b`. The `node_to_idx` member
    /// of the subgraph buffer contains a mapping between the node IDs
    /// of the parent graph and these new node IDs.
    ///
    /// # Arguments
    ///
    /// * `graph` - The underlying graph of the [Partition].
    /// * `buf` - The buffer to copy the nodes into.
    /// * `a` - The label of the `a`-district.
    /// * `b` - The label of the `b`-district.
    pub fn subgraph(&self, graph: &Graph, buf: &mut SubgraphBuffer, a: usize, b: usize) {
        buf.clear();
        for &node in self.dist_nodes[a].iter() {
            buf.raw_nodes.push(node);
        }
        for &node in self.dist_nodes[b].iter() {
            buf.raw_nodes.push(node);
        }
        for (idx, &node) in buf.raw_nodes.iter().enumerate() {
            buf.node_to_idx[node] = idx as i64;
        }
        for (idx, &node) in buf.raw_nodes.iter().enumerate() {
            for &neighbor in graph.neighbors[node].iter() {
                if buf.node_to_idx[neighbor] >= 0 {
                    let neighbor_idx = buf.node_to_idx[neighbor] as usize;
                    buf.graph.neighbors[idx].push(neighbor_idx);
                    if neighbor_idx > idx {
                        buf.graph.edges.push(Edge(idx, neighbor_idx));
                    }
                }
            }
            buf.graph.pops.push(graph.pops[node]);
        }
        buf.graph.total_pop = self.dist_pops[a] + self.dist_pops[b];
    }

    /// Builds a partition from a 1-indexed assignment vector.
    pub fn from_assignments(
        graph: &Graph,
        assignments: &[u32],
    ) -> Result<Partition, MalformedGraphError> {
        match assignments.iter().min() {
            None => return Err(MalformedGraphError::EmptyAssignments),
            Some(&1) => (),
            Some(_) => return Err(MalformedGraphError::NotOneIndexed),
        };
        if assignments.len() != graph.neighbors.len() {
            return Err(MalformedGraphError::NodeCountMismatch {
                graph: graph.neighbors.len(),
                assignments: assignments.len(),
            });
        }

        let num_dists = *assignments.iter().max().unwrap(); // guaranteed nonempty
        let mut dist_nodes = vec![Vec::<usize>::new(); num_dists as usize];
        let mut dist_pops = vec![0 as u32; num_dists as usize];
        let assignments_zeroed = assignments.iter().map(|a| a - 1).collect::<Vec<u32>>();
        for (node, &assignment) in assignments_zeroed.iter().enumerate() {
            dist_nodes[assignment as usize].push(node);
            dist_pops[assignment as usize] += graph.pops[node];
        }
        for (dist, nodes) in dist_nodes.iter().enumerate() {
            if nodes.is_empty() {
                return Err(MalformedGraphError::EmptyDistrict {
                    district: dist as u32 + 1,
                });
            }
        }
        let mut partition = Partition {
            num_dists: num_dists,
            assignments: assignments_zeroed,
            cut_edges: Vec::<usize>::new(), // derived
            dist_adj: Vec::<u32>::new(),    // derived
            dist_pops: dist_pops,
            dist_nodes: dist_nodes,
        };
        partition.update_derived(graph);
        Ok(partition)
    }
}
