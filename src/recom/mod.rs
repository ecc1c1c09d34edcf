//! The ReCom (recombination) step.
//!
//! A step merges two adjacent districts, draws a uniformly random spanning
//! tree of the merged subgraph, and searches the tree for an edge whose
//! removal splits the region into two population-balanced districts. The
//! candidate relabeling is computed entirely in buffers; the live plan is
//! only touched when a proposal is accepted.
use crate::buffers::{SplitBuffer, SpanningTreeBuffer, SubgraphBuffer};
use crate::error::ChainError;
use crate::graph::Graph;
use crate::partition::Partition;
use crate::spanning_tree::SpanningTreeSampler;
use rand::rngs::SmallRng;
use rand::Rng;
use tracing::trace;

pub mod run;

/// Spanning tree sampling strategies (both uniform).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TreeVariant {
    /// Wilson's loop-erased random walk.
    Ust,
    /// Random edge order + Kruskal.
    Rmst,
}

/// Parameters of a ReCom chain run.
#[derive(Clone, Debug)]
pub struct RecomParams {
    /// The minimum population of a district (plan-wide band).
    pub min_pop: u32,
    /// The maximum population of a district (plan-wide band).
    pub max_pop: u32,
    /// Relative population tolerance ε for a merged pair's split.
    pub epsilon: f64,
    /// The number of initial chain steps discarded before ensemble
    /// collection begins (burn-in).
    pub cooling_period: u64,
    /// The number of chain steps recorded into the ensemble.
    pub rounds: u64,
    /// The seed for all random choices in the chain.
    pub rng_seed: u64,
    /// The maximum number of consecutive self-loops before the chain
    /// aborts with [`ChainError::NoValidRecombination`].
    pub max_retries: u64,
    /// The spanning tree sampling strategy.
    pub variant: TreeVariant,
}

impl RecomParams {
    /// Computes the plan-wide population band: every district must stay
    /// within a relative tolerance of `epsilon` of the ideal population
    /// (total population / number of districts).
    pub fn global_bounds(total_pop: u32, num_dists: u32, epsilon: f64) -> (u32, u32) {
        let ideal = total_pop as f64 / num_dists as f64;
        let min_pop = ((1.0 - epsilon) * ideal).floor() as u32;
        let max_pop = ((1.0 + epsilon) * ideal).ceil() as u32;
        (min_pop, max_pop)
    }

    /// Computes the population band a valid cut of a merged pair must place
    /// both components in: within ε of half the merged population, further
    /// clamped to the plan-wide `[min_pop, max_pop]` band.
    ///
    /// The band may be empty (`lo > hi`); an odd merged population with
    /// ε = 0 can never split evenly, for instance.
    pub fn split_bounds(&self, merged_pop: u32) -> (u32, u32) {
        let half = merged_pop as f64 / 2.0;
        let lo = ((1.0 - self.epsilon) * half).ceil() as u32;
        let hi = ((1.0 + self.epsilon) * half).floor() as u32;
        (lo.max(self.min_pop), hi.min(self.max_pop))
    }
}

/// A candidate relabeling of two districts produced by a balanced cut.
#[derive(Clone, Debug)]
pub struct RecomProposal {
    /// The label of the district the `a`-component keeps.
    pub a_label: usize,
    /// The label of the district the `b`-component keeps.
    pub b_label: usize,
    /// The population of the new `a`-district.
    pub a_pop: u32,
    /// The population of the new `b`-district.
    pub b_pop: u32,
    /// The nodes in the new `a`-district (parent-graph IDs).
    pub a_nodes: Vec<usize>,
    /// The nodes in the new `b`-district (parent-graph IDs).
    pub b_nodes: Vec<usize>,
}

impl RecomProposal {
    /// Returns an empty proposal buffer with capacity for `n` nodes.
    pub fn new_buffer(n: usize) -> RecomProposal {
        RecomProposal {
            a_label: 0,
            b_label: 0,
            a_pop: 0,
            b_pop: 0,
            a_nodes: Vec::<usize>::with_capacity(n),
            b_nodes: Vec::<usize>::with_capacity(n),
        }
    }

    /// Resets the buffer.
    pub fn clear(&mut self) {
        self.a_nodes.clear();
        self.b_nodes.clear();
    }
}

/// Returns an upper bound on the number of nodes in any two districts whose
/// populations are at most `max_pop`, based on node populations.
///
/// Used to size the per-step buffers.
pub(crate) fn node_bound(pops: &[u32], max_pop: u32) -> usize {
    let mut sorted_pops = pops.to_vec();
    sorted_pops.sort_unstable();
    let mut bound = 0;
    let mut total: u64 = 0;
    while bound < sorted_pops.len() && total < 2 * max_pop as u64 {
        total += sorted_pops[bound] as u64;
        bound += 1;
    }
    bound + 1
}

/// The reusable buffers for one chain's recombination steps.
pub struct StepBuffers {
    /// The buffer size: an upper bound on the node count of any merged pair.
    pub node_ub: usize,
    /// Merged-pair subgraph extraction.
    pub subgraph: SubgraphBuffer,
    /// Spanning tree adjacency.
    pub tree: SpanningTreeBuffer,
    /// Balanced-cut search state.
    pub split: SplitBuffer,
}

impl StepBuffers {
    /// Allocates buffers for chains over `graph` starting from `partition`
    /// under `params`.
    ///
    /// The buffer bound covers both the population band and the starting
    /// plan: an initial district may exceed `max_pop` (the chain only moves
    /// toward balance), so its node count must fit in the buffers too.
    pub fn new(graph: &Graph, partition: &Partition, params: &RecomParams) -> StepBuffers {
        let n = graph.pops.len();
        let mut dist_sizes: Vec<usize> = partition.dist_nodes.iter().map(|d| d.len()).collect();
        dist_sizes.sort_unstable_by(|a, b| b.cmp(a));
        let seed_bound = dist_sizes.iter().take(2).sum::<usize>() + 1;
        let node_ub = node_bound(&graph.pops, params.max_pop).max(seed_bound);
        StepBuffers {
            node_ub: node_ub,
            subgraph: SubgraphBuffer::new(n, node_ub),
            tree: SpanningTreeBuffer::new(node_ub),
            split: SplitBuffer::new(node_ub),
        }
    }
}

/// Searches a spanning tree for a population-balanced cut and extracts a
/// proposal for a random valid cut, if any exists.
///
/// The search orients the tree with a BFS from node 0, accumulates subtree
/// populations in reverse visit order, and collects every node whose
/// subtree roots a cut with both components inside `bounds` (the "balance
/// nodes"). One balance node is then chosen uniformly at random: scanning
/// the tree's edges in a fixed order would bias which balanced cuts are
/// reachable, so the choice must not depend on enumeration order.
///
/// Returns the number of balance nodes in the tree, or `None` if the tree
/// admits no balanced cut (a self-loop for the chain).
///
/// # Arguments
/// * `subgraph` - The merged subgraph (relabeled node IDs).
/// * `rng` - A random number generator (used to choose among balance nodes).
/// * `tree` - A spanning tree of `subgraph` (list-of-lists adjacency).
/// * `a` / `b` - The district labels being recombined.
/// * `buf` - The split search buffer.
/// * `proposal` - The proposal buffer to fill on success.
/// * `node_map` - Mapping from subgraph node IDs to parent-graph node IDs.
/// * `bounds` - The inclusive population band for both components.
pub fn random_split(
    subgraph: &Graph,
    rng: &mut SmallRng,
    tree: &[Vec<usize>],
    a: usize,
    b: usize,
    buf: &mut SplitBuffer,
    proposal: &mut RecomProposal,
    node_map: &[usize],
    bounds: (u32, u32),
) -> Option<usize> {
    buf.clear();
    proposal.clear();
    let n = subgraph.pops.len();
    let (lo, hi) = bounds;
    let root = 0;

    // Orient the tree away from the root.
    buf.deque.push_back(root);
    buf.visited[root] = true;
    while let Some(next) = buf.deque.pop_front() {
        buf.order.push(next);
        for &neighbor in tree[next].iter() {
            if !buf.visited[neighbor] {
                buf.visited[neighbor] = true;
                buf.deque.push_back(neighbor);
                buf.succ[next].push(neighbor);
            }
        }
    }

    // Accumulate subtree populations (children before parents).
    for &node in buf.order.iter().rev() {
        let mut pop = subgraph.pops[node];
        for &child in buf.succ[node].iter() {
            pop += buf.tree_pops[child];
        }
        buf.tree_pops[node] = pop;
    }

    // Collect the nodes whose parent edge roots an ε-balanced cut.
    for node in 0..n {
        if node == root {
            continue;
        }
        let pop = buf.tree_pops[node];
        let rest = subgraph.total_pop - pop;
        if pop >= lo && pop <= hi && rest >= lo && rest <= hi {
            buf.balance_nodes.push(node);
        }
    }
    if buf.balance_nodes.is_empty() {
        return None;
    }
    let balance_node = buf.balance_nodes[rng.gen_range(0..buf.balance_nodes.len())];

    // Extract the component under the chosen cut.
    let mut a_pop = 0;
    buf.deque.push_back(balance_node);
    while let Some(next) = buf.deque.pop_front() {
        buf.in_a[next] = true;
        proposal.a_nodes.push(node_map[next]);
        a_pop += subgraph.pops[next];
        for &child in buf.succ[next].iter() {
            buf.deque.push_back(child);
        }
    }
    for node in 0..n {
        if !buf.in_a[node] {
            proposal.b_nodes.push(node_map[node]);
        }
    }
    proposal.a_label = a;
    proposal.b_label = b;
    proposal.a_pop = a_pop;
    proposal.b_pop = subgraph.total_pop - a_pop;
    Some(buf.balance_nodes.len())
}

/// Runs one recombination attempt:
/// SELECT_PAIR → MERGE → SPANNING_TREE → SEARCH_CUT.
///
/// On success, `proposal` holds the candidate relabeling and `Ok(true)` is
/// returned. `Ok(false)` indicates a self-loop: the sampled tree admitted
/// no balanced cut, and the plan is unchanged. The only error is
/// [`ChainError::NoAdjacentPairs`] on a degenerate single-district plan.
pub fn recom_attempt(
    graph: &Graph,
    partition: &Partition,
    params: &RecomParams,
    bufs: &mut StepBuffers,
    sampler: &mut dyn SpanningTreeSampler,
    proposal: &mut RecomProposal,
    rng: &mut SmallRng,
) -> Result<bool, ChainError> {
    let pairs = partition.adjacent_pairs();
    if pairs.is_empty() {
        return Err(ChainError::NoAdjacentPairs);
    }
    let (dist_a, dist_b) = pairs[rng.gen_range(0..pairs.len())];
    partition.subgraph(graph, &mut bufs.subgraph, dist_a as usize, dist_b as usize);
    sampler.random_spanning_tree(&bufs.subgraph.graph, &mut bufs.tree, rng);
    let bounds = params.split_bounds(bufs.subgraph.graph.total_pop);
    match random_split(
        &bufs.subgraph.graph,
        rng,
        &bufs.tree.tree,
        dist_a as usize,
        dist_b as usize,
        &mut bufs.split,
        proposal,
        &bufs.subgraph.raw_nodes,
        bounds,
    ) {
        Some(n_cuts) => {
            trace!(
                dist_a,
                dist_b,
                n_cuts,
                a_pop = proposal.a_pop,
                b_pop = proposal.b_pop,
                "balanced cut found"
            );
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_with_band(min_pop: u32, max_pop: u32, epsilon: f64) -> RecomParams {
        RecomParams {
            min_pop: min_pop,
            max_pop: max_pop,
            epsilon: epsilon,
            cooling_period: 0,
            rounds: 0,
            rng_seed: 0,
            max_retries: 1,
            variant: TreeVariant::Ust,
        }
    }

    #[test]
    fn global_bounds_exact() {
        assert_eq!(RecomParams::global_bounds(40, 2, 0.0), (20, 20));
        assert_eq!(RecomParams::global_bounds(100, 4, 0.05), (23, 27));
    }

    #[test]
    fn split_bounds_even_merge() {
        let params = params_with_band(0, u32::MAX, 0.0);
        assert_eq!(params.split_bounds(40), (20, 20));
    }

    #[test]
    fn split_bounds_odd_merge_is_empty_at_zero_tolerance() {
        // An odd merged population can never split evenly.
        let params = params_with_band(0, u32::MAX, 0.0);
        let (lo, hi) = params.split_bounds(41);
        assert!(lo > hi);
    }

    #[test]
    fn split_bounds_clamped_to_global_band() {
        let params = params_with_band(18, 21, 0.5);
        // Pair-half band would be [10, 30]; the plan-wide band wins.
        assert_eq!(params.split_bounds(40), (18, 21));
    }

    #[test]
    fn node_bound_covers_small_graphs() {
        // The bound must never exceed the node count by more than one,
        // even when two districts can hold the whole graph.
        assert_eq!(node_bound(&[10, 10, 10, 10], 20), 5);
        assert_eq!(node_bound(&[1, 1, 1, 1], 1), 3);
    }
}
