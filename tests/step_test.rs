// Functional tests that verify ReCom chain invariants at each step.
use planchain::error::ChainError;
use planchain::graph::Graph;
use planchain::partition::Partition;
use planchain::recom::run::{parallel_chains, run_chain};
use planchain::recom::{RecomParams, RecomProposal, TreeVariant};
use planchain::stats::{plan_scores, PlanScores, SelfLoopCounts, StatsWriter};
use std::collections::HashSet;
use std::io::Result as IOResult;
use std::iter::FromIterator;
use std::sync::atomic::AtomicBool;

use rstest::rstest;
use test_fixtures::{example_fixture, four_cycle, striped_grid};

/// RNG seed for all tests.
const RNG_SEED: u64 = 153434375;

/// Verifies that a set of nodes is connected.
fn nodes_connected(graph: &Graph, nodes: &[usize]) -> bool {
    if nodes.is_empty() {
        return true; // ...vacuously.
    }
    // Perform a DFS through the subgraph and attempt to reach all nodes.
    let nodeset = HashSet::<usize>::from_iter(nodes.iter().cloned());
    let mut stack = vec![nodes[0]];
    let mut visited = HashSet::<usize>::from_iter(stack.iter().cloned());
    while let Some(next) = stack.pop() {
        for neighbor in graph.neighbors[next].iter() {
            if nodeset.contains(neighbor) && !visited.contains(neighbor) {
                visited.insert(*neighbor);
                stack.push(*neighbor);
            }
        }
    }
    visited.len() == nodes.len()
}

/// Verifies that every district in a partition is connected.
fn partition_connected_invariant(graph: &Graph, partition: &Partition) -> bool {
    (0..partition.num_dists).all(|dist| partition.district_connected(graph, dist))
}

/// Verifies that the two changed districts in a `RecomProposal` are connected.
fn proposal_connected_invariant(graph: &Graph, proposal: &RecomProposal) -> bool {
    nodes_connected(graph, &proposal.a_nodes) && nodes_connected(graph, &proposal.b_nodes)
}

/// Verifies all districts in a partition are within population bounds.
fn population_tolerance_invariant(partition: &Partition, min_pop: u32, max_pop: u32) -> bool {
    partition
        .dist_pops
        .iter()
        .all(|&pop| min_pop <= pop && pop <= max_pop)
}

/// Verifies all districts in a partition have the correct population.
fn population_sum_invariant(graph: &Graph, partition: &Partition) -> bool {
    partition
        .dist_pops
        .iter()
        .zip(partition.dist_nodes.iter())
        .all(|(&pop, nodes)| pop == nodes.iter().map(|&n| graph.pops[n]).sum::<u32>())
}

/// Verifies that a partition's `cut_edges` match its `assignments`.
fn cut_edges_invariant(graph: &Graph, partition: &Partition) -> bool {
    let cut_edges: Vec<usize> = graph
        .edges
        .iter()
        .enumerate()
        .filter(|(_, edge)| partition.assignments[edge.0] != partition.assignments[edge.1])
        .map(|(idx, _)| idx)
        .collect();
    cut_edges == partition.cut_edges
}

/// Verifies that a partition's `dist_adj` is consistent with `cut_edges`.
fn dist_adj_invariant(graph: &Graph, partition: &Partition) -> bool {
    let n = partition.num_dists;
    let mut dist_adj = vec![0 as u32; (n * n) as usize];
    for &edge_idx in partition.cut_edges.iter() {
        let edge = &graph.edges[edge_idx];
        let dist_a = partition.assignments[edge.0];
        let dist_b = partition.assignments[edge.1];
        dist_adj[((dist_a * n) + dist_b) as usize] += 1;
        dist_adj[((dist_b * n) + dist_a) as usize] += 1;
    }
    dist_adj == partition.dist_adj
}

/// Verifies that a partition's `dist_nodes` match its `assignments`.
fn assignments_invariant(graph: &Graph, partition: &Partition) -> bool {
    let node_count: usize = partition.dist_nodes.iter().map(|nodes| nodes.len()).sum();
    if node_count != graph.neighbors.len() {
        return false;
    }
    partition.dist_nodes.iter().enumerate().all(|(dist, nodes)| {
        nodes
            .iter()
            .all(|&n| partition.assignments[n] as usize == dist)
    })
}

/// Verifies that the global step count was updated properly from the step's counts.
fn step_count_invariant(step: u64, last_step: u64, counts: &SelfLoopCounts) -> bool {
    step == last_step + counts.sum() as u64 + 1
}

/// Verifies that a partition's overall properties (number of nodes,
/// total population, district count) are consistent with its graph.
fn conservation_invariant(graph: &Graph, partition: &Partition, num_dists: u32) -> bool {
    graph.neighbors.len() == partition.assignments.len()
        && graph.total_pop == partition.dist_pops.iter().sum::<u32>()
        && partition.num_dists == num_dists
        && partition.dist_nodes.iter().all(|nodes| !nodes.is_empty())
}

/// Observes the state of the chain at each step through `StatsWriter`
/// callbacks and asserts the per-step chain invariants.
struct StepInvariantWriter {
    /// The chain parameters (relevant: population tolerances).
    params: RecomParams,
    /// The district count of the initial partition.
    /// (`None` if the chain hasn't called .init() yet.)
    num_dists: Option<u32>,
    /// The global step counter at the last step.
    last_step: u64,
    /// The number of accepted proposals observed.
    accepted: u64,
}

impl StepInvariantWriter {
    fn new(params: RecomParams) -> StepInvariantWriter {
        StepInvariantWriter {
            params: params,
            num_dists: None,
            last_step: 0,
            accepted: 0,
        }
    }
}

impl StatsWriter for StepInvariantWriter {
    /// Checks initial partition invariants and initializes the writer.
    fn init(&mut self, graph: &Graph, partition: &Partition, scores: &PlanScores) -> IOResult<()> {
        assert!(
            self.num_dists.is_none(),
            "Writer must be initialized exactly once."
        );
        assert!(
            cut_edges_invariant(graph, partition),
            "Cut edges don't match node assignments in initial partition."
        );
        assert!(
            dist_adj_invariant(graph, partition),
            "Initial partition has incorrect adjacency matrix."
        );
        assert!(
            partition_connected_invariant(graph, partition),
            "Initial partition is disconnected."
        );
        assert!(
            population_sum_invariant(graph, partition),
            "District population sums incorrect in initial partition."
        );
        assert!(
            assignments_invariant(graph, partition),
            ".assignments does not match .dist_nodes in initial partition."
        );
        assert_eq!(
            *scores,
            plan_scores(graph, partition),
            "Initial scores are not a pure function of the plan."
        );
        self.num_dists = Some(partition.num_dists);
        Ok(())
    }

    /// Checks step-to-step chain invariants (i.e. the validity of each
    /// individual accepted proposal).
    fn step(
        &mut self,
        step: u64,
        graph: &Graph,
        partition: &Partition,
        proposal: &RecomProposal,
        scores: &PlanScores,
        counts: &SelfLoopCounts,
    ) -> IOResult<()> {
        let num_dists = self.num_dists.expect("Writer must be initialized first.");
        assert!(
            cut_edges_invariant(graph, partition),
            "Cut edges don't match node assignments after proposal."
        );
        assert!(
            dist_adj_invariant(graph, partition),
            "District adjacency matrix is incorrect after step."
        );
        assert!(
            proposal_connected_invariant(graph, proposal),
            "At least one of the proposed districts is disconnected."
        );
        assert!(
            population_tolerance_invariant(partition, self.params.min_pop, self.params.max_pop),
            "Partition outside population tolerances after proposal."
        );
        assert!(
            population_sum_invariant(graph, partition),
            "District population sums incorrect after proposal."
        );
        assert!(
            conservation_invariant(graph, partition, num_dists),
            "Label set or total population not conserved after step."
        );
        assert!(
            assignments_invariant(graph, partition),
            ".assignments does not match .dist_nodes after proposal."
        );
        assert!(
            step_count_invariant(step, self.last_step, counts),
            "Step count is incorrect after proposal."
        );
        assert_eq!(
            *scores,
            plan_scores(graph, partition),
            "Step scores are not a pure function of the plan."
        );
        self.last_step = step;
        self.accepted += 1;
        Ok(())
    }

    fn close(&mut self) -> IOResult<()> {
        assert!(
            self.num_dists.is_some(),
            "Writer must be initialized before closing."
        );
        Ok(())
    }
}

fn grid_params(num_steps: u64, pop_range: (u32, u32), variant: TreeVariant) -> RecomParams {
    RecomParams {
        min_pop: pop_range.0,
        max_pop: pop_range.1,
        epsilon: 0.2,
        cooling_period: 10,
        rounds: num_steps,
        rng_seed: RNG_SEED,
        max_retries: 100_000,
        variant: variant,
    }
}

#[rstest]
fn test_chain_invariants_grid(
    #[values(500)] num_steps: u64,
    #[values((10, 14), (11, 13))] pop_range: (u32, u32),
    #[values(TreeVariant::Ust, TreeVariant::Rmst)] variant: TreeVariant,
) {
    let (graph, mut partition) = striped_grid(6, 6, 3);
    let params = grid_params(num_steps, pop_range, variant);
    let writer = Box::new(StepInvariantWriter::new(params.clone())) as Box<dyn StatsWriter>;
    let stop = AtomicBool::new(false);
    let ensemble = run_chain(&graph, &mut partition, writer, &params, &stop).unwrap();
    assert_eq!(ensemble.len() as u64, num_steps);
}

#[rstest]
fn test_chain_invariants_example(#[values(TreeVariant::Ust, TreeVariant::Rmst)] variant: TreeVariant) {
    let (graph, mut partition, _) = example_fixture();
    let (min_pop, max_pop) = RecomParams::global_bounds(graph.total_pop, partition.num_dists, 0.05);
    let params = RecomParams {
        min_pop: min_pop,
        max_pop: max_pop,
        epsilon: 0.05,
        cooling_period: 25,
        rounds: 100,
        rng_seed: RNG_SEED,
        max_retries: 100_000,
        variant: variant,
    };
    let writer = Box::new(StepInvariantWriter::new(params.clone())) as Box<dyn StatsWriter>;
    let stop = AtomicBool::new(false);
    let ensemble = run_chain(&graph, &mut partition, writer, &params, &stop).unwrap();
    assert_eq!(ensemble.len(), 100);
    for scores in ensemble.scores.iter() {
        assert!(scores.dem_districts + scores.rep_districts <= 4);
        assert!(scores.efficiency_gap >= 0.0 && scores.efficiency_gap <= 1.0);
    }
}

#[test]
fn test_chain_deterministic_under_fixed_seed() {
    let params = grid_params(200, (7, 9), TreeVariant::Ust);
    let (graph, partition) = striped_grid(4, 4, 2);

    let mut first = partition.clone();
    let stop = AtomicBool::new(false);
    let ensemble_a = run_chain(
        &graph,
        &mut first,
        Box::new(StepInvariantWriter::new(params.clone())),
        &params,
        &stop,
    )
    .unwrap();

    let mut second = partition.clone();
    let ensemble_b = run_chain(
        &graph,
        &mut second,
        Box::new(StepInvariantWriter::new(params.clone())),
        &params,
        &stop,
    )
    .unwrap();

    assert_eq!(ensemble_a, ensemble_b);
    assert_eq!(first.assignments, second.assignments);
}

#[test]
fn test_four_cycle_step_is_exactly_balanced() {
    // With ε = 0, one step on the 4-cycle either self-loops or produces
    // two districts with population exactly 20.
    let (graph, mut partition) = four_cycle();
    let params = RecomParams {
        min_pop: 20,
        max_pop: 20,
        epsilon: 0.0,
        cooling_period: 0,
        rounds: 1,
        rng_seed: RNG_SEED,
        max_retries: 1000,
        variant: TreeVariant::Ust,
    };
    let stop = AtomicBool::new(false);
    let writer = Box::new(StepInvariantWriter::new(params.clone())) as Box<dyn StatsWriter>;
    let ensemble = run_chain(&graph, &mut partition, writer, &params, &stop).unwrap();
    // cooling_period = 0: the very first step's plan is recorded.
    assert_eq!(ensemble.len(), 1);
    assert_eq!(partition.dist_pops, vec![20, 20]);
    assert!(partition.district_connected(&graph, 0));
    assert!(partition.district_connected(&graph, 1));
}

#[test]
fn test_zero_rounds_yields_empty_ensemble() {
    let (graph, mut partition) = four_cycle();
    let params = RecomParams {
        min_pop: 20,
        max_pop: 20,
        epsilon: 0.0,
        cooling_period: 5,
        rounds: 0,
        rng_seed: RNG_SEED,
        max_retries: 1000,
        variant: TreeVariant::Ust,
    };
    let stop = AtomicBool::new(false);
    let writer = Box::new(StepInvariantWriter::new(params.clone())) as Box<dyn StatsWriter>;
    let ensemble = run_chain(&graph, &mut partition, writer, &params, &stop).unwrap();
    assert!(ensemble.is_empty());
}

#[test]
fn test_interruption_preserves_plan() {
    let (graph, mut partition) = striped_grid(4, 4, 2);
    let initial_assignments = partition.assignments.clone();
    let params = grid_params(1000, (7, 9), TreeVariant::Ust);
    let stop = AtomicBool::new(true); // interrupt before the first step
    let writer = Box::new(StepInvariantWriter::new(params.clone())) as Box<dyn StatsWriter>;
    let ensemble = run_chain(&graph, &mut partition, writer, &params, &stop).unwrap();
    assert!(ensemble.is_empty());
    assert_eq!(partition.assignments, initial_assignments);
}

#[test]
fn test_single_district_has_no_adjacent_pairs() {
    let graph = Graph::rect_grid(2, 2);
    let mut partition = Partition::from_assignments(&graph, &[1, 1, 1, 1]).unwrap();
    let params = RecomParams {
        min_pop: 0,
        max_pop: 4,
        epsilon: 0.5,
        cooling_period: 0,
        rounds: 1,
        rng_seed: RNG_SEED,
        max_retries: 10,
        variant: TreeVariant::Ust,
    };
    let stop = AtomicBool::new(false);
    let writer = Box::new(StepInvariantWriter::new(params.clone())) as Box<dyn StatsWriter>;
    let err = run_chain(&graph, &mut partition, writer, &params, &stop).unwrap_err();
    assert!(matches!(err, ChainError::NoAdjacentPairs));
}

#[test]
fn test_odd_population_exhausts_retries() {
    // An odd total population can never split evenly under ε = 0, so every
    // attempt self-loops until the retry bound aborts the chain.
    let (mut graph, _) = four_cycle();
    graph.pops[3] = 11;
    graph.total_pop = 41;
    let mut partition = Partition::from_assignments(&graph, &[1, 1, 2, 2]).unwrap();
    let params = RecomParams {
        min_pop: 0,
        max_pop: u32::MAX,
        epsilon: 0.0,
        cooling_period: 0,
        rounds: 10,
        rng_seed: RNG_SEED,
        max_retries: 3,
        variant: TreeVariant::Ust,
    };
    let stop = AtomicBool::new(false);
    let writer = Box::new(StepInvariantWriter::new(params.clone())) as Box<dyn StatsWriter>;
    let err = run_chain(&graph, &mut partition, writer, &params, &stop).unwrap_err();
    assert!(matches!(
        err,
        ChainError::NoValidRecombination { attempts: 3 }
    ));
}

#[test]
fn test_parallel_chains_are_independent_and_deterministic() {
    let (graph, partition) = striped_grid(4, 4, 2);
    let params = grid_params(50, (7, 9), TreeVariant::Ust);
    let stop = AtomicBool::new(false);

    let writers = |n: usize| -> Vec<Box<dyn StatsWriter>> {
        (0..n)
            .map(|_| Box::new(StepInvariantWriter::new(params.clone())) as Box<dyn StatsWriter>)
            .collect()
    };
    let first = parallel_chains(&graph, &partition, writers(3), &params, &stop).unwrap();
    assert_eq!(first.len(), 3);
    for ensemble in first.iter() {
        assert_eq!(ensemble.len(), 50);
    }
    // Chain 0 runs with the base seed: it must match a sequential run.
    let mut sequential = partition.clone();
    let ensemble = run_chain(
        &graph,
        &mut sequential,
        Box::new(StepInvariantWriter::new(params.clone())),
        &params,
        &stop,
    )
    .unwrap();
    assert_eq!(first[0], ensemble);

    let second = parallel_chains(&graph, &partition, writers(3), &params, &stop).unwrap();
    assert_eq!(first, second);
}
