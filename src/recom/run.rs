//! Runners for ReCom chains.
//!
//! A runner orchestrates the components of the ReCom algorithm (pair
//! selection, spanning tree generation, cut search), drives the cooling
//! period and ensemble collection, streams step data to a [StatsWriter],
//! and supports cooperative interruption between macro-steps.
//!
//! A single chain is strictly sequential: every step reads and mutates the
//! shared plan state. [`parallel_chains`] runs several *independent* chains
//! concurrently, each owning a private copy of the graph and plan.
use super::{recom_attempt, RecomParams, RecomProposal, StepBuffers, TreeVariant};
use crate::error::ChainError;
use crate::graph::Graph;
use crate::partition::Partition;
use crate::spanning_tree::{RmstSampler, SpanningTreeSampler, UstSampler};
use crate::stats::{plan_scores, Ensemble, SelfLoopCounts, StatsWriter};
use crossbeam::scope;
use crossbeam_channel::unbounded;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Runs a ReCom chain for `cooling_period + rounds` steps and returns the
/// collected ensemble.
///
/// Accepted proposals and self-loops both count as chain steps; every
/// post-cooling step appends the current plan's scores to the ensemble, so
/// a self-loop contributes the unchanged plan (the correct Markov sample).
/// `rounds = 0` yields an empty ensemble without error, and
/// `cooling_period = 0` makes the very first step's plan eligible.
///
/// The partition is updated in place on every accepted proposal; a step
/// either fully commits or leaves the plan untouched. The runner checks
/// `stop` between macro-steps and returns the partial ensemble when it is
/// set, so a caller can interrupt a long run without corrupting the plan.
///
/// # Errors
///
/// * [`ChainError::NoAdjacentPairs`] on a single-district plan.
/// * [`ChainError::NoValidRecombination`] after `params.max_retries`
///   consecutive self-loops.
/// * [`ChainError::Io`] if the writer fails.
pub fn run_chain(
    graph: &Graph,
    partition: &mut Partition,
    mut writer: Box<dyn StatsWriter>,
    params: &RecomParams,
    stop: &AtomicBool,
) -> Result<Ensemble, ChainError> {
    let mut rng: SmallRng = SeedableRng::seed_from_u64(params.rng_seed);
    let mut bufs = StepBuffers::new(graph, partition, params);
    let node_ub = bufs.node_ub;
    let mut proposal = RecomProposal::new_buffer(node_ub);
    let mut sampler: Box<dyn SpanningTreeSampler> = match params.variant {
        TreeVariant::Ust => Box::new(UstSampler::new(node_ub, &mut rng)),
        TreeVariant::Rmst => Box::new(RmstSampler::new(node_ub)),
    };

    if let Some(&worst) = partition
        .dist_pops
        .iter()
        .find(|&&pop| pop < params.min_pop || pop > params.max_pop)
    {
        warn!(
            worst,
            min_pop = params.min_pop,
            max_pop = params.max_pop,
            "initial plan is outside the population band; the chain can only move toward balance"
        );
    }

    let original = plan_scores(graph, partition);
    writer.init(graph, partition, &original)?;
    let mut ensemble = Ensemble::new(original);

    let total_steps = params.cooling_period + params.rounds;
    let mut step: u64 = 0;
    let mut accepted: u64 = 0;
    let mut counts = SelfLoopCounts::default();
    let mut failures: u64 = 0;
    while step < total_steps {
        if stop.load(Ordering::Relaxed) {
            info!(step, "chain interrupted; returning partial ensemble");
            break;
        }
        let found = recom_attempt(
            graph,
            partition,
            params,
            &mut bufs,
            sampler.as_mut(),
            &mut proposal,
            &mut rng,
        )?;
        step += 1;
        if found {
            partition.update(graph, &proposal);
            accepted += 1;
            failures = 0;
            let scores = plan_scores(graph, partition);
            writer.step(step, graph, partition, &proposal, &scores, &counts)?;
            counts = SelfLoopCounts::default();
            if step > params.cooling_period {
                ensemble.push(scores);
            }
        } else {
            counts.inc_no_split();
            failures += 1;
            if failures >= params.max_retries {
                return Err(ChainError::NoValidRecombination { attempts: failures });
            }
            if step > params.cooling_period {
                ensemble.push(plan_scores(graph, partition));
            }
        }
    }
    writer.close()?;
    debug!(
        steps = step,
        accepted,
        self_loops = step - accepted,
        recorded = ensemble.len(),
        "chain finished"
    );
    Ok(ensemble)
}

/// Runs `writers.len()` independent ReCom chains concurrently and returns
/// their ensembles in chain order.
///
/// Chain `i` runs with seed `params.rng_seed + i` on a private copy of the
/// graph and starting plan; chains never communicate. The first chain error
/// (by chain index) is surfaced if any chain fails.
pub fn parallel_chains(
    graph: &Graph,
    partition: &Partition,
    writers: Vec<Box<dyn StatsWriter>>,
    params: &RecomParams,
    stop: &AtomicBool,
) -> Result<Vec<Ensemble>, ChainError> {
    let n_chains = writers.len();
    let (result_send, result_recv) = unbounded();
    scope(|scope| {
        for (index, writer) in writers.into_iter().enumerate() {
            let sender = result_send.clone();
            let graph = graph.clone();
            let mut partition = partition.clone();
            let chain_params = RecomParams {
                rng_seed: params.rng_seed + index as u64,
                ..params.clone()
            };
            scope.spawn(move |_| {
                let result = run_chain(&graph, &mut partition, writer, &chain_params, stop);
                sender.send((index, result)).unwrap();
            });
        }
        drop(result_send);

        let mut results: Vec<Option<Result<Ensemble, ChainError>>> =
            (0..n_chains).map(|_| None).collect();
        for (index, result) in result_recv.iter() {
            results[index] = Some(result);
        }
        let mut ensembles = Vec::with_capacity(n_chains);
        for result in results {
            ensembles.push(result.expect("every chain reports exactly once")?);
        }
        Ok(ensembles)
    })
    .unwrap()
}
