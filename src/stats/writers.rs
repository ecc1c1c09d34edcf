//! Streaming I/O for chain statistics.
use crate::graph::Graph;
use crate::partition::Partition;
use crate::recom::RecomProposal;
use crate::stats::{PlanScores, SelfLoopCounts};
use serde_json::{json, to_value};
use std::io::Result;

/// A standard interface for streaming steps and statistics to stdout.
///
/// The runner calls `init` once with the starting plan, `step` after every
/// accepted proposal (self-loops are folded into `counts`), and `close`
/// when the chain finishes.
pub trait StatsWriter: Send {
    /// Writes data from the initial partition.
    fn init(&mut self, graph: &Graph, partition: &Partition, scores: &PlanScores) -> Result<()>;

    /// Writes data for an accepted proposal which has been applied
    /// to `partition`.
    fn step(
        &mut self,
        step: u64,
        graph: &Graph,
        partition: &Partition,
        proposal: &RecomProposal,
        scores: &PlanScores,
        counts: &SelfLoopCounts,
    ) -> Result<()>;

    /// Cleans up after the last step (useful for testing).
    fn close(&mut self) -> Result<()>;
}

/// Writes chain statistics in TSV (tab-separated values) format.
/// Each accepted step is a line; no statistics are saved about the
/// initial partition.
///
/// Rows in the output contain the following columns:
///   * `step` - The step count at the accepted proposal (including
///     self-loops).
///   * `no_split` - The number of self-loops since the last accepted
///     proposal.
///   * `a_label` / `b_label` - The labels of the districts in the proposal.
///   * `a_pop` / `b_pop` - The populations of the new districts.
///   * `efficiency_gap` - The plan-level efficiency gap after the step.
///   * `dem_districts` / `rep_districts` - Districts won per party.
pub struct TsvWriter {}

impl TsvWriter {
    pub fn new() -> TsvWriter {
        TsvWriter {}
    }
}

impl StatsWriter for TsvWriter {
    fn init(&mut self, _graph: &Graph, _partition: &Partition, _scores: &PlanScores) -> Result<()> {
        print!("step\tno_split\ta_label\tb_label\ta_pop\tb_pop\t");
        println!("efficiency_gap\tdem_districts\trep_districts");
        Ok(())
    }

    fn step(
        &mut self,
        step: u64,
        _graph: &Graph,
        _partition: &Partition,
        proposal: &RecomProposal,
        scores: &PlanScores,
        counts: &SelfLoopCounts,
    ) -> Result<()> {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            step,
            counts.no_split,
            proposal.a_label,
            proposal.b_label,
            proposal.a_pop,
            proposal.b_pop,
            scores.efficiency_gap,
            scores.dem_districts,
            scores.rep_districts
        );
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes statistics in JSONL (JSON Lines) format: one `{"init": …}` line
/// for the starting plan, then one `{"step": …}` line per accepted step.
pub struct JsonlWriter {
    /// Determines whether node deltas should be saved for each step.
    nodes: bool,
}

impl JsonlWriter {
    pub fn new(nodes: bool) -> JsonlWriter {
        JsonlWriter { nodes: nodes }
    }
}

impl StatsWriter for JsonlWriter {
    fn init(&mut self, _graph: &Graph, partition: &Partition, scores: &PlanScores) -> Result<()> {
        let stats = json!({
            "num_dists": partition.num_dists,
            "populations": partition.dist_pops,
            "scores": to_value(scores).unwrap(),
        });
        println!("{}", json!({ "init": stats }).to_string());
        Ok(())
    }

    fn step(
        &mut self,
        step: u64,
        _graph: &Graph,
        _partition: &Partition,
        proposal: &RecomProposal,
        scores: &PlanScores,
        counts: &SelfLoopCounts,
    ) -> Result<()> {
        let mut stats = json!({
            "step": step,
            "dists": (proposal.a_label, proposal.b_label),
            "populations": (proposal.a_pop, proposal.b_pop),
            "counts": to_value(counts).unwrap(),
            "scores": to_value(scores).unwrap(),
        });
        if self.nodes {
            stats.as_object_mut().unwrap().insert(
                "nodes".to_string(),
                json!((proposal.a_nodes.clone(), proposal.b_nodes.clone())),
            );
        }
        println!("{}", json!({ "step": stats }).to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A writer that discards everything. Used by benchmarks and by parallel
/// chain runs where interleaved stdout would be unreadable.
#[derive(Default)]
pub struct NullWriter {}

impl NullWriter {
    pub fn new() -> NullWriter {
        NullWriter {}
    }
}

impl StatsWriter for NullWriter {
    fn init(&mut self, _graph: &Graph, _partition: &Partition, _scores: &PlanScores) -> Result<()> {
        Ok(())
    }

    fn step(
        &mut self,
        _step: u64,
        _graph: &Graph,
        _partition: &Partition,
        _proposal: &RecomProposal,
        _scores: &PlanScores,
        _counts: &SelfLoopCounts,
    ) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
