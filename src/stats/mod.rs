//! Statistics for districting plans and chain runs.

/// Election statistics (winners, wasted votes, efficiency gap).
mod elections;
/// Ensembles of plan scores.
mod ensemble;
/// Markov chain self-loop statistics.
mod self_loops;
/// I/O for statistics.
mod writers;

pub use crate::stats::elections::{district_tallies, plan_scores, DistrictTally, PlanScores};
pub use crate::stats::ensemble::Ensemble;
pub use crate::stats::self_loops::SelfLoopCounts;
pub use crate::stats::writers::{JsonlWriter, NullWriter, StatsWriter, TsvWriter};
