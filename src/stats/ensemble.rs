//! Ensembles of plan scores.
use crate::stats::PlanScores;
use serde::Serialize;

/// An ordered, append-only collection of plan scores sampled from a chain,
/// together with the scores of the original (observed) plan.
///
/// The size is bounded by the configured round count; a chain interrupted
/// early yields a shorter ensemble.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ensemble {
    /// Scores of the plan the chain started from.
    pub original: PlanScores,
    /// Scores of the sampled plans, in chain order.
    pub scores: Vec<PlanScores>,
}

impl Ensemble {
    /// Creates an empty ensemble for a chain started from a plan with
    /// scores `original`.
    pub fn new(original: PlanScores) -> Ensemble {
        Ensemble {
            original: original,
            scores: Vec::new(),
        }
    }

    /// Appends one sampled plan's scores.
    pub fn push(&mut self, scores: PlanScores) {
        self.scores.push(scores);
    }

    /// The number of sampled plans.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether any plans have been sampled.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// The sampled plan-level efficiency gaps, in chain order.
    pub fn efficiency_gaps(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.efficiency_gap).collect()
    }

    /// The sampled D-won district counts, in chain order.
    pub fn dem_district_counts(&self) -> Vec<u32> {
        self.scores.iter().map(|s| s.dem_districts).collect()
    }

    /// The sampled R-won district counts, in chain order.
    pub fn rep_district_counts(&self) -> Vec<u32> {
        self.scores.iter().map(|s| s.rep_districts).collect()
    }

    /// The share of sampled plans whose `stat` is strictly below the
    /// original plan's, or `None` for an empty ensemble.
    ///
    /// A share near 0 or 1 marks the original plan as an outlier for
    /// that statistic.
    pub fn rank_of_original<F>(&self, stat: F) -> Option<f64>
    where
        F: Fn(&PlanScores) -> f64,
    {
        if self.scores.is_empty() {
            return None;
        }
        let original = stat(&self.original);
        let below = self.scores.iter().filter(|s| stat(s) < original).count();
        Some(below as f64 / self.scores.len() as f64)
    }
}
