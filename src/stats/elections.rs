//! Election statistics: district winners, wasted votes, efficiency gap.
//!
//! Votes are precinct counts, not raw tallies: the source data records a
//! single winning party per precinct, so each precinct contributes one vote
//! to its district's total.
use crate::graph::{Graph, Party};
use crate::partition::Partition;
use serde::Serialize;

/// Precinct-vote counts for one district.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DistrictTally {
    /// Precincts carried by party D.
    pub dem: u32,
    /// Precincts carried by party R.
    pub rep: u32,
}

impl DistrictTally {
    /// Total votes (precincts) cast in the district.
    pub fn total(&self) -> u32 {
        self.dem + self.rep
    }

    /// The party with a strict majority of the district's precinct votes.
    ///
    /// An exact tie has no winner: the district is excluded from
    /// won-district counts and records no wasted votes.
    pub fn winner(&self) -> Option<Party> {
        if self.dem > self.rep {
            Some(Party::D)
        } else if self.rep > self.dem {
            Some(Party::R)
        } else {
            None
        }
    }

    /// Wasted votes per party: all of the losing side's votes, and the
    /// winning side's votes beyond the minimum needed to win
    /// (⌈total / 2⌉ under a two-party plurality).
    ///
    /// Returns `(dem_wasted, rep_wasted)`, or `None` for a tied district.
    pub fn wasted_votes(&self) -> Option<(u32, u32)> {
        let votes_to_win = (self.total() + 1) / 2;
        match self.winner()? {
            Party::D => Some((self.dem - votes_to_win, self.rep)),
            Party::R => Some((self.dem, self.rep - votes_to_win)),
        }
    }

    /// The district's signed efficiency gap:
    /// (losing-side wasted − winning-side wasted) / total votes cast.
    /// Always in [−1, 1]. `None` for a tied or empty district.
    pub fn efficiency_gap(&self) -> Option<f64> {
        let (dem_wasted, rep_wasted) = self.wasted_votes()?;
        let (winner_wasted, loser_wasted) = match self.winner()? {
            Party::D => (dem_wasted, rep_wasted),
            Party::R => (rep_wasted, dem_wasted),
        };
        Some((loser_wasted as f64 - winner_wasted as f64) / self.total() as f64)
    }
}

/// Counts precinct votes per district.
pub fn district_tallies(graph: &Graph, partition: &Partition) -> Vec<DistrictTally> {
    let mut tallies = vec![DistrictTally::default(); partition.num_dists as usize];
    for (node, &dist) in partition.assignments.iter().enumerate() {
        match graph.votes[node] {
            Party::D => tallies[dist as usize].dem += 1,
            Party::R => tallies[dist as usize].rep += 1,
        }
    }
    tallies
}

/// The statistic bundle recorded for each plan in an ensemble.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlanScores {
    /// Plan-level efficiency gap: |Σ D wasted − Σ R wasted| / total
    /// precincts, with tied districts contributing no wasted votes.
    pub efficiency_gap: f64,
    /// Per-district signed efficiency gaps (`None` marks a tied district).
    pub district_gaps: Vec<Option<f64>>,
    /// Districts won by party D.
    pub dem_districts: u32,
    /// Districts won by party R.
    pub rep_districts: u32,
}

/// Computes the statistic bundle for a plan.
///
/// This is a pure function of the frozen plan state: computing it twice on
/// the same plan yields identical results.
pub fn plan_scores(graph: &Graph, partition: &Partition) -> PlanScores {
    let tallies = district_tallies(graph, partition);
    let mut dem_wasted: u64 = 0;
    let mut rep_wasted: u64 = 0;
    let mut dem_districts = 0;
    let mut rep_districts = 0;
    let mut district_gaps = Vec::with_capacity(tallies.len());
    for tally in tallies.iter() {
        if let Some((d, r)) = tally.wasted_votes() {
            dem_wasted += d as u64;
            rep_wasted += r as u64;
        }
        match tally.winner() {
            Some(Party::D) => dem_districts += 1,
            Some(Party::R) => rep_districts += 1,
            None => {}
        }
        district_gaps.push(tally.efficiency_gap());
    }
    let total_votes = graph.votes.len() as f64;
    let gap_spread = (dem_wasted as f64 - rep_wasted as f64).abs();
    PlanScores {
        efficiency_gap: if total_votes > 0.0 {
            gap_spread / total_votes
        } else {
            0.0
        },
        district_gaps: district_gaps,
        dem_districts: dem_districts,
        rep_districts: rep_districts,
    }
}
