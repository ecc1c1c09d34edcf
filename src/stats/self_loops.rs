//! Chain self-loop statistics.
use serde::Serialize;

/// Self-loop statistics since the last accepted proposal.
///
/// A self-loop is a chain step that leaves the plan unchanged because the
/// sampled spanning tree admitted no ε-balanced cut. (Pair selection cannot
/// self-loop: pairs are drawn from the adjacency set directly.)
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SelfLoopCounts {
    /// Steps rejected for lack of an ε-balanced split.
    pub no_split: usize,
}

impl SelfLoopCounts {
    /// Increments the no-split self-loop count.
    pub fn inc_no_split(&mut self) {
        self.no_split += 1;
    }

    /// Returns the total self-loop count.
    pub fn sum(&self) -> usize {
        self.no_split
    }
}
