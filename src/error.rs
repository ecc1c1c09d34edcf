//! Error types for graph loading and chain execution.
use thiserror::Error;

/// Errors raised while building a precinct graph and seed plan from source
/// data. All of these are surfaced before any simulation starts.
#[derive(Debug, Error)]
pub enum MalformedGraphError {
    /// A precinct's adjacency list names an identifier that does not exist.
    #[error("precinct {id:?} lists unknown neighbor {neighbor:?}")]
    UnknownNeighbor { id: String, neighbor: String },
    /// A precinct carries a negative population.
    #[error("precinct {id:?} has negative population {population}")]
    NegativePopulation { id: String, population: i64 },
    /// A precinct's voting history is outside the recognized party set.
    #[error("precinct {id:?} has unrecognized voting history {label:?}")]
    UnknownParty { id: String, label: String },
    /// The graph contains no precincts.
    #[error("graph contains no precincts")]
    Empty,
    /// The assignment vector is empty.
    #[error("empty assignment vector")]
    EmptyAssignments,
    /// Assignment labels must be 1-indexed and consecutive.
    #[error("assignments must be 1-indexed")]
    NotOneIndexed,
    /// The assignment vector does not cover the graph.
    #[error("mismatch: graph has {graph} nodes, assignment vector has {assignments} nodes")]
    NodeCountMismatch { graph: usize, assignments: usize },
    /// A district label in the assignment range has no member precincts.
    #[error("district {district} has no nodes")]
    EmptyDistrict { district: u32 },
    /// An initial district does not induce a connected subgraph.
    #[error("district {district:?} is not contiguous")]
    DiscontiguousDistrict { district: String },
    /// The source data could not be parsed.
    #[error("could not parse graph JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fatal conditions surfaced by a chain run.
///
/// Self-loop retries below the configured bound are recovered locally and
/// reported only through [`crate::stats::SelfLoopCounts`]; everything here
/// aborts the chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The plan has no adjacent district pairs to recombine
    /// (degenerate single-district plan).
    #[error("plan has no adjacent district pairs")]
    NoAdjacentPairs,
    /// No spanning tree admitted a balanced cut within the retry bound.
    /// Usually indicates an over-tight population tolerance or a graph
    /// too small to admit balanced splits.
    #[error("no valid recombination found after {attempts} attempts")]
    NoValidRecombination { attempts: u64 },
    /// A statistics writer failed.
    #[error("failed to write chain statistics")]
    Io(#[from] std::io::Error),
}
