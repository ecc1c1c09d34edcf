//! Loading precinct graphs and seed plans from the source JSON schema.
//!
//! The schema maps each precinct identifier to an object with fields
//! `adjacent_nodes` (neighbor identifiers; symmetry is not required and is
//! enforced here), `population` (non-negative integer), `voting_history`
//! (a party label), and `district` (the initial assignment).
use crate::error::MalformedGraphError;
use crate::graph::{Edge, Graph, Party};
use crate::partition::Partition;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use tracing::info;

/// A precinct record as it appears in the source schema.
#[derive(Deserialize)]
struct RawPrecinct {
    adjacent_nodes: Vec<String>,
    population: i64,
    voting_history: String,
    district: String,
}

/// Loads a precinct graph and seed plan from a JSON file.
///
/// Returns the graph, the initial partition, and the district names in
/// label order.
pub fn from_precinct_json(path: &str) -> Result<(Graph, Partition, Vec<String>)> {
    let raw = fs::read_to_string(path).with_context(|| format!("could not read graph at {}", path))?;
    let loaded = from_precinct_str(&raw)
        .with_context(|| format!("could not load precinct graph from {}", path))?;
    Ok(loaded)
}

/// Loads a precinct graph and seed plan from a JSON string.
///
/// Precincts are indexed in sorted-identifier order and district labels in
/// sorted-name order, so loading is deterministic. Adjacency lists are
/// symmetrized; duplicate and self references are dropped.
pub fn from_precinct_str(
    raw: &str,
) -> std::result::Result<(Graph, Partition, Vec<String>), MalformedGraphError> {
    let precincts: BTreeMap<String, RawPrecinct> = serde_json::from_str(raw)?;
    if precincts.is_empty() {
        return Err(MalformedGraphError::Empty);
    }
    let num_nodes = precincts.len();
    let index: HashMap<&str, usize> = precincts
        .keys()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();

    let mut pops = Vec::<u32>::with_capacity(num_nodes);
    let mut votes = Vec::<Party>::with_capacity(num_nodes);
    let mut keys = Vec::<String>::with_capacity(num_nodes);
    let mut neighbor_sets = vec![BTreeSet::<usize>::new(); num_nodes];
    let mut district_names = BTreeSet::<String>::new();
    for (node, (id, precinct)) in precincts.iter().enumerate() {
        if precinct.population < 0 {
            return Err(MalformedGraphError::NegativePopulation {
                id: id.clone(),
                population: precinct.population,
            });
        }
        let party = Party::from_label(&precinct.voting_history).ok_or_else(|| {
            MalformedGraphError::UnknownParty {
                id: id.clone(),
                label: precinct.voting_history.clone(),
            }
        })?;
        for neighbor in precinct.adjacent_nodes.iter() {
            let neighbor_node = *index.get(neighbor.as_str()).ok_or_else(|| {
                MalformedGraphError::UnknownNeighbor {
                    id: id.clone(),
                    neighbor: neighbor.clone(),
                }
            })?;
            if neighbor_node != node {
                neighbor_sets[node].insert(neighbor_node);
                neighbor_sets[neighbor_node].insert(node);
            }
        }
        pops.push(precinct.population as u32);
        votes.push(party);
        keys.push(id.clone());
        district_names.insert(precinct.district.clone());
    }

    let mut edges = Vec::<Edge>::new();
    let mut neighbors = Vec::<Vec<usize>>::with_capacity(num_nodes);
    for (node, set) in neighbor_sets.iter().enumerate() {
        neighbors.push(set.iter().cloned().collect());
        for &neighbor in set.iter() {
            if neighbor > node {
                edges.push(Edge(node, neighbor));
            }
        }
    }
    let total_pop = pops.iter().sum();
    let graph = Graph {
        edges: edges,
        pops: pops,
        votes: votes,
        keys: keys,
        neighbors: neighbors,
        total_pop: total_pop,
    };

    let district_names: Vec<String> = district_names.into_iter().collect();
    let district_index: HashMap<&str, u32> = district_names
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx as u32 + 1))
        .collect();
    let assignments: Vec<u32> = precincts
        .values()
        .map(|p| district_index[p.district.as_str()])
        .collect();
    let partition = Partition::from_assignments(&graph, &assignments)?;
    for dist in 0..partition.num_dists {
        if !partition.district_connected(&graph, dist) {
            return Err(MalformedGraphError::DiscontiguousDistrict {
                district: district_names[dist as usize].clone(),
            });
        }
    }
    info!(
        precincts = graph.pops.len(),
        edges = graph.edges.len(),
        districts = partition.num_dists,
        total_pop = graph.total_pop,
        "loaded precinct graph"
    );
    Ok((graph, partition, district_names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// A 2x2 grid of precincts: 01-02 / 03-04, two vertical districts.
    const SQUARE: &str = r#"{
        "01": {"adjacent_nodes": ["02", "03"], "population": 5, "voting_history": "D", "district": "A"},
        "02": {"adjacent_nodes": ["01", "04"], "population": 7, "voting_history": "R", "district": "B"},
        "03": {"adjacent_nodes": ["01", "04"], "population": 6, "voting_history": "D", "district": "A"},
        "04": {"adjacent_nodes": ["02", "03"], "population": 8, "voting_history": "R", "district": "B"}
    }"#;

    #[test]
    fn loads_square() {
        let (graph, partition, names) = from_precinct_str(SQUARE).unwrap();
        assert_eq!(graph.keys, vec!["01", "02", "03", "04"]);
        assert_eq!(graph.pops, vec![5, 7, 6, 8]);
        assert_eq!(graph.total_pop, 26);
        assert_eq!(
            graph.votes,
            vec![Party::D, Party::R, Party::D, Party::R]
        );
        assert_eq!(graph.edges.len(), 4);
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(partition.num_dists, 2);
        assert_eq!(partition.assignments, vec![0, 1, 0, 1]);
        assert_eq!(partition.dist_pops, vec![11, 15]);
    }

    #[test]
    fn symmetrizes_one_sided_adjacency() {
        let raw = r#"{
            "a": {"adjacent_nodes": ["b"], "population": 1, "voting_history": "D", "district": "X"},
            "b": {"adjacent_nodes": [], "population": 1, "voting_history": "R", "district": "Y"}
        }"#;
        let (graph, _, _) = from_precinct_str(raw).unwrap();
        assert_eq!(graph.neighbors[0], vec![1]);
        assert_eq!(graph.neighbors[1], vec![0]);
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn rejects_unknown_neighbor() {
        let raw = r#"{
            "a": {"adjacent_nodes": ["z"], "population": 1, "voting_history": "D", "district": "X"}
        }"#;
        let err = from_precinct_str(raw).unwrap_err();
        assert!(matches!(err, MalformedGraphError::UnknownNeighbor { .. }));
    }

    #[test]
    fn rejects_negative_population() {
        let raw = r#"{
            "a": {"adjacent_nodes": [], "population": -3, "voting_history": "D", "district": "X"}
        }"#;
        let err = from_precinct_str(raw).unwrap_err();
        assert!(matches!(
            err,
            MalformedGraphError::NegativePopulation { population: -3, .. }
        ));
    }

    #[test]
    fn rejects_unknown_party() {
        let raw = r#"{
            "a": {"adjacent_nodes": [], "population": 1, "voting_history": "G", "district": "X"}
        }"#;
        let err = from_precinct_str(raw).unwrap_err();
        assert!(matches!(err, MalformedGraphError::UnknownParty { .. }));
    }

    #[test]
    fn rejects_discontiguous_district() {
        // District X is the two ends of a 3-node path.
        let raw = r#"{
            "a": {"adjacent_nodes": ["b"], "population": 1, "voting_history": "D", "district": "X"},
            "b": {"adjacent_nodes": ["a", "c"], "population": 1, "voting_history": "R", "district": "Y"},
            "c": {"adjacent_nodes": ["b"], "population": 1, "voting_history": "D", "district": "X"}
        }"#;
        let err = from_precinct_str(raw).unwrap_err();
        match err {
            MalformedGraphError::DiscontiguousDistrict { district } => assert_eq!(district, "X"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn rejects_empty_graph() {
        let err = from_precinct_str("{}").unwrap_err();
        assert!(matches!(err, MalformedGraphError::Empty));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SQUARE.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let (graph, partition, _) = from_precinct_json(&path).unwrap();
        assert_eq!(graph.pops.len(), 4);
        assert_eq!(partition.num_dists, 2);
    }
}
