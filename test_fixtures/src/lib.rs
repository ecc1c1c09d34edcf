//! Graph/initial partition fixtures for chain tests and benchmarks.
use planchain::graph::{Edge, Graph, Party};
use planchain::init::from_precinct_json;
use planchain::partition::Partition;
use std::path::PathBuf;

/// A 4-precinct cycle P1–P2–P3–P4–P1 with equal populations of 10,
/// split into districts {P1, P2} and {P3, P4}.
pub fn four_cycle() -> (Graph, Partition) {
    let graph = Graph {
        edges: vec![Edge(0, 1), Edge(0, 3), Edge(1, 2), Edge(2, 3)],
        pops: vec![10; 4],
        votes: vec![Party::D, Party::R, Party::D, Party::R],
        keys: vec!["P1", "P2", "P3", "P4"]
            .into_iter()
            .map(String::from)
            .collect(),
        neighbors: vec![vec![1, 3], vec![0, 2], vec![1, 3], vec![0, 2]],
        total_pop: 40,
    };
    let partition = Partition::from_assignments(&graph, &[1, 1, 2, 2]).unwrap();
    (graph, partition)
}

/// A `width` x `height` rook grid with unit populations, split into
/// `dists` vertical stripes. `width` must be divisible by `dists`.
pub fn striped_grid(width: usize, height: usize, dists: u32) -> (Graph, Partition) {
    assert!(width % dists as usize == 0);
    let graph = Graph::rect_grid(width, height);
    let stripe = width / dists as usize;
    let assignments: Vec<u32> = (0..width * height)
        .map(|node| ((node % width) / stripe) as u32 + 1)
        .collect();
    let partition = Partition::from_assignments(&graph, &assignments).unwrap();
    (graph, partition)
}

/// Loads the bundled example plan (16 precincts, 4 districts).
pub fn example_fixture() -> (Graph, Partition, Vec<String>) {
    // stable dir: resolve relative to this crate's manifest.
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("..");
    path.push("data");
    path.push("example.json");
    let path_str = path.into_os_string().into_string().unwrap();
    from_precinct_json(&path_str).unwrap()
}
