//! Library definition for planchain.
//!
//! planchain generates ensembles of population-balanced districting plans
//! with the ReCom (recombination) Markov chain and scores each plan
//! (efficiency gap, districts won per party) so that an observed plan can
//! be compared against the ensemble distribution.
pub mod buffers;
pub mod error;
pub mod graph;
pub mod init;
pub mod partition;
pub mod recom;
pub mod spanning_tree;
pub mod stats;
