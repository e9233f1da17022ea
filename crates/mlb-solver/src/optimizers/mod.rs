//! Optimizer implementations.
//!
//! - [`BruteForce`]: every point of a regular grid over the scope.
//! - [`Permutator`]: every arrangement of distinct values from a shared pool.
//! - [`RandomSampler`]: uniform samples, best one wins.

pub mod exhaustive;
pub mod grid;
pub mod permutator;
pub mod random;

pub use exhaustive::{CandidateSource, ExhaustiveSearch};
pub use grid::{BruteForce, GridCursor};
pub use permutator::{PermutationCursor, Permutator};
pub use random::RandomSampler;
