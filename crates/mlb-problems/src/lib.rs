//! # mlb-problems
//!
//! Problem definitions shipped with MLBench. Each one implements
//! [`mlb_types::Problem`] and is built from a resolved [`mlb_types::ProblemConfig`].

mod circuit;
mod expression;
mod function;

pub use circuit::{Circuit, Distance, MAX_COMPONENTS, PITCH};
pub use expression::{CompiledExpression, MAX_NESTING};
pub use function::{Function, MAX_DIMENSION};
