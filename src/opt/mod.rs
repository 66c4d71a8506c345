//! Sequence optimisers: searching the space of elimination orders.

pub mod bnb;

pub use bnb::{solve, SearchStats};
