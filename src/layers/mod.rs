//! In-process generation layers.
//!
//! Only the two cheap layers live in this crate: [`DirectLayer`] (platform
//! metadata mapping) and [`HeuristicLayer`] (README/document heuristics).
//! NLP and LLM layers are external collaborators plugged in through
//! [`GenerationLayer`](crate::contract::GenerationLayer).

pub mod direct;
pub mod heuristic;

pub use direct::DirectLayer;
pub use heuristic::HeuristicLayer;
