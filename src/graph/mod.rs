//! Task-scoped graph bookkeeping

pub mod accumulator;

pub use accumulator::{FunctionMetrics, GraphAccumulator};
