//! # vegtrend Parallel
//!
//! Bounded worker pool for per-scene processing.
//!
//! Each scene is an independent item; [`ProcessingMode::par_map`] runs a
//! function over all of them and returns every result in input order
//! (collect-then-merge). [`ProcessingMode::Sequential`] is the reference
//! behavior.

pub mod strategy;

pub use strategy::{num_cpus, ParallelError, ParallelStrategy, ProcessingMode};
