//! Pre-graph simplification
//!
//! This module implements the simplification pipeline:
//! 1. Clip short dead-end tips off branch points, repeating until stable
//! 2. Contract every singleton chain into a single node
//! 3. Renumber node IDs into a dense range
//!
//! Each step runs either sequentially or on a rayon thread pool. The
//! parallel contraction coordinates workers through a [`claims::ClaimTable`]
//! and a graph-wide `parking_lot::RwLock`.

pub mod claims;
pub mod clip_tips;
pub mod concatenate;
pub mod config;
pub mod simplifier;

pub use clip_tips::{clip_tips, clip_tips_parallel, clip_tips_with_cutoff, is_eligible_tip, ClipReport};
pub use concatenate::{concatenate_pregraph, concatenate_pregraph_parallel, ConcatenationReport};
pub use config::SimplifyConfiguration;
pub use simplifier::{SimplifyReport, Simplifier};
