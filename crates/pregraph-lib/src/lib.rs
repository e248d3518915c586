// pregraph: pre-graph simplification for de Bruijn assembly
//
// Contracts unbranched chains and clips short tips on a bit-packed,
// double-stranded sequence graph, sequentially or on a rayon pool.

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod constants;
pub mod encoding;
pub mod descriptor;
pub mod node_id;
pub mod pregraph;
pub mod markers;
pub mod simplify;
pub mod synthetic;

// Re-export common types at crate root
pub use descriptor::{Descriptor, DescriptorWriter};
pub use markers::ReferenceMarker;
pub use node_id::NodeId;
pub use pregraph::{ArcId, GraphError, PreGraph, PreNode};
pub use simplify::{
    clip_tips, clip_tips_parallel, concatenate_pregraph, concatenate_pregraph_parallel, ClipReport,
    ConcatenationReport, SimplifyConfiguration, SimplifyReport, Simplifier,
};
pub use synthetic::{SyntheticGraph, SyntheticGraphConfig};

/// Version information
pub fn version() -> (u8, u8, u8) {
    constants::VERSION
}
