//! Bounded task pipeline: analyze -> (execute) -> complete.
//!
//! - [`graph`]: node identifiers and the pure routing functions
//! - [`nodes`]: the node bodies, which consult the oracle and executor
//! - [`runner`]: drives the graph, checkpointing after every node

pub mod graph;
pub mod nodes;
pub mod runner;

pub use graph::{entry_node, select_next, successor, PipelineNode};
pub use nodes::TaskPipeline;
pub use runner::TaskRunner;
