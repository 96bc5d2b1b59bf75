//! Open-ended think -> act -> observe -> decide loop.
//!
//! Shares the pipeline's invariants: state is checkpointed after every phase,
//! oracle and executor failures are surfaced in the transcript but never end
//! the loop, and the only expected ways out are data (`ExitReason`).

pub mod graph;
pub mod phases;
pub mod runner;

pub use graph::{entry_node, node_for_phase, select_after_decide, successor, LoopNode};
pub use phases::LoopAgent;
pub use runner::LoopRunner;
