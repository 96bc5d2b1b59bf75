//! Loop node identifiers and routing.

use std::fmt;

use tinker_types::agent_loop::{LoopPhase, LoopState};

/// A node of the reasoning loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopNode {
    Think,
    Act,
    Observe,
    Decide,
    End,
}

impl fmt::Display for LoopNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopNode::Think => write!(f, "think"),
            LoopNode::Act => write!(f, "act"),
            LoopNode::Observe => write!(f, "observe"),
            LoopNode::Decide => write!(f, "decide"),
            LoopNode::End => write!(f, "end"),
        }
    }
}

pub fn node_for_phase(phase: LoopPhase) -> LoopNode {
    match phase {
        LoopPhase::Think => LoopNode::Think,
        LoopPhase::Act => LoopNode::Act,
        LoopPhase::Observe => LoopNode::Observe,
        LoopPhase::Decide => LoopNode::Decide,
    }
}

/// Conditional edge after decide.
pub fn select_after_decide(state: &LoopState) -> LoopNode {
    if state.should_continue {
        LoopNode::Think
    } else {
        LoopNode::End
    }
}

/// The node that follows `node` once it has run on `state`.
///
/// Phases record where they hand over, so this mostly follows `state.phase`;
/// a think that reaches the goal hands straight to decide.
pub fn successor(node: LoopNode, state: &LoopState) -> LoopNode {
    match node {
        LoopNode::Decide => select_after_decide(state),
        LoopNode::End => LoopNode::End,
        LoopNode::Think | LoopNode::Act | LoopNode::Observe => node_for_phase(state.phase),
    }
}

/// Where a persisted loop re-enters the graph.
pub fn entry_node(state: &LoopState) -> LoopNode {
    if state.is_finished() {
        LoopNode::End
    } else {
        node_for_phase(state.phase)
    }
}
