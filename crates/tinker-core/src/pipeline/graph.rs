//! Pipeline node identifiers and routing.
//!
//! Every transition is a pure function of the state, so routing is tested
//! without running any node.

use std::fmt;

use tinker_types::task::{ResumptionMarker, TaskState};

/// A node of the task pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineNode {
    Analyze,
    Execute,
    Complete,
    End,
}

impl fmt::Display for PipelineNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineNode::Analyze => write!(f, "analyze"),
            PipelineNode::Execute => write!(f, "execute"),
            PipelineNode::Complete => write!(f, "complete"),
            PipelineNode::End => write!(f, "end"),
        }
    }
}

/// Conditional edge after analysis: execute only when there is work planned.
pub fn select_next(state: &TaskState) -> PipelineNode {
    if state.planned_actions.is_empty() {
        PipelineNode::Complete
    } else {
        PipelineNode::Execute
    }
}

/// Where a (possibly resumed) state re-enters the graph.
///
/// Never returns `Analyze` once a step has been recorded, so a resumed run
/// neither re-plans nor re-runs executed actions.
pub fn entry_node(state: &TaskState) -> PipelineNode {
    match &state.resumption_marker {
        None => PipelineNode::Analyze,
        Some(ResumptionMarker::TaskAnalyzed) => select_next(state),
        Some(ResumptionMarker::ToolsExecuted) => PipelineNode::Complete,
        Some(ResumptionMarker::Completed) | Some(ResumptionMarker::Error(_)) => PipelineNode::End,
    }
}

/// The node that follows `node` once it has run on `state`.
pub fn successor(node: PipelineNode, state: &TaskState) -> PipelineNode {
    match node {
        PipelineNode::Analyze => select_next(state),
        PipelineNode::Execute => PipelineNode::Complete,
        PipelineNode::Complete | PipelineNode::End => PipelineNode::End,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinker_types::task::PlannedAction;

    #[test]
    fn select_next_depends_only_on_plan() {
        let mut state = TaskState::new("t", "x");
        assert_eq!(select_next(&state), PipelineNode::Complete);

        state.planned_actions.push(PlannedAction::shell("ls"));
        assert_eq!(select_next(&state), PipelineNode::Execute);

        state.planned_actions.push(PlannedAction::noop("nothing"));
        assert_eq!(select_next(&state), PipelineNode::Execute);
    }

    #[test]
    fn entry_node_follows_marker() {
        let mut state = TaskState::new("t", "x");
        assert_eq!(entry_node(&state), PipelineNode::Analyze);

        state.resumption_marker = Some(ResumptionMarker::TaskAnalyzed);
        assert_eq!(entry_node(&state), PipelineNode::Complete);
        state.planned_actions.push(PlannedAction::shell("ls"));
        assert_eq!(entry_node(&state), PipelineNode::Execute);

        state.resumption_marker = Some(ResumptionMarker::ToolsExecuted);
        assert_eq!(entry_node(&state), PipelineNode::Complete);

        state.resumption_marker = Some(ResumptionMarker::Completed);
        assert_eq!(entry_node(&state), PipelineNode::End);

        state.resumption_marker = Some(ResumptionMarker::Error("disk full".into()));
        assert_eq!(entry_node(&state), PipelineNode::End);
    }

    #[test]
    fn successor_chain() {
        let state = TaskState::new("t", "x");
        assert_eq!(successor(PipelineNode::Analyze, &state), PipelineNode::Complete);
        assert_eq!(successor(PipelineNode::Execute, &state), PipelineNode::Complete);
        assert_eq!(successor(PipelineNode::Complete, &state), PipelineNode::End);
        assert_eq!(successor(PipelineNode::End, &state), PipelineNode::End);
    }
}
