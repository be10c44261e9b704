//! Per-event classification shared by both streaming shapes.

use crate::agent::AgentEvent;
use crate::agent::tools::READY_TO_SUMMARIZE;

use super::phase::StreamPhase;

/// Banner written by the buffered shape at the summary boundary.
pub const SUMMARY_BANNER: &str = "\n\n--- Agent is generating summary ---\n\n";

/// Prefix of the chunk announcing a tool invocation.
pub const TOOL_MARKER_PREFIX: &str = "\n\n🔧 Using tool: ";

/// Text emitted when the phase-transition tool is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMarker {
    /// A single newline (live shape).
    Newline,
    /// [`SUMMARY_BANNER`] (buffered shape).
    Banner,
}

impl SummaryMarker {
    /// The marker text.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newline => "\n",
            Self::Banner => SUMMARY_BANNER,
        }
    }
}

/// Turns agent events into output chunks and tracks the phase.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    phase: StreamPhase,
    marker: SummaryMarker,
}

impl EventClassifier {
    /// Classifier in the `Reasoning` phase.
    #[must_use]
    pub fn new(marker: SummaryMarker) -> Self {
        Self {
            phase: StreamPhase::default(),
            marker,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Chunk for `event`, if any.
    ///
    /// Every signal event yields the summary marker; the phase itself only
    /// moves on the first one. Nothing is emitted once the phase is terminal.
    pub fn classify(&mut self, event: &AgentEvent) -> Option<String> {
        if self.phase.is_terminal() {
            return None;
        }
        match event {
            AgentEvent::ToolUse { tool_name } if tool_name == READY_TO_SUMMARIZE => {
                if self.phase.begin_summary() {
                    tracing::debug!(marker = ?self.marker, "Entering summary phase");
                }
                Some(self.marker.as_str().to_string())
            }
            AgentEvent::ToolUse { tool_name } if !tool_name.is_empty() => {
                Some(format!("{TOOL_MARKER_PREFIX}{tool_name}"))
            }
            AgentEvent::Data { text } => Some(text.clone()),
            AgentEvent::ToolUse { .. } | AgentEvent::Other { .. } => None,
        }
    }

    /// Mark the sequence as ended normally.
    pub fn finish(&mut self) {
        self.phase.finish();
    }

    /// Mark the sequence as failed.
    pub fn fail(&mut self) {
        self.phase.fail();
    }
}
