//! Request-scoped streaming phase.

/// Where a streaming response currently is.
///
/// ```text
/// Reasoning ──signal──▶ Summarizing ──signal──▶ Summarizing
///     │                      │
///     ├── end ──▶ Done       ├── end ──▶ Done
///     └── error ─▶ Failed    └── error ─▶ Failed
/// ```
///
/// `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamPhase {
    /// The agent is still working; tool markers and text pass through.
    #[default]
    Reasoning,
    /// The phase-transition tool was seen; the summary is being written.
    Summarizing,
    /// The event sequence ended normally.
    Done,
    /// The agent failed.
    Failed,
}

impl StreamPhase {
    /// Enter `Summarizing`. Returns true only on the actual transition.
    pub fn begin_summary(&mut self) -> bool {
        if *self == Self::Reasoning {
            *self = Self::Summarizing;
            true
        } else {
            false
        }
    }

    /// Normal end of the sequence.
    pub fn finish(&mut self) {
        if !self.is_terminal() {
            *self = Self::Done;
        }
    }

    /// Agent failure.
    pub fn fail(&mut self) {
        if !self.is_terminal() {
            *self = Self::Failed;
        }
    }

    /// True for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}
