//! Error types for the tracking engine.

use thiserror::Error;

/// Stage of a tracking call in which an assignment problem was solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FrameToFrame,
    Split,
    Merge,
    GapClosing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::FrameToFrame => "frame-to-frame",
            Stage::Split => "split",
            Stage::Merge => "merge",
            Stage::GapClosing => "gap-closing",
        };
        f.write_str(name)
    }
}

/// Fatal errors of a tracking call. No partial lineage is returned alongside.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    /// The assignment solver found no valid matching.
    #[error("infeasible assignment during {stage} linking: {message}")]
    InfeasibleAssignment { stage: Stage, message: String },

    /// The accepted edges do not form a frame-monotonic lineage.
    #[error("corrupt lineage: {0}")]
    CorruptLineage(String),

    #[error("invalid tracker configuration: {0}")]
    InvalidConfig(String),
}

impl TrackingError {
    pub(crate) fn infeasible(stage: Stage, message: impl Into<String>) -> Self {
        Self::InfeasibleAssignment {
            stage,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackingError>;
