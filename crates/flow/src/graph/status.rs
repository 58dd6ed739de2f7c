//! Node status

use serde::{Deserialize, Serialize};

/// Status of a node in a [`Flow`](super::Flow)
///
/// ```text
/// Inactive ──▶ Active ──▶ Succeeded | Failed | Canceled
/// ```
///
/// The three terminal values are "done"; done is final.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Inactive,
    Active,
    Succeeded,
    Failed,
    Canceled,
}

impl NodeStatus {
    /// Whether the node reached a terminal status
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}
