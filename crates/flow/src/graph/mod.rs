//! Status graph
//!
//! Nodes live in an arena owned by [`Flow`] and are addressed by
//! [`NodeIndex`]. Status changes propagate from a node to its outputs.

mod flow;
mod node;
mod status;

pub use flow::{Flow, FlowError};
pub use node::{Node, NodeIndex};
pub use status::NodeStatus;
