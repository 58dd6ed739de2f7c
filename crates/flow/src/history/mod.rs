//! Execution history as delivered by the coordination service
//!
//! - [`HistoryEvent`] one ordered, immutable fact about an execution
//! - [`EventAttributes`] the type-specific payload, tagged by event type
//! - [`EventType`] the bare tag, used for filtering

mod event;

pub use event::{EventAttributes, EventType, HistoryEvent, TimeoutType};
