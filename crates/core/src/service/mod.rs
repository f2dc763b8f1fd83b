//! Services orchestrating storage and the topology engine.

mod line;
mod station;

pub use line::LineService;
pub use station::StationService;

use crate::topology::TraversalPolicy;

/// Behaviour switches for [`LineService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Reject a new line whose name or colour is already used.
    pub enforce_line_uniqueness: bool,
    /// How reads treat sections unreachable from the head station.
    pub traversal: TraversalPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enforce_line_uniqueness: true,
            traversal: TraversalPolicy::Strict,
        }
    }
}
