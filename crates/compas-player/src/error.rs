//! Player configuration errors.
//!
//! Only configuration-time operations return these; runtime triggers
//! surface their failures as `Aerror` events in the event stream and
//! never abort rendering.

use thiserror::Error;

use compas_module::ModuleError;

/// Errors from player configuration and plan building.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// An argument was outside its valid range.
    #[error("invalid argument: {0}")]
    BadArgument(String),

    /// The module description is inconsistent.
    #[error("module error: {0}")]
    Module(#[from] ModuleError),

    /// A connection graph contains a true cycle.
    #[error("connection graph of {context} contains a cycle")]
    GraphCycle {
        /// Which graph failed to order.
        context: String,
    },

    /// A reservation exceeded an engine limit.
    #[error("{what} of {size} exceeds limit {limit}")]
    ReservationTooLarge {
        /// What was being reserved.
        what: &'static str,
        /// Requested size.
        size: usize,
        /// The limit.
        limit: usize,
    },

    /// Worker thread setup failed; the player fell back to one thread.
    #[error("thread setup failed: {0}")]
    ThreadSetup(String),

    /// An externally fired event could not be parsed.
    #[error("event parse error: {0}")]
    EventParse(String),
}
