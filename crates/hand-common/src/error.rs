use thiserror::Error;

/// Controller error types covering configuration, collaborator, and platform failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HandError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Task registry cardinality does not match the configured slot count.
    #[error("task registry has {actual} entries but the cycle is split into {expected} slots")]
    SlotCountMismatch {
        /// Configured number of task slots.
        expected: usize,
        /// Number of registry entries supplied.
        actual: usize,
    },

    /// Cycle cannot be divided into whole-microsecond slots of at least 1us.
    #[error("invalid cycle: {cycle_length_ms}ms cannot be split into {task_slot_count} slots")]
    InvalidCycle {
        /// Configured cycle length in milliseconds.
        cycle_length_ms: u32,
        /// Configured number of task slots.
        task_slot_count: u32,
    },

    /// A collaborator failed to initialize.
    #[error("collaborator {name} failed to initialize: {reason}")]
    Collaborator {
        /// Collaborator name.
        name: String,
        /// Failure description.
        reason: String,
    },

    /// Real-time environment setup failed.
    #[error("real-time setup failed: {0}")]
    Realtime(String),

    /// Invalid lifecycle state transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

/// Convenience type alias for controller operations.
pub type HandResult<T> = Result<T, HandError>;
