use thiserror::Error;

/// Error types for the glue around the synchronizer.
///
/// The timestamp synchronizer itself never returns these; its queries are
/// total and degrade precision instead of failing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HubError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Wake lock sysfs node could not be opened or written.
    #[error("wake lock error: {0}")]
    Wakelock(String),

    /// Acquiring would overflow the wake lock reference count.
    #[error("wake lock count overflow: requested {requested}, held {held}")]
    WakelockOverflow {
        /// Count requested by the caller.
        requested: u32,
        /// Count currently held.
        held: u32,
    },

    /// Releasing more references than are held.
    #[error("wake lock over-release: requested {requested}, held {held}")]
    WakelockUnderflow {
        /// Count requested by the caller.
        requested: u32,
        /// Count currently held.
        held: u32,
    },

    /// Worker thread could not be spawned or has already stopped.
    #[error("worker error: {0}")]
    Worker(String),

    /// I/O operation error.
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Convenience type alias for hubclock operations.
pub type HubResult<T> = Result<T, HubError>;
