//! Error types for the Cityscape engine
//!
//! Most failures in the streaming core are recoverable: the operation is
//! logged at the point of failure and rejected without side effects, and the
//! caller decides whether to flush and retry. The variants below carry enough
//! context for that decision.

use std::fmt;

/// Result type for Cityscape engine operations
pub type CityscapeResult<T> = std::result::Result<T, CityscapeError>;

/// Cityscape engine errors
#[derive(Debug, Clone)]
pub enum CityscapeError {
    /// Backend-specific error (device, driver, headless simulation)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, shader, etc.)
    InvalidResource(String),

    /// Initialization failed (device, pool, subsystems)
    InitializationFailed(String),

    /// A write or append did not fit in the remaining capacity
    ///
    /// Nothing was written; flush or swap and retry.
    CapacityExceeded {
        /// Bytes (or elements) the operation needed
        requested: u64,
        /// Bytes (or elements) still available
        available: u64,
    },

    /// Operation not valid in the resource's current state
    InvalidState(String),

    /// File could not be read or decoded
    LoadFailed(String),

    /// Vertex format outside the recognized set
    UnsupportedVertexFormat(String),
}

impl fmt::Display for CityscapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CityscapeError::BackendError(msg) => write!(f, "Backend error: {}", msg),
            CityscapeError::OutOfMemory => write!(f, "Out of GPU memory"),
            CityscapeError::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            CityscapeError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            CityscapeError::CapacityExceeded { requested, available } => write!(
                f,
                "Capacity exceeded: requested {}, available {}",
                requested, available
            ),
            CityscapeError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            CityscapeError::LoadFailed(msg) => write!(f, "Load failed: {}", msg),
            CityscapeError::UnsupportedVertexFormat(msg) => write!(f, "Unsupported vertex format: {}", msg),
        }
    }
}

impl std::error::Error for CityscapeError {}

// ===== ERROR MACROS =====

/// Log an ERROR and evaluate to a `CityscapeError` carrying the same message
///
/// Builds `BackendError` unless a message-carrying variant is named first.
///
/// # Example
///
/// ```no_run
/// # use cityscape_engine::engine_err;
/// let err = engine_err!("cityscape::Mesh", "Device lost while drawing mesh {}", 3);
/// let misuse = engine_err!(InvalidState => "cityscape::Mesh", "Mesh {} not committed", 3);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($kind:ident => $source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::cityscape::CityscapeError::$kind(message)
    }};
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::cityscape::CityscapeError::BackendError(message)
    }};
}

/// Log an ERROR and return early with the error `engine_err!` builds
///
/// # Example
///
/// ```no_run
/// # use cityscape_engine::engine_bail;
/// fn check(size: u64) -> cityscape_engine::cityscape::CityscapeResult<()> {
///     if size == 0 {
///         engine_bail!(InvalidResource => "cityscape::Buffer", "Buffer size must be non-zero");
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($kind:ident => $source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($kind => $source, $($arg)*))
    };
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
