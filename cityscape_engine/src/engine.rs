/// Cityscape Engine - process-wide logging facade
///
/// The engine keeps exactly one piece of global state: the active logger and
/// its severity threshold. GPU resources are never global; they live in an
/// explicitly owned [`ResourcePool`](crate::resource::ResourcePool) and in the
/// objects that created them.

use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};

// ===== INTERNAL STATE =====

/// Active logger and minimum severity
struct LoggerState {
    logger: Box<dyn Logger>,
    min_severity: LogSeverity,
}

/// Global logger (initialized with DefaultLogger, Info threshold)
static LOGGER: OnceLock<RwLock<LoggerState>> = OnceLock::new();

fn logger_state() -> &'static RwLock<LoggerState> {
    LOGGER.get_or_init(|| {
        RwLock::new(LoggerState {
            logger: Box::new(DefaultLogger),
            min_severity: LogSeverity::Info,
        })
    })
}

// ===== PUBLIC API =====

/// Engine logging facade
///
/// # Example
///
/// ```no_run
/// use cityscape_engine::cityscape::{Engine, log::{Logger, LogEntry, LogSeverity}};
///
/// struct Silent;
/// impl Logger for Silent {
///     fn log(&self, _entry: &LogEntry) {}
/// }
///
/// Engine::set_logger(Silent);
/// Engine::set_min_severity(LogSeverity::Warn);
/// ```
pub struct Engine;

impl Engine {
    /// Replace the active logger
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        if let Ok(mut state) = logger_state().write() {
            state.logger = Box::new(logger);
        }
    }

    /// Restore the default console logger (threshold is kept)
    pub fn reset_logger() {
        if let Ok(mut state) = logger_state().write() {
            state.logger = Box::new(DefaultLogger);
        }
    }

    /// Drop every entry below `severity`
    pub fn set_min_severity(severity: LogSeverity) {
        if let Ok(mut state) = logger_state().write() {
            state.min_severity = severity;
        }
    }

    /// Current severity threshold
    pub fn min_severity() -> LogSeverity {
        logger_state()
            .read()
            .map(|state| state.min_severity)
            .unwrap_or(LogSeverity::Info)
    }

    /// Log without source location (used by engine_trace! .. engine_warn!)
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        Self::dispatch(severity, source, message, None, None);
    }

    /// Log with file:line (used by engine_error!)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        Self::dispatch(severity, source, message, Some(file), Some(line));
    }

    fn dispatch(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: Option<&'static str>,
        line: Option<u32>,
    ) {
        if let Ok(state) = logger_state().read() {
            if severity < state.min_severity {
                return;
            }
            state.logger.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file,
                line,
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
