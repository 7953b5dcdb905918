//! Unit tests for the Engine logging facade
//!
//! The logger is process-wide, so every test is #[serial].

use crate::cityscape::Engine;
use crate::cityscape::log::{Logger, LogEntry, LogSeverity};
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST HELPERS
// ============================================================================

struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

fn capture() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: entries.clone() });
    entries
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        // Other tests log concurrently; keep only this module's entries
        if entry.source == "cityscape::test" {
            self.entries.lock().unwrap().push(entry.clone());
        }
    }
}

fn restore() {
    Engine::set_min_severity(LogSeverity::Info);
    Engine::reset_logger();
}

// ============================================================================
// TESTS
// ============================================================================

#[test]
#[serial]
fn test_custom_logger_receives_entries() {
    let entries = capture();

    Engine::log(LogSeverity::Info, "cityscape::test", "hello".to_string());
    Engine::log(LogSeverity::Warn, "cityscape::test", "careful".to_string());

    {
        let entries = entries.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "hello");
        assert_eq!(entries[1].severity, LogSeverity::Warn);
        assert!(entries[1].file.is_none());
    }
    restore();
}

#[test]
#[serial]
fn test_min_severity_filters_entries() {
    let entries = capture();
    Engine::set_min_severity(LogSeverity::Warn);
    assert_eq!(Engine::min_severity(), LogSeverity::Warn);

    Engine::log(LogSeverity::Debug, "cityscape::test", "dropped".to_string());
    Engine::log(LogSeverity::Info, "cityscape::test", "dropped".to_string());
    Engine::log(LogSeverity::Error, "cityscape::test", "kept".to_string());

    {
        let entries = entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "kept");
    }
    restore();
}

#[test]
#[serial]
fn test_error_macro_carries_location() {
    let entries = capture();

    crate::engine_error!("cityscape::test", "failure {}", 3);

    {
        let entries = entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "failure 3");
        assert!(entries[0].file.unwrap().ends_with("engine_tests.rs"));
        assert!(entries[0].line.is_some());
    }
    restore();
}

#[test]
#[serial]
fn test_reset_logger_detaches_custom_logger() {
    let entries = capture();
    Engine::reset_logger();

    Engine::log(LogSeverity::Info, "cityscape::test", "to console".to_string());

    assert!(entries.lock().unwrap().is_empty());
    restore();
}
