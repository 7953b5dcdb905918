//! Integration tests for Engine logging
//!
//! Drives the streaming types on the headless device and checks the entries
//! they emit through a custom logger.
//!
//! Run with: cargo test --test logging_integration_tests

use cityscape_engine::cityscape::Engine;
use cityscape_engine::cityscape::buffer::{MappedRingBuffer, RingBufferDesc, SectionCount};
use cityscape_engine::cityscape::graphics_device::{
    BufferUsage, GraphicsDevice, HeadlessGraphicsDevice, SamplerDesc,
};
use cityscape_engine::cityscape::log::{Logger, LogEntry, LogSeverity};
use cityscape_engine::cityscape::resource::ResourcePool;
use cityscape_engine::cityscape::StreamingConfig;
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST LOGGER IMPLEMENTATION
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLogger {
    fn new() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        (Self { entries: entries.clone() }, entries)
    }
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn from_source(entries: &Arc<Mutex<Vec<LogEntry>>>, source: &str) -> Vec<LogEntry> {
    entries.lock().unwrap().iter().filter(|e| e.source == source).cloned().collect()
}

fn device() -> Arc<Mutex<dyn GraphicsDevice>> {
    Arc::new(Mutex::new(HeadlessGraphicsDevice::new()))
}

// ============================================================================
// LOGGING TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_custom_logger() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    Engine::log(LogSeverity::Info, "test::module", "Test info message".to_string());
    Engine::log(LogSeverity::Warn, "test::module", "Test warning message".to_string());

    let captured = from_source(&entries, "test::module");
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].severity, LogSeverity::Info);
    assert_eq!(captured[1].message, "Test warning message");
    assert_eq!(captured[1].file, None);

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_ring_overflow_warns() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    let mut ring = MappedRingBuffer::new(
        device(),
        RingBufferDesc::dynamic("overflow", SectionCount::Double, 16, BufferUsage::UNIFORM),
    ).unwrap();
    ring.write_bytes(&[0u8; 12]).unwrap();
    assert!(ring.write_bytes(&[0u8; 8]).is_err());

    let warnings: Vec<LogEntry> = from_source(&entries, "cityscape::RingBuffer")
        .into_iter()
        .filter(|e| e.severity == LogSeverity::Warn)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("8 bytes"));
    assert!(warnings[0].message.contains("'overflow'"));

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_texture_failure_logs_error_with_location() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    let mut pool = ResourcePool::new(device(), StreamingConfig::default());
    let key = pool.acquire_texture("missing/facade.png", SamplerDesc::default()).unwrap();

    assert_eq!(pool.texture_size(key), Some((1, 1)));
    let errors = from_source(&entries, "cityscape::ResourcePool");
    let error = errors.iter().find(|e| e.severity == LogSeverity::Error).unwrap();
    assert!(error.message.contains("missing/facade.png"));
    assert!(error.file.is_some());
    assert!(error.line.is_some());

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_min_severity_filters() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);
    Engine::set_min_severity(LogSeverity::Error);

    Engine::log(LogSeverity::Warn, "test::filter", "dropped".to_string());
    Engine::log(LogSeverity::Error, "test::filter", "kept".to_string());

    let captured = from_source(&entries, "test::filter");
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].message, "kept");

    Engine::set_min_severity(LogSeverity::Info);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_logger_reset() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    Engine::log(LogSeverity::Info, "test::reset", "Message 1".to_string());
    Engine::reset_logger();
    Engine::log(LogSeverity::Info, "test::reset", "Message 2".to_string());

    assert_eq!(from_source(&entries, "test::reset").len(), 1);
}
