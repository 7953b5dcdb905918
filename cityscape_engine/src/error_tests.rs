//! Unit tests for error.rs
//!
//! Tests Error variants, Display output, and the engine_err!/engine_bail! macros.

use crate::error::{CityscapeError, CityscapeResult};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = CityscapeError::BackendError("headless device lost".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("headless device lost"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", CityscapeError::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_capacity_exceeded_display() {
    let err = CityscapeError::CapacityExceeded { requested: 80, available: 64 };
    let display = format!("{}", err);
    assert!(display.contains("requested 80"));
    assert!(display.contains("available 64"));
}

#[test]
fn test_invalid_state_display() {
    let err = CityscapeError::InvalidState("mesh already committed".to_string());
    assert_eq!(format!("{}", err), "Invalid state: mesh already committed");
}

#[test]
fn test_load_failed_and_unsupported_format_display() {
    let err = CityscapeError::LoadFailed("textures/brick.png".to_string());
    assert!(format!("{}", err).contains("textures/brick.png"));

    let err = CityscapeError::UnsupportedVertexFormat("custom stride 20".to_string());
    assert!(format!("{}", err).starts_with("Unsupported vertex format"));
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = CityscapeError::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_clone_keeps_fields() {
    let err = CityscapeError::CapacityExceeded { requested: 12, available: 4 };
    match err.clone() {
        CityscapeError::CapacityExceeded { requested, available } => {
            assert_eq!(requested, 12);
            assert_eq!(available, 4);
        }
        other => panic!("unexpected clone result: {:?}", other),
    }
}

// ============================================================================
// MACRO TESTS
// ============================================================================

#[test]
fn test_engine_err_builds_backend_error() {
    let err = crate::engine_err!("cityscape::ErrorTest", "value {} out of range", 7);
    match err {
        CityscapeError::BackendError(msg) => assert_eq!(msg, "value 7 out of range"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_engine_bail_returns_early() {
    fn check(size: u64) -> CityscapeResult<u64> {
        if size == 0 {
            crate::engine_bail!("cityscape::ErrorTest", "size must be non-zero");
        }
        Ok(size * 2)
    }

    assert_eq!(check(4).unwrap(), 8);
    assert!(matches!(check(0), Err(CityscapeError::BackendError(_))));
}

#[test]
fn test_engine_err_with_named_variant() {
    let err = crate::engine_err!(InvalidState => "cityscape::ErrorTest", "mesh {} not committed", 2);
    match err {
        CityscapeError::InvalidState(msg) => assert_eq!(msg, "mesh 2 not committed"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_engine_bail_with_named_variant() {
    fn check(size: u64) -> CityscapeResult<u64> {
        if size == 0 {
            crate::engine_bail!(InvalidResource => "cityscape::ErrorTest", "size must be non-zero");
        }
        Ok(size)
    }

    assert!(matches!(check(0), Err(CityscapeError::InvalidResource(_))));
}

#[test]
fn test_error_propagation_with_question_mark() {
    fn inner() -> CityscapeResult<i32> {
        Err(CityscapeError::OutOfMemory)
    }

    fn outer() -> CityscapeResult<i32> {
        inner()?;
        Ok(42)
    }

    assert!(matches!(outer(), Err(CityscapeError::OutOfMemory)));
}
