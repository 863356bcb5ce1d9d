//! FFI bindings for GoodWheel Core
//!
//! This module provides C-compatible functions for driving a monitoring session
//! from a mobile or web shell. Events are buffered inside the handle and drained
//! as a JSON array. Strings returned by these functions must be freed with
//! `gw_free_string`. Timestamps are Unix epoch milliseconds.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, Utc};

use crate::session::DriveSession;
use crate::types::{
    EventRecord, FrameSample, MotionSample, PositionSample, SensorFault, SensorKind, Vec3,
};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn timestamp_from_millis(timestamp_ms: i64) -> Option<DateTime<Utc>> {
    let timestamp = DateTime::from_timestamp_millis(timestamp_ms);
    if timestamp.is_none() {
        set_last_error("Timestamp out of range");
    }
    timestamp
}

/// Optional reading passed as a value plus a presence flag
fn optional(value: f64, present: bool) -> Option<f64> {
    present.then_some(value)
}

// ============================================================================
// Session Lifecycle
// ============================================================================

/// Opaque handle to a DriveSession with its pending events
pub struct DriveSessionHandle {
    session: DriveSession,
    pending: Vec<EventRecord>,
}

impl DriveSessionHandle {
    fn new(session: DriveSession) -> Self {
        Self {
            session,
            pending: Vec::new(),
        }
    }
}

/// Create a new session from a JSON configuration.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a pointer that must be freed with `gw_session_free`.
/// - Returns NULL on error; call `gw_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gw_session_new(config_json: *const c_char) -> *mut DriveSessionHandle {
    clear_last_error();

    let session = if config_json.is_null() {
        DriveSession::new()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match DriveSession::from_config_json(&json) {
            Ok(session) => session,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    Box::into_raw(Box::new(DriveSessionHandle::new(session)))
}

/// Free a session.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gw_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn gw_session_free(handle: *mut DriveSessionHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Start a monitoring session, discarding any undrained events.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gw_session_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn gw_session_start(
    handle: *mut DriveSessionHandle,
    timestamp_ms: i64,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *handle;

    let Some(now) = timestamp_from_millis(timestamp_ms) else {
        return -1;
    };

    handle.pending.clear();
    handle.session.start(now);
    0
}

/// Stop the monitoring session.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gw_session_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn gw_session_stop(
    handle: *mut DriveSessionHandle,
    timestamp_ms: i64,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *handle;

    let Some(now) = timestamp_from_millis(timestamp_ms) else {
        return -1;
    };

    handle.session.stop(now);
    0
}

// ============================================================================
// Sample Ingestion
// ============================================================================

/// Feed one accelerometer + gyroscope sample. Pass NaN on any acceleration
/// axis when the device gave no acceleration reading; non-finite rotation
/// axes read as zero.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gw_session_new`.
/// - Returns the number of events emitted, or -1 on error.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn gw_session_feed_motion(
    handle: *mut DriveSessionHandle,
    accel_x: f64,
    accel_y: f64,
    accel_z: f64,
    rotation_alpha: f64,
    rotation_beta: f64,
    rotation_gamma: f64,
    timestamp_ms: i64,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *handle;

    let Some(timestamp) = timestamp_from_millis(timestamp_ms) else {
        return -1;
    };

    let sample = MotionSample::new(
        Vec3::new(accel_x, accel_y, accel_z),
        Vec3::new(rotation_alpha, rotation_beta, rotation_gamma),
        timestamp,
    );
    handle.session.feed_motion_into(&sample, &mut handle.pending) as i32
}

/// Feed one GPS fix. `has_speed` is zero when the receiver gave no speed.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gw_session_new`.
/// - Returns the number of events emitted, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn gw_session_feed_position(
    handle: *mut DriveSessionHandle,
    lat: f64,
    lng: f64,
    speed_mps: f64,
    has_speed: i32,
    timestamp_ms: i64,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *handle;

    let Some(timestamp) = timestamp_from_millis(timestamp_ms) else {
        return -1;
    };

    let sample = PositionSample {
        lat,
        lng,
        speed_mps: optional(speed_mps, has_speed != 0),
        timestamp,
    };
    handle.session.feed_position_into(&sample, &mut handle.pending) as i32
}

/// Report a failed position request.
///
/// `code`: 1 = permission denied, 2 = no fix, 3 = timeout, anything else =
/// unavailable. Always returns -1 with the fault message set as the last error.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gw_session_new`.
#[no_mangle]
pub unsafe extern "C" fn gw_session_feed_position_error(
    handle: *mut DriveSessionHandle,
    code: i32,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *handle;

    let fault = match code {
        1 => SensorFault::PermissionDenied(SensorKind::Position),
        2 => SensorFault::NoFix,
        3 => SensorFault::Timeout,
        other => SensorFault::Unavailable {
            sensor: SensorKind::Position,
            reason: format!("adapter error code {other}"),
        },
    };

    match handle.session.feed_position_fix(Err(fault)) {
        Ok(records) => {
            handle.pending.extend(records);
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Feed one camera inference result.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gw_session_new`.
/// - Returns the number of events emitted, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn gw_session_feed_frame(
    handle: *mut DriveSessionHandle,
    face_present: i32,
    timestamp_ms: i64,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *handle;

    let Some(timestamp) = timestamp_from_millis(timestamp_ms) else {
        return -1;
    };

    let frame = FrameSample {
        face_present: face_present != 0,
        timestamp,
    };
    handle.session.feed_frame_into(&frame, &mut handle.pending) as i32
}

// ============================================================================
// Readout
// ============================================================================

/// Drain buffered events as a JSON array, oldest first.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gw_session_new`.
/// - Returns a newly allocated string that must be freed with `gw_free_string`.
/// - Returns NULL on error; call `gw_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gw_session_drain_events(handle: *mut DriveSessionHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *handle;

    match serde_json::to_string(&handle.pending) {
        Ok(json) => {
            handle.pending.clear();
            string_to_cstr(&json)
        }
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Session summary (state, counters, current speed) as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `gw_session_new`.
/// - Returns a newly allocated string that must be freed with `gw_free_string`.
/// - Returns NULL on error; call `gw_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gw_session_summary(handle: *const DriveSessionHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;

    match handle.session.summary_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by GoodWheel functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a GoodWheel function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn gw_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next GoodWheel function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn gw_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}
