//! Shared call-site exception safety for pluggable builders, validators, and
//! formatters: a registered callable that panics must not take down the
//! caller's conversion/validation/reverse-map pass. A panic is caught here
//! and turned into the appropriate `EngineError` variant tied to the field's
//! dotted path.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{EngineError, EngineResult};

/// Runs `f`, catching any panic and converting it into an `EngineError` via
/// `make_err`. `f` may itself return `Err` normally (that passes through
/// unchanged); only an actual unwind is intercepted here.
pub fn call_guarded<T>(
    f: impl FnOnce() -> EngineResult<T>,
    make_err: impl FnOnce(String) -> EngineError,
) -> EngineResult<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "callable panicked with a non-string payload".to_string());
            Err(make_err(message))
        }
    }
}
