//! Recording adapters that capture interactions to cassettes.

pub mod generation_service;

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::cassette::format::{Call, Outcome};
use crate::cassette::recorder::CassetteRecorder;

/// Record one call and its result.
pub(crate) fn record_result<T, E>(recorder: &Arc<Mutex<CassetteRecorder>>, call: Call, result: &Result<T, E>)
where
    T: Serialize,
    E: std::fmt::Display,
{
    let outcome = Outcome::from_result(result);
    match recorder.lock() {
        Ok(mut guard) => guard.record(call, outcome),
        Err(e) => tracing::warn!(error = %e, "recorder lock poisoned, dropping interaction"),
    }
}
