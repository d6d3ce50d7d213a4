//! Simulated job execution.
//!
//! Maps a job's payload and 1-indexed attempt number to an [`Outcome`]
//! without doing any real work. Payload fields are checked in a fixed
//! precedence order; the first recognized field wins.

use rand::Rng;
use serde_json::Value;

use crate::store::Outcome;

/// Success probability when no forcing field is present.
const DEFAULT_SUCCESS_RATE: f64 = 0.8;

/// Simulate one execution attempt.
///
/// Recognized payload fields, first match wins:
/// 1. `force = "success"`: always succeeds.
/// 2. `force = "fail"`: always fails with `"forced failure"`.
/// 3. `fail_times = N`: fails the first N attempts, succeeds from
///    attempt N+1 on.
/// 4. none: succeeds with probability 0.8, otherwise fails with
///    `"random failure"`.
///
/// An unrecognized `force` value falls through to the later rules.
/// `attempt_number` is 1-indexed: the job's attempt count after the
/// increment for the current try.
pub fn simulate(payload: &Value, attempt_number: u32) -> Outcome {
    match payload.get("force").and_then(Value::as_str) {
        Some("success") => return Outcome::success(),
        Some("fail") => return Outcome::failure("forced failure"),
        _ => {}
    }

    if let Some(fail_times) = payload.get("fail_times").and_then(Value::as_u64) {
        if u64::from(attempt_number) <= fail_times {
            return Outcome::failure(format!(
                "forced failure (attempt {attempt_number} of {fail_times})"
            ));
        }
        return Outcome::success();
    }

    // Thread-local source, reseeded by the OS: repeated attempts of the
    // same job are independent trials.
    if rand::thread_rng().gen_bool(DEFAULT_SUCCESS_RATE) {
        Outcome::success()
    } else {
        Outcome::failure("random failure")
    }
}
