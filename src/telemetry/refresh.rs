use std::time::Duration;

use jiff::Timestamp;
use tracing::{Level, event};
use uuid::Uuid;

use crate::errors::RefreshFailure;

#[derive(Clone, Debug)]
pub enum RefreshOutcome {
    Success,
    Rejected,
    Abandoned,
}

/// Auth event emitter for one refresh attempt.
///
/// Routine events go out at INFO when `verbose` is set (the `debug_auth`
/// switch) and at DEBUG otherwise. Failures are always WARN or above.
#[derive(Clone, Debug)]
pub struct RefreshTelemetry {
    attempt_id: Uuid,
    context: String,
    verbose: bool,
}

macro_rules! routine {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            event!(Level::INFO, $($arg)+)
        } else {
            event!(Level::DEBUG, $($arg)+)
        }
    };
}

impl RefreshTelemetry {
    pub fn new(context: impl Into<String>, verbose: bool) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            context: context.into(),
            verbose,
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn emit_start(&self) {
        routine!(
            self.verbose,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = %Timestamp::now(),
            "refresh.start"
        );
    }

    pub fn emit_success(&self, released: usize) {
        routine!(
            self.verbose,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = %Timestamp::now(),
            outcome = ?RefreshOutcome::Success,
            released,
            "refresh.success"
        );
    }

    pub fn emit_queued(&self, position: usize) {
        routine!(
            self.verbose,
            context = %self.context,
            position,
            "refresh.queued"
        );
    }

    pub fn emit_throttled(&self, retry_after: Duration) {
        event!(
            Level::WARN,
            context = %self.context,
            retry_after_ms = retry_after.as_millis() as u64,
            "refresh.throttled"
        );
    }

    pub fn emit_failure(&self, failure: &RefreshFailure, outcome: RefreshOutcome, rejected: usize) {
        event!(
            Level::ERROR,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = %Timestamp::now(),
            outcome = ?outcome,
            status = ?failure.status,
            rejected,
            error = %failure,
            "refresh.failure"
        );
    }
}
