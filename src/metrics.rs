use std::time::Instant;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Added,
    Duplicate,
    Error,
}

impl Outcome {
    fn label(self) -> &'static str {
        match self {
            Outcome::Added => "added",
            Outcome::Duplicate => "duplicate",
            Outcome::Error => "error",
        }
    }
}

pub fn record_outcome(outcome: Outcome) {
    trace!(
        target = "catalog.metrics",
        outcome = outcome.label(),
        "record_outcome"
    );
}

pub struct StageTimer {
    stage: &'static str,
    started: Instant,
}

pub fn time_stage(stage: &'static str) -> StageTimer {
    StageTimer {
        stage,
        started: Instant::now(),
    }
}

impl StageTimer {
    /// Emits the elapsed time for the stage and returns it in milliseconds.
    pub fn finish(self) -> u64 {
        let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        trace!(
            target = "catalog.metrics",
            stage = self.stage,
            elapsed_ms,
            "stage_finished"
        );
        elapsed_ms
    }
}
