//! Progress accounting and the built-in progress sinks.

use std::sync::{Mutex, PoisonError};

use tracing::info;

use crate::traits::ProgressSink;

/// Default number of source rows mapped and written per batch.
pub const MAPPING_BATCH_SIZE: usize = 1000;

/// Work units for one source of `rows` rows: one per batch, at least one.
pub fn batch_units(rows: u64, batch_size: usize) -> u64 {
    let batch_size = batch_size.max(1) as u64;
    rows.div_ceil(batch_size).max(1)
}

/// Total work units for a target fed by sources with the given row counts.
///
/// Self-referencing targets are written twice, so the aggregate doubles.
pub fn estimate_units<I>(row_counts: I, batch_size: usize, self_referencing: bool) -> u64
where
    I: IntoIterator<Item = u64>,
{
    let total: u64 = row_counts
        .into_iter()
        .map(|rows| batch_units(rows, batch_size))
        .sum();
    if self_referencing { total * 2 } else { total }
}

/// One observed progress call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    SetMax(u64),
    Status(String),
    Increment(u64),
}

/// Records every progress call in order.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.lock().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Status(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Sum of all increments.
    pub fn completed(&self) -> u64 {
        self.lock()
            .iter()
            .map(|event| match event {
                ProgressEvent::Increment(units) => *units,
                _ => 0,
            })
            .sum()
    }

    /// One line per event, for snapshot comparisons.
    pub fn transcript(&self) -> String {
        self.lock()
            .iter()
            .map(|event| match event {
                ProgressEvent::SetMax(max) => format!("max {max}"),
                ProgressEvent::Status(message) => format!("status {message}"),
                ProgressEvent::Increment(units) => format!("increment {units}"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ProgressEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProgressSink for RecordingProgress {
    fn set_max(&self, max: u64) {
        self.lock().push(ProgressEvent::SetMax(max));
    }

    fn status(&self, message: &str) {
        self.lock().push(ProgressEvent::Status(message.to_string()));
    }

    fn increment(&self, units: u64) {
        self.lock().push(ProgressEvent::Increment(units));
    }
}

/// Forwards progress to `tracing` at info level.
#[derive(Debug, Default)]
pub struct TracingProgress {
    state: Mutex<(u64, u64)>,
}

impl TracingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units done and the current ceiling.
    pub fn position(&self) -> (u64, u64) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProgressSink for TracingProgress {
    fn set_max(&self, max: u64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = (0, max);
        info!(max, "progress ceiling set");
    }

    fn status(&self, message: &str) {
        info!("{message}");
    }

    fn increment(&self, units: u64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.0 += units;
        info!(done = state.0, max = state.1, "progress");
    }
}
