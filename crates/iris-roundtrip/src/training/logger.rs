//! Training progress logging on top of `tracing`.

use std::time::Instant;

use super::eval::MetricValue;

/// Verbosity level for training output.
///
/// Gates which `tracing` events the trainer emits; the subscriber's filter
/// still decides what is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// No events.
    Silent,
    /// Only warnings.
    #[default]
    Warning,
    /// Start/finish summaries.
    Info,
    /// Per-round metrics as well.
    Debug,
}

/// Emits training lifecycle events.
#[derive(Debug)]
pub struct TrainingLogger {
    verbosity: Verbosity,
    model: &'static str,
    started: Option<Instant>,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity, model: &'static str) -> Self {
        Self { verbosity, model, started: None }
    }

    pub fn start_training(&mut self, n_rounds: usize, n_rows: usize, n_features: usize) {
        self.started = Some(Instant::now());
        if self.verbosity >= Verbosity::Info {
            tracing::info!(model = self.model, n_rounds, n_rows, n_features, "training started");
        }
    }

    /// Log the metrics of one round.
    pub fn log_metrics(&self, round: usize, metrics: &[MetricValue]) {
        if self.verbosity < Verbosity::Debug || metrics.is_empty() {
            return;
        }
        let line = metrics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\t");
        tracing::debug!(model = self.model, round = round + 1, "{line}");
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= Verbosity::Warning {
            tracing::warn!(model = self.model, "{message}");
        }
    }

    pub fn finish_training(&self, n_trees: usize) {
        if self.verbosity >= Verbosity::Info {
            let elapsed_ms = self.started.map(|s| s.elapsed().as_millis()).unwrap_or(0);
            tracing::info!(model = self.model, n_trees, elapsed_ms, "training finished");
        }
    }
}
