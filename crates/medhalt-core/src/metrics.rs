//! Process-wide parse and exception counters.
//!
//! The parser and evaluator bump [`METRICS`] as samples go by. A run takes a
//! [`ParseStats`] snapshot when it starts and reports only its own growth
//! when it finishes, so several runs in one process do not blur together.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

pub static METRICS: Metrics = Metrics::new();

#[derive(Default)]
pub struct Metrics {
    outputs_parsed: AtomicU64,
    lenient_recoveries: AtomicU64,
    parse_failures: AtomicU64,
    samples_excepted: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            outputs_parsed: AtomicU64::new(0),
            lenient_recoveries: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            samples_excepted: AtomicU64::new(0),
        }
    }

    pub fn inc_outputs_parsed(&self) {
        self.outputs_parsed.fetch_add(1, Ordering::Relaxed);
    }

    /// Strict decoding failed but the key/value scan recovered fields.
    pub fn inc_lenient_recoveries(&self) {
        self.lenient_recoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_parse_failures(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_samples_excepted(&self) {
        self.samples_excepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn outputs_parsed(&self) -> u64 {
        self.outputs_parsed.load(Ordering::Relaxed)
    }

    pub fn lenient_recoveries(&self) -> u64 {
        self.lenient_recoveries.load(Ordering::Relaxed)
    }

    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    pub fn samples_excepted(&self) -> u64 {
        self.samples_excepted.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ParseStats {
        ParseStats {
            outputs_parsed: self.outputs_parsed(),
            lenient_recoveries: self.lenient_recoveries(),
            parse_failures: self.parse_failures(),
            samples_excepted: self.samples_excepted(),
        }
    }

    /// Log what the counters gained since `start` as one `info!` event.
    pub fn flush_since(&self, start: &ParseStats) -> ParseStats {
        let run = self.snapshot().since(start);
        tracing::info!(
            event = "run.stats",
            outputs_parsed = run.outputs_parsed,
            lenient_recoveries = run.lenient_recoveries,
            parse_failures = run.parse_failures,
            samples_excepted = run.samples_excepted,
            degraded_pct = %run
                .degraded_ratio()
                .map_or_else(|| "undefined".to_string(), |r| format!("{:.1}", r * 100.0)),
        );
        run
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub outputs_parsed: u64,
    pub lenient_recoveries: u64,
    pub parse_failures: u64,
    pub samples_excepted: u64,
}

impl ParseStats {
    /// Growth since an earlier snapshot.
    pub fn since(&self, earlier: &ParseStats) -> ParseStats {
        ParseStats {
            outputs_parsed: self.outputs_parsed.saturating_sub(earlier.outputs_parsed),
            lenient_recoveries: self
                .lenient_recoveries
                .saturating_sub(earlier.lenient_recoveries),
            parse_failures: self.parse_failures.saturating_sub(earlier.parse_failures),
            samples_excepted: self.samples_excepted.saturating_sub(earlier.samples_excepted),
        }
    }

    /// Share of parsed outputs that missed the strict path.
    pub fn degraded_ratio(&self) -> Option<f64> {
        if self.outputs_parsed == 0 {
            return None;
        }
        Some((self.lenient_recoveries + self.parse_failures) as f64 / self.outputs_parsed as f64)
    }
}
