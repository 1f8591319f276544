//! Latency statistics over a completed run.
//!
//! Latency figures only ever consider successful requests. A figure that can not be
//! computed because there were no successful requests is `None`, which is never the
//! same thing as a latency of `0.0`.

use chrono::prelude::*;
use num_format::{Locale, ToFormattedString};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::issuer::RequestOutcome;

/// Linearly interpolated percentile of an ascending, sorted sample.
///
/// With `n` values the rank is `k = (n - 1) * p / 100`; the result interpolates
/// between the order statistics either side of `k`. Returns `None` for an empty
/// sample.
///
/// # Example
/// ```rust
/// use hostload::stats::percentile;
///
/// assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 50.0), Some(2.5));
/// assert_eq!(percentile(&[], 99.0), None);
/// ```
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let last = sorted.len() - 1;
    let k = last as f64 * (p / 100.0);
    let f = (k.floor() as usize).min(last);
    let c = (f + 1).min(last);
    if f == c {
        Some(sorted[f])
    } else {
        Some(sorted[f] + (sorted[c] - sorted[f]) * (k - f as f64))
    }
}

/// Arithmetic mean, `None` for an empty sample.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Average and percentile latencies, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PercentileTable {
    pub avg: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

impl PercentileTable {
    /// Build the table from unsorted latencies.
    pub fn from_latencies(latencies: &[f64]) -> Self {
        let mut sorted = latencies.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        PercentileTable {
            avg: mean(&sorted),
            p50: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        }
    }

    /// Labelled entries, in report order.
    pub fn entries(&self) -> [(&'static str, Option<f64>); 5] {
        [
            ("avg", self.avg),
            ("p50", self.p50),
            ("p90", self.p90),
            ("p95", self.p95),
            ("p99", self.p99),
        ]
    }

    /// At least one latency figure could be computed.
    pub fn is_available(&self) -> bool {
        self.entries().iter().any(|(_, value)| value.is_some())
    }
}

/// Aggregate results of a completed run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// When the run started, local time.
    pub started: DateTime<Local>,
    pub total_requests: usize,
    pub concurrency: usize,
    /// Wall-clock duration of the whole run.
    pub duration: Duration,
    pub success_count: usize,
    pub failure_count: usize,
    pub percentiles: PercentileTable,
    /// Requests issued per host label.
    pub host_counts: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn from_outcomes(
        outcomes: &[RequestOutcome],
        concurrency: usize,
        duration: Duration,
        started: DateTime<Local>,
    ) -> Self {
        let latencies: Vec<f64> = outcomes
            .iter()
            .filter(|outcome| outcome.success)
            .map(|outcome| outcome.elapsed_ms)
            .collect();

        let mut host_counts = BTreeMap::new();
        for outcome in outcomes {
            *host_counts.entry(outcome.host.clone()).or_insert(0) += 1;
        }

        RunSummary {
            started,
            total_requests: outcomes.len(),
            concurrency,
            duration,
            success_count: latencies.len(),
            failure_count: outcomes.len() - latencies.len(),
            percentiles: PercentileTable::from_latencies(&latencies),
            host_counts,
        }
    }

    /// Requests per second over the wall-clock duration, `0.0` for a zero duration.
    pub fn throughput(&self) -> f64 {
        let seconds = self.duration.as_secs_f64();
        if seconds > 0.0 {
            self.total_requests as f64 / seconds
        } else {
            0.0
        }
    }

    /// Share of requests that failed, from `0.0` to `1.0`.
    pub fn failure_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.failure_count as f64 / self.total_requests as f64
        }
    }

    pub fn failure_percentage(&self) -> f64 {
        self.failure_ratio() * 100.0
    }

    pub(crate) fn log_summary(&self) {
        info!(
            "run started {} took {:.2}s: {} requests, {} failed",
            self.started.format("%Y-%m-%d %H:%M:%S"),
            self.duration.as_secs_f64(),
            format_number(self.total_requests),
            format_number(self.failure_count),
        );
        for (host, count) in &self.host_counts {
            info!("  {}: {} requests", host, format_number(*count));
        }
        if !self.percentiles.is_available() {
            warn!("no successful requests, latency percentiles are unavailable");
        }
    }
}

/// Format large numbers in a human readable manner, ie `12,345`.
pub(crate) fn format_number(number: usize) -> String {
    number.to_formatted_string(&Locale::en)
}
