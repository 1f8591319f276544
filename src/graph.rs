//! Per-second series for charting a run.
//!
//! The series are written as a single line of comma-separated integers, one entry per
//! elapsed second, which is all an external plotting tool needs to draw request rate
//! and latency over time.

use std::time::Duration;

use crate::issuer::RequestOutcome;
use crate::stats::percentile;
use crate::LoadTestError;

/// Requests completed and p95 latency for every second of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChartSeries {
    /// Requests that completed during each second.
    pub requests: Vec<u64>,
    /// p95 latency, in whole milliseconds, of the successful requests that completed
    /// during each second. Seconds with no successful request hold `0`.
    pub latency: Vec<u64>,
}

impl ChartSeries {
    /// Bucket outcomes by the second they completed in.
    pub fn from_outcomes(outcomes: &[RequestOutcome], duration: Duration) -> Self {
        let seconds = (duration.as_secs_f64().ceil() as usize).max(1);
        let mut requests = vec![0u64; seconds];
        let mut latencies: Vec<Vec<f64>> = vec![Vec::new(); seconds];

        for outcome in outcomes {
            // Completion times are measured independently of `duration`, clamp
            // stragglers into the last second.
            let second =
                ((outcome.completed_ms / 1_000.0).floor().max(0.0) as usize).min(seconds - 1);
            requests[second] += 1;
            if outcome.success {
                latencies[second].push(outcome.elapsed_ms);
            }
        }

        let latency = latencies
            .iter_mut()
            .map(|bucket| {
                bucket.sort_by(|a, b| a.total_cmp(b));
                percentile(bucket, 95.0)
                    .map(|value| value.round() as u64)
                    .unwrap_or(0)
            })
            .collect();

        ChartSeries { requests, latency }
    }

    pub async fn write_requests(&self, path: &str) -> Result<(), LoadTestError> {
        write_series(path, &self.requests).await
    }

    pub async fn write_latency(&self, path: &str) -> Result<(), LoadTestError> {
        write_series(path, &self.latency).await
    }
}

/// Render values as `1,2,3`.
pub fn to_csv_line(values: &[u64]) -> String {
    values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<String>>()
        .join(",")
}

async fn write_series(path: &str, values: &[u64]) -> Result<(), LoadTestError> {
    tokio::fs::write(path, to_csv_line(values)).await?;
    info!("wrote {} data points to {}", values.len(), path);
    Ok(())
}
