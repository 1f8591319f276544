//! # hostload
//!
//! hostload generates a controlled burst of concurrent HTTP GET requests against a
//! service that routes on the `Host` header, validates that every response came from
//! the backend the request was routed to, and reports throughput and latency
//! percentiles.
//!
//! A load test is a fixed number of requests. Each request picks one of the configured
//! host labels at random, waits for a free slot under the concurrency cap, and is sent
//! to a single target URL with the chosen label in the `Host` header. A request is
//! successful when the target answers `200 OK` and the trimmed response body contains
//! the first dot-separated part of the host label (`foo` for `foo.localhost`).
//!
//! ## Running a load test
//!
//! ```bash
//! $ hostload --hosts foo.localhost --hosts bar.localhost --requests 500 --concurrency 50
//! ```
//!
//! The markdown report is echoed to standard out and written to `loadtest-report.md`.
//!
//! ## Library use
//!
//! ```rust,no_run
//! use gumdrop::Options;
//! use hostload::config::LoadTestConfiguration;
//! use hostload::{LoadTest, LoadTestError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LoadTestError> {
//!     let configuration = LoadTestConfiguration::parse_args_default(&[
//!         "--hosts",
//!         "foo.localhost",
//!         "--requests",
//!         "20",
//!         "--seed",
//!         "7",
//!     ])
//!     .expect("valid options");
//!
//!     let report = LoadTest::initialize_with_config(configuration)?
//!         .execute()
//!         .await?;
//!     println!("{}", report.markdown);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## License
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! you may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//! <http://www.apache.org/licenses/LICENSE-2.0>
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

#[macro_use]
extern crate log;

pub mod collector;
pub mod config;
pub mod graph;
pub mod issuer;
pub mod limiter;
pub mod logger;
mod report;
pub mod scheduler;
pub mod stats;

use chrono::prelude::*;
use gumdrop::Options;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::{fmt, io, time};

use crate::collector::ResultCollector;
use crate::config::{LoadTestConfig, LoadTestConfiguration};
use crate::graph::ChartSeries;
use crate::issuer::{RequestIssuer, RequestOutcome};
use crate::limiter::ConcurrencyLimiter;
use crate::scheduler::WorkScheduler;
use crate::stats::RunSummary;

pub use crate::report::render_report;

/// An enumeration of all errors a [`LoadTest`] can return.
///
/// Failures of individual requests are never reported here: they are recorded as
/// failed [`RequestOutcome`]s.
#[derive(Debug)]
pub enum LoadTestError {
    /// Wraps a [`std::io::Error`](https://doc.rust-lang.org/std/io/struct.Error.html).
    Io(io::Error),
    /// Wraps a [`reqwest::Error`](https://docs.rs/reqwest/*/reqwest/struct.Error.html).
    Reqwest(reqwest::Error),
    /// Wraps a ['tokio::task::JoinError'](https://docs.rs/tokio/*/tokio/task/struct.JoinError.html).
    TokioJoin(tokio::task::JoinError),
    /// Wraps a ['tokio::sync::AcquireError'](https://docs.rs/tokio/*/tokio/sync/struct.AcquireError.html).
    Acquire(tokio::sync::AcquireError),
    /// Invalid option or value specified, may only be invalid in context.
    InvalidOption {
        /// The invalid option that caused this error, may be only invalid in context.
        option: String,
        /// The invalid value that caused this error, may be only invalid in context.
        value: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// Failed to parse the target URL.
    InvalidTarget {
        /// The invalid target that caused this error.
        target: String,
        /// An optional explanation of the error.
        detail: String,
        /// Wraps a [`url::ParseError`](https://docs.rs/url/*/url/enum.ParseError.html).
        parse_error: url::ParseError,
    },
    /// The run finished without an outcome for every scheduled request.
    IncompleteRun {
        /// Number of requests that were scheduled.
        expected: usize,
        /// Number of outcomes actually collected.
        collected: usize,
    },
}
/// Implement a helper to provide a text description of all possible types of errors.
impl LoadTestError {
    fn describe(&self) -> &str {
        match *self {
            LoadTestError::Io(_) => "io::Error",
            LoadTestError::Reqwest(_) => "reqwest::Error",
            LoadTestError::TokioJoin(_) => "tokio::task::JoinError",
            LoadTestError::Acquire(_) => "tokio::sync::AcquireError",
            LoadTestError::InvalidOption { .. } => "invalid option or value specified",
            LoadTestError::InvalidTarget { .. } => "failed to parse target url",
            LoadTestError::IncompleteRun { .. } => "not every request produced an outcome",
        }
    }
}

/// Implement format trait to allow displaying errors.
impl fmt::Display for LoadTestError {
    // Implement display of error with `{}` marker.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LoadTestError::Io(ref source) => {
                write!(f, "LoadTestError: {} ({})", self.describe(), source)
            }
            LoadTestError::Reqwest(ref source) => {
                write!(f, "LoadTestError: {} ({})", self.describe(), source)
            }
            LoadTestError::TokioJoin(ref source) => {
                write!(f, "LoadTestError: {} ({})", self.describe(), source)
            }
            LoadTestError::Acquire(ref source) => {
                write!(f, "LoadTestError: {} ({})", self.describe(), source)
            }
            LoadTestError::InvalidOption {
                ref option,
                ref value,
                ref detail,
            } => write!(
                f,
                "LoadTestError: {} ({} = {:?}: {})",
                self.describe(),
                option,
                value,
                detail
            ),
            LoadTestError::InvalidTarget {
                ref target,
                ref parse_error,
                ..
            } => write!(
                f,
                "LoadTestError: {} ({}: {})",
                self.describe(),
                target,
                parse_error
            ),
            LoadTestError::IncompleteRun {
                expected,
                collected,
            } => write!(
                f,
                "LoadTestError: {} ({} of {})",
                self.describe(),
                collected,
                expected
            ),
        }
    }
}

// Define the lower level source of this error, if any.
impl std::error::Error for LoadTestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            LoadTestError::Io(ref source) => Some(source),
            LoadTestError::Reqwest(ref source) => Some(source),
            LoadTestError::TokioJoin(ref source) => Some(source),
            LoadTestError::Acquire(ref source) => Some(source),
            LoadTestError::InvalidTarget {
                ref parse_error, ..
            } => Some(parse_error),
            _ => None,
        }
    }
}

/// Auto-convert Reqwest errors.
impl From<reqwest::Error> for LoadTestError {
    fn from(err: reqwest::Error) -> LoadTestError {
        LoadTestError::Reqwest(err)
    }
}

/// Auto-convert IO errors.
impl From<io::Error> for LoadTestError {
    fn from(err: io::Error) -> LoadTestError {
        LoadTestError::Io(err)
    }
}

/// Auto-convert TokioJoin errors.
impl From<tokio::task::JoinError> for LoadTestError {
    fn from(err: tokio::task::JoinError) -> LoadTestError {
        LoadTestError::TokioJoin(err)
    }
}

/// Auto-convert semaphore acquire errors.
impl From<tokio::sync::AcquireError> for LoadTestError {
    fn from(err: tokio::sync::AcquireError) -> LoadTestError {
        LoadTestError::Acquire(err)
    }
}

/// Everything a completed load test produced.
#[derive(Debug)]
pub struct LoadTestReport {
    /// Aggregate statistics for the run.
    pub summary: RunSummary,
    /// One outcome per issued request, in completion order.
    pub outcomes: Vec<RequestOutcome>,
    /// The rendered markdown report, identical to what was written to the report file.
    pub markdown: String,
    /// Highest number of requests that were in flight at the same time.
    pub peak_in_flight: usize,
}

/// A single load test run: validated configuration plus the random source used to
/// pick a host for each request.
pub struct LoadTest {
    /// Options as parsed from the command line.
    configuration: LoadTestConfiguration,
    /// Validated, immutable run parameters.
    config: LoadTestConfig,
    /// Drives host selection; seeded when `--seed` is set.
    rng: StdRng,
}
impl LoadTest {
    /// Load configuration from the command line and validate it.
    ///
    /// Prints help and exits if `--help` is passed or the options can not be parsed.
    pub fn initialize() -> Result<LoadTest, LoadTestError> {
        LoadTest::initialize_with_config(LoadTestConfiguration::parse_args_default_or_exit())
    }

    /// Validate an already parsed configuration.
    ///
    /// All configuration errors are returned from here, before any client is built or
    /// any request is made.
    pub fn initialize_with_config(
        configuration: LoadTestConfiguration,
    ) -> Result<LoadTest, LoadTestError> {
        let config = configuration.configure()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(LoadTest {
            configuration,
            config,
            rng,
        })
    }

    /// Replace the random source used for host selection, overriding `--seed`.
    pub fn set_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// The validated run parameters.
    pub fn config(&self) -> &LoadTestConfig {
        &self.config
    }

    /// Run the load test to completion and write all configured artifacts.
    ///
    /// The run always issues exactly `total_requests` requests and always writes a
    /// report, even when every request fails.
    pub async fn execute(mut self) -> Result<LoadTestReport, LoadTestError> {
        let total_requests = self.config.total_requests;
        let hosts = scheduler::plan_hosts(&self.config.hosts, total_requests, &mut self.rng)?;

        let (logger_handle, logger_tx) = self.configuration.setup_request_logger().await?;

        let started = Local::now();
        let run_started = time::Instant::now();
        let issuer = RequestIssuer::new(&self.config, run_started)?;
        let limiter = ConcurrencyLimiter::new(self.config.concurrency);
        let scheduler = WorkScheduler::new(issuer, limiter.clone());
        let mut collector =
            ResultCollector::new(total_requests).with_request_log(logger_tx.clone());

        info!(
            "launching {} requests against {} with concurrency {}",
            stats::format_number(total_requests),
            self.config.target,
            self.config.concurrency
        );
        scheduler.run(hosts, &mut collector).await?;
        let duration = run_started.elapsed();
        let outcomes = collector.finish()?;
        info!("all requests completed in {:?}", duration);

        // An empty message tells the request logger to flush and exit.
        if let Some(tx) = logger_tx {
            let _ = tx.send(None);
        }

        let summary =
            RunSummary::from_outcomes(&outcomes, self.config.concurrency, duration, started);
        summary.log_summary();

        let markdown = render_report(&summary)?;
        let report_file = self.configuration.report_file();
        report::write_report(report_file, &markdown).await?;
        info!("wrote report to {}", report_file);

        // The report is already on disk, a failed request log only warrants a warning.
        if let Some(handle) = logger_handle {
            match handle.await {
                Ok(Ok(())) => (),
                Ok(Err(e)) => warn!("request log incomplete: {}", e),
                Err(e) => warn!("request logger failed: {}", e),
            }
        }

        if !self.configuration.requests_series.is_empty()
            || !self.configuration.latency_series.is_empty()
        {
            let series = ChartSeries::from_outcomes(&outcomes, duration);
            if !self.configuration.requests_series.is_empty() {
                series
                    .write_requests(&self.configuration.requests_series)
                    .await?;
            }
            if !self.configuration.latency_series.is_empty() {
                series
                    .write_latency(&self.configuration.latency_series)
                    .await?;
            }
        }

        Ok(LoadTestReport {
            summary,
            outcomes,
            markdown,
            peak_in_flight: limiter.peak_in_flight(),
        })
    }
}
