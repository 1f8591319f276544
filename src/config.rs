//! Functions and structures related to configuring a load test.
//!
//! A load test is configured at run time by passing in the options and flags defined by
//! the [`LoadTestConfiguration`] structure. [`LoadTestConfiguration::configure`] checks
//! the options and turns them into the immutable [`LoadTestConfig`] the run works from.

use gumdrop::Options;
use serde::{Deserialize, Serialize};
use simplelog::*;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::logger::RequestLogFormat;
use crate::LoadTestError;

/// Host labels used when no `--hosts` are given.
pub const DEFAULT_HOSTS: [&str; 2] = ["foo.localhost", "bar.localhost"];
/// Number of requests issued when `--requests` is not given.
pub const DEFAULT_REQUESTS: usize = 100;
/// Concurrency cap used when `--concurrency` is not given.
pub const DEFAULT_CONCURRENCY: usize = 10;
/// Every request is sent here unless `--target` is given.
pub const DEFAULT_TARGET: &str = "http://localhost/";
/// Per-request timeout, in seconds.
pub const DEFAULT_TIMEOUT: u64 = 10;
/// Name of the markdown report written at the end of every run.
pub const DEFAULT_REPORT_FILE: &str = "loadtest-report.md";

/// Runtime options available when launching a load test.
///
/// Help is generated for all of these options by passing a `-h` flag. hostload
/// leverages [`gumdrop`](https://docs.rs/gumdrop/) to derive the help from the below
/// structure.
#[derive(Options, Debug, Clone, Default, Serialize, Deserialize)]
#[options(
    help = r#"hostload sends a fixed number of concurrent GET requests to one target,
routing each through a randomly chosen Host header, and reports latency percentiles.

The following runtime options are available:"#
)]
pub struct LoadTestConfiguration {
    /// Displays this help
    #[options(short = "h")]
    pub help: bool,

    /// Host labels trailing the options, as in `--hosts foo.localhost bar.localhost`
    #[options(free)]
    pub extra_hosts: Vec<String>,

    /// Host label sent in the Host header, more may follow (default: foo.localhost bar.localhost)
    #[options(short = "H", meta = "HOST")]
    pub hosts: Vec<String>,
    /// Sets total number of requests (default: 100)
    #[options(short = "n", meta = "COUNT")]
    pub requests: Option<usize>,
    /// Sets maximum in-flight requests (default: 10)
    #[options(short = "c", meta = "COUNT")]
    pub concurrency: Option<usize>,
    /// Sets URL every request is sent to (default: http://localhost/)
    #[options(short = "t", meta = "URL")]
    pub target: String,
    /// Sets per-request timeout, in seconds (default: 10)
    #[options(no_short, meta = "VALUE")]
    pub timeout: Option<u64>,
    /// Seeds host selection for a reproducible run
    #[options(
        no_short,
        meta = "SEED",
        help = "Seeds host selection for a reproducible run\n\nReports:"
    )]
    pub seed: Option<u64>,

    /// Sets markdown report file name (default: loadtest-report.md)
    #[options(no_short, meta = "NAME")]
    pub report_file: String,
    /// Writes requests per second as comma-separated integers
    #[options(no_short, meta = "NAME")]
    pub requests_series: String,
    /// Writes p95 latency per second as comma-separated integers
    #[options(no_short, meta = "NAME")]
    pub latency_series: String,
    /// Sets request log file name
    #[options(short = "R", meta = "NAME")]
    pub request_log: String,
    /// Sets request log format (json, csv, raw)
    #[options(
        no_short,
        meta = "FORMAT",
        help = "Sets request log format (json, csv, raw)\n\nLogging:"
    )]
    pub request_format: Option<RequestLogFormat>,

    /// Enables log file and sets name
    #[options(short = "G", meta = "NAME")]
    pub log_file: String,
    /// Increases log file level (-g, -gg, etc)
    #[options(short = "g", count)]
    pub log_level: u8,
    /// Decreases verbosity (-q, -qq, etc)
    #[options(count, short = "q")]
    pub quiet: u8,
    /// Increases verbosity (-v, -vv, etc)
    #[options(count, short = "v")]
    pub verbose: u8,
}

/// Validated parameters of a single run. Immutable once the run starts.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadTestConfig {
    /// Host labels to pick from, never empty.
    pub hosts: Vec<String>,
    /// Exact number of requests to issue, at least 1.
    pub total_requests: usize,
    /// Maximum number of requests in flight at once, at least 1.
    pub concurrency: usize,
    /// URL every request is sent to.
    pub target: Url,
    /// Per-request timeout covering connect, send and reading the full body.
    pub timeout: Duration,
    /// Optional seed for host selection.
    pub seed: Option<u64>,
}

impl LoadTestConfig {
    /// Size of the shared connection pool.
    pub fn connection_pool_size(&self) -> usize {
        self.concurrency.saturating_mul(2)
    }
}

impl LoadTestConfiguration {
    /// Validate the options and build the [`LoadTestConfig`] for a run.
    pub fn configure(&self) -> Result<LoadTestConfig, LoadTestError> {
        let hosts: Vec<String> = if self.hosts.is_empty() && self.extra_hosts.is_empty() {
            DEFAULT_HOSTS.iter().map(|host| host.to_string()).collect()
        } else {
            self.hosts
                .iter()
                .chain(self.extra_hosts.iter())
                .cloned()
                .collect()
        };
        if let Some(host) = hosts.iter().find(|host| host.trim().is_empty()) {
            return Err(LoadTestError::InvalidOption {
                option: "--hosts".to_string(),
                value: host.to_string(),
                detail: "host labels can not be empty.".to_string(),
            });
        }

        let total_requests = self.requests.unwrap_or(DEFAULT_REQUESTS);
        if total_requests == 0 {
            return Err(LoadTestError::InvalidOption {
                option: "--requests".to_string(),
                value: total_requests.to_string(),
                detail: "--requests must be set to at least 1.".to_string(),
            });
        }

        let concurrency = self.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(LoadTestError::InvalidOption {
                option: "--concurrency".to_string(),
                value: concurrency.to_string(),
                detail: "--concurrency must be set to at least 1.".to_string(),
            });
        }
        if concurrency > total_requests {
            debug!(
                "concurrency {} exceeds total requests {}, at most {} requests will be in flight",
                concurrency, total_requests, total_requests
            );
        }

        let target = if self.target.is_empty() {
            DEFAULT_TARGET
        } else {
            self.target.as_str()
        };
        let target = match Url::parse(target) {
            Ok(url) => url,
            Err(parse_error) => {
                return Err(LoadTestError::InvalidTarget {
                    target: target.to_string(),
                    detail: "--target must be an absolute url, for example http://localhost/."
                        .to_string(),
                    parse_error,
                });
            }
        };
        if target.scheme() != "http" && target.scheme() != "https" {
            return Err(LoadTestError::InvalidOption {
                option: "--target".to_string(),
                value: target.to_string(),
                detail: "--target must use the http or https scheme.".to_string(),
            });
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout == 0 {
            return Err(LoadTestError::InvalidOption {
                option: "--timeout".to_string(),
                value: timeout.to_string(),
                detail: "--timeout must be set to at least 1 second.".to_string(),
            });
        }

        Ok(LoadTestConfig {
            hosts,
            total_requests,
            concurrency,
            target,
            timeout: Duration::from_secs(timeout),
            seed: self.seed,
        })
    }

    /// Name of the markdown report file.
    pub fn report_file(&self) -> &str {
        if self.report_file.is_empty() {
            DEFAULT_REPORT_FILE
        } else {
            &self.report_file
        }
    }

    /// Initialize the logger which writes to standard out and optionally to a
    /// configurable log file.
    pub fn initialize_logger(&self) {
        // Configure debug output level.
        let debug_level = match self.verbose {
            0 => match self.quiet {
                0 => LevelFilter::Info,
                _ => LevelFilter::Warn,
            },
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Configure log file level.
        let log_level = match self.log_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        let log_file: Option<PathBuf> = if !self.log_file.is_empty() {
            Some(PathBuf::from(&self.log_file))
        } else {
            None
        };

        let mut loggers: Vec<Box<dyn SharedLogger>> =
            vec![SimpleLogger::new(debug_level, Config::default())];
        if let Some(log_to_file) = log_file.as_ref() {
            match std::fs::File::create(log_to_file) {
                Ok(file) => loggers.push(WriteLogger::new(log_level, Config::default(), file)),
                Err(e) => eprintln!("failed to create {}: {}", log_to_file.display(), e),
            }
        }

        match CombinedLogger::init(loggers) {
            Ok(_) => (),
            Err(e) => {
                info!("failed to initialize CombinedLogger: {}", e);
            }
        }
        if let Some(log_to_file) = log_file {
            info!("Writing to log file: {}", log_to_file.display());
        }

        info!("Output verbosity level: {}", debug_level);
        info!("Logfile verbosity level: {}", log_level);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> LoadTestConfiguration {
        LoadTestConfiguration::parse_args_default(args).expect("failed to parse options")
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).configure().unwrap();
        assert_eq!(config.hosts, vec!["foo.localhost", "bar.localhost"]);
        assert_eq!(config.total_requests, DEFAULT_REQUESTS);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.target.as_str(), DEFAULT_TARGET);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.seed, None);
        assert_eq!(config.connection_pool_size(), 20);
        assert_eq!(parse(&[]).report_file(), DEFAULT_REPORT_FILE);
    }

    #[test]
    fn custom_options() {
        let configuration = parse(&[
            "--hosts",
            "foo.local",
            "--hosts",
            "bar.local",
            "--hosts",
            "baz.local",
            "--requests",
            "500",
            "--concurrency",
            "50",
            "--target",
            "http://127.0.0.1:8080/health",
            "--timeout",
            "3",
            "--seed",
            "42",
            "--report-file",
            "custom-report.md",
            "--request-format",
            "csv",
        ]);
        assert_eq!(configuration.report_file(), "custom-report.md");
        assert_eq!(configuration.request_format, Some(RequestLogFormat::Csv));

        let config = configuration.configure().unwrap();
        assert_eq!(config.hosts, vec!["foo.local", "bar.local", "baz.local"]);
        assert_eq!(config.total_requests, 500);
        assert_eq!(config.concurrency, 50);
        assert_eq!(config.target.as_str(), "http://127.0.0.1:8080/health");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn hosts_after_one_flag() {
        let config = parse(&[
            "--requests",
            "5",
            "--hosts",
            "foo.local",
            "bar.local",
            "baz.local",
        ])
        .configure()
        .unwrap();
        assert_eq!(config.hosts, vec!["foo.local", "bar.local", "baz.local"]);
        assert_eq!(config.total_requests, 5);

        // Both forms can be mixed.
        let config = parse(&["--hosts", "foo.local", "bar.local", "--hosts", "baz.local"])
            .configure()
            .unwrap();
        assert_eq!(config.hosts, vec!["foo.local", "baz.local", "bar.local"]);
    }

    #[test]
    fn zero_requests_rejected() {
        match parse(&["--requests", "0"]).configure() {
            Err(LoadTestError::InvalidOption { option, .. }) => assert_eq!(option, "--requests"),
            other => panic!("expected invalid --requests, got {:?}", other),
        }
    }

    #[test]
    fn zero_concurrency_rejected() {
        match parse(&["--concurrency", "0"]).configure() {
            Err(LoadTestError::InvalidOption { option, .. }) => {
                assert_eq!(option, "--concurrency")
            }
            other => panic!("expected invalid --concurrency, got {:?}", other),
        }
    }

    #[test]
    fn empty_host_rejected() {
        assert!(parse(&["--hosts", "foo.local", "--hosts", " "])
            .configure()
            .is_err());
    }

    #[test]
    fn invalid_target_rejected() {
        match parse(&["--target", "not a url"]).configure() {
            Err(LoadTestError::InvalidTarget { target, .. }) => assert_eq!(target, "not a url"),
            other => panic!("expected invalid target, got {:?}", other),
        }
        assert!(parse(&["--target", "ftp://localhost/"]).configure().is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        assert!(parse(&["--timeout", "0"]).configure().is_err());
    }

    #[test]
    fn concurrency_may_exceed_requests() {
        let config = parse(&["--requests", "5", "--concurrency", "50"])
            .configure()
            .unwrap();
        assert_eq!(config.total_requests, 5);
        assert_eq!(config.concurrency, 50);
    }
}
