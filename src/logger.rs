//! Optional request log.
//!
//! When `--request-log NAME` is set, a logger task is launched and every
//! [`RequestOutcome`] is sent to it over a channel as it is collected. The task writes
//! one line per outcome through Tokio's asynchronous
//! [`BufWriter`](https://docs.rs/tokio/*/tokio/io/struct.BufWriter.html) so slow disks
//! never hold up the requests themselves.
//!
//! The format is set with `--request-format`:
//!  - `json` (default): one JSON object per line, for example
//!    `{"host":"foo.localhost","success":true,"elapsed_ms":2.31,"status_code":200,"detail":"foo-ok","completed_ms":14.2}`
//!  - `csv`: a header line, then one row per request
//!  - `raw`: the `Debug` output of each outcome

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::LoadTestConfiguration;
use crate::issuer::RequestOutcome;
use crate::LoadTestError;

/// Sends outcomes to the logger task. `None` tells the task to flush and exit.
pub(crate) type RequestLogTx = flume::Sender<Option<RequestOutcome>>;

/// Handle of the logger task, resolves once the log is flushed.
pub(crate) type RequestLoggerJoinHandle = tokio::task::JoinHandle<Result<(), LoadTestError>>;

/// Supported request log formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestLogFormat {
    #[default]
    Json,
    Csv,
    Raw,
}
impl FromStr for RequestLogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(RequestLogFormat::Json),
            "csv" => Ok(RequestLogFormat::Csv),
            "raw" => Ok(RequestLogFormat::Raw),
            _ => Err(format!(
                "unrecognized log format '{}', expected json, csv or raw",
                s
            )),
        }
    }
}

impl RequestLogFormat {
    /// Column names written as the first line of a csv log.
    pub fn header(&self) -> Option<&'static str> {
        match self {
            RequestLogFormat::Csv => {
                Some("host,success,elapsed_ms,status_code,detail,completed_ms")
            }
            _ => None,
        }
    }

    /// Format one outcome as a single log entry, without a trailing line feed.
    pub fn format(&self, outcome: &RequestOutcome) -> String {
        match self {
            RequestLogFormat::Json => json!(outcome).to_string(),
            RequestLogFormat::Csv => format!(
                "{},{},{:.3},{},{},{:.3}",
                csv_field(&outcome.host),
                outcome.success,
                outcome.elapsed_ms,
                outcome
                    .status_code
                    .map(|status_code| status_code.to_string())
                    .unwrap_or_default(),
                csv_field(&outcome.detail),
                outcome.completed_ms,
            ),
            RequestLogFormat::Raw => format!("{:?}", outcome),
        }
    }
}

/// Quote a csv field when it contains a separator, a quote or a line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl LoadTestConfiguration {
    /// Launch the request logger task if `--request-log` is set.
    ///
    /// The log file is created here, before any request is made, so an unwritable path
    /// fails the run up front.
    pub(crate) async fn setup_request_logger(
        &self,
    ) -> Result<(Option<RequestLoggerJoinHandle>, Option<RequestLogTx>), LoadTestError> {
        if self.request_log.is_empty() {
            return Ok((None, None));
        }

        let file = match File::create(&self.request_log).await {
            Ok(file) => file,
            Err(e) => {
                return Err(LoadTestError::InvalidOption {
                    option: "--request-log".to_string(),
                    value: self.request_log.clone(),
                    detail: format!("failed to create request log: {}", e),
                });
            }
        };

        let (tx, rx) = flume::unbounded();
        let handle = tokio::spawn(request_logger_main(
            file,
            self.request_log.clone(),
            self.request_format.unwrap_or_default(),
            rx,
        ));

        Ok((Some(handle), Some(tx)))
    }
}

/// Logger task: writes every outcome it receives until it gets `None` or every
/// sender is dropped.
async fn request_logger_main(
    file: File,
    request_log: String,
    format: RequestLogFormat,
    receiver: flume::Receiver<Option<RequestOutcome>>,
) -> Result<(), LoadTestError> {
    info!("writing requests to request_log: {}", &request_log);
    let mut writer = BufWriter::with_capacity(64 * 1024, file);

    if let Some(header) = format.header() {
        writer.write_all(format!("{}\n", header).as_bytes()).await?;
    }

    while let Ok(message) = receiver.recv_async().await {
        match message {
            Some(outcome) => {
                let formatted_log = format!("{}\n", format.format(&outcome));
                if let Err(e) = writer.write_all(formatted_log.as_bytes()).await {
                    warn!("failed to write to {}: {}", &request_log, e);
                }
            }
            // Empty message means it's time to exit.
            None => break,
        }
    }

    info!("flushing request_log: {}", &request_log);
    writer.flush().await?;

    Ok(())
}
