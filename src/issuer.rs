//! Issue a single timed GET request routed by the `Host` header, and decide whether
//! the routing worked.

use http::header::HOST;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use url::Url;

use crate::config::LoadTestConfig;
use crate::LoadTestError;

/// User agent sent with every request.
static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// The recorded result of one issued request. Created once, never modified.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    /// Host label the request was routed with.
    pub host: String,
    /// Status was 200 and the body named the expected backend.
    pub success: bool,
    /// Time from just before sending until the full body was read, or until the
    /// request failed.
    pub elapsed_ms: f64,
    /// Response status, `None` when no response was received.
    pub status_code: Option<u16>,
    /// Trimmed response body, or a description of why the request failed.
    pub detail: String,
    /// Milliseconds from the start of the run until this request completed.
    pub completed_ms: f64,
}

/// The part of a host label a backend is expected to echo back: everything before the
/// first `.` (`foo` for `foo.localhost`), or the whole label if it has no `.`.
///
/// # Example
/// ```rust
/// use hostload::issuer::expected_label;
///
/// assert_eq!(expected_label("foo.localhost"), "foo");
/// assert_eq!(expected_label("bar"), "bar");
/// ```
pub fn expected_label(host: &str) -> &str {
    match host.find('.') {
        Some(index) => &host[..index],
        None => host,
    }
}

/// A response is valid when its status is `200 OK` and its trimmed body contains the
/// expected label of the host it was routed with.
pub fn is_valid_response(host: &str, status: StatusCode, body: &str) -> bool {
    status == StatusCode::OK && body.trim().contains(expected_label(host))
}

/// Build the client shared by every request of a run.
pub(crate) fn build_client(config: &LoadTestConfig) -> Result<Client, LoadTestError> {
    Ok(Client::builder()
        .user_agent(APP_USER_AGENT)
        .timeout(config.timeout)
        .pool_max_idle_per_host(config.connection_pool_size())
        .build()?)
}

/// Sends requests to the target and turns every result into a [`RequestOutcome`].
#[derive(Clone, Debug)]
pub struct RequestIssuer {
    client: Client,
    target: Url,
    run_started: Instant,
}

impl RequestIssuer {
    /// Build an issuer with its own client, configured from the run parameters.
    pub fn new(config: &LoadTestConfig, run_started: Instant) -> Result<Self, LoadTestError> {
        Ok(RequestIssuer::with_client(
            build_client(config)?,
            config.target.clone(),
            run_started,
        ))
    }

    /// Build an issuer around an existing client.
    pub fn with_client(client: Client, target: Url, run_started: Instant) -> Self {
        RequestIssuer {
            client,
            target,
            run_started,
        }
    }

    /// Send one GET request routed to `host`.
    ///
    /// Never fails: transport errors, timeouts and unexpected responses all produce an
    /// unsuccessful outcome. There are no retries.
    pub async fn issue(&self, host: &str) -> RequestOutcome {
        let started = Instant::now();
        let response = self.send(host).await;
        let elapsed = started.elapsed();

        let (success, status_code, detail) = match response {
            Ok((status, body)) => {
                let body = body.trim().to_string();
                let success = is_valid_response(host, status, &body);
                if !success {
                    debug!(
                        "{}: unexpected response, status {}, body {:?}",
                        host, status, body
                    );
                }
                (success, Some(status.as_u16()), body)
            }
            Err(e) => {
                warn!("{}: {}", host, e);
                (false, None, describe_failure(&e))
            }
        };

        RequestOutcome {
            host: host.to_string(),
            success,
            elapsed_ms: elapsed.as_secs_f64() * 1_000.0,
            status_code,
            detail,
            completed_ms: self.run_started.elapsed().as_secs_f64() * 1_000.0,
        }
    }

    async fn send(&self, host: &str) -> Result<(StatusCode, String), reqwest::Error> {
        let response = self
            .client
            .get(self.target.clone())
            .header(HOST, host)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

fn describe_failure(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {}", error)
    } else if error.is_connect() {
        format!("failed to connect: {}", error)
    } else {
        error.to_string()
    }
}
