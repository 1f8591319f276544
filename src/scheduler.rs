//! Fan out one task per request and fan the outcomes back in.
//!
//! Hosts are drawn for every request up front, in submission order, from an injected
//! random source: a seeded [`StdRng`](rand::rngs::StdRng) reproduces the exact same host
//! sequence. The tasks themselves complete in whatever order the network allows.

use futures::future::join_all;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::collector::ResultCollector;
use crate::issuer::{RequestIssuer, RequestOutcome};
use crate::limiter::ConcurrencyLimiter;
use crate::LoadTestError;

/// Draw `count` hosts uniformly at random, with replacement.
///
/// # Example
/// ```rust
/// use hostload::scheduler::plan_hosts;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let hosts = vec!["foo.localhost".to_string(), "bar.localhost".to_string()];
/// let first = plan_hosts(&hosts, 10, &mut StdRng::seed_from_u64(7)).unwrap();
/// let second = plan_hosts(&hosts, 10, &mut StdRng::seed_from_u64(7)).unwrap();
/// assert_eq!(first, second);
/// ```
pub fn plan_hosts<R: Rng + ?Sized>(
    hosts: &[String],
    count: usize,
    rng: &mut R,
) -> Result<Vec<String>, LoadTestError> {
    let mut planned = Vec::with_capacity(count);
    for _ in 0..count {
        match hosts.choose(rng) {
            Some(host) => planned.push(host.clone()),
            None => {
                return Err(LoadTestError::InvalidOption {
                    option: "--hosts".to_string(),
                    value: String::new(),
                    detail: "at least one host label is required.".to_string(),
                })
            }
        }
    }
    Ok(planned)
}

/// Launches request tasks, each bound by the shared [`ConcurrencyLimiter`].
#[derive(Clone, Debug)]
pub struct WorkScheduler {
    issuer: Arc<RequestIssuer>,
    limiter: ConcurrencyLimiter,
}

impl WorkScheduler {
    pub fn new(issuer: RequestIssuer, limiter: ConcurrencyLimiter) -> Self {
        WorkScheduler {
            issuer: Arc::new(issuer),
            limiter,
        }
    }

    /// Spawn one task per host, in order. Each task waits for a permit, issues its
    /// request, frees the permit and sends the outcome to `sender`.
    pub fn spawn_all(
        &self,
        hosts: Vec<String>,
        sender: flume::Sender<RequestOutcome>,
    ) -> Vec<JoinHandle<Result<(), LoadTestError>>> {
        hosts
            .into_iter()
            .enumerate()
            .map(|(index, host)| {
                let issuer = self.issuer.clone();
                let limiter = self.limiter.clone();
                let sender = sender.clone();
                tokio::spawn(async move {
                    let permit = limiter.acquire().await?;
                    trace!("request {} launching for {}", index, host);
                    let outcome = issuer.issue(&host).await;
                    drop(permit);

                    if sender.send(outcome).is_err() {
                        warn!("request {}: result collector is gone, outcome lost", index);
                    }
                    Ok::<(), LoadTestError>(())
                })
            })
            .collect()
    }

    /// Run every request to completion, feeding outcomes to `collector` as they
    /// finish, then wait for all tasks to exit.
    pub async fn run(
        &self,
        hosts: Vec<String>,
        collector: &mut ResultCollector,
    ) -> Result<(), LoadTestError> {
        let (sender, receiver) = flume::unbounded();
        // The channel closes once the last task drops its sender.
        let handles = self.spawn_all(hosts, sender);

        collector.collect(receiver).await;

        for result in join_all(handles).await {
            result??;
        }
        Ok(())
    }
}
