//! Gather outcomes in completion order.
//!
//! Nothing downstream looks at the outcomes until every request has finished: the
//! statistics are computed once, over the complete set.

use crate::issuer::RequestOutcome;
use crate::logger::RequestLogTx;
use crate::LoadTestError;

/// Owns every [`RequestOutcome`] of a run once its task returns it.
#[derive(Debug)]
pub struct ResultCollector {
    expected: usize,
    outcomes: Vec<RequestOutcome>,
    request_log: Option<RequestLogTx>,
}

impl ResultCollector {
    /// Prepare to collect `expected` outcomes.
    pub fn new(expected: usize) -> Self {
        ResultCollector {
            expected,
            outcomes: Vec::with_capacity(expected),
            request_log: None,
        }
    }

    /// Also forward every outcome to the request logger.
    pub(crate) fn with_request_log(mut self, request_log: Option<RequestLogTx>) -> Self {
        self.request_log = request_log;
        self
    }

    /// Receive outcomes until every sender is dropped.
    pub async fn collect(&mut self, receiver: flume::Receiver<RequestOutcome>) {
        while let Ok(outcome) = receiver.recv_async().await {
            self.record(outcome);
        }
    }

    /// Store one outcome.
    pub fn record(&mut self, outcome: RequestOutcome) {
        if let Some(request_log) = self.request_log.as_ref() {
            if let Err(e) = request_log.send(Some(outcome.clone())) {
                warn!("failed to send outcome to request logger: {}", e);
            }
        }
        self.outcomes.push(outcome);

        let collected = self.outcomes.len();
        if collected % 100 == 0 || collected == self.expected {
            debug!("collected {} of {} outcomes", collected, self.expected);
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Every expected outcome has arrived.
    pub fn is_complete(&self) -> bool {
        self.outcomes.len() == self.expected
    }

    /// Hand over the full set of outcomes.
    ///
    /// Fails if the number collected differs from the number expected.
    pub fn finish(self) -> Result<Vec<RequestOutcome>, LoadTestError> {
        if !self.is_complete() {
            return Err(LoadTestError::IncompleteRun {
                expected: self.expected,
                collected: self.outcomes.len(),
            });
        }
        Ok(self.outcomes)
    }
}
