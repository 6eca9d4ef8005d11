//! Bounded-retry probe sequences and one-off model tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use modelwatch_config::ProbePolicy;
use modelwatch_core::{is_failure_response, ModelEndpointId, ModelError, ProbeStatus, TestModelRequest};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{ModelTester, StatusStore};

/// Slack added on top of a request's own timeout before the prober gives up on it.
const ATTEMPT_GRACE: Duration = Duration::from_secs(1);

/// Why a single attempt did not pass.
#[derive(Error, Debug)]
pub enum AttemptError {
    /// The test request could not complete.
    #[error(transparent)]
    Transport(#[from] ModelError),

    /// The tester did not answer within the attempt bound.
    #[error("no answer within {0:?}")]
    TimedOut(Duration),

    /// The endpoint answered with the failure marker.
    #[error("{0}")]
    Rejected(String),
}

/// Runs probe sequences against model endpoints and records their status.
///
/// Sequences for different endpoints are independent tasks. Sequences for the
/// same endpoint are not serialized; only the newest one writes its result.
pub struct HealthProber {
    tester: Arc<dyn ModelTester>,
    store: Arc<dyn StatusStore>,
    policy: ProbePolicy,
    next_generation: AtomicU64,
    generations: Mutex<Generations>,
}

/// Per-endpoint sequence bookkeeping.
#[derive(Default)]
struct Generations {
    /// Generation of the newest sequence started for each endpoint.
    current: HashMap<ModelEndpointId, u64>,
    /// Counter value at the moment each endpoint was last forgotten.
    forgotten: HashMap<ModelEndpointId, u64>,
}

impl HealthProber {
    /// Creates a prober that sends requests through `tester` and records status in `store`.
    pub fn new(tester: Arc<dyn ModelTester>, store: Arc<dyn StatusStore>, policy: ProbePolicy) -> Self {
        Self {
            tester,
            store,
            policy,
            next_generation: AtomicU64::new(0),
            generations: Mutex::new(Generations::default()),
        }
    }

    pub fn policy(&self) -> &ProbePolicy {
        &self.policy
    }

    /// Current status of an endpoint, if it was ever probed.
    pub fn status(&self, id: &ModelEndpointId) -> Option<ProbeStatus> {
        self.store.read(id)
    }

    /// Copy of every recorded status.
    pub fn snapshot(&self) -> HashMap<ModelEndpointId, ProbeStatus> {
        self.store.snapshot()
    }

    /// Starts a probe sequence in the background.
    ///
    /// The status reads `pending` when this returns. No handle is kept: the
    /// sequence runs to completion or is dropped with the runtime.
    pub fn probe(self: &Arc<Self>, id: &ModelEndpointId) {
        let generation = self.begin(id);
        let prober = Arc::clone(self);
        let id = id.clone();
        tokio::spawn(async move {
            prober.run_sequence(&id, generation).await;
        });
    }

    /// Runs a probe sequence and waits for its outcome.
    ///
    /// The returned status is this sequence's own outcome, even when a newer
    /// sequence has since taken over the stored status.
    pub async fn probe_and_wait(&self, id: &ModelEndpointId) -> ProbeStatus {
        let generation = self.begin(id);
        self.run_sequence(id, generation).await
    }

    /// Probes every endpoint that has no recorded status yet.
    ///
    /// Returns how many sequences were started.
    pub fn observe<'a>(self: &Arc<Self>, ids: impl IntoIterator<Item = &'a ModelEndpointId>) -> usize {
        let mut started = 0;
        for id in ids {
            if self.store.read(id).is_none() {
                self.probe(id);
                started += 1;
            }
        }
        if started > 0 {
            info!("Started {} probe(s) for newly observed models", started);
        }
        started
    }

    /// Drops an endpoint's status. Sequences and manual tests still running
    /// for it will not write.
    pub fn forget(&self, id: &ModelEndpointId) {
        let mut generations = self.lock_generations();
        generations.current.remove(id);
        generations.forgotten.insert(id.clone(), self.claim_generation());
        self.store.remove(id);
    }

    /// Sends a single test request with a caller-supplied prompt.
    ///
    /// Returns the literal response text, marker included on failure. A
    /// passing response marks the endpoint `success`; nothing else touches
    /// the stored status or the running sequences. If the endpoint is
    /// forgotten while the request is in flight, nothing is written.
    pub async fn test_once(&self, id: &ModelEndpointId, message: &str) -> Result<String, ModelError> {
        let started = self.claim_generation();
        let request = self.policy.manual_request(id, message);
        let text = match self.attempt(&request).await {
            Ok(text) => text,
            Err(AttemptError::Rejected(text)) => {
                warn!("Manual test of {} failed: {}", id, text);
                return Ok(text);
            }
            Err(AttemptError::Transport(e)) => return Err(e),
            Err(AttemptError::TimedOut(_)) => return Err(ModelError::Timeout(request.timeout)),
        };

        let generations = self.lock_generations();
        if generations.forgotten.get(id).is_some_and(|&at| at > started) {
            debug!("Discarding manual test result for forgotten model {}", id);
            return Ok(text);
        }
        self.store.write(id, ProbeStatus::Success);
        info!("Manual test of {} passed", id);
        Ok(text)
    }

    /// Marks the endpoint pending and claims a new generation for it.
    fn begin(&self, id: &ModelEndpointId) -> u64 {
        let generation = self.claim_generation();
        let mut generations = self.lock_generations();
        generations.current.insert(id.clone(), generation);
        generations.forgotten.remove(id);
        self.store.write(id, ProbeStatus::Pending);
        generation
    }

    async fn run_sequence(&self, id: &ModelEndpointId, generation: u64) -> ProbeStatus {
        let request = self.policy.probe_request(id);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut status = ProbeStatus::Failure;

        for attempt in 1..=max_attempts {
            match self.attempt(&request).await {
                Ok(_) => {
                    info!("Model {} passed probe on attempt {}/{}", id, attempt, max_attempts);
                    status = ProbeStatus::Success;
                    break;
                }
                Err(e) => {
                    warn!("Attempt {}/{}: model {} test failed: {}", attempt, max_attempts, id, e);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.retry_delay()).await;
                    }
                }
            }
        }

        self.finish(id, generation, status);
        status
    }

    async fn attempt(&self, request: &TestModelRequest) -> Result<String, AttemptError> {
        let bound = Duration::from_secs(request.timeout).saturating_add(ATTEMPT_GRACE);
        let text = tokio::time::timeout(bound, self.tester.test_model(request))
            .await
            .map_err(|_| AttemptError::TimedOut(bound))??;

        if is_failure_response(&text) {
            return Err(AttemptError::Rejected(text));
        }
        Ok(text)
    }

    fn finish(&self, id: &ModelEndpointId, generation: u64, status: ProbeStatus) {
        let generations = self.lock_generations();
        if generations.current.get(id) != Some(&generation) {
            debug!("Discarding stale {} result for {} (sequence {})", status, id, generation);
            return;
        }
        self.store.write(id, status);
        if status == ProbeStatus::Failure {
            warn!("Model {} failed all {} probe attempts", id, self.policy.max_attempts);
        }
    }

    fn claim_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn lock_generations(&self) -> MutexGuard<'_, Generations> {
        self.generations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
