//! Request lifecycle for one generation at a time: attempts, backoff between
//! transient failures, and cooperative cancellation.
//!
//! Every logical generation gets a fresh token (a counter) and a fresh
//! [`CancellationToken`]. The attempt loop captures both when it is spawned and
//! only mutates state while its token is still the current one, so a response
//! or timer belonging to an aborted generation can never leak into a newer one.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{sync::{broadcast, watch}, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, error, debug};

use crate::{
    config::RetryPolicy,
    error::TransportError,
    models::{Generation, GenerationRequest},
    transport::Transport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Attempting,
    RetryPending,
    Succeeded,
    Failed,
    Aborted,
}

impl Phase {
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Attempting | Phase::RetryPending)
    }
}

/// Consistent snapshot of the controller, published after every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationStatus {
    pub phase: Phase,
    pub is_loading: bool,
    pub can_abort: bool,
    pub error: Option<String>,
    pub result: Option<Generation>,
    pub retry_count: u32,
}

impl Default for GenerationStatus {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            is_loading: false,
            can_abort: false,
            error: None,
            result: None,
            retry_count: 0,
        }
    }
}

impl GenerationStatus {
    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.is_loading = phase.is_in_flight();
        self.can_abort = phase.is_in_flight();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Started,
    AttemptFailed { attempt: u32, message: String },
    RetryScheduled { attempt: u32, max_attempts: u32, delay: Duration },
    Completed(Generation),
    Failed(String),
    Cancelled,
}

struct Inner {
    token: u64,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    last_request: Option<GenerationRequest>,
    status: GenerationStatus,
}

struct Core {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    inner: Mutex<Inner>,
    status_tx: watch::Sender<GenerationStatus>,
    events: broadcast::Sender<ControllerEvent>,
}

impl Core {
    fn publish(&self, inner: &Inner) {
        self.status_tx.send_replace(inner.status.clone());
    }

    fn emit(&self, event: ControllerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Applies `f` only if `token` still names the active generation.
    fn update(&self, token: u64, f: impl FnOnce(&mut GenerationStatus)) -> bool {
        let mut inner = self.inner.lock();
        if !is_live(&inner, token) {
            return false;
        }
        f(&mut inner.status);
        self.publish(&inner);
        true
    }

    fn settle(&self, token: u64, f: impl FnOnce(&mut GenerationStatus), event: ControllerEvent) {
        let mut inner = self.inner.lock();
        if !is_live(&inner, token) {
            debug!("Dropping stale outcome for generation #{}", token);
            return;
        }
        f(&mut inner.status);
        inner.cancel = None;
        inner.task = None;
        self.publish(&inner);
        self.emit(event);
    }
}

fn is_live(inner: &Inner, token: u64) -> bool {
    inner.token == token && inner.cancel.as_ref().is_some_and(|c| !c.is_cancelled())
}

/// Drives generation requests through a [`Transport`], retrying transient
/// failures on the configured backoff schedule.
///
/// Must be used from inside a tokio runtime. Dropping the controller cancels
/// whatever is in flight.
pub struct GenerationController {
    core: Arc<Core>,
}

impl GenerationController {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        let (status_tx, _) = watch::channel(GenerationStatus::default());
        let (events, _) = broadcast::channel(64);
        Self {
            core: Arc::new(Core {
                transport,
                policy,
                inner: Mutex::new(Inner {
                    token: 0,
                    cancel: None,
                    task: None,
                    last_request: None,
                    status: GenerationStatus::default(),
                }),
                status_tx,
                events,
            }),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.core.policy
    }

    pub fn status(&self) -> GenerationStatus {
        self.core.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationStatus> {
        self.core.status_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.core.events.subscribe()
    }

    /// Starts a logical generation. Ignored while another one is in flight.
    /// Returns whether a new generation was started.
    pub fn generate(&self, request: GenerationRequest) -> bool {
        let mut inner = self.core.inner.lock();
        if inner.status.phase.is_in_flight() {
            debug!("Generation already in flight, ignoring duplicate submit");
            return false;
        }

        inner.token += 1;
        let token = inner.token;
        let cancel = CancellationToken::new();
        inner.cancel = Some(cancel.clone());
        inner.last_request = Some(request.clone());
        inner.status = GenerationStatus::default();
        inner.status.set_phase(Phase::Attempting);
        self.core.publish(&inner);
        self.core.emit(ControllerEvent::Started);

        info!("🎨 Starting generation #{}: {}", token, request.summary());
        inner.task = Some(tokio::spawn(run_attempts(self.core.clone(), token, cancel, request)));
        true
    }

    /// Cancels the in-flight generation, if any. The status drops straight
    /// to a neutral state with no error recorded.
    pub fn abort(&self) {
        let mut inner = self.core.inner.lock();
        if !inner.status.phase.is_in_flight() {
            return;
        }

        inner.token += 1;
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = inner.task.take() {
            task.abort();
        }
        inner.status = GenerationStatus::default();
        inner.status.set_phase(Phase::Aborted);
        self.core.publish(&inner);
        self.core.emit(ControllerEvent::Cancelled);
        info!("🛑 Generation cancelled");
    }

    /// User-initiated retry: reruns the last request from attempt 0.
    pub fn retry(&self) -> bool {
        let request = {
            let inner = self.core.inner.lock();
            if inner.status.phase.is_in_flight() {
                return false;
            }
            inner.last_request.clone()
        };
        match request {
            Some(request) => self.generate(request),
            None => {
                warn!("Nothing to retry");
                false
            }
        }
    }

    /// Resolves once no generation is in flight.
    pub async fn wait(&self) -> GenerationStatus {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(|s| !s.phase.is_in_flight()).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.status())
    }
}

impl Drop for GenerationController {
    fn drop(&mut self) {
        let mut inner = self.core.inner.lock();
        inner.token += 1;
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = inner.task.take() {
            task.abort();
        }
    }
}

async fn run_attempts(core: Arc<Core>, token: u64, cancel: CancellationToken, request: GenerationRequest) {
    let max_attempts = core.policy.max_attempts;
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return;
        }
        let started = core.update(token, |s| {
            s.set_phase(Phase::Attempting);
            s.retry_count = attempt;
        });
        if !started {
            return;
        }

        debug!("Generation #{} attempt {}/{}", token, attempt + 1, max_attempts);
        let outcome = core.transport.send(&request, cancel.clone()).await;

        match outcome {
            Ok(generation) => {
                info!("✅ Generation #{} complete ({})", token, generation.id);
                core.settle(
                    token,
                    |s| {
                        s.set_phase(Phase::Succeeded);
                        s.error = None;
                        s.result = Some(generation.clone());
                    },
                    ControllerEvent::Completed(generation.clone()),
                );
                return;
            }
            Err(TransportError::Cancelled) => {
                if !cancel.is_cancelled() {
                    // Transport gave up on its own; still not an error.
                    core.settle(token, |s| *s = GenerationStatus { phase: Phase::Aborted, ..Default::default() }, ControllerEvent::Cancelled);
                }
                return;
            }
            Err(err) => {
                if cancel.is_cancelled() {
                    return;
                }
                let message = err.to_string();
                error!("❌ Generation #{} attempt {} failed: {}", token, attempt + 1, message);
                core.emit(ControllerEvent::AttemptFailed { attempt, message: message.clone() });

                if !err.is_retryable() || core.policy.is_last_attempt(attempt) {
                    core.settle(
                        token,
                        |s| {
                            s.set_phase(Phase::Failed);
                            s.error = Some(message.clone());
                        },
                        ControllerEvent::Failed(message.clone()),
                    );
                    return;
                }

                let delay = core.policy.delay_for(attempt);
                let notice = format!(
                    "{} - Retrying in {} seconds... (Attempt {}/{})",
                    message,
                    delay.as_secs_f64(),
                    attempt + 2,
                    max_attempts
                );
                let scheduled = core.update(token, |s| {
                    s.set_phase(Phase::RetryPending);
                    s.error = Some(notice);
                });
                if !scheduled {
                    return;
                }
                core.emit(ControllerEvent::RetryScheduled { attempt: attempt + 1, max_attempts, delay });
                info!("🔄 Retrying generation #{} in {:?}", token, delay);

                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}
