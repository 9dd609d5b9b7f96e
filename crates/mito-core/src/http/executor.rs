//! Timeout, bounded retry and offline deferral for every backend call.
//!
//! The control flow is a small state machine. `transition` is pure so the
//! retry schedule can be checked without a network; `RequestExecutor` drives
//! it against a real `Transport`.

use std::sync::Arc;
use std::time::Duration;

use super::request::{ApiRequest, ApiResponse};
use super::transport::Transport;
use crate::config::AppConfig;
use crate::connectivity::Connectivity;
use crate::error::{Error, Result};
use crate::outbox::ActionLog;

const BASE_RETRY_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt for network-level failures.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Applied to each attempt individually.
    pub timeout: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn from_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.retry_attempts,
            base_delay: BASE_RETRY_DELAY,
            timeout: config.timeout,
        }
    }

    /// Linear backoff: `base_delay * (retry_count + 1)`.
    #[must_use]
    pub fn backoff(&self, retry_count: u32) -> Duration {
        self.base_delay.saturating_mul(retry_count.saturating_add(1))
    }

    #[must_use]
    const fn without_retries(self) -> Self {
        Self {
            max_retries: 0,
            ..self
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Timeout,
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    InFlight { retry_count: u32 },
    Retrying { retry_count: u32, delay: Duration },
    Queued,
    Failed(Failure),
    Succeeded(ApiResponse),
}

impl RequestState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Queued | Self::Failed(_) | Self::Succeeded(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestEvent {
    Dispatch { retry_count: u32 },
    /// The server answered, whatever the status.
    Responded(ApiResponse),
    Failed(Failure),
    BackoffElapsed,
}

/// Facts sampled at the moment an attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttemptContext {
    pub offline: bool,
    /// Mutating method and queueing allowed for this call.
    pub queueable: bool,
}

/// Advance the request state machine. Events that do not apply to the current
/// state leave it unchanged.
#[must_use]
pub fn transition(
    state: RequestState,
    event: RequestEvent,
    context: AttemptContext,
    policy: &RetryPolicy,
) -> RequestState {
    match (state, event) {
        (RequestState::Idle, RequestEvent::Dispatch { retry_count }) => {
            RequestState::InFlight { retry_count }
        }
        (RequestState::InFlight { .. }, RequestEvent::Responded(response)) => {
            RequestState::Succeeded(response)
        }
        (RequestState::InFlight { .. }, RequestEvent::Failed(Failure::Timeout)) => {
            RequestState::Failed(Failure::Timeout)
        }
        (RequestState::InFlight { retry_count }, RequestEvent::Failed(Failure::Network(message))) => {
            if context.offline && context.queueable {
                RequestState::Queued
            } else if retry_count < policy.max_retries {
                RequestState::Retrying {
                    retry_count: retry_count + 1,
                    delay: policy.backoff(retry_count),
                }
            } else {
                RequestState::Failed(Failure::Network(message))
            }
        }
        (RequestState::Retrying { retry_count, .. }, RequestEvent::BackoffElapsed) => {
            RequestState::InFlight { retry_count }
        }
        (state, _) => state,
    }
}

/// The single path for backend calls.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    connectivity: Connectivity,
    action_log: ActionLog,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
        connectivity: Connectivity,
        action_log: ActionLog,
    ) -> Self {
        Self {
            transport,
            policy,
            connectivity,
            action_log,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[must_use]
    pub const fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    #[must_use]
    pub const fn action_log(&self) -> &ActionLog {
        &self.action_log
    }

    /// Send a request. Non-2xx statuses are returned as responses.
    ///
    /// Fails with `Timeout` when an attempt exceeds the timeout,
    /// `QueuedForSync` when a mutating call was deferred while offline, and
    /// `Network` once retries are exhausted.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.execute_from(request, 0).await
    }

    /// Like `execute`, starting from an existing retry count.
    pub async fn execute_from(&self, request: &ApiRequest, retry_count: u32) -> Result<ApiResponse> {
        self.run(request, retry_count, true, self.policy).await
    }

    /// Like `execute`, but an offline failure is reported instead of queued.
    ///
    /// Used for requests that carry credentials, which must never reach the
    /// action log.
    pub async fn execute_unqueued(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.run(request, 0, false, self.policy).await
    }

    /// One attempt for a queued action. Never re-enqueues.
    pub(crate) async fn replay(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.run(request, 0, false, self.policy.without_retries())
            .await
    }

    async fn run(
        &self,
        request: &ApiRequest,
        retry_count: u32,
        allow_queue: bool,
        policy: RetryPolicy,
    ) -> Result<ApiResponse> {
        let queueable = allow_queue && request.method.is_mutating();
        let mut state = transition(
            RequestState::Idle,
            RequestEvent::Dispatch { retry_count },
            AttemptContext::default(),
            &policy,
        );

        loop {
            state = match state {
                RequestState::InFlight { retry_count } => {
                    tracing::debug!(method = %request.method, url = %request.url, retry_count, "Sending request");
                    let event = match tokio::time::timeout(policy.timeout, self.transport.send(request)).await {
                        Ok(Ok(response)) => RequestEvent::Responded(response),
                        Ok(Err(error)) => RequestEvent::Failed(Failure::Network(error.to_string())),
                        Err(_) => RequestEvent::Failed(Failure::Timeout),
                    };
                    let context = AttemptContext {
                        offline: !self.connectivity.is_online(),
                        queueable,
                    };
                    transition(RequestState::InFlight { retry_count }, event, context, &policy)
                }
                RequestState::Retrying { retry_count, delay } => {
                    tracing::warn!(
                        method = %request.method,
                        url = %request.url,
                        retry_count,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Network error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    transition(
                        RequestState::Retrying { retry_count, delay },
                        RequestEvent::BackoffElapsed,
                        AttemptContext::default(),
                        &policy,
                    )
                }
                RequestState::Queued => {
                    let action = self.action_log.enqueue(request)?;
                    return Err(Error::QueuedForSync {
                        action_id: action.id,
                    });
                }
                RequestState::Failed(Failure::Timeout) => {
                    tracing::warn!(method = %request.method, url = %request.url, "Request timed out");
                    return Err(Error::Timeout);
                }
                RequestState::Failed(Failure::Network(message)) => {
                    tracing::warn!(method = %request.method, url = %request.url, "Network error: {}", message);
                    return Err(Error::Network(message));
                }
                RequestState::Succeeded(response) => return Ok(response),
                RequestState::Idle => {
                    return Err(Error::Network("request was never dispatched".to_string()));
                }
            };
        }
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RequestExecutor")
            .field("policy", &self.policy)
            .field("online", &self.connectivity.is_online())
            .finish_non_exhaustive()
    }
}
