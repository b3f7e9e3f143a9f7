//! Per-task retry state machine
//!
//! ```text
//! Pending -> Attempting -> Success
//!                       -> Retrying -> Attempting
//!                       -> Failed
//! ```
//!
//! `Success` and `Failed` are terminal. The task keeps its pool slot while
//! `Retrying`.

use crate::crawler::fetcher::{BoxFut, Response};
use crate::TransportError;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Pending,
    Attempting,
    Retrying,
    Success,
    Failed,
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// What the caller should do after an attempt completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Succeeded,
    Retry { delay: Duration, remaining: u32 },
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct RetryController {
    remaining: u32,
    delay: Duration,
    attempts: u32,
    state: RetryState,
}

impl RetryController {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self {
            remaining: retries,
            delay,
            attempts: 0,
            state: RetryState::Pending,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Retries left before a failure becomes terminal
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Attempts started so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn start_attempt(&mut self) {
        debug_assert!(!self.state.is_terminal(), "attempt after terminal state");
        self.attempts += 1;
        self.state = RetryState::Attempting;
    }

    pub fn record_success(&mut self) -> Transition {
        self.state = RetryState::Success;
        Transition::Succeeded
    }

    /// Records a failed attempt
    ///
    /// Non-retryable failures are terminal regardless of the remaining budget.
    pub fn record_failure(&mut self, retryable: bool) -> Transition {
        if retryable && self.remaining > 0 {
            self.remaining -= 1;
            self.state = RetryState::Retrying;
            Transition::Retry {
                delay: self.delay,
                remaining: self.remaining,
            }
        } else {
            self.state = RetryState::Failed;
            Transition::GiveUp
        }
    }
}

/// Runs `attempt` until it succeeds or the retry budget is spent
pub async fn fetch_with_retries<'a, F>(
    controller: &mut RetryController,
    uri: &str,
    mut attempt: F,
) -> Result<Response, TransportError>
where
    F: FnMut() -> BoxFut<'a, Result<Response, TransportError>>,
{
    loop {
        controller.start_attempt();
        let error = match attempt().await {
            Ok(response) => {
                controller.record_success();
                tracing::debug!("Got {} ({} bytes)", uri, response.content.len());
                return Ok(response);
            }
            Err(error) => error,
        };

        match controller.record_failure(error.is_retryable()) {
            Transition::Retry { delay, remaining } => {
                tracing::debug!(
                    "Error {} when fetching {} ({} retries left)",
                    error,
                    uri,
                    remaining
                );
                tokio::time::sleep(delay).await;
            }
            Transition::GiveUp | Transition::Succeeded => {
                tracing::debug!("Error {} when fetching {}", error, uri);
                return Err(error);
            }
        }
    }
}
