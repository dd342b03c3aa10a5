//! Application-wide state and error types for the node
//!
//! [`LinkSupervisor`] holds the join and uplink bookkeeping. It never touches
//! the radio itself: the firmware reports what happened and acts on the
//! returned decision, which keeps the policy testable on the host.

use core::fmt::{Debug, Write};

use embassy_time::Duration;
use log::{info, warn};
use thiserror_no_std::Error;

use crate::config::{ConfigError, JoinPolicy};
use crate::credentials::CredentialsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRunState {
    Uninitialized,
    Joining,
    Joined,
    /// Gave up joining; nothing is transmitted.
    Offline,
}

/// What to do after a join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    Joined,
    RetryAfter(Duration),
    GiveUp,
}

/// Result of handing a frame to the network stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UplinkOutcome {
    /// Sent, nothing came back in the receive windows.
    Sent,
    /// Sent and a downlink was received.
    SentWithDownlink,
    /// Confirmed uplink was not acknowledged.
    NoAck,
    /// The stack has no valid session any more.
    SessionExpired,
    /// The radio or the stack reported an error.
    Failed,
}

impl UplinkOutcome {
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Sent | Self::SentWithDownlink)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UplinkDecision {
    Continue,
    Rejoin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub joins: u32,
    pub uplinks_sent: u32,
    pub uplinks_failed: u32,
    pub downlinks: u32,
}

pub struct LinkSupervisor {
    policy: JoinPolicy,
    run_state: NodeRunState,
    join_attempts: u8,
    stats: LinkStats,
}

impl LinkSupervisor {
    pub const fn new(policy: JoinPolicy) -> Self {
        Self {
            policy,
            run_state: NodeRunState::Uninitialized,
            join_attempts: 0,
            stats: LinkStats {
                joins: 0,
                uplinks_sent: 0,
                uplinks_failed: 0,
                downlinks: 0,
            },
        }
    }

    pub fn run_state(&self) -> NodeRunState {
        self.run_state
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Mark the start of a join attempt and return its 1-based number.
    pub fn begin_join(&mut self) -> u8 {
        if self.run_state != NodeRunState::Joining {
            self.join_attempts = 0;
        }
        self.run_state = NodeRunState::Joining;
        self.join_attempts = self.join_attempts.saturating_add(1);
        self.join_attempts
    }

    pub fn on_join_result(&mut self, joined: bool) -> JoinDecision {
        if joined {
            self.run_state = NodeRunState::Joined;
            self.stats.joins += 1;
            self.join_attempts = 0;
            return JoinDecision::Joined;
        }

        let exhausted =
            self.policy.max_attempts != 0 && self.join_attempts >= self.policy.max_attempts;
        if exhausted {
            warn!("Join failed after {} attempt(s)", self.join_attempts);
            self.run_state = NodeRunState::Offline;
            JoinDecision::GiveUp
        } else {
            JoinDecision::RetryAfter(self.policy.retry_delay)
        }
    }

    pub fn on_uplink(&mut self, outcome: UplinkOutcome) -> UplinkDecision {
        if outcome.is_success() {
            self.stats.uplinks_sent += 1;
        } else {
            self.stats.uplinks_failed += 1;
        }
        if outcome == UplinkOutcome::SentWithDownlink {
            self.stats.downlinks += 1;
        }

        match outcome {
            UplinkOutcome::SessionExpired => {
                info!("Session expired, rejoining");
                self.run_state = NodeRunState::Joining;
                self.join_attempts = 0;
                UplinkDecision::Rejoin
            }
            _ => UplinkDecision::Continue,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Radio error: {0}")]
    Radio(heapless::String<64>),
    #[error("Credentials error: {0}")]
    Credentials(CredentialsError),
    #[error("Config error: {0}")]
    Config(ConfigError),
    #[error("Hardware error: {0}")]
    Hardware(heapless::String<64>),
    #[error("Spawn failed: {0}")]
    Spawn(&'static str),
}

impl From<CredentialsError> for AppError {
    fn from(value: CredentialsError) -> Self {
        Self::Credentials(value)
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Debug-format `value` into a bounded string, truncating what does not fit.
pub fn describe<E: Debug>(value: &E) -> heapless::String<64> {
    let mut out = heapless::String::new();
    let _ = write!(out, "{:?}", value);
    out
}
