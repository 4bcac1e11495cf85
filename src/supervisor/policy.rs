//! Restart policy and supervisor state machine
//!
//! A producer that dies before `min_uptime` is taken to be broken for good
//! and is not restarted again. One that ran longer is restarted right away,
//! forever; the uptime check is the only throttle.

use std::time::Duration;

/// Minimum uptime before an exit counts as transient
pub const DEFAULT_MIN_UPTIME: Duration = Duration::from_secs(120);

/// Lifecycle of the supervised producer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Building and starting the command
    Spawning,
    /// Process alive, stdout and stderr being drained
    Running,
    /// Crash loop detected; no further spawns for the program lifetime
    Stopped,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorState::Spawning => write!(f, "spawning"),
            SupervisorState::Running => write!(f, "running"),
            SupervisorState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Observable supervisor status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorStatus {
    /// Current state
    pub state: SupervisorState,
    /// Spawn attempts made so far, successful or not
    pub spawns: u64,
}

impl Default for SupervisorStatus {
    fn default() -> Self {
        Self {
            state: SupervisorState::Spawning,
            spawns: 0,
        }
    }
}

/// What to do once a producer run is over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    /// Ran long enough; spawn again
    Restart,
    /// Ended too quickly; stop supervising
    Stop,
}

/// Crash-loop-stop policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Runs shorter than this stop the supervisor
    pub min_uptime: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            min_uptime: DEFAULT_MIN_UPTIME,
        }
    }
}

impl RestartPolicy {
    /// Policy that stops after any run shorter than `min_uptime`
    pub fn new(min_uptime: Duration) -> Self {
        Self { min_uptime }
    }

    /// Decide based on how long the run lasted
    ///
    /// Spawn failures count as a zero-length run.
    pub fn decide(&self, elapsed: Duration) -> ExitDecision {
        if elapsed < self.min_uptime {
            ExitDecision::Stop
        } else {
            ExitDecision::Restart
        }
    }
}
