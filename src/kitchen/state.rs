// src/kitchen/state.rs

//! Cook state machine
//!
//! A cook moves strictly forward through
//! `Pending -> Fetched -> Verified -> Patched -> Built -> Installed -> Tested -> Done`
//! and may drop into the terminal `Failed` state from anywhere except `Done`.
//! The tracker refuses any other transition, so a stage can never be skipped
//! or repeated.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Where in the pipeline a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Dependencies,
    Fetch,
    Verify,
    Unpack,
    Patch,
    Build,
    Install,
    PostInstall,
    Test,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Dependencies => "dependencies",
            Phase::Fetch => "fetch",
            Phase::Verify => "verify",
            Phase::Unpack => "unpack",
            Phase::Patch => "patch",
            Phase::Build => "build",
            Phase::Install => "install",
            Phase::PostInstall => "post-install",
            Phase::Test => "test",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one cook
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum CookState {
    Pending,
    Fetched,
    Verified,
    Patched,
    Built,
    Installed,
    Tested,
    Done,
    Failed { stage: Phase, reason: String },
}

impl CookState {
    /// The only state this one may advance to on success
    pub fn successor(&self) -> Option<CookState> {
        match self {
            CookState::Pending => Some(CookState::Fetched),
            CookState::Fetched => Some(CookState::Verified),
            CookState::Verified => Some(CookState::Patched),
            CookState::Patched => Some(CookState::Built),
            CookState::Built => Some(CookState::Installed),
            CookState::Installed => Some(CookState::Tested),
            CookState::Tested => Some(CookState::Done),
            CookState::Done | CookState::Failed { .. } => None,
        }
    }

    /// Done or Failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, CookState::Done | CookState::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            CookState::Pending => "pending",
            CookState::Fetched => "fetched",
            CookState::Verified => "verified",
            CookState::Patched => "patched",
            CookState::Built => "built",
            CookState::Installed => "installed",
            CookState::Tested => "tested",
            CookState::Done => "done",
            CookState::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for CookState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CookState::Failed { stage, reason } => write!(f, "failed at {}: {}", stage, reason),
            other => f.write_str(other.name()),
        }
    }
}

/// Records every state a cook passes through
#[derive(Debug, Clone)]
pub struct StateTracker {
    history: Vec<CookState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            history: vec![CookState::Pending],
        }
    }

    /// Current state
    pub fn current(&self) -> &CookState {
        // history always holds at least Pending
        &self.history[self.history.len() - 1]
    }

    /// Move to `next`, which must be the successor of the current state
    pub fn advance(&mut self, next: CookState) -> Result<()> {
        let current = self.current();
        if current.successor().as_ref() != Some(&next) {
            return Err(Error::InvalidTransition {
                from: current.name().to_string(),
                to: next.name().to_string(),
            });
        }
        self.history.push(next);
        Ok(())
    }

    /// Enter the terminal failed state
    pub fn fail(&mut self, stage: Phase, reason: impl Into<String>) -> Result<()> {
        let current = self.current();
        if current.is_terminal() {
            return Err(Error::InvalidTransition {
                from: current.name().to_string(),
                to: "failed".to_string(),
            });
        }
        self.history.push(CookState::Failed {
            stage,
            reason: reason.into(),
        });
        Ok(())
    }

    /// All states visited, starting with Pending
    pub fn history(&self) -> &[CookState] {
        &self.history
    }

    pub fn into_history(self) -> Vec<CookState> {
        self.history
    }
}
