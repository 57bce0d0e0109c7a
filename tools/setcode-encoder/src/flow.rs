//! Progress of a single build-and-submit operation.

use serde::Serialize;
use tracing::info;

use crate::error::FlowError;

/// `Idle -> Validating -> Signing -> (Simulating) -> Submitting -> Succeeded | Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BuildStatus {
    Idle,
    Validating,
    Signing,
    Simulating,
    Submitting,
    Succeeded,
    Failed,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Signing => "signing",
            Self::Simulating => "simulating",
            Self::Submitting => "submitting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    fn can_move_to(self, next: BuildStatus) -> bool {
        use BuildStatus::*;
        match (self, next) {
            (Idle, Validating) => true,
            (Validating, Signing) => true,
            // Offline builds stop after signing; simulation is optional.
            (Signing, Simulating | Submitting | Succeeded) => true,
            (Simulating, Submitting | Succeeded) => true,
            (Submitting, Succeeded) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// State machine for one build; keeps the path taken and the failure reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildFlow {
    status: BuildStatus,
    history: Vec<BuildStatus>,
    failure: Option<String>,
}

impl Default for BuildFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildFlow {
    pub fn new() -> Self {
        Self { status: BuildStatus::Idle, history: vec![BuildStatus::Idle], failure: None }
    }

    pub fn status(&self) -> BuildStatus {
        self.status
    }

    pub fn history(&self) -> &[BuildStatus] {
        &self.history
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn visited(&self, status: BuildStatus) -> bool {
        self.history.contains(&status)
    }

    pub fn transition(&mut self, next: BuildStatus) -> Result<(), FlowError> {
        if !self.status.can_move_to(next) {
            return Err(FlowError::IllegalTransition { from: self.status, to: next });
        }
        info!(from = self.status.as_str(), to = next.as_str(), "build status");
        self.status = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed`, recording `reason`. A flow that already finished is left as is.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.failure = Some(reason.into());
        self.status = BuildStatus::Failed;
        self.history.push(BuildStatus::Failed);
    }

    /// Back to `Idle` for the next build; only allowed once finished.
    pub fn reset(&mut self) -> Result<(), FlowError> {
        if !self.status.is_terminal() && self.status != BuildStatus::Idle {
            return Err(FlowError::IllegalTransition { from: self.status, to: BuildStatus::Idle });
        }
        *self = Self::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BuildStatus::*;

    #[test]
    fn full_path_with_simulation() {
        let mut flow = BuildFlow::new();
        for next in [Validating, Signing, Simulating, Submitting, Succeeded] {
            flow.transition(next).unwrap();
        }
        assert_eq!(
            flow.history(),
            &[Idle, Validating, Signing, Simulating, Submitting, Succeeded]
        );
        assert!(flow.status().is_terminal());
    }

    #[test]
    fn rejects_skipping_signing() {
        let mut flow = BuildFlow::new();
        flow.transition(Validating).unwrap();
        assert_eq!(
            flow.transition(Submitting),
            Err(FlowError::IllegalTransition { from: Validating, to: Submitting })
        );
        assert_eq!(flow.status(), Validating);
    }

    #[test]
    fn failure_is_sticky_and_recorded() {
        let mut flow = BuildFlow::new();
        flow.transition(Validating).unwrap();
        flow.fail("step 2 (SweepToken): token: invalid");
        assert_eq!(flow.status(), Failed);
        assert!(!flow.visited(Signing));
        assert!(flow.failure().unwrap().contains("SweepToken"));

        flow.fail("again");
        assert!(flow.failure().unwrap().contains("SweepToken"));
        assert!(flow.transition(Validating).is_err());

        flow.reset().unwrap();
        assert_eq!(flow.status(), Idle);
        assert_eq!(flow.failure(), None);
    }

    #[test]
    fn reset_mid_flight_is_rejected() {
        let mut flow = BuildFlow::new();
        flow.transition(Validating).unwrap();
        assert!(flow.reset().is_err());
    }
}
