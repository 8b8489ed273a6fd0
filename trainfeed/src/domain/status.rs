//! Job lifecycle state machine.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Checking that the training service is up.
    Init,
    /// Submitted and waiting for a dispatcher worker.
    #[default]
    Pending,
    /// Pulling pages and dispatching batches.
    Running,
    /// Every batch was delivered.
    Completed,
    /// Stopped by an error; see the job's error message.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Validate a state transition.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, target),
            (Pending, Init | Running | Failed)
                | (Init, Pending | Failed)
                | (Running, Completed | Failed)
        )
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&self, target: JobStatus) -> Result<JobStatus, Error> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(Error::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: target.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(JobStatus::Pending, JobStatus::Init)]
    #[case(JobStatus::Init, JobStatus::Pending)]
    #[case(JobStatus::Init, JobStatus::Failed)]
    #[case(JobStatus::Pending, JobStatus::Running)]
    #[case(JobStatus::Pending, JobStatus::Failed)]
    #[case(JobStatus::Running, JobStatus::Completed)]
    #[case(JobStatus::Running, JobStatus::Failed)]
    fn test_allowed_transitions(#[case] from: JobStatus, #[case] to: JobStatus) {
        assert!(from.can_transition_to(to));
        assert_eq!(from.transition_to(to).unwrap(), to);
    }

    #[rstest]
    #[case(JobStatus::Completed, JobStatus::Failed)]
    #[case(JobStatus::Failed, JobStatus::Completed)]
    #[case(JobStatus::Completed, JobStatus::Pending)]
    #[case(JobStatus::Failed, JobStatus::Running)]
    #[case(JobStatus::Running, JobStatus::Pending)]
    #[case(JobStatus::Init, JobStatus::Running)]
    #[case(JobStatus::Pending, JobStatus::Completed)]
    #[case(JobStatus::Running, JobStatus::Running)]
    fn test_rejected_transitions(#[case] from: JobStatus, #[case] to: JobStatus) {
        assert!(!from.can_transition_to(to));
        assert!(matches!(
            from.transition_to(to),
            Err(Error::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_serde_matches_display() {
        let json = serde_json::to_string(&JobStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
        assert_eq!(JobStatus::Completed.to_string(), "COMPLETED");
    }
}
