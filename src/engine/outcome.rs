//! Results of single steps, groups and whole graphs.

use serde::Serialize;
use serde_json::Value;

use crate::error::{ScreenError, StepError};
use crate::response::{ResponseEnvelope, UserFacingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    /// Not dispatched because its group short-circuited.
    Skipped,
    /// Arrived for a superseded epoch and was dropped.
    Stale,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub group: String,
    pub index: usize,
    pub workflow_id: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope: Option<ResponseEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "display_error")]
    pub error: Option<StepError>,
}

impl StepOutcome {
    pub(crate) fn new(group: &str, index: usize, workflow_id: &str, status: StepStatus) -> Self {
        Self {
            group: group.to_string(),
            index,
            workflow_id: workflow_id.to_string(),
            status,
            envelope: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Completed
    }

    pub fn is_auth_failure(&self) -> bool {
        self.error.as_ref().is_some_and(StepError::is_auth)
    }

    pub fn data(&self) -> Option<&Value> {
        if !self.is_success() {
            return None;
        }
        self.envelope.as_ref().and_then(ResponseEnvelope::data)
    }

    /// What the UI shows for this step: `errors[0]` of its envelope, or the
    /// resolution failure when nothing was sent. Stale steps show nothing.
    pub fn user_error(&self) -> Option<UserFacingError> {
        if self.status == StepStatus::Stale {
            return None;
        }
        let error = self.error.as_ref()?;
        match error.entry() {
            Some(entry) => Some(UserFacingError::from(entry)),
            None => Some(UserFacingError {
                info: error.to_string(),
                execute_id: None,
                key: None,
            }),
        }
    }
}

fn display_error<S>(error: &Option<StepError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(e) => serializer.serialize_some(&e.context()),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    /// Every step completed.
    Completed,
    /// Ran to the end, but a non-critical step failed.
    Partial,
    /// Short-circuited by a critical or authentication failure.
    Failed,
    /// Not started: a dependency did not succeed, or the run halted.
    Skipped,
    /// Superseded by a newer run.
    Stale,
}

impl GroupStatus {
    /// Whether dependent groups may run after this one.
    pub fn satisfies_dependents(self) -> bool {
        matches!(self, GroupStatus::Completed | GroupStatus::Partial)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupOutcome {
    pub name: String,
    pub status: GroupStatus,
    pub steps: Vec<StepOutcome>,
    pub force_logout: bool,
}

impl GroupOutcome {
    pub(crate) fn skipped(name: &str, status: GroupStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            steps: Vec::new(),
            force_logout: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == GroupStatus::Completed
    }

    /// Envelopes of every dispatched step, in step order.
    pub fn envelopes(&self) -> Vec<&ResponseEnvelope> {
        self.steps.iter().filter_map(|s| s.envelope.as_ref()).collect()
    }

    /// `data` of the last successful step.
    pub fn last_data(&self) -> Option<&Value> {
        self.steps.iter().rev().find_map(StepOutcome::data)
    }

    pub fn user_error(&self) -> Option<UserFacingError> {
        if self.status == GroupStatus::Stale {
            return None;
        }
        self.steps.iter().find_map(StepOutcome::user_error)
    }

    /// The screen-level error for a group that did not complete.
    pub fn failure(&self) -> ScreenError {
        if self.status == GroupStatus::Stale {
            return ScreenError::Stale;
        }
        let error = self.user_error().unwrap_or_else(|| UserFacingError {
            info: format!("Workflow group '{}' did not complete", self.name),
            execute_id: None,
            key: None,
        });
        if self.force_logout {
            ScreenError::ForceLogout(error)
        } else {
            ScreenError::Backend(error)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphOutcome {
    pub epoch: u64,
    pub stale: bool,
    pub force_logout: bool,
    pub groups: Vec<GroupOutcome>,
}

impl GraphOutcome {
    pub fn group(&self, name: &str) -> Option<&GroupOutcome> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn is_success(&self) -> bool {
        !self.stale && self.groups.iter().all(GroupOutcome::is_success)
    }

    /// Envelopes per group, in declaration order.
    pub fn envelopes(&self) -> Vec<(&str, Vec<&ResponseEnvelope>)> {
        self.groups
            .iter()
            .map(|g| (g.name.as_str(), g.envelopes()))
            .collect()
    }

    /// First user-visible failure in declaration order; none for a
    /// superseded run.
    pub fn user_error(&self) -> Option<UserFacingError> {
        if self.stale {
            return None;
        }
        self.groups.iter().find_map(GroupOutcome::user_error)
    }

    /// `data` of the last group, in declaration order, that produced any.
    pub fn last_data(&self) -> Option<&Value> {
        self.groups.iter().rev().find_map(GroupOutcome::last_data)
    }

    pub fn failure(&self) -> ScreenError {
        if self.stale {
            return ScreenError::Stale;
        }
        let error = self.user_error().unwrap_or_else(|| UserFacingError {
            info: "Workflow did not complete".to_string(),
            execute_id: None,
            key: None,
        });
        if self.force_logout {
            ScreenError::ForceLogout(error)
        } else {
            ScreenError::Backend(error)
        }
    }
}
