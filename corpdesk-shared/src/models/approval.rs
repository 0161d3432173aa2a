/// Approval workflow shared by leave requests and expenses
///
/// ```text
///            approve
///   pending ---------> approved
///      |
///      |  reject(reason)
///      +-------------> rejected
/// ```
///
/// Both targets are terminal. The database transition itself is a single
/// conditional `UPDATE ... WHERE status = 'pending'` (see
/// `LeaveRequest::decide` and `Expense::decide`), so of two concurrent
/// approvers exactly one observes the pending row.
///
/// # Example
///
/// ```
/// use corpdesk_shared::models::approval::{ApprovalDecision, ApprovalStatus, ReasonPolicy};
///
/// let decision = ApprovalDecision {
///     action: "reject".to_string(),
///     rejection_reason: Some("Budget frozen".to_string()),
/// };
/// let transition = decision.resolve(ReasonPolicy::Required).unwrap();
/// assert_eq!(transition.target, ApprovalStatus::Rejected);
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of an approvable record
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "approval_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Awaiting a decision
    #[default]
    Pending,

    /// Approved (terminal)
    Approved,

    /// Rejected (terminal)
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "Pending",
            ApprovalStatus::Approved => "Approved",
            ApprovalStatus::Rejected => "Rejected",
        }
    }

    /// Checks if this is a terminal state (approved or rejected)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action requested by an approver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAction {
    Approve,
    Reject,
}

impl ApprovalAction {
    /// Status the record moves to
    pub fn target(&self) -> ApprovalStatus {
        match self {
            ApprovalAction::Approve => ApprovalStatus::Approved,
            ApprovalAction::Reject => ApprovalStatus::Rejected,
        }
    }
}

impl FromStr for ApprovalAction {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(ApprovalAction::Approve),
            "reject" => Ok(ApprovalAction::Reject),
            other => Err(TransitionError::UnknownAction(other.to_string())),
        }
    }
}

/// Whether a rejection must carry a reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonPolicy {
    Required,
    Optional,
}

/// Errors raised by the approval workflow
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// `action` was neither "approve" nor "reject"
    #[error("Invalid action '{0}': expected 'approve' or 'reject'")]
    UnknownAction(String),

    /// Rejection without a reason where one is required
    #[error("A rejection reason is required")]
    ReasonRequired,

    /// The record already left the pending state
    #[error("Record is already {0}")]
    NotPending(ApprovalStatus),
}

/// Approval request body: `{ "action": "approve" | "reject", "rejection_reason"?: string }`
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalDecision {
    pub action: String,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// A validated transition, ready to be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub target: ApprovalStatus,
    /// Empty for approvals
    pub rejection_reason: String,
}

impl ApprovalDecision {
    /// Validates the decision and turns it into a [`Transition`]
    ///
    /// # Errors
    ///
    /// - `UnknownAction` if `action` is not recognised
    /// - `ReasonRequired` if rejecting under [`ReasonPolicy::Required`] with a
    ///   missing or blank reason
    pub fn resolve(self, policy: ReasonPolicy) -> Result<Transition, TransitionError> {
        let action: ApprovalAction = self.action.trim().parse()?;

        let rejection_reason = match action {
            ApprovalAction::Approve => String::new(),
            ApprovalAction::Reject => {
                let reason = self
                    .rejection_reason
                    .map(|r| r.trim().to_string())
                    .unwrap_or_default();
                if reason.is_empty() && policy == ReasonPolicy::Required {
                    return Err(TransitionError::ReasonRequired);
                }
                reason
            }
        };

        Ok(Transition {
            target: action.target(),
            rejection_reason,
        })
    }
}

/// Ensures a record can still be edited by its owner
pub fn ensure_pending(status: ApprovalStatus) -> Result<(), TransitionError> {
    if status.is_terminal() {
        return Err(TransitionError::NotPending(status));
    }
    Ok(())
}
