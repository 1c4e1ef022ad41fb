/// Lifecycle state machine for DID document records
///
/// ```text
/// pending --approve--> active
/// pending --reject---> revoked
/// (any but deleted) --delete--> deleted
/// ```
///
/// `expired` exists in the model but no transition reaches it.
use crate::{
    auth::{Principal, Role},
    did::{identifier::same_owner, record::{DidDocumentRecord, DidStatus}},
    error::{RegistryError, RegistryResult},
};
use chrono::{DateTime, Utc};

/// A requested status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Approve { by: String },
    Reject { by: String, reason: String },
    Delete { by: String },
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Approve { .. } => "approve",
            Transition::Reject { .. } => "reject",
            Transition::Delete { .. } => "delete",
        }
    }

    pub fn target(&self) -> DidStatus {
        match self {
            Transition::Approve { .. } => DidStatus::Active,
            Transition::Reject { .. } => DidStatus::Revoked,
            Transition::Delete { .. } => DidStatus::Deleted,
        }
    }

    /// Authorization class of this transition
    pub fn action(&self) -> Action {
        match self {
            Transition::Approve { .. } | Transition::Reject { .. } => Action::Moderate,
            Transition::Delete { .. } => Action::Delete,
        }
    }
}

/// Operations subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Approve or reject
    Moderate,
    /// Submit a new version
    Update,
    /// Soft delete
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Moderate => "moderate",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// Check that `principal` may perform `action` on `record`
pub fn authorize(principal: &Principal, record: &DidDocumentRecord, action: Action) -> RegistryResult<()> {
    let is_owner = principal
        .owner_address
        .as_deref()
        .map_or(false, |addr| same_owner(addr, &record.owner_address));

    let allowed = match action {
        Action::Moderate => is_owner || principal.role.can_act_as(Role::Moderator),
        Action::Update => is_owner,
        Action::Delete => is_owner || principal.role.can_act_as(Role::Admin),
    };

    if allowed {
        Ok(())
    } else {
        Err(RegistryError::Forbidden(format!(
            "{} may not {} {}",
            principal.id,
            action.as_str(),
            record.did
        )))
    }
}

/// Apply a transition to a record, returning the updated copy.
///
/// The input is never modified. Callers persist the result with a
/// conditional write on the input's status.
pub fn apply(
    record: &DidDocumentRecord,
    transition: &Transition,
    now: DateTime<Utc>,
) -> RegistryResult<DidDocumentRecord> {
    let mut next = record.clone();

    match transition {
        Transition::Approve { by } => {
            require_pending(record, "approved")?;
            next.metadata.approved_by = Some(by.clone());
            next.metadata.approved_at = Some(now);
        }
        Transition::Reject { by, reason } => {
            require_pending(record, "rejected")?;
            next.metadata.revoked_by = Some(by.clone());
            next.metadata.revoked_at = Some(now);
            next.metadata.revocation_reason = Some(reason.clone());
        }
        Transition::Delete { by } => {
            if record.status == DidStatus::Deleted {
                return Err(RegistryError::InvalidTransition(format!(
                    "{} v{} is already deleted",
                    record.did, record.version
                )));
            }
            next.metadata.deleted_by = Some(by.clone());
            next.metadata.deleted_at = Some(now);
        }
    }

    next.status = transition.target();
    next.updated_at = now;
    Ok(next)
}

fn require_pending(record: &DidDocumentRecord, verb: &str) -> RegistryResult<()> {
    if record.status != DidStatus::Pending {
        return Err(RegistryError::InvalidTransition(format!(
            "only pending DIDs may be {} ({} v{} is {})",
            verb, record.did, record.version, record.status
        )));
    }
    Ok(())
}
