//! Access control for projects.
//!
//! One pure resolver consumed by every mutating operation: the effective
//! role is `owner` when the user is the project owner, otherwise the
//! collaborator role, otherwise no access. Assignment-level access is a
//! derived rule applied by the handlers in `rest` (a volunteer always has
//! access to their own assignment).

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Collaborator, Project, Role};

/// Effective role of `user_id` on `project`, or None for no access.
/// `collaborator` is the user's collaborator row for this project, if any.
pub fn resolve_role(
    project: &Project,
    collaborator: Option<&Collaborator>,
    user_id: Uuid,
) -> Option<Role> {
    if project.owner_id == user_id {
        return Some(Role::Owner);
    }
    collaborator
        .filter(|c| c.project_id == project.id && c.user_id == user_id)
        .map(|c| c.role)
}

/// Grants access at `minimum` privilege or fails with Forbidden.
///
/// No minimum is the "can view" check: any access level passes. A minimum
/// of `Owner` passes only the actual owner, never a collaborator row that
/// happens to carry the owner role.
pub fn require_role(
    project: &Project,
    collaborator: Option<&Collaborator>,
    user_id: Uuid,
    minimum: Option<Role>,
) -> Result<Role> {
    let role = resolve_role(project, collaborator, user_id)
        .ok_or_else(|| Error::Forbidden("You don't have access to this project".into()))?;

    match minimum {
        None => Ok(role),
        Some(Role::Owner) => {
            if project.owner_id == user_id {
                Ok(role)
            } else {
                Err(Error::Forbidden(
                    "Only the project owner can perform this action".into(),
                ))
            }
        }
        Some(min) => {
            if role >= min {
                Ok(role)
            } else {
                Err(Error::Forbidden(
                    "You need organizer or owner permissions to perform this action".into(),
                ))
            }
        }
    }
}
