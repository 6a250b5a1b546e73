//! Assignment lifecycle state machine.
//!
//! Two distinct mutation paths share the status field and must not be
//! confused:
//!
//! - `transition` is the volunteer path. It enforces the transition table
//!   strictly and owns the timestamp side effects.
//! - `admin_update` is the organizer/owner override channel. It sets
//!   status and timestamps directly with no table enforcement and no side
//!   effects; callers gate it behind the organizer access check.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{AssignmentStatus, ZoneAssignment};

use AssignmentStatus::{Assigned, Completed, InProgress};

/// Allowed next states, keyed by current state. `completed` is not
/// terminal: volunteers may reactivate a completed assignment.
pub fn allowed_transitions(from: AssignmentStatus) -> &'static [AssignmentStatus] {
    match from {
        Assigned => &[InProgress],
        InProgress => &[Assigned, Completed],
        Completed => &[InProgress],
    }
}

/// Applies a volunteer-initiated status transition.
///
/// Timestamp side effects, applied together with the state change:
/// - entering `in_progress` from `completed` clears `completed_at`
///   (reactivation);
/// - entering `in_progress` for the first time sets `started_at`;
///   re-entries keep the original start time;
/// - entering `completed` sets `completed_at` unless already set;
/// - entering `assigned` from `in_progress` clears `started_at` (reset).
pub fn transition(
    assignment: &mut ZoneAssignment,
    to: AssignmentStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    let from = assignment.status;
    let allowed = allowed_transitions(from);
    if !allowed.contains(&to) {
        return Err(Error::InvalidTransition {
            from,
            to,
            allowed: allowed.to_vec(),
        });
    }

    assignment.status = to;

    match to {
        InProgress => {
            if from == Completed {
                assignment.completed_at = None;
            }
            if assignment.started_at.is_none() {
                assignment.started_at = Some(now);
            }
        }
        Completed => {
            if assignment.completed_at.is_none() {
                assignment.completed_at = Some(now);
            }
        }
        Assigned => {
            if from == InProgress {
                assignment.started_at = None;
            }
        }
    }

    Ok(())
}

/// Administrative field update (set-if-provided semantics).
#[derive(Deserialize, Debug, Default)]
pub struct AdminUpdate {
    pub status: Option<AssignmentStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Organizer/owner override: writes status and timestamps directly.
/// This is not a lifecycle transition and the table is deliberately not
/// consulted.
pub fn admin_update(assignment: &mut ZoneAssignment, update: &AdminUpdate) {
    if let Some(status) = update.status {
        assignment.status = status;
    }
    if let Some(started_at) = update.started_at {
        assignment.started_at = Some(started_at);
    }
    if let Some(completed_at) = update.completed_at {
        assignment.completed_at = Some(completed_at);
    }
}
