use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>, // None for OAuth-only accounts
    pub google_id: Option<String>,
    pub picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Project lifecycle status (stable wire values)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    InProgress,
    Completed,
    Archived,
}

/// Collaborator role, ordered by privilege: viewer < organizer < owner.
/// The project owner is never stored as a collaborator row; ownership is
/// implicit via `Project.owner_id`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Organizer,
    Owner,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub is_active: bool,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Collaborator {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub invited_by: Uuid,
    pub invited_at: DateTime<Utc>,
}

/// Geographic area for flyer distribution. Geometry is stored as a WKT
/// polygon string (lon/lat degrees, SRID 4326 equivalent); the codec in
/// `geometry` converts to and from the GeoJSON interchange shape.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Zone {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub geometry: String,
    pub color: Option<String>, // #rrggbb
    pub kml_metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Assignment status (stable wire values). Transitions are enforced by
/// `lifecycle`; `completed` is reactivatable, not terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ZoneAssignment {
    pub id: Uuid,
    pub zone_id: Uuid,
    pub volunteer_id: Uuid,
    pub assigned_by: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub status: AssignmentStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Manual override for the computed progress percentage (0-100).
    /// Precedence over the computed value is applied by API consumers.
    pub manual_completion_percentage: Option<u8>,
}

/// Attributed note on an assignment (threaded, newest first on read).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AssignmentNote {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A patch of ground a volunteer marked as covered. Geometry may be a
/// point, line, or polygon (WKT); overlapping marks are merged at
/// progress-computation time, never rejected on write.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CompletionArea {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub geometry: String,
    pub completed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// JWT claims payload
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthPayload {
    pub sub: String, // user id
    pub exp: usize,
    #[serde(rename = "type")]
    pub token_type: String, // "access" or "refresh"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering_matches_privilege() {
        assert!(Role::Owner > Role::Organizer);
        assert!(Role::Organizer > Role::Viewer);
    }

    #[test]
    fn test_enum_wire_values_are_stable() {
        assert_eq!(serde_json::to_string(&Role::Organizer).unwrap(), "\"organizer\"");
        assert_eq!(
            serde_json::to_string(&AssignmentStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&ProjectStatus::Archived).unwrap(),
            "\"archived\""
        );
        let role: Role = serde_json::from_str("\"viewer\"").unwrap();
        assert_eq!(role, Role::Viewer);
    }
}
