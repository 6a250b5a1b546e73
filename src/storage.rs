//! Sled-backed persistence for the flyerflow entities.
//!
//! One tree per entity, UUID-string keys, JSON (serde) values. Secondary
//! lookups are tree scans; at flyer-distribution scale that beats carrying
//! index trees around. Single-key writes are atomic in sled; the KML
//! import batch goes through `sled::Batch` so a whole import commits or
//! nothing does. Cascading deletes mirror the ownership tree:
//! project -> zones -> assignments -> completion areas / notes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    AssignmentNote, AssignmentStatus, Collaborator, CompletionArea, Project, User, Zone,
    ZoneAssignment,
};

#[derive(Clone)]
pub struct Storage {
    #[allow(dead_code)] // kept for flush/size ops on the underlying Db
    db: Db,
    users: sled::Tree,
    projects: sled::Tree,
    collaborators: sled::Tree,
    zones: sled::Tree,
    assignments: sled::Tree,
    notes: sled::Tree,
    completions: sled::Tree,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn get_by_id<T: DeserializeOwned>(tree: &sled::Tree, id: Uuid) -> Result<Option<T>> {
    match tree.get(id.to_string().as_bytes())? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn put_by_id<T: Serialize>(tree: &sled::Tree, id: Uuid, value: &T) -> Result<()> {
    tree.insert(id.to_string().as_bytes(), encode(value)?)?;
    Ok(())
}

fn scan<T: DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for item in tree.iter() {
        let (_, value) = item?;
        out.push(serde_json::from_slice(&value)?);
    }
    Ok(out)
}

impl Storage {
    /// Open or create the Sled database at the given path.
    pub fn open(path: &str) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            users: db.open_tree("users")?,
            projects: db.open_tree("projects")?,
            collaborators: db.open_tree("collaborators")?,
            zones: db.open_tree("zones")?,
            assignments: db.open_tree("assignments")?,
            notes: db.open_tree("assignment_notes")?,
            completions: db.open_tree("completion_areas")?,
            db,
        })
    }

    // --- Users ---

    pub fn create_user(&self, user: &User) -> Result<()> {
        if self.find_user_by_email(&user.email)?.is_some() {
            return Err(Error::Conflict("Email already registered".into()));
        }
        put_by_id(&self.users, user.id, user)
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        get_by_id(&self.users, id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(scan::<User>(&self.users)?
            .into_iter()
            .find(|u| u.email == email))
    }

    pub fn find_user_by_google_id(&self, google_id: &str) -> Result<Option<User>> {
        Ok(scan::<User>(&self.users)?
            .into_iter()
            .find(|u| u.google_id.as_deref() == Some(google_id)))
    }

    pub fn update_user(&self, user: &User) -> Result<()> {
        put_by_id(&self.users, user.id, user)
    }

    // --- Projects & collaborators ---

    pub fn create_project(&self, project: &Project) -> Result<()> {
        put_by_id(&self.projects, project.id, project)
    }

    pub fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        get_by_id(&self.projects, id)
    }

    pub fn update_project(&self, project: &Project) -> Result<()> {
        put_by_id(&self.projects, project.id, project)
    }

    /// Deletes a project and everything it owns: collaborator rows, zones,
    /// and transitively assignments, notes, and completion areas.
    pub fn delete_project(&self, id: Uuid) -> Result<()> {
        for zone in self.zones_in_project(id)? {
            self.delete_zone(zone.id)?;
        }
        for collab in self.collaborators_of(id)? {
            self.collaborators.remove(collab.id.to_string().as_bytes())?;
        }
        self.projects.remove(id.to_string().as_bytes())?;
        Ok(())
    }

    /// Projects the user owns plus projects they collaborate on.
    pub fn projects_for_user(&self, user_id: Uuid) -> Result<Vec<Project>> {
        let collab_project_ids: Vec<Uuid> = scan::<Collaborator>(&self.collaborators)?
            .into_iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.project_id)
            .collect();

        Ok(scan::<Project>(&self.projects)?
            .into_iter()
            .filter(|p| p.owner_id == user_id || collab_project_ids.contains(&p.id))
            .collect())
    }

    pub fn add_collaborator(&self, collab: &Collaborator) -> Result<()> {
        if self
            .collaborator_for(collab.project_id, collab.user_id)?
            .is_some()
        {
            return Err(Error::Conflict(
                "User is already a collaborator on this project".into(),
            ));
        }
        put_by_id(&self.collaborators, collab.id, collab)
    }

    pub fn collaborator_for(&self, project_id: Uuid, user_id: Uuid) -> Result<Option<Collaborator>> {
        Ok(scan::<Collaborator>(&self.collaborators)?
            .into_iter()
            .find(|c| c.project_id == project_id && c.user_id == user_id))
    }

    pub fn collaborators_of(&self, project_id: Uuid) -> Result<Vec<Collaborator>> {
        Ok(scan::<Collaborator>(&self.collaborators)?
            .into_iter()
            .filter(|c| c.project_id == project_id)
            .collect())
    }

    pub fn remove_collaborator(&self, project_id: Uuid, user_id: Uuid) -> Result<()> {
        let collab = self
            .collaborator_for(project_id, user_id)?
            .ok_or(Error::NotFound("Collaborator"))?;
        self.collaborators.remove(collab.id.to_string().as_bytes())?;
        Ok(())
    }

    // --- Zones ---

    pub fn create_zone(&self, zone: &Zone) -> Result<()> {
        put_by_id(&self.zones, zone.id, zone)
    }

    /// Persists a whole import batch atomically: either every zone commits
    /// or none do.
    pub fn create_zones(&self, zones: &[Zone]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for zone in zones {
            batch.insert(zone.id.to_string().as_bytes(), encode(zone)?);
        }
        self.zones.apply_batch(batch)?;
        Ok(())
    }

    pub fn get_zone(&self, id: Uuid) -> Result<Option<Zone>> {
        get_by_id(&self.zones, id)
    }

    pub fn zones_in_project(&self, project_id: Uuid) -> Result<Vec<Zone>> {
        Ok(scan::<Zone>(&self.zones)?
            .into_iter()
            .filter(|z| z.project_id == project_id)
            .collect())
    }

    /// Deletes a zone and its assignments (which cascade further).
    pub fn delete_zone(&self, id: Uuid) -> Result<()> {
        for assignment in self.assignments_for_zone(id)? {
            self.delete_assignment(assignment.id)?;
        }
        self.zones.remove(id.to_string().as_bytes())?;
        Ok(())
    }

    pub fn delete_zones_in_project(&self, project_id: Uuid) -> Result<usize> {
        let zones = self.zones_in_project(project_id)?;
        for zone in &zones {
            self.delete_zone(zone.id)?;
        }
        Ok(zones.len())
    }

    // --- Assignments ---

    /// Creates an assignment, guarding against a duplicate active one for
    /// the same (zone, volunteer) pair. The read-then-insert here is
    /// serialized by sled's tree locking within this process; a SQL
    /// backend would need a partial uniqueness index on
    /// (zone_id, volunteer_id) where status != 'completed'.
    pub fn create_assignment(&self, assignment: &ZoneAssignment) -> Result<()> {
        let duplicate = scan::<ZoneAssignment>(&self.assignments)?.into_iter().any(|a| {
            a.zone_id == assignment.zone_id
                && a.volunteer_id == assignment.volunteer_id
                && a.status != AssignmentStatus::Completed
        });
        if duplicate {
            return Err(Error::DuplicateAssignment);
        }
        put_by_id(&self.assignments, assignment.id, assignment)
    }

    pub fn get_assignment(&self, id: Uuid) -> Result<Option<ZoneAssignment>> {
        get_by_id(&self.assignments, id)
    }

    pub fn update_assignment(&self, assignment: &ZoneAssignment) -> Result<()> {
        put_by_id(&self.assignments, assignment.id, assignment)
    }

    pub fn assignments_for_zone(&self, zone_id: Uuid) -> Result<Vec<ZoneAssignment>> {
        Ok(scan::<ZoneAssignment>(&self.assignments)?
            .into_iter()
            .filter(|a| a.zone_id == zone_id)
            .collect())
    }

    pub fn assignments_for_project(&self, project_id: Uuid) -> Result<Vec<ZoneAssignment>> {
        let zone_ids: Vec<Uuid> = self
            .zones_in_project(project_id)?
            .into_iter()
            .map(|z| z.id)
            .collect();
        Ok(scan::<ZoneAssignment>(&self.assignments)?
            .into_iter()
            .filter(|a| zone_ids.contains(&a.zone_id))
            .collect())
    }

    pub fn assignments_for_volunteer(&self, volunteer_id: Uuid) -> Result<Vec<ZoneAssignment>> {
        Ok(scan::<ZoneAssignment>(&self.assignments)?
            .into_iter()
            .filter(|a| a.volunteer_id == volunteer_id)
            .collect())
    }

    /// Deletes an assignment, its notes, and its completion areas.
    pub fn delete_assignment(&self, id: Uuid) -> Result<()> {
        for area in self.completions_for_assignment(id)? {
            self.completions.remove(area.id.to_string().as_bytes())?;
        }
        for note in self.notes_for_assignment(id)? {
            self.notes.remove(note.id.to_string().as_bytes())?;
        }
        self.assignments.remove(id.to_string().as_bytes())?;
        Ok(())
    }

    // --- Assignment notes ---

    pub fn add_note(&self, note: &AssignmentNote) -> Result<()> {
        put_by_id(&self.notes, note.id, note)
    }

    pub fn get_note(&self, id: Uuid) -> Result<Option<AssignmentNote>> {
        get_by_id(&self.notes, id)
    }

    /// Notes for an assignment, newest first.
    pub fn notes_for_assignment(&self, assignment_id: Uuid) -> Result<Vec<AssignmentNote>> {
        let mut notes: Vec<AssignmentNote> = scan::<AssignmentNote>(&self.notes)?
            .into_iter()
            .filter(|n| n.assignment_id == assignment_id)
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notes)
    }

    pub fn delete_note(&self, id: Uuid) -> Result<()> {
        self.notes.remove(id.to_string().as_bytes())?;
        Ok(())
    }

    // --- Completion areas ---

    pub fn add_completion(&self, area: &CompletionArea) -> Result<()> {
        put_by_id(&self.completions, area.id, area)
    }

    pub fn get_completion(&self, id: Uuid) -> Result<Option<CompletionArea>> {
        get_by_id(&self.completions, id)
    }

    pub fn completions_for_assignment(&self, assignment_id: Uuid) -> Result<Vec<CompletionArea>> {
        Ok(scan::<CompletionArea>(&self.completions)?
            .into_iter()
            .filter(|c| c.assignment_id == assignment_id)
            .collect())
    }

    pub fn delete_completion(&self, id: Uuid) -> Result<()> {
        self.completions.remove(id.to_string().as_bytes())?;
        Ok(())
    }
}
