//! REST API layer (axum).
//!
//! JSON endpoints for auth, projects, zones, assignments, notes, and
//! completion tracking. Bearer middleware guards everything except /health
//! and /auth/*; validated claims ride on the request as an Extension.
//! Every response goes through a typed struct, never an ad hoc map.

use axum::{
    extract::{Path, Query, Request, State},
    http::header,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{
    self, create_access_token, create_refresh_token, hash_password, validate_token,
    verify_password, StateStore,
};
use crate::error::{Error, Result};
use crate::geometry::{self, GeoJson};
use crate::models::{
    AssignmentNote, AssignmentStatus, AuthPayload, Collaborator, CompletionArea, Project,
    ProjectStatus, Role, User, Zone, ZoneAssignment,
};
use crate::storage::Storage;
use crate::{kml, lifecycle, progress};

/// Shared app state for REST handlers
pub struct AppState {
    storage: Storage,
    oauth_states: StateStore,
}

async fn auth_middleware(
    State(_state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(Error::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(Error::Unauthorized)?;
    let claims = validate_token(token, "access")?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

fn caller_id(claims: &AuthPayload) -> Result<Uuid> {
    Uuid::parse_str(&claims.sub).map_err(|_| Error::Unauthorized)
}

/// Create the axum router over an opened storage.
pub fn create_router(storage: Storage) -> Router {
    let state = Arc::new(AppState {
        storage,
        oauth_states: StateStore::default(),
    });

    let protected = Router::new()
        .route("/auth/me", get(me_handler))
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:project_id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route(
            "/projects/:project_id/collaborators",
            get(list_collaborators).post(add_collaborator),
        )
        .route(
            "/projects/:project_id/collaborators/:user_id",
            delete(remove_collaborator),
        )
        .route("/zones/project/:project_id", get(list_zones))
        .route("/zones/project/:project_id/all", delete(delete_all_zones))
        .route("/zones/preview-kml", post(preview_kml))
        .route("/zones/import-kml", post(import_kml))
        .route("/zones/:zone_id", get(get_zone).delete(delete_zone))
        .route(
            "/assignments/projects/:project_id",
            get(list_project_assignments).post(create_assignment),
        )
        .route(
            "/assignments/projects/:project_id/available-volunteers",
            get(available_volunteers),
        )
        .route("/assignments/zones/:zone_id", get(list_zone_assignments))
        .route(
            "/assignments/:assignment_id",
            patch(admin_update_assignment).delete(delete_assignment),
        )
        .route("/assignments/my-assignments", get(my_assignments))
        .route(
            "/assignments/my-assignments/:assignment_id",
            get(my_assignment).patch(update_my_assignment),
        )
        .route(
            "/assignments/my-assignments/:assignment_id/status",
            patch(update_my_status),
        )
        .route(
            "/assignments/:assignment_id/notes",
            get(list_notes).post(add_note),
        )
        .route("/notes/:note_id", patch(update_note).delete(delete_note))
        .route(
            "/completions/assignments/:assignment_id/areas",
            get(list_areas).post(add_area),
        )
        .route("/completions/areas/:area_id", delete(delete_area))
        .route(
            "/completions/assignments/:assignment_id/progress",
            get(assignment_progress),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/refresh", post(refresh_handler))
        .route("/auth/oauth/start", get(oauth_start))
        .route("/auth/oauth/callback", post(oauth_callback))
        .merge(protected)
        .with_state(state)
}

// --- Shared access helpers ---

/// Loads the project and gates the caller at the given minimum role.
fn require_project_role(
    state: &AppState,
    project_id: Uuid,
    user_id: Uuid,
    minimum: Option<Role>,
) -> Result<(Project, Role)> {
    let project = state
        .storage
        .get_project(project_id)?
        .ok_or(Error::NotFound("Project"))?;
    let collab = state.storage.collaborator_for(project_id, user_id)?;
    let role = crate::access::require_role(&project, collab.as_ref(), user_id, minimum)?;
    Ok((project, role))
}

fn load_assignment(state: &AppState, id: Uuid) -> Result<(ZoneAssignment, Zone, Project)> {
    let assignment = state
        .storage
        .get_assignment(id)?
        .ok_or(Error::NotFound("Assignment"))?;
    let zone = state
        .storage
        .get_zone(assignment.zone_id)?
        .ok_or(Error::NotFound("Zone"))?;
    let project = state
        .storage
        .get_project(zone.project_id)?
        .ok_or(Error::NotFound("Project"))?;
    Ok((assignment, zone, project))
}

/// A volunteer always sees their own assignment; anyone else needs view
/// access on the project.
fn require_assignment_view(
    state: &AppState,
    assignment: &ZoneAssignment,
    project: &Project,
    user_id: Uuid,
) -> Result<()> {
    if assignment.volunteer_id == user_id {
        return Ok(());
    }
    let collab = state.storage.collaborator_for(project.id, user_id)?;
    crate::access::require_role(project, collab.as_ref(), user_id, None)?;
    Ok(())
}

// --- Response / request DTOs ---

#[derive(Serialize)]
pub struct Message {
    pub message: String,
}

/// Public view of a user (no credential material).
#[derive(Serialize)]
pub struct UserOut {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserOut {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            picture_url: user.picture_url,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub user: UserOut,
}

fn token_response(user: User) -> Result<TokenResponse> {
    Ok(TokenResponse {
        access_token: create_access_token(user.id)?,
        refresh_token: create_refresh_token(user.id)?,
        token_type: "bearer".to_string(),
        user: user.into(),
    })
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Serialize)]
pub struct OauthStartResponse {
    pub state: String,
    pub authorize_url: String,
}

#[derive(Deserialize)]
pub struct OauthCallbackRequest {
    pub code: String,
    pub state: String,
}

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub is_active: Option<bool>,
}

/// A project enriched with the caller's effective role.
#[derive(Serialize)]
pub struct ProjectOut {
    #[serde(flatten)]
    pub project: Project,
    pub my_role: Role,
}

#[derive(Deserialize)]
pub struct AddCollaboratorRequest {
    pub email: String,
    pub role: Role,
}

#[derive(Serialize)]
pub struct CollaboratorOut {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub invited_at: DateTime<Utc>,
}

/// Zone with its geometry decoded back to the interchange shape.
#[derive(Serialize)]
pub struct ZoneOut {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub geometry: GeoJson,
    pub color: Option<String>,
    pub kml_metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ZoneOut {
    fn try_from_zone(zone: Zone) -> Result<Self> {
        let polygon = geometry::wkt_to_polygon(&zone.geometry)?;
        Ok(Self {
            id: zone.id,
            project_id: zone.project_id,
            name: zone.name,
            description: zone.description,
            geometry: geometry::encode_polygon(&polygon),
            color: zone.color,
            kml_metadata: zone.kml_metadata,
            created_at: zone.created_at,
            updated_at: zone.updated_at,
        })
    }
}

#[derive(Deserialize)]
pub struct PreviewKmlRequest {
    pub kml_content: String,
}

#[derive(Serialize)]
pub struct ZonePreview {
    pub name: String,
    pub description: Option<String>,
    pub geometry: GeoJson,
    pub color: Option<String>,
}

#[derive(Serialize)]
pub struct PreviewKmlResponse {
    pub zones: Vec<ZonePreview>,
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
pub struct ImportKmlRequest {
    pub project_id: Uuid,
    pub kml_content: String,
    #[serde(default)]
    pub skip_names: Vec<String>,
}

#[derive(Serialize)]
pub struct ImportKmlResponse {
    pub imported: Vec<ZoneOut>,
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Serialize)]
pub struct DeleteZonesResponse {
    pub deleted: usize,
}

#[derive(Deserialize)]
pub struct CreateAssignmentRequest {
    pub zone_id: Uuid,
    pub volunteer_id: Uuid,
}

#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    pub status: AssignmentStatus,
}

#[derive(Deserialize, Default)]
pub struct VolunteerUpdateRequest {
    pub notes: Option<String>,
    pub manual_completion_percentage: Option<u8>,
}

#[derive(Deserialize)]
pub struct MyAssignmentsQuery {
    pub project_id: Option<Uuid>,
}

/// Assignment joined with the zone it covers, for the volunteer views.
#[derive(Serialize)]
pub struct MyAssignmentOut {
    #[serde(flatten)]
    pub assignment: ZoneAssignment,
    pub zone_name: String,
    pub project_id: Uuid,
}

#[derive(Deserialize)]
pub struct CreateNoteRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct UpdateNoteRequest {
    pub content: String,
}

/// Someone an organizer can hand a zone to, with their current workload.
#[derive(Serialize)]
pub struct AvailableVolunteer {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub active_assignments: usize,
}

#[derive(Deserialize)]
pub struct CreateAreaRequest {
    pub geometry: GeoJson,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct AreaOut {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub geometry: GeoJson,
    pub completed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl AreaOut {
    fn try_from_area(area: CompletionArea) -> Result<Self> {
        let decoded = geometry::wkt_to_geometry(&area.geometry)?;
        Ok(Self {
            id: area.id,
            assignment_id: area.assignment_id,
            geometry: geometry::encode_geometry(&decoded)?,
            completed_at: area.completed_at,
            notes: area.notes,
        })
    }
}

#[derive(Serialize)]
pub struct ProgressResponse {
    pub assignment_id: Uuid,
    #[serde(flatten)]
    pub progress: progress::Progress,
}

// --- Health & auth handlers ---

async fn health_handler() -> Json<Message> {
    Json(Message {
        message: "flyerflow API healthy".to_string(),
    })
}

async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>> {
    if !payload.email.contains('@') {
        return Err(Error::Validation("Invalid email address".into()));
    }
    if payload.password.len() < 8 {
        return Err(Error::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }

    let hashed =
        hash_password(&payload.password).map_err(|e| Error::Internal(format!("bcrypt: {e}")))?;
    let user = User {
        id: Uuid::new_v4(),
        email: payload.email,
        name: payload.name,
        password_hash: Some(hashed),
        google_id: None,
        picture_url: None,
        created_at: Utc::now(),
        last_login: Some(Utc::now()),
    };
    state.storage.create_user(&user)?;
    tracing::info!(user = %user.id, "user registered");
    Ok(Json(token_response(user)?))
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let mut user = state
        .storage
        .find_user_by_email(&payload.email)?
        .ok_or(Error::Unauthorized)?;

    let hash = user.password_hash.clone().ok_or(Error::Unauthorized)?;
    if !verify_password(&payload.password, &hash).unwrap_or(false) {
        return Err(Error::Unauthorized);
    }

    user.last_login = Some(Utc::now());
    state.storage.update_user(&user)?;
    Ok(Json(token_response(user)?))
}

async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>> {
    let claims = validate_token(&payload.refresh_token, "refresh")?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| Error::Unauthorized)?;
    state
        .storage
        .get_user(user_id)?
        .ok_or(Error::Unauthorized)?;
    Ok(Json(RefreshResponse {
        access_token: create_access_token(user_id)?,
        token_type: "bearer".to_string(),
    }))
}

async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
) -> Result<Json<UserOut>> {
    let user_id = caller_id(&claims)?;
    let user = state
        .storage
        .get_user(user_id)?
        .ok_or(Error::Unauthorized)?;
    Ok(Json(user.into()))
}

async fn oauth_start(State(state): State<Arc<AppState>>) -> Result<Json<OauthStartResponse>> {
    let login_state = Uuid::new_v4().simple().to_string();
    let authorize_url = auth::google_authorize_url(&login_state)?;
    state.oauth_states.put(login_state.clone());
    Ok(Json(OauthStartResponse {
        state: login_state,
        authorize_url,
    }))
}

async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OauthCallbackRequest>,
) -> Result<Json<TokenResponse>> {
    if state.oauth_states.take(&payload.state).is_none() {
        return Err(Error::Forbidden("Invalid or expired OAuth state".into()));
    }

    let info = auth::exchange_google_code(&payload.code).await?;

    // Upsert: known google_id, then email linking, then a fresh account
    let mut user = match state.storage.find_user_by_google_id(&info.id)? {
        Some(user) => user,
        None => match state.storage.find_user_by_email(&info.email)? {
            Some(mut existing) => {
                existing.google_id = Some(info.id);
                existing.picture_url = info.picture.or(existing.picture_url);
                existing
            }
            None => {
                let user = User {
                    id: Uuid::new_v4(),
                    email: info.email,
                    name: info.name,
                    password_hash: None,
                    google_id: Some(info.id),
                    picture_url: info.picture,
                    created_at: Utc::now(),
                    last_login: None,
                };
                state.storage.create_user(&user)?;
                user
            }
        },
    };

    user.last_login = Some(Utc::now());
    state.storage.update_user(&user)?;
    tracing::info!(user = %user.id, "oauth login");
    Ok(Json(token_response(user)?))
}

// --- Project handlers ---

async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<Json<ProjectOut>> {
    let user_id = caller_id(&claims)?;
    if payload.name.trim().is_empty() {
        return Err(Error::Validation("Project name cannot be empty".into()));
    }

    let project = Project {
        id: Uuid::new_v4(),
        name: payload.name,
        description: payload.description,
        owner_id: user_id,
        is_active: true,
        status: ProjectStatus::InProgress,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    state.storage.create_project(&project)?;
    tracing::info!(project = %project.id, "project created");
    Ok(Json(ProjectOut {
        project,
        my_role: Role::Owner,
    }))
}

async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
) -> Result<Json<Vec<ProjectOut>>> {
    let user_id = caller_id(&claims)?;
    let mut out = Vec::new();
    for project in state.storage.projects_for_user(user_id)? {
        let collab = state.storage.collaborator_for(project.id, user_id)?;
        if let Some(role) = crate::access::resolve_role(&project, collab.as_ref(), user_id) {
            out.push(ProjectOut {
                project,
                my_role: role,
            });
        }
    }
    Ok(Json(out))
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectOut>> {
    let user_id = caller_id(&claims)?;
    let (project, role) = require_project_role(&state, project_id, user_id, None)?;
    Ok(Json(ProjectOut {
        project,
        my_role: role,
    }))
}

async fn update_project(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectOut>> {
    let user_id = caller_id(&claims)?;
    let (mut project, role) =
        require_project_role(&state, project_id, user_id, Some(Role::Organizer))?;

    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            return Err(Error::Validation("Project name cannot be empty".into()));
        }
        project.name = name;
    }
    if let Some(description) = payload.description {
        project.description = Some(description);
    }
    if let Some(status) = payload.status {
        project.status = status;
    }
    if let Some(is_active) = payload.is_active {
        project.is_active = is_active;
    }
    project.updated_at = Utc::now();
    state.storage.update_project(&project)?;
    Ok(Json(ProjectOut {
        project,
        my_role: role,
    }))
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Message>> {
    let user_id = caller_id(&claims)?;
    require_project_role(&state, project_id, user_id, Some(Role::Owner))?;
    state.storage.delete_project(project_id)?;
    tracing::info!(project = %project_id, "project deleted");
    Ok(Json(Message {
        message: "Project deleted".to_string(),
    }))
}

// --- Collaborator handlers ---

async fn add_collaborator(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<AddCollaboratorRequest>,
) -> Result<Json<CollaboratorOut>> {
    let user_id = caller_id(&claims)?;
    let (project, _) = require_project_role(&state, project_id, user_id, Some(Role::Organizer))?;

    if payload.role == Role::Owner {
        return Err(Error::Validation(
            "Collaborators cannot be granted the owner role".into(),
        ));
    }

    let invited = state
        .storage
        .find_user_by_email(&payload.email)?
        .ok_or(Error::NotFound("User"))?;
    if invited.id == project.owner_id {
        return Err(Error::Validation(
            "The project owner cannot be added as a collaborator".into(),
        ));
    }

    let collab = Collaborator {
        id: Uuid::new_v4(),
        project_id,
        user_id: invited.id,
        role: payload.role,
        invited_by: user_id,
        invited_at: Utc::now(),
    };
    state.storage.add_collaborator(&collab)?;
    tracing::info!(project = %project_id, collaborator = %invited.id, "collaborator added");
    Ok(Json(CollaboratorOut {
        id: collab.id,
        user_id: invited.id,
        email: invited.email,
        name: invited.name,
        role: collab.role,
        invited_at: collab.invited_at,
    }))
}

async fn list_collaborators(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<CollaboratorOut>>> {
    let user_id = caller_id(&claims)?;
    require_project_role(&state, project_id, user_id, None)?;

    let mut out = Vec::new();
    for collab in state.storage.collaborators_of(project_id)? {
        let user = state
            .storage
            .get_user(collab.user_id)?
            .ok_or(Error::NotFound("User"))?;
        out.push(CollaboratorOut {
            id: collab.id,
            user_id: user.id,
            email: user.email,
            name: user.name,
            role: collab.role,
            invited_at: collab.invited_at,
        });
    }
    Ok(Json(out))
}

async fn remove_collaborator(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path((project_id, collaborator_user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Message>> {
    let user_id = caller_id(&claims)?;
    require_project_role(&state, project_id, user_id, Some(Role::Organizer))?;
    state
        .storage
        .remove_collaborator(project_id, collaborator_user_id)?;
    Ok(Json(Message {
        message: "Collaborator removed".to_string(),
    }))
}

// --- Zone handlers ---

async fn list_zones(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<ZoneOut>>> {
    let user_id = caller_id(&claims)?;
    require_project_role(&state, project_id, user_id, None)?;
    let zones = state
        .storage
        .zones_in_project(project_id)?
        .into_iter()
        .map(ZoneOut::try_from_zone)
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(zones))
}

async fn get_zone(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(zone_id): Path<Uuid>,
) -> Result<Json<ZoneOut>> {
    let user_id = caller_id(&claims)?;
    let zone = state
        .storage
        .get_zone(zone_id)?
        .ok_or(Error::NotFound("Zone"))?;
    require_project_role(&state, zone.project_id, user_id, None)?;
    Ok(Json(ZoneOut::try_from_zone(zone)?))
}

async fn preview_kml(
    State(_state): State<Arc<AppState>>,
    Json(payload): Json<PreviewKmlRequest>,
) -> Result<Json<PreviewKmlResponse>> {
    let (candidates, errors) = kml::parse_kml(&payload.kml_content);
    let zones = candidates
        .into_iter()
        .map(|c| ZonePreview {
            name: c.name,
            description: c.description,
            geometry: c.geometry,
            color: c.color,
        })
        .collect();
    Ok(Json(PreviewKmlResponse { zones, errors }))
}

async fn import_kml(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Json(payload): Json<ImportKmlRequest>,
) -> Result<Json<ImportKmlResponse>> {
    let user_id = caller_id(&claims)?;
    require_project_role(&state, payload.project_id, user_id, Some(Role::Organizer))?;

    let (candidates, errors) = kml::parse_kml(&payload.kml_content);
    if candidates.is_empty() && !errors.is_empty() {
        return Err(Error::Validation(format!(
            "KML import failed: {}",
            errors.join("; ")
        )));
    }

    // Case-insensitive skip list; skipping everything is a successful no-op
    let skip: Vec<String> = payload
        .skip_names
        .iter()
        .map(|n| n.to_lowercase())
        .collect();
    let (kept, skipped): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| !skip.contains(&c.name.to_lowercase()));

    let now = Utc::now();
    let mut zones = Vec::with_capacity(kept.len());
    for candidate in kept {
        let polygon = geometry::decode_polygon(&candidate.geometry)?;
        zones.push(Zone {
            id: Uuid::new_v4(),
            project_id: payload.project_id,
            name: candidate.name,
            description: candidate.description,
            geometry: geometry::polygon_to_wkt(&polygon),
            color: candidate.color,
            kml_metadata: Some(candidate.metadata),
            created_at: now,
            updated_at: now,
        });
    }
    state.storage.create_zones(&zones)?;
    tracing::info!(
        project = %payload.project_id,
        imported = zones.len(),
        skipped = skipped.len(),
        "KML import"
    );

    Ok(Json(ImportKmlResponse {
        imported: zones
            .into_iter()
            .map(ZoneOut::try_from_zone)
            .collect::<Result<Vec<_>>>()?,
        skipped: skipped.len(),
        errors,
    }))
}

async fn delete_zone(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(zone_id): Path<Uuid>,
) -> Result<Json<Message>> {
    let user_id = caller_id(&claims)?;
    let zone = state
        .storage
        .get_zone(zone_id)?
        .ok_or(Error::NotFound("Zone"))?;
    require_project_role(&state, zone.project_id, user_id, Some(Role::Organizer))?;
    state.storage.delete_zone(zone_id)?;
    Ok(Json(Message {
        message: "Zone deleted".to_string(),
    }))
}

async fn delete_all_zones(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<DeleteZonesResponse>> {
    let user_id = caller_id(&claims)?;
    require_project_role(&state, project_id, user_id, Some(Role::Organizer))?;
    let deleted = state.storage.delete_zones_in_project(project_id)?;
    tracing::info!(project = %project_id, deleted, "all zones deleted");
    Ok(Json(DeleteZonesResponse { deleted }))
}

// --- Assignment handlers ---

async fn create_assignment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<CreateAssignmentRequest>,
) -> Result<Json<ZoneAssignment>> {
    let user_id = caller_id(&claims)?;
    require_project_role(&state, project_id, user_id, Some(Role::Organizer))?;

    let zone = state
        .storage
        .get_zone(payload.zone_id)?
        .ok_or(Error::NotFound("Zone"))?;
    if zone.project_id != project_id {
        return Err(Error::Validation(
            "Zone does not belong to this project".into(),
        ));
    }
    state
        .storage
        .get_user(payload.volunteer_id)?
        .ok_or(Error::NotFound("User"))?;

    let assignment = ZoneAssignment {
        id: Uuid::new_v4(),
        zone_id: payload.zone_id,
        volunteer_id: payload.volunteer_id,
        assigned_by: user_id,
        assigned_at: Utc::now(),
        status: AssignmentStatus::Assigned,
        started_at: None,
        completed_at: None,
        notes: None,
        manual_completion_percentage: None,
    };
    state.storage.create_assignment(&assignment)?;
    tracing::info!(
        assignment = %assignment.id,
        zone = %assignment.zone_id,
        volunteer = %assignment.volunteer_id,
        "assignment created"
    );
    Ok(Json(assignment))
}

/// Owner plus collaborators of the project, each with their count of
/// non-completed assignments in it, for the organizer's assignment picker.
async fn available_volunteers(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<AvailableVolunteer>>> {
    let user_id = caller_id(&claims)?;
    let (project, _) = require_project_role(&state, project_id, user_id, Some(Role::Organizer))?;

    let zone_ids: Vec<Uuid> = state
        .storage
        .zones_in_project(project_id)?
        .into_iter()
        .map(|z| z.id)
        .collect();
    let active_count = |volunteer_id: Uuid| -> Result<usize> {
        Ok(state
            .storage
            .assignments_for_volunteer(volunteer_id)?
            .into_iter()
            .filter(|a| {
                zone_ids.contains(&a.zone_id) && a.status != AssignmentStatus::Completed
            })
            .count())
    };

    let mut members = vec![(project.owner_id, Role::Owner)];
    for collab in state.storage.collaborators_of(project_id)? {
        members.push((collab.user_id, collab.role));
    }

    let mut out = Vec::with_capacity(members.len());
    for (member_id, role) in members {
        let user = state
            .storage
            .get_user(member_id)?
            .ok_or(Error::NotFound("User"))?;
        out.push(AvailableVolunteer {
            user_id: user.id,
            email: user.email,
            name: user.name,
            role,
            active_assignments: active_count(member_id)?,
        });
    }
    Ok(Json(out))
}

async fn list_project_assignments(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<ZoneAssignment>>> {
    let user_id = caller_id(&claims)?;
    require_project_role(&state, project_id, user_id, None)?;
    Ok(Json(state.storage.assignments_for_project(project_id)?))
}

async fn list_zone_assignments(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(zone_id): Path<Uuid>,
) -> Result<Json<Vec<ZoneAssignment>>> {
    let user_id = caller_id(&claims)?;
    let zone = state
        .storage
        .get_zone(zone_id)?
        .ok_or(Error::NotFound("Zone"))?;
    require_project_role(&state, zone.project_id, user_id, None)?;
    Ok(Json(state.storage.assignments_for_zone(zone_id)?))
}

/// Organizer override: status and timestamps set directly, no lifecycle
/// table enforcement.
async fn admin_update_assignment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(assignment_id): Path<Uuid>,
    Json(payload): Json<lifecycle::AdminUpdate>,
) -> Result<Json<ZoneAssignment>> {
    let user_id = caller_id(&claims)?;
    let (mut assignment, _, project) = load_assignment(&state, assignment_id)?;
    require_project_role(&state, project.id, user_id, Some(Role::Organizer))?;

    lifecycle::admin_update(&mut assignment, &payload);
    state.storage.update_assignment(&assignment)?;
    tracing::info!(assignment = %assignment.id, status = %assignment.status, "admin update");
    Ok(Json(assignment))
}

async fn delete_assignment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<Message>> {
    let user_id = caller_id(&claims)?;
    let (_, _, project) = load_assignment(&state, assignment_id)?;
    require_project_role(&state, project.id, user_id, Some(Role::Organizer))?;
    state.storage.delete_assignment(assignment_id)?;
    Ok(Json(Message {
        message: "Assignment deleted".to_string(),
    }))
}

async fn my_assignments(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Query(query): Query<MyAssignmentsQuery>,
) -> Result<Json<Vec<MyAssignmentOut>>> {
    let user_id = caller_id(&claims)?;
    let mut out = Vec::new();
    for assignment in state.storage.assignments_for_volunteer(user_id)? {
        let zone = state
            .storage
            .get_zone(assignment.zone_id)?
            .ok_or(Error::NotFound("Zone"))?;
        if let Some(project_id) = query.project_id {
            if zone.project_id != project_id {
                continue;
            }
        }
        out.push(MyAssignmentOut {
            assignment,
            zone_name: zone.name,
            project_id: zone.project_id,
        });
    }
    Ok(Json(out))
}

async fn my_assignment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<MyAssignmentOut>> {
    let user_id = caller_id(&claims)?;
    let (assignment, zone, _) = load_assignment(&state, assignment_id)?;
    if assignment.volunteer_id != user_id {
        return Err(Error::NotFound("Assignment"));
    }
    Ok(Json(MyAssignmentOut {
        assignment,
        zone_name: zone.name,
        project_id: zone.project_id,
    }))
}

async fn update_my_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(assignment_id): Path<Uuid>,
    Json(payload): Json<StatusUpdateRequest>,
) -> Result<Json<ZoneAssignment>> {
    let user_id = caller_id(&claims)?;
    let (mut assignment, _, _) = load_assignment(&state, assignment_id)?;
    if assignment.volunteer_id != user_id {
        return Err(Error::NotFound("Assignment"));
    }

    lifecycle::transition(&mut assignment, payload.status, Utc::now())?;
    state.storage.update_assignment(&assignment)?;
    tracing::info!(assignment = %assignment.id, status = %assignment.status, "status updated");
    Ok(Json(assignment))
}

async fn update_my_assignment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(assignment_id): Path<Uuid>,
    Json(payload): Json<VolunteerUpdateRequest>,
) -> Result<Json<ZoneAssignment>> {
    let user_id = caller_id(&claims)?;
    let (mut assignment, _, _) = load_assignment(&state, assignment_id)?;
    if assignment.volunteer_id != user_id {
        return Err(Error::NotFound("Assignment"));
    }

    if let Some(pct) = payload.manual_completion_percentage {
        if pct > 100 {
            return Err(Error::Validation(
                "manual_completion_percentage must be between 0 and 100".into(),
            ));
        }
        assignment.manual_completion_percentage = Some(pct);
    }
    if let Some(notes) = payload.notes {
        assignment.notes = Some(notes);
    }
    state.storage.update_assignment(&assignment)?;
    Ok(Json(assignment))
}

// --- Note handlers ---

async fn add_note(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(assignment_id): Path<Uuid>,
    Json(payload): Json<CreateNoteRequest>,
) -> Result<Json<AssignmentNote>> {
    let user_id = caller_id(&claims)?;
    let (assignment, _, project) = load_assignment(&state, assignment_id)?;
    require_assignment_view(&state, &assignment, &project, user_id)?;

    if payload.content.trim().is_empty() {
        return Err(Error::Validation("Note content cannot be empty".into()));
    }

    let note = AssignmentNote {
        id: Uuid::new_v4(),
        assignment_id,
        user_id,
        content: payload.content,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    state.storage.add_note(&note)?;
    Ok(Json(note))
}

async fn list_notes(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<Vec<AssignmentNote>>> {
    let user_id = caller_id(&claims)?;
    let (assignment, _, project) = load_assignment(&state, assignment_id)?;
    require_assignment_view(&state, &assignment, &project, user_id)?;
    Ok(Json(state.storage.notes_for_assignment(assignment_id)?))
}

async fn update_note(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(note_id): Path<Uuid>,
    Json(payload): Json<UpdateNoteRequest>,
) -> Result<Json<AssignmentNote>> {
    let user_id = caller_id(&claims)?;
    let mut note = state
        .storage
        .get_note(note_id)?
        .ok_or(Error::NotFound("Note"))?;
    if note.user_id != user_id {
        return Err(Error::Forbidden("You can only edit your own notes".into()));
    }
    if payload.content.trim().is_empty() {
        return Err(Error::Validation("Note content cannot be empty".into()));
    }

    note.content = payload.content;
    note.updated_at = Utc::now();
    state.storage.add_note(&note)?;
    Ok(Json(note))
}

async fn delete_note(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(note_id): Path<Uuid>,
) -> Result<Json<Message>> {
    let user_id = caller_id(&claims)?;
    let note = state
        .storage
        .get_note(note_id)?
        .ok_or(Error::NotFound("Note"))?;
    if note.user_id != user_id {
        return Err(Error::Forbidden(
            "You can only delete your own notes".into(),
        ));
    }
    state.storage.delete_note(note_id)?;
    Ok(Json(Message {
        message: "Note deleted".to_string(),
    }))
}

// --- Completion handlers ---

async fn add_area(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(assignment_id): Path<Uuid>,
    Json(payload): Json<CreateAreaRequest>,
) -> Result<Json<AreaOut>> {
    let user_id = caller_id(&claims)?;
    let (assignment, _, _) = load_assignment(&state, assignment_id)?;
    if assignment.volunteer_id != user_id {
        return Err(Error::Forbidden(
            "Only the assigned volunteer can mark completion areas".into(),
        ));
    }

    // Validation is decode-only; no containment check against the zone
    let decoded = geometry::decode_geometry(&payload.geometry)?;
    let area = CompletionArea {
        id: Uuid::new_v4(),
        assignment_id,
        geometry: geometry::geometry_to_wkt(&decoded),
        completed_at: Utc::now(),
        notes: payload.notes,
    };
    state.storage.add_completion(&area)?;
    tracing::info!(assignment = %assignment_id, area = %area.id, "completion area added");
    Ok(Json(AreaOut::try_from_area(area)?))
}

async fn list_areas(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<Vec<AreaOut>>> {
    let user_id = caller_id(&claims)?;
    let (assignment, _, project) = load_assignment(&state, assignment_id)?;
    require_assignment_view(&state, &assignment, &project, user_id)?;
    let areas = state
        .storage
        .completions_for_assignment(assignment_id)?
        .into_iter()
        .map(AreaOut::try_from_area)
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(areas))
}

async fn delete_area(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(area_id): Path<Uuid>,
) -> Result<Json<Message>> {
    let user_id = caller_id(&claims)?;
    let area = state
        .storage
        .get_completion(area_id)?
        .ok_or(Error::NotFound("Completion area"))?;
    let (assignment, _, _) = load_assignment(&state, area.assignment_id)?;
    if assignment.volunteer_id != user_id {
        return Err(Error::Forbidden(
            "Only the assigned volunteer can remove completion areas".into(),
        ));
    }
    state.storage.delete_completion(area_id)?;
    Ok(Json(Message {
        message: "Completion area deleted".to_string(),
    }))
}

async fn assignment_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<ProgressResponse>> {
    let user_id = caller_id(&claims)?;
    let (assignment, zone, project) = load_assignment(&state, assignment_id)?;
    require_assignment_view(&state, &assignment, &project, user_id)?;

    let zone_polygon = geometry::wkt_to_polygon(&zone.geometry)?;
    let marks = state
        .storage
        .completions_for_assignment(assignment_id)?
        .iter()
        .map(|a| geometry::wkt_to_geometry(&a.geometry))
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(ProgressResponse {
        assignment_id,
        progress: progress::compute(&zone_polygon, &marks),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use serde_json::{json, Value};
    use std::fs;
    use tower::ServiceExt; // for .oneshot()

    const SQUARE_KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>Block A</name>
      <description>North block</description>
      <Polygon>
        <outerBoundaryIs>
          <LinearRing>
            <coordinates>
              13.0,52.0,0 13.0,52.001,0 13.001,52.001,0 13.001,52.0,0 13.0,52.0,0
            </coordinates>
          </LinearRing>
        </outerBoundaryIs>
      </Polygon>
    </Placemark>
  </Document>
</kml>"#;

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = HttpRequest::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.expect("request failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body read failed");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("non-JSON body")
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_full_distribution_flow() {
        let temp_dir = std::env::temp_dir().join("flyerflow_test_rest_flow");
        let _ = fs::remove_dir_all(&temp_dir);
        let storage = Storage::open(temp_dir.to_str().unwrap()).expect("storage for REST test");
        let app = create_router(storage);

        // Health is open
        let (status, _) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);

        // Everything else is not
        let (status, _) = send(&app, "GET", "/projects", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Register and look ourselves up
        let (status, body) = send(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "email": "anna@example.org",
                "name": "Anna",
                "password": "distribute8"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let token = body["access_token"].as_str().unwrap().to_string();
        let user_id = body["user"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "GET", "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "anna@example.org");

        // Password login works and a bad password is rejected
        let (status, _) = send(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({"email": "anna@example.org", "password": "distribute8"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({"email": "anna@example.org", "password": "wrong-pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Create a project and import a zone from KML
        let (status, body) = send(
            &app,
            "POST",
            "/projects",
            Some(&token),
            Some(json!({"name": "Altstadt flyers"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["my_role"], "owner");
        let project_id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "POST",
            "/zones/import-kml",
            Some(&token),
            Some(json!({"project_id": project_id, "kml_content": SQUARE_KML})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["imported"].as_array().unwrap().len(), 1);
        assert_eq!(body["imported"][0]["name"], "Block A");
        let zone_id = body["imported"][0]["id"].as_str().unwrap().to_string();
        let zone_geometry = body["imported"][0]["geometry"].clone();

        let (status, body) = send(
            &app,
            "GET",
            &format!("/zones/project/{project_id}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        // Assign ourselves as the volunteer
        let (status, body) = send(
            &app,
            "POST",
            &format!("/assignments/projects/{project_id}"),
            Some(&token),
            Some(json!({"zone_id": zone_id, "volunteer_id": user_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "assigned");
        let assignment_id = body["id"].as_str().unwrap().to_string();

        // A second active assignment for the same pair is a conflict
        let (status, _) = send(
            &app,
            "POST",
            &format!("/assignments/projects/{project_id}"),
            Some(&token),
            Some(json!({"zone_id": zone_id, "volunteer_id": user_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Start working; re-entering in_progress is not a valid transition
        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/assignments/my-assignments/{assignment_id}/status"),
            Some(&token),
            Some(json!({"status": "in_progress"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(body["started_at"].is_string());

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/assignments/my-assignments/{assignment_id}/status"),
            Some(&token),
            Some(json!({"status": "in_progress"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Invalid status transition"));

        // Mark the whole zone as covered and check progress
        let (status, body) = send(
            &app,
            "POST",
            &format!("/completions/assignments/{assignment_id}/areas"),
            Some(&token),
            Some(json!({"geometry": zone_geometry})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (status, body) = send(
            &app,
            "GET",
            &format!("/completions/assignments/{assignment_id}/progress"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["progress_percentage"], 100.0);
        assert_eq!(body["completion_count"], 1);
        assert!(body["total_area_sqm"].as_f64().unwrap() > 0.0);

        let _ = fs::remove_dir_all(temp_dir);
    }

    #[tokio::test]
    async fn test_collaborator_roles_gate_mutations() {
        let temp_dir = std::env::temp_dir().join("flyerflow_test_rest_roles");
        let _ = fs::remove_dir_all(&temp_dir);
        let storage = Storage::open(temp_dir.to_str().unwrap()).expect("storage for REST test");
        let app = create_router(storage);

        let mut tokens = Vec::new();
        for (email, name) in [("owner@example.org", "Olga"), ("viewer@example.org", "Vik")] {
            let (status, body) = send(
                &app,
                "POST",
                "/auth/register",
                None,
                Some(json!({"email": email, "name": name, "password": "distribute8"})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            tokens.push(body["access_token"].as_str().unwrap().to_string());
        }
        let (owner_token, viewer_token) = (&tokens[0], &tokens[1]);

        let (_, body) = send(
            &app,
            "POST",
            "/projects",
            Some(owner_token),
            Some(json!({"name": "Hafen flyers"})),
        )
        .await;
        let project_id = body["id"].as_str().unwrap().to_string();

        // An owner-role invite is rejected, viewer is fine
        let (status, _) = send(
            &app,
            "POST",
            &format!("/projects/{project_id}/collaborators"),
            Some(owner_token),
            Some(json!({"email": "viewer@example.org", "role": "owner"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/projects/{project_id}/collaborators"),
            Some(owner_token),
            Some(json!({"email": "viewer@example.org", "role": "viewer"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // The viewer can read but not import zones or delete the project
        let (status, body) = send(
            &app,
            "GET",
            &format!("/projects/{project_id}"),
            Some(viewer_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["my_role"], "viewer");

        let (status, _) = send(
            &app,
            "POST",
            "/zones/import-kml",
            Some(viewer_token),
            Some(json!({"project_id": project_id, "kml_content": SQUARE_KML})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/projects/{project_id}"),
            Some(viewer_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // The volunteer picker lists owner + collaborators with workloads,
        // and is organizer-gated
        let (status, _) = send(
            &app,
            "GET",
            &format!("/assignments/projects/{project_id}/available-volunteers"),
            Some(viewer_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = send(
            &app,
            "POST",
            "/zones/import-kml",
            Some(owner_token),
            Some(json!({"project_id": project_id, "kml_content": SQUARE_KML})),
        )
        .await;
        let zone_id = body["imported"][0]["id"].as_str().unwrap().to_string();
        let (_, body) = send(&app, "GET", "/auth/me", Some(viewer_token), None).await;
        let viewer_id = body["id"].as_str().unwrap().to_string();
        let (status, _) = send(
            &app,
            "POST",
            &format!("/assignments/projects/{project_id}"),
            Some(owner_token),
            Some(json!({"zone_id": zone_id, "volunteer_id": viewer_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &app,
            "GET",
            &format!("/assignments/projects/{project_id}/available-volunteers"),
            Some(owner_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let volunteers = body.as_array().unwrap();
        assert_eq!(volunteers.len(), 2);
        let viewer_entry = volunteers
            .iter()
            .find(|v| v["user_id"] == viewer_id.as_str())
            .unwrap();
        assert_eq!(viewer_entry["role"], "viewer");
        assert_eq!(viewer_entry["active_assignments"], 1);
        let owner_entry = volunteers
            .iter()
            .find(|v| v["role"] == "owner")
            .unwrap();
        assert_eq!(owner_entry["active_assignments"], 0);

        let _ = fs::remove_dir_all(temp_dir);
    }

    #[tokio::test]
    async fn test_note_editing_is_author_only() {
        let temp_dir = std::env::temp_dir().join("flyerflow_test_rest_notes");
        let _ = fs::remove_dir_all(&temp_dir);
        let storage = Storage::open(temp_dir.to_str().unwrap()).expect("storage for REST test");
        let app = create_router(storage);

        let mut ids = Vec::new();
        let mut tokens = Vec::new();
        for (email, name) in [
            ("organizer@example.org", "Olga"),
            ("volunteer@example.org", "Vik"),
        ] {
            let (_, body) = send(
                &app,
                "POST",
                "/auth/register",
                None,
                Some(json!({"email": email, "name": name, "password": "distribute8"})),
            )
            .await;
            ids.push(body["user"]["id"].as_str().unwrap().to_string());
            tokens.push(body["access_token"].as_str().unwrap().to_string());
        }
        let (organizer_token, volunteer_token) = (&tokens[0], &tokens[1]);

        let (_, body) = send(
            &app,
            "POST",
            "/projects",
            Some(organizer_token),
            Some(json!({"name": "Notes drive"})),
        )
        .await;
        let project_id = body["id"].as_str().unwrap().to_string();
        let (_, body) = send(
            &app,
            "POST",
            "/zones/import-kml",
            Some(organizer_token),
            Some(json!({"project_id": project_id, "kml_content": SQUARE_KML})),
        )
        .await;
        let zone_id = body["imported"][0]["id"].as_str().unwrap().to_string();
        let (_, body) = send(
            &app,
            "POST",
            &format!("/assignments/projects/{project_id}"),
            Some(organizer_token),
            Some(json!({"zone_id": zone_id, "volunteer_id": ids[1]})),
        )
        .await;
        let assignment_id = body["id"].as_str().unwrap().to_string();

        // The volunteer leaves a note on their own assignment
        let (status, body) = send(
            &app,
            "POST",
            &format!("/assignments/{assignment_id}/notes"),
            Some(volunteer_token),
            Some(json!({"content": "Mailboxes on Hauptstr. are full"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let note_id = body["id"].as_str().unwrap().to_string();
        let created_at = body["created_at"].as_str().unwrap().to_string();

        // Only the author can edit, and the edit must carry content
        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/notes/{note_id}"),
            Some(organizer_token),
            Some(json!({"content": "rewritten by someone else"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/notes/{note_id}"),
            Some(volunteer_token),
            Some(json!({"content": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/notes/{note_id}"),
            Some(volunteer_token),
            Some(json!({"content": "Skipped the full mailboxes"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["content"], "Skipped the full mailboxes");
        assert_eq!(body["created_at"], created_at.as_str());
        assert!(body["updated_at"].as_str().unwrap() >= created_at.as_str());

        // The edit is persisted, not just echoed
        let (_, body) = send(
            &app,
            "GET",
            &format!("/assignments/{assignment_id}/notes"),
            Some(volunteer_token),
            None,
        )
        .await;
        assert_eq!(body[0]["content"], "Skipped the full mailboxes");

        let _ = fs::remove_dir_all(temp_dir);
    }
}
