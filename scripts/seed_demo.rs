//! Demo data seeder for flyerflow
//!
//! Populates the sled store with two users, a project, zones imported from
//! an inline KML document, and an assignment so the API has something to
//! show right after startup.
//! Run: cargo run --bin seed_demo

use chrono::Utc;
use uuid::Uuid;

use flyerflow::auth::hash_password;
use flyerflow::geometry;
use flyerflow::kml::parse_kml;
use flyerflow::models::{AssignmentStatus, Project, ProjectStatus, User, Zone, ZoneAssignment};
use flyerflow::storage::Storage;

const DEMO_KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>Altstadt Nord</name>
      <description>Old town, north of the river</description>
      <Style><PolyStyle><color>ff0000cc</color></PolyStyle></Style>
      <Polygon>
        <outerBoundaryIs>
          <LinearRing>
            <coordinates>
              6.955,50.940,0 6.955,50.945,0 6.962,50.945,0 6.962,50.940,0 6.955,50.940,0
            </coordinates>
          </LinearRing>
        </outerBoundaryIs>
      </Polygon>
    </Placemark>
    <Placemark>
      <name>Altstadt Sued</name>
      <Polygon>
        <outerBoundaryIs>
          <LinearRing>
            <coordinates>
              6.955,50.934,0 6.955,50.939,0 6.962,50.939,0 6.962,50.934,0 6.955,50.934,0
            </coordinates>
          </LinearRing>
        </outerBoundaryIs>
      </Polygon>
    </Placemark>
  </Document>
</kml>"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "flyerflow_data".to_string());
    let storage = Storage::open(&data_dir)?;

    let organizer = User {
        id: Uuid::new_v4(),
        email: "organizer@example.org".to_string(),
        name: "Demo Organizer".to_string(),
        password_hash: Some(hash_password("organizer")?),
        google_id: None,
        picture_url: None,
        created_at: Utc::now(),
        last_login: None,
    };
    let volunteer = User {
        id: Uuid::new_v4(),
        email: "volunteer@example.org".to_string(),
        name: "Demo Volunteer".to_string(),
        password_hash: Some(hash_password("volunteer")?),
        google_id: None,
        picture_url: None,
        created_at: Utc::now(),
        last_login: None,
    };
    storage.create_user(&organizer)?;
    storage.create_user(&volunteer)?;

    let project = Project {
        id: Uuid::new_v4(),
        name: "Altstadt flyer drive".to_string(),
        description: Some("Spring flyer distribution across the old town".to_string()),
        owner_id: organizer.id,
        is_active: true,
        status: ProjectStatus::InProgress,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    storage.create_project(&project)?;

    let (candidates, errors) = parse_kml(DEMO_KML);
    if !errors.is_empty() {
        println!("⚠️  KML parse errors: {errors:?}");
    }
    let now = Utc::now();
    let mut zones = Vec::new();
    for candidate in candidates {
        let polygon = geometry::decode_polygon(&candidate.geometry)?;
        zones.push(Zone {
            id: Uuid::new_v4(),
            project_id: project.id,
            name: candidate.name,
            description: candidate.description,
            geometry: geometry::polygon_to_wkt(&polygon),
            color: candidate.color,
            kml_metadata: Some(candidate.metadata),
            created_at: now,
            updated_at: now,
        });
    }
    storage.create_zones(&zones)?;

    let Some(first_zone) = zones.first() else {
        return Err("no zones parsed from demo KML".into());
    };
    storage.create_assignment(&ZoneAssignment {
        id: Uuid::new_v4(),
        zone_id: first_zone.id,
        volunteer_id: volunteer.id,
        assigned_by: organizer.id,
        assigned_at: Utc::now(),
        status: AssignmentStatus::Assigned,
        started_at: None,
        completed_at: None,
        notes: None,
        manual_completion_percentage: None,
    })?;

    println!(
        "✅ Seeded {} zones into project '{}' at {data_dir}",
        zones.len(),
        project.name
    );
    println!("✅ Users: organizer@example.org / organizer, volunteer@example.org / volunteer");

    Ok(())
}
