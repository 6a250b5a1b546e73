use clap::{Parser, Subcommand};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fs;

const TOKEN_FILE: &str = ".flyerflow_token";

#[derive(Parser)]
#[command(name = "flyerflow-cli")]
#[command(about = "CLI for the flyerflow coordination backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        password: String,
    },
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    Me,
    CreateProject {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    ListProjects,
    AddCollaborator {
        #[arg(short = 'p', long)]
        project_id: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long, default_value = "viewer")]
        role: String,
    },
    /// Import zones from a KML file into a project
    ImportKml {
        #[arg(short = 'p', long)]
        project_id: String,
        #[arg(short, long)]
        file: String,
        /// Zone names to skip (repeatable)
        #[arg(short, long)]
        skip: Vec<String>,
    },
    ListZones {
        #[arg(short = 'p', long)]
        project_id: String,
    },
    Assign {
        #[arg(short = 'p', long)]
        project_id: String,
        #[arg(short, long)]
        zone_id: String,
        #[arg(short, long)]
        volunteer_id: String,
    },
    MyAssignments {
        #[arg(short = 'p', long)]
        project_id: Option<String>,
    },
    SetStatus {
        #[arg(short, long)]
        assignment_id: String,
        /// assigned, in_progress, or completed
        #[arg(short, long)]
        status: String,
    },
    /// Mark a covered area on an assignment (GeoJSON geometry file)
    MarkArea {
        #[arg(short, long)]
        assignment_id: String,
        #[arg(short, long)]
        file: String,
    },
    Progress {
        #[arg(short, long)]
        assignment_id: String,
    },
    Logout,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

fn token() -> String {
    fs::read_to_string(TOKEN_FILE).unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Register {
            email,
            name,
            password,
        } => {
            let res = client
                .post(format!("{}/auth/register", cli.url))
                .json(&json!({ "email": email, "name": name, "password": password }))
                .send()
                .await?;
            if res.status().is_success() {
                let body: TokenResponse = res.json().await?;
                fs::write(TOKEN_FILE, body.access_token)?;
                println!("Registered and logged in. Token saved to {TOKEN_FILE}");
            } else {
                println!("Registration failed: {}", res.text().await?);
            }
        }
        Commands::Login { email, password } => {
            let res = client
                .post(format!("{}/auth/login", cli.url))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?;
            if res.status().is_success() {
                let body: TokenResponse = res.json().await?;
                fs::write(TOKEN_FILE, body.access_token)?;
                println!("Logged in. Token saved to {TOKEN_FILE}");
            } else {
                println!("Login failed: {}", res.text().await?);
            }
        }
        Commands::Me => {
            let res = client
                .get(format!("{}/auth/me", cli.url))
                .header("Authorization", format!("Bearer {}", token()))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::CreateProject { name, description } => {
            let res = client
                .post(format!("{}/projects", cli.url))
                .header("Authorization", format!("Bearer {}", token()))
                .json(&json!({ "name": name, "description": description }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::ListProjects => {
            let res = client
                .get(format!("{}/projects", cli.url))
                .header("Authorization", format!("Bearer {}", token()))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::AddCollaborator {
            project_id,
            email,
            role,
        } => {
            let res = client
                .post(format!("{}/projects/{}/collaborators", cli.url, project_id))
                .header("Authorization", format!("Bearer {}", token()))
                .json(&json!({ "email": email, "role": role }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::ImportKml {
            project_id,
            file,
            skip,
        } => {
            let kml_content = fs::read_to_string(&file)?;
            let res = client
                .post(format!("{}/zones/import-kml", cli.url))
                .header("Authorization", format!("Bearer {}", token()))
                .json(&json!({
                    "project_id": project_id,
                    "kml_content": kml_content,
                    "skip_names": skip
                }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::ListZones { project_id } => {
            let res = client
                .get(format!("{}/zones/project/{}", cli.url, project_id))
                .header("Authorization", format!("Bearer {}", token()))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::Assign {
            project_id,
            zone_id,
            volunteer_id,
        } => {
            let res = client
                .post(format!("{}/assignments/projects/{}", cli.url, project_id))
                .header("Authorization", format!("Bearer {}", token()))
                .json(&json!({ "zone_id": zone_id, "volunteer_id": volunteer_id }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::MyAssignments { project_id } => {
            let mut url = format!("{}/assignments/my-assignments", cli.url);
            if let Some(project_id) = project_id {
                url = format!("{url}?project_id={project_id}");
            }
            let res = client
                .get(url)
                .header("Authorization", format!("Bearer {}", token()))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::SetStatus {
            assignment_id,
            status,
        } => {
            let res = client
                .patch(format!(
                    "{}/assignments/my-assignments/{}/status",
                    cli.url, assignment_id
                ))
                .header("Authorization", format!("Bearer {}", token()))
                .json(&json!({ "status": status }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::MarkArea {
            assignment_id,
            file,
        } => {
            let geometry: serde_json::Value = serde_json::from_str(&fs::read_to_string(&file)?)?;
            let res = client
                .post(format!(
                    "{}/completions/assignments/{}/areas",
                    cli.url, assignment_id
                ))
                .header("Authorization", format!("Bearer {}", token()))
                .json(&json!({ "geometry": geometry }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::Progress { assignment_id } => {
            let res = client
                .get(format!(
                    "{}/completions/assignments/{}/progress",
                    cli.url, assignment_id
                ))
                .header("Authorization", format!("Bearer {}", token()))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::Logout => {
            let _ = fs::remove_file(TOKEN_FILE);
            println!("Logged out (token removed).");
        }
    }

    Ok(())
}
