//! flyerflow server
//!
//! Starts the REST API over sled storage.
//!
//! Usage:
//!   cargo run --bin seed_demo      # populate demo data (optional)
//!   cargo run --bin flyerflow      # start server
//!   # Then talk to it via flyerflow-cli or plain curl
//!
//! Configuration (env / .env): BIND_ADDR, DATA_DIR, JWT_SECRET,
//! GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET, GOOGLE_REDIRECT_URI.

use std::net::SocketAddr;
use tokio::net::TcpListener;

use flyerflow::rest::create_router;
use flyerflow::storage::Storage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flyerflow=info".into()),
        )
        .init();

    let bind_addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()?;
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "flyerflow_data".to_string());

    println!("🚀 flyerflow starting...");
    println!("📦 Storage: sled at {data_dir}");
    println!("🌐 REST (axum) on {bind_addr}");

    let storage = Storage::open(&data_dir)?;
    let app = create_router(storage);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "listening");
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
