use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    async fn train(
        &self,
        person_id: &str,
        display_name: &str,
        metadata_json: &str,
        images: Vec<Vec<u8>>,
    ) -> zbus::Result<String>;
    async fn recognize(&self, image: Vec<u8>, threshold: f64) -> zbus::Result<String>;
    async fn remove(&self, person_id: &str) -> zbus::Result<bool>;
    async fn set_enabled(&self, person_id: &str, enabled: bool) -> zbus::Result<bool>;
    async fn training_status(&self, person_id: &str) -> zbus::Result<String>;
    async fn list_persons(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall biometric attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a student from one or more photos
    Enroll {
        /// Stable identifier (e.g. student id)
        person_id: String,
        /// Human-readable name
        #[arg(short, long)]
        name: String,
        /// Optional JSON metadata (department, email, ...)
        #[arg(short, long, default_value = "null")]
        metadata: String,
        /// Enrollment photos
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Take attendance from a group photo
    Recognize {
        /// Group photo
        photo: PathBuf,
        /// Similarity threshold override (0 < t <= 1)
        #[arg(short, long)]
        threshold: Option<f64>,
    },
    /// List enrolled, matchable persons
    List,
    /// Delete a person's enrollment data
    Remove { person_id: String },
    /// Re-enable a person for matching
    Enable { person_id: String },
    /// Exclude a person from matching without deleting their data
    Disable { person_id: String },
    /// Show one person's training status
    Info { person_id: String },
    /// Show daemon status
    Status,
}

fn print_json(raw: &str) {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(v) => println!("{}", serde_json::to_string_pretty(&v).unwrap_or_default()),
        Err(_) => println!("{raw}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = zbus::Connection::session()
        .await
        .context("connecting to session bus (is rollcalld running?)")?;
    let proxy = AttendanceProxy::new(&conn).await?;

    match cli.command {
        Commands::Enroll {
            person_id,
            name,
            metadata,
            images,
        } => {
            let mut payloads = Vec::with_capacity(images.len());
            for path in &images {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                payloads.push(bytes);
            }
            let reply = proxy.train(&person_id, &name, &metadata, payloads).await?;
            print_json(&reply);
        }
        Commands::Recognize { photo, threshold } => {
            let bytes = std::fs::read(&photo)
                .with_context(|| format!("reading {}", photo.display()))?;
            let reply = proxy.recognize(bytes, threshold.unwrap_or(0.0)).await?;
            print_json(&reply);
        }
        Commands::List => {
            let reply = proxy.list_persons().await?;
            print_json(&reply);
        }
        Commands::Remove { person_id } => {
            proxy.remove(&person_id).await?;
            println!("removed {person_id}");
        }
        Commands::Enable { person_id } => {
            proxy.set_enabled(&person_id, true).await?;
            println!("enabled {person_id}");
        }
        Commands::Disable { person_id } => {
            proxy.set_enabled(&person_id, false).await?;
            println!("disabled {person_id}");
        }
        Commands::Info { person_id } => {
            let reply = proxy.training_status(&person_id).await?;
            print_json(&reply);
        }
        Commands::Status => {
            let reply = proxy.status().await?;
            print_json(&reply);
        }
    }

    Ok(())
}
