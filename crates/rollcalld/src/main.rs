use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod annotate;
mod config;
mod dbus_interface;
mod engine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = config::Config::from_env();
    tracing::info!(
        db = %config.db_path.display(),
        models = %config.model_dir.display(),
        threshold = config.similarity_threshold,
        "configuration loaded"
    );

    // Fails fast: store unreachable or models missing abort startup.
    let engine = engine::spawn_engine(&config)?;

    let service = dbus_interface::AttendanceService::new(engine, config.similarity_threshold);
    let _conn = zbus::connection::Builder::session()?
        .name("org.rollcall.Attendance1")?
        .serve_at("/org/rollcall/Attendance1", service)?
        .build()
        .await?;

    tracing::info!("rollcalld ready on org.rollcall.Attendance1");

    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    Ok(())
}
