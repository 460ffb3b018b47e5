use anyhow::Context;
use promptinit_kernel::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load promptinit settings")?;
    promptinit_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.name,
        "promptinit bootstrap starting"
    );

    promptinit_app::bootstrap(&settings).await?;

    println!("Database initialized successfully");
    Ok(())
}
