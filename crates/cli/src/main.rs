use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use promptinit_kernel::Settings;

#[derive(Debug, Parser)]
#[command(name = "promptinit", version, about = "Initialize and inspect the prompts database")]
struct Cli {
    /// Directory holding base.toml and the environment overlays
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Environment overlay: local, staging or production
    #[arg(long = "env", global = true)]
    environment: Option<String>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ensure the collection, its unique index and the default document
    Init,
    /// Print every default document as one JSON object per line
    Defaults,
}

#[derive(Debug, Args)]
struct Overrides {
    /// MongoDB connection string
    #[arg(long, global = true)]
    uri: Option<String>,

    /// Database name
    #[arg(long, global = true)]
    database: Option<String>,

    /// Collection holding the default documents
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Prompt stored in a newly seeded default document
    #[arg(long, global = true)]
    default_prompt: Option<String>,
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings =
            Settings::load_with(self.config_dir.clone(), self.environment.clone())?;

        let overrides = &self.overrides;
        if let Some(uri) = &overrides.uri {
            settings.database.uri = uri.clone();
        }
        if let Some(database) = &overrides.database {
            settings.database.name = database.clone();
        }
        if let Some(collection) = &overrides.collection {
            settings.seed.collection = collection.clone();
        }
        if let Some(prompt) = &overrides.default_prompt {
            settings.seed.default_prompt = prompt.clone();
        }

        settings.seed.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli
        .settings()
        .with_context(|| "failed to load promptinit settings")?;
    promptinit_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Init => {
            let report = promptinit_app::bootstrap(&settings).await?;
            tracing::debug!(report = ?report, "init finished");
            println!("Database initialized successfully");
        }
        Command::Defaults => {
            for document in promptinit_app::default_documents(&settings).await? {
                println!("{}", document);
            }
        }
    }

    Ok(())
}
