use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "PROMPTINIT_ENV";
const CONFIG_DIR_ENV: &str = "PROMPTINIT_CONFIG_DIR";
const ENV_PREFIX: &str = "PROMPTINIT";
/// Connection string variable read by the older deployment scripts.
const LEGACY_URI_ENV: &str = "MONGODB_URI";
const URI_ENV_NAME: &str = "PROMPTINIT__DATABASE__URI";

/// Deployment environment the initializer is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        match name {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub seed: SeedSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(None, None)
    }

    /// Like [`Settings::load`], with explicit values taking precedence over
    /// `PROMPTINIT_CONFIG_DIR` and `PROMPTINIT_ENV`.
    pub fn load_with(
        config_dir: Option<PathBuf>,
        environment: Option<String>,
    ) -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = environment
            .or_else(|| std::env::var(ENV_VAR_NAME).ok())
            .unwrap_or_else(|| DEFAULT_ENV.to_string());
        let config_dir = config_dir
            .or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        let config_dir = match config_dir {
            Some(dir) => dir,
            // Default to repo root `config` directory.
            None => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load configuration from an explicit directory and environment name.
    ///
    /// Sources, lowest priority first: `base.toml`, `<environment>.toml`,
    /// then `PROMPTINIT__SECTION__KEY` variables. `MONGODB_URI` sets
    /// `database.uri` unless `PROMPTINIT__DATABASE__URI` is present.
    pub fn load_from(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment = Environment::parse(environment)?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let mut builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        // The legacy variable beats the files but not PROMPTINIT__DATABASE__URI.
        if std::env::var(URI_ENV_NAME).is_err() {
            if let Ok(uri) = std::env::var(LEGACY_URI_ENV) {
                builder = builder
                    .set_override("database.uri", uri)
                    .with_context(|| format!("failed to apply {}", LEGACY_URI_ENV))?;
            }
        }

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = parsed_environment;
        settings.seed.validate()?;

        tracing::debug!(
            environment = ?settings.environment,
            config_dir = %config_dir.display(),
            "settings loaded"
        );

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_uri")]
    pub uri: String,
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
    #[serde(default = "DatabaseSettings::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "DatabaseSettings::default_app_name")]
    pub app_name: String,
}

impl DatabaseSettings {
    fn default_uri() -> String {
        "mongodb://127.0.0.1:27017".to_string()
    }

    fn default_name() -> String {
        "ocr_prompts".to_string()
    }

    fn default_connect_timeout_ms() -> u64 {
        5000
    }

    fn default_app_name() -> String {
        "promptinit".to_string()
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            uri: Self::default_uri(),
            name: Self::default_name(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
            app_name: Self::default_app_name(),
        }
    }
}

/// What gets seeded, and where.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedSettings {
    #[serde(default = "SeedSettings::default_collection")]
    pub collection: String,
    #[serde(default = "SeedSettings::default_key_field")]
    pub key_field: String,
    #[serde(default = "SeedSettings::default_key_value")]
    pub key_value: String,
    #[serde(default)]
    pub default_prompt: String,
}

impl SeedSettings {
    fn default_collection() -> String {
        "prompts".to_string()
    }

    fn default_key_field() -> String {
        "default_type".to_string()
    }

    fn default_key_value() -> String {
        "pdf".to_string()
    }

    /// Reject names MongoDB would interpret as operators or paths.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.collection.trim().is_empty() {
            bail!("seed.collection must not be empty");
        }
        if self.collection.contains('$') {
            bail!("seed.collection '{}' must not contain '$'", self.collection);
        }
        if self.key_field.trim().is_empty() {
            bail!("seed.key_field must not be empty");
        }
        if self.key_field.starts_with('$') || self.key_field.contains('.') {
            bail!(
                "seed.key_field '{}' must be a plain top-level field name",
                self.key_field
            );
        }
        Ok(())
    }
}

impl Default for SeedSettings {
    fn default() -> Self {
        Self {
            collection: Self::default_collection(),
            key_field: Self::default_key_field(),
            key_value: Self::default_key_value(),
            default_prompt: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_seed_targets_pdf_prompts() {
        let settings = Settings::default();
        assert_eq!(settings.database.name, "ocr_prompts");
        assert_eq!(settings.seed.collection, "prompts");
        assert_eq!(settings.seed.key_field, "default_type");
        assert_eq!(settings.seed.key_value, "pdf");
        assert_eq!(settings.seed.default_prompt, "");
    }

    #[test]
    fn environment_files_override_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.toml"),
            "[database]\nname = \"base_db\"\n\n[seed]\ndefault_prompt = \"from base\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("staging.toml"),
            "[seed]\ndefault_prompt = \"from staging\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(dir.path(), "staging").unwrap();
        assert_eq!(settings.environment, Environment::Staging);
        assert_eq!(settings.database.name, "base_db");
        assert_eq!(settings.seed.default_prompt, "from staging");
        assert_eq!(settings.seed.collection, "prompts");
    }

    #[test]
    fn legacy_uri_variable_overrides_shipped_config() {
        let config_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config");

        std::env::remove_var(URI_ENV_NAME);
        std::env::set_var(LEGACY_URI_ENV, "mongodb://db.internal:27017");
        let from_legacy = Settings::load_from(&config_dir, "production");

        std::env::set_var(URI_ENV_NAME, "mongodb://explicit:27017");
        let from_prefixed = Settings::load_from(&config_dir, "production");

        std::env::remove_var(URI_ENV_NAME);
        std::env::remove_var(LEGACY_URI_ENV);

        let from_legacy = from_legacy.unwrap();
        assert_eq!(from_legacy.database.uri, "mongodb://db.internal:27017");
        assert_eq!(from_legacy.database.name, "ocr_prompts");
        assert_eq!(from_legacy.telemetry.log_format, LogFormat::Json);
        assert_eq!(
            from_prefixed.unwrap().database.uri,
            "mongodb://explicit:27017"
        );
    }

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(dir.path(), "local").unwrap();
        assert_eq!(settings.seed.key_value, "pdf");
        assert_eq!(settings.telemetry.log_format, LogFormat::Pretty);
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from(dir.path(), "qa").unwrap_err();
        assert!(err.to_string().contains("unsupported environment 'qa'"));
    }

    #[test]
    fn operator_key_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.toml"), "[seed]\nkey_field = \"$where\"\n").unwrap();
        assert!(Settings::load_from(dir.path(), "local").is_err());
    }

    #[test]
    fn dotted_key_field_is_rejected() {
        let seed = SeedSettings {
            key_field: "meta.type".to_string(),
            ..SeedSettings::default()
        };
        assert!(seed.validate().is_err());
    }
}
