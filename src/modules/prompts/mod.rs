pub mod models;

use anyhow::Context;
use mongodb::bson::{self, Bson};
use promptinit_db::{InitReport, Initializer, MongoStore, SeedPlan};
use promptinit_kernel::{SeedSettings, Settings};

use models::ConfigDocument;

/// Build the seed plan for the configured default document.
pub fn seed_plan(seed: &SeedSettings) -> anyhow::Result<SeedPlan> {
    seed.validate()?;

    let defaults = ConfigDocument::new(seed.key_value.clone(), seed.default_prompt.clone());
    let mut document =
        bson::to_document(&defaults).context("failed to encode default document")?;
    if seed.key_field != ConfigDocument::KEY_FIELD {
        // The plan writes the configured key field instead.
        document.remove(ConfigDocument::KEY_FIELD);
    }

    Ok(SeedPlan::new(
        seed.collection.clone(),
        seed.key_field.clone(),
        seed.key_value.clone(),
        document,
    ))
}

async fn connect(settings: &Settings) -> anyhow::Result<MongoStore> {
    MongoStore::connect(&settings.database)
        .await
        .with_context(|| format!("failed to configure client for database '{}'", settings.database.name))
}

/// Ensure the prompts collection, its unique index and the default document.
pub async fn bootstrap(settings: &Settings) -> anyhow::Result<InitReport> {
    let plan = seed_plan(&settings.seed)?;
    let store = connect(settings).await?;

    tracing::info!(
        database = %settings.database.name,
        collection = %plan.collection,
        key = %plan.key_field,
        "initializing database"
    );

    Initializer::new(&store).run(&plan).await.with_context(|| {
        format!(
            "failed to initialize '{}.{}'",
            settings.database.name, plan.collection
        )
    })
}

/// Every seeded default document, rendered as relaxed extended JSON.
pub async fn default_documents(settings: &Settings) -> anyhow::Result<Vec<serde_json::Value>> {
    let store = connect(settings).await?;
    let documents = Initializer::new(&store)
        .list_defaults(&settings.seed.collection, &settings.seed.key_field)
        .await
        .with_context(|| format!("failed to read '{}'", settings.seed.collection))?;

    Ok(documents
        .into_iter()
        .map(|document| Bson::Document(document).into_relaxed_extjson())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use promptinit_db::{MemoryStore, SeedOutcome};

    #[test]
    fn default_settings_plan_matches_pdf_document() {
        let plan = seed_plan(&SeedSettings::default()).unwrap();
        assert_eq!(plan.collection, "prompts");
        assert_eq!(plan.key_filter(), doc! { "default_type": "pdf" });
        assert_eq!(
            plan.document,
            doc! { "default_type": "pdf", "default_prompt": "" }
        );
    }

    #[test]
    fn custom_key_field_replaces_default_type() {
        let seed = SeedSettings {
            key_field: "category".to_string(),
            key_value: "invoice".to_string(),
            default_prompt: "Extract totals".to_string(),
            ..SeedSettings::default()
        };
        let plan = seed_plan(&seed).unwrap();
        assert_eq!(
            plan.document,
            doc! { "default_prompt": "Extract totals", "category": "invoice" }
        );
    }

    #[test]
    fn invalid_seed_settings_are_rejected() {
        let seed = SeedSettings {
            collection: String::new(),
            ..SeedSettings::default()
        };
        assert!(seed_plan(&seed).is_err());
    }

    #[tokio::test]
    async fn seeded_document_decodes_as_config_document() {
        let store = MemoryStore::new();
        let plan = seed_plan(&SeedSettings::default()).unwrap();
        let report = Initializer::new(&store).run(&plan).await.unwrap();
        assert_eq!(report.seed, SeedOutcome::Inserted);

        let stored = Initializer::new(&store)
            .list_defaults("prompts", ConfigDocument::KEY_FIELD)
            .await
            .unwrap();
        let decoded: Vec<ConfigDocument> = stored
            .into_iter()
            .map(|document| bson::from_document(document).unwrap())
            .collect();
        assert_eq!(decoded, vec![ConfigDocument::new("pdf", "")]);
    }
}
