//! Runs against a real server: `MONGODB_URI=mongodb://localhost:27017 cargo test -- --ignored`.

use mongodb::bson::doc;
use promptinit_db::{DocumentStore, Initializer, MongoStore, SeedOutcome, SeedPlan};
use promptinit_kernel::DatabaseSettings;

async fn scratch_store() -> MongoStore {
    let uri = std::env::var("MONGODB_URI").expect("MONGODB_URI must be set for live tests");
    let settings = DatabaseSettings {
        uri,
        name: format!("promptinit_test_{}", std::process::id()),
        ..DatabaseSettings::default()
    };
    let store = MongoStore::connect(&settings).await.unwrap();
    store.database().drop().await.unwrap();
    store
}

#[tokio::test]
#[ignore = "requires a running MongoDB"]
async fn seeds_once_and_enforces_uniqueness() {
    let store = scratch_store().await;
    let plan = SeedPlan::new(
        "prompts",
        "default_type",
        "pdf",
        doc! { "default_prompt": "" },
    );
    let initializer = Initializer::new(&store);

    let first = initializer.run(&plan).await.unwrap();
    let second = initializer.run(&plan).await.unwrap();
    assert_eq!(first.seed, SeedOutcome::Inserted);
    assert_eq!(second.seed, SeedOutcome::AlreadyPresent);
    assert_eq!(first.index_name, "default_type_1");

    let documents = store.find("prompts", doc! {}).await.unwrap();
    assert_eq!(
        documents,
        vec![doc! { "default_type": "pdf", "default_prompt": "" }]
    );

    let err = store
        .insert_one(
            "prompts",
            doc! { "default_type": "pdf", "default_prompt": "x" },
        )
        .await
        .unwrap_err();
    assert!(err.is_duplicate_key());

    store.database().drop().await.unwrap();
}
