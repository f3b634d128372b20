use std::env;
use uuid::Uuid;

use ritter_leads_api::data::db_storage::PgLeadStore;
use ritter_leads_api::db::Database;
use ritter_leads_api::lead_store::LeadStore;
use ritter_leads_api::models::{LeadChanges, LeadField, NewLead};

/// Integration smoke test for the Postgres lead store.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn lead_store_round_trip_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let store = PgLeadStore::new(db.pool.clone());

    // Unique email so repeated runs don't collide.
    let email = format!("smoke-{}@example.com", Uuid::new_v4());
    let saved = store
        .save(NewLead {
            email: Some(email.clone()),
            data_quality_score: Some(3),
            ..NewLead::new("Smoke Test S.L.", "Testing")
        })
        .await?;

    let found = store.find_by_field(LeadField::Email, &email).await?;
    assert_eq!(found.map(|l| l.id), Some(saved.id));

    let updated = store
        .update(
            &saved,
            &LeadChanges {
                verified_email: Some(true),
                ..Default::default()
            },
        )
        .await?;
    assert!(updated.verified_email);

    assert!(store.delete(saved.id).await?);
    assert!(!store.delete(saved.id).await?);
    Ok(())
}
