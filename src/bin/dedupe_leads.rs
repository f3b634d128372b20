//! Script to find (and optionally remove) duplicate leads in the database.
//!
//! Usage: `dedupe_leads [email|company_name|phone] [--apply]`
//!
//! Without `--apply` it only reports the groups it would merge.

use anyhow::Context;
use ritter_leads_api::dedup::{find_duplicates, resolve_duplicates, DedupOptions, DedupStrategy};
use ritter_leads_api::db::Database;
use ritter_leads_api::db_storage::PgLeadStore;
use ritter_leads_api::lead_store::LeadStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let mut strategy = DedupStrategy::Email;
    let mut apply = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--apply" => apply = true,
            other => strategy = other.parse()?,
        }
    }

    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("DB_URL"))
        .context("DATABASE_URL must be set")?;
    let db = Database::new(&database_url).await?;
    let store = PgLeadStore::new(db.pool.clone());

    tracing::info!("Connected to database. Looking for duplicates by {}...", strategy);

    let leads = store.list_all().await?;
    let groups: Vec<_> = find_duplicates(strategy, &leads).collect();

    for group in &groups {
        tracing::info!("{} '{}': {} leads", strategy, group.match_value, group.len());
    }

    let options = DedupOptions {
        auto_merge: apply,
        keep_highest_quality: true,
    };
    let outcome = resolve_duplicates(&store, &groups, options).await?;

    if apply {
        tracing::info!(
            "Deduplication complete. {} groups merged, {} leads removed.",
            outcome.leads_merged,
            outcome.leads_removed
        );
    } else {
        tracing::info!(
            "Dry run: {} duplicate groups found. Re-run with --apply to merge them.",
            outcome.duplicates_found
        );
    }

    Ok(())
}
