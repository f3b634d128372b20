use sqlx::{postgres::PgPoolOptions, PgPool};

/// Idempotent schema for the `leads` table.
const SCHEMA: &str = include_str!("../migrations/0001_leads.sql");

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        tracing::debug!("Lead schema ensured");

        Ok(Self { pool })
    }
}
