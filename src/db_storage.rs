use crate::errors::{AppError, ResultExt};
use crate::lead_store::{ensure_text_field, LeadStore};
use crate::models::{Lead, LeadChanges, LeadField, LeadFilters, LeadQuery, NewLead};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

/// PostgreSQL-backed lead store over the `leads` table.
#[derive(Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escapes `%`, `_` and `\` so user input matches literally inside ILIKE.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Appends the WHERE clause for `filters`. Column names come from the closed
/// filter set only; every value is bound.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &LeadFilters) {
    builder.push(" WHERE TRUE");

    if let Some(min) = filters.min_quality_score {
        builder.push(" AND data_quality_score >= ").push_bind(min);
    }

    if let Some(term) = filters.search.as_deref().filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", escape_like(term));
        builder
            .push(" AND (company_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR activity ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(flag) = filters.verified_email {
        builder.push(" AND verified_email = ").push_bind(flag);
    }
    if let Some(flag) = filters.verified_phone {
        builder.push(" AND verified_phone = ").push_bind(flag);
    }
    if let Some(flag) = filters.verified_website {
        builder.push(" AND verified_website = ").push_bind(flag);
    }

    if !filters.categories.is_empty() {
        builder
            .push(" AND category = ANY(")
            .push_bind(filters.categories.clone())
            .push(")");
    }
    if !filters.states.is_empty() {
        builder
            .push(" AND state = ANY(")
            .push_bind(filters.states.clone())
            .push(")");
    }
    if !filters.countries.is_empty() {
        builder
            .push(" AND country = ANY(")
            .push_bind(filters.countries.clone())
            .push(")");
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn get(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("fetching lead {}", id))
    }

    async fn find_by_field(
        &self,
        field: LeadField,
        value: &str,
    ) -> Result<Option<Lead>, AppError> {
        ensure_text_field(field)?;
        let sql = format!(
            "SELECT * FROM leads WHERE {} = $1 ORDER BY created_at ASC, id ASC LIMIT 1",
            field.as_str()
        );
        sqlx::query_as::<_, Lead>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("finding lead by {}", field))
    }

    async fn find_many_by_field(
        &self,
        field: LeadField,
        value: &str,
    ) -> Result<Vec<Lead>, AppError> {
        ensure_text_field(field)?;
        let sql = format!(
            "SELECT * FROM leads WHERE {} = $1 ORDER BY created_at ASC, id ASC",
            field.as_str()
        );
        sqlx::query_as::<_, Lead>(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("finding leads by {}", field))
    }

    async fn list(&self, filters: &LeadFilters) -> Result<Vec<Lead>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM leads");
        push_filters(&mut builder, filters);
        builder.push(" ORDER BY created_at ASC, id ASC");

        builder
            .build_query_as::<Lead>()
            .fetch_all(&self.pool)
            .await
            .context("listing leads")
    }

    async fn query(&self, query: &LeadQuery) -> Result<Vec<Lead>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM leads");
        push_filters(&mut builder, &query.filters);

        // Absent values sort first ascending, last descending.
        let direction = if query.sort.descending {
            "DESC NULLS LAST"
        } else {
            "ASC NULLS FIRST"
        };
        builder
            .push(" ORDER BY ")
            .push(query.sort.sort_by.as_str())
            .push(" ")
            .push(direction)
            .push(", id ASC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        builder
            .build_query_as::<Lead>()
            .fetch_all(&self.pool)
            .await
            .context("querying leads")
    }

    async fn count(&self, filters: &LeadFilters) -> Result<i64, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM leads");
        push_filters(&mut builder, filters);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .context("counting leads")
    }

    async fn save(&self, lead: NewLead) -> Result<Lead, AppError> {
        lead.validate()?;
        let now = Utc::now();

        sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (
                id, email, verified_email, phone, verified_phone, company_name,
                company_website, verified_website, address, state, country,
                activity, description, category, data_quality_score,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&lead.email)
        .bind(lead.verified_email)
        .bind(&lead.phone)
        .bind(lead.verified_phone)
        .bind(&lead.company_name)
        .bind(&lead.company_website)
        .bind(lead.verified_website)
        .bind(&lead.address)
        .bind(&lead.state)
        .bind(&lead.country)
        .bind(&lead.activity)
        .bind(&lead.description)
        .bind(&lead.category)
        .bind(lead.data_quality_score.unwrap_or(1))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("inserting lead")
    }

    async fn update(&self, existing: &Lead, changes: &LeadChanges) -> Result<Lead, AppError> {
        changes.validate()?;
        let mut next = existing.clone();
        changes.apply(&mut next, Utc::now());

        sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET email = $2,
                verified_email = $3,
                phone = $4,
                verified_phone = $5,
                company_name = $6,
                company_website = $7,
                verified_website = $8,
                address = $9,
                state = $10,
                country = $11,
                activity = $12,
                description = $13,
                category = $14,
                data_quality_score = $15,
                updated_at = $16,
                last_contacted_at = $17
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(next.id)
        .bind(&next.email)
        .bind(next.verified_email)
        .bind(&next.phone)
        .bind(next.verified_phone)
        .bind(&next.company_name)
        .bind(&next.company_website)
        .bind(next.verified_website)
        .bind(&next.address)
        .bind(&next.state)
        .bind(&next.country)
        .bind(&next.activity)
        .bind(&next.description)
        .bind(&next.category)
        .bind(next.data_quality_score)
        .bind(next.updated_at)
        .bind(next.last_contacted_at)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("updating lead {}", existing.id))?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", existing.id)))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("deleting lead {}", id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM leads WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await
            .context("bulk deleting leads")?;

        Ok(result.rows_affected())
    }

    async fn update_many(&self, ids: &[Uuid], changes: &LeadChanges) -> Result<u64, AppError> {
        changes.validate()?;

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE leads SET updated_at = ");
        builder.push_bind(Utc::now());

        macro_rules! set_column {
            ($column:literal, $value:expr) => {
                if let Some(value) = $value.clone() {
                    builder.push(concat!(", ", $column, " = ")).push_bind(value);
                }
            };
        }

        set_column!("email", changes.email);
        set_column!("phone", changes.phone);
        set_column!("company_name", changes.company_name);
        set_column!("company_website", changes.company_website);
        set_column!("address", changes.address);
        set_column!("state", changes.state);
        set_column!("country", changes.country);
        set_column!("activity", changes.activity);
        set_column!("description", changes.description);
        set_column!("category", changes.category);
        set_column!("last_contacted_at", changes.last_contacted_at);
        set_column!("verified_email", changes.verified_email);
        set_column!("verified_phone", changes.verified_phone);
        set_column!("verified_website", changes.verified_website);
        set_column!("data_quality_score", changes.data_quality_score);

        builder
            .push(" WHERE id = ANY(")
            .push_bind(ids.to_vec())
            .push(")");

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .context("bulk updating leads")?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%_solar\\"), "100\\%\\_solar\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn filters_bind_every_value() {
        let filters = LeadFilters {
            search: Some("solar".to_string()),
            min_quality_score: Some(2),
            verified_email: Some(true),
            categories: vec!["Energía".to_string()],
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM leads");
        push_filters(&mut builder, &filters);
        let sql = builder.sql();

        assert!(sql.contains("data_quality_score >= $1"));
        assert!(sql.contains("company_name ILIKE $2"));
        assert!(sql.contains("verified_email = $5"));
        assert!(sql.contains("category = ANY($6)"));
        assert!(!sql.contains("solar"));
    }
}
