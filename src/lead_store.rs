//! Persistence seam for leads.
//!
//! The pipeline never talks to SQL directly; it borrows records through
//! [`LeadStore`] and hands mutated copies back. `PgLeadStore` (in
//! `db_storage`) is the production implementation, [`InMemoryLeadStore`] backs
//! tests and local demos.

use crate::errors::AppError;
use crate::models::{Lead, LeadChanges, LeadField, LeadFilters, LeadQuery, NewLead};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Lead>, AppError>;

    /// First lead whose text column `field` equals `value` exactly.
    async fn find_by_field(&self, field: LeadField, value: &str)
        -> Result<Option<Lead>, AppError>;

    async fn find_many_by_field(&self, field: LeadField, value: &str)
        -> Result<Vec<Lead>, AppError>;

    /// Every lead matching `filters`, in retrieval order.
    async fn list(&self, filters: &LeadFilters) -> Result<Vec<Lead>, AppError>;

    /// One sorted page of leads matching `query.filters`.
    async fn query(&self, query: &LeadQuery) -> Result<Vec<Lead>, AppError>;

    async fn count(&self, filters: &LeadFilters) -> Result<i64, AppError>;

    async fn save(&self, lead: NewLead) -> Result<Lead, AppError>;

    async fn update(&self, existing: &Lead, changes: &LeadChanges) -> Result<Lead, AppError>;

    /// Idempotent: `Ok(false)` when nothing was there to delete.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, AppError>;

    async fn update_many(&self, ids: &[Uuid], changes: &LeadChanges) -> Result<u64, AppError>;

    async fn list_all(&self) -> Result<Vec<Lead>, AppError> {
        self.list(&LeadFilters::default()).await
    }
}

/// Rejects lookups on columns that cannot hold the given text.
pub(crate) fn ensure_text_field(field: LeadField) -> Result<(), AppError> {
    if field.is_text() {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Field '{}' cannot be matched by text value",
            field
        )))
    }
}

/// Lead store kept in process memory. Insertion order is retrieval order.
#[derive(Debug, Default)]
pub struct InMemoryLeadStore {
    leads: RwLock<Vec<Lead>>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with fully formed records, timestamps included.
    pub fn with_leads(leads: Vec<Lead>) -> Self {
        Self {
            leads: RwLock::new(leads),
        }
    }

    pub async fn len(&self) -> usize {
        self.leads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.leads.read().await.is_empty()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn get(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let leads = self.leads.read().await;
        Ok(leads.iter().find(|l| l.id == id).cloned())
    }

    async fn find_by_field(
        &self,
        field: LeadField,
        value: &str,
    ) -> Result<Option<Lead>, AppError> {
        ensure_text_field(field)?;
        let leads = self.leads.read().await;
        Ok(leads
            .iter()
            .find(|l| field.text_value(l) == Some(value))
            .cloned())
    }

    async fn find_many_by_field(
        &self,
        field: LeadField,
        value: &str,
    ) -> Result<Vec<Lead>, AppError> {
        ensure_text_field(field)?;
        let leads = self.leads.read().await;
        Ok(leads
            .iter()
            .filter(|l| field.text_value(l) == Some(value))
            .cloned()
            .collect())
    }

    async fn list(&self, filters: &LeadFilters) -> Result<Vec<Lead>, AppError> {
        let leads = self.leads.read().await;
        Ok(leads.iter().filter(|l| filters.matches(l)).cloned().collect())
    }

    async fn query(&self, query: &LeadQuery) -> Result<Vec<Lead>, AppError> {
        let mut matching = self.list(&query.filters).await?;
        matching.sort_by(|a, b| query.sort.compare(a, b));
        let offset = usize::try_from(query.offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit.max(0)).unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, filters: &LeadFilters) -> Result<i64, AppError> {
        let leads = self.leads.read().await;
        Ok(leads.iter().filter(|l| filters.matches(l)).count() as i64)
    }

    async fn save(&self, lead: NewLead) -> Result<Lead, AppError> {
        lead.validate()?;
        let stored = lead.into_lead(Uuid::new_v4(), Utc::now());
        self.leads.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, existing: &Lead, changes: &LeadChanges) -> Result<Lead, AppError> {
        changes.validate()?;
        let mut leads = self.leads.write().await;
        let slot = leads
            .iter_mut()
            .find(|l| l.id == existing.id)
            .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", existing.id)))?;
        changes.apply(slot, Utc::now());
        Ok(slot.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut leads = self.leads.write().await;
        let before = leads.len();
        leads.retain(|l| l.id != id);
        Ok(leads.len() != before)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let mut leads = self.leads.write().await;
        let before = leads.len();
        leads.retain(|l| !ids.contains(&l.id));
        Ok((before - leads.len()) as u64)
    }

    async fn update_many(&self, ids: &[Uuid], changes: &LeadChanges) -> Result<u64, AppError> {
        changes.validate()?;
        let now = Utc::now();
        let mut leads = self.leads.write().await;
        let mut updated = 0;
        for lead in leads.iter_mut().filter(|l| ids.contains(&l.id)) {
            changes.apply(lead, now);
            updated += 1;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryLeadStore::new();
        let lead = store.save(NewLead::new("Acme", "Retail")).await.unwrap();

        assert!(store.delete(lead.id).await.unwrap());
        assert!(!store.delete(lead.id).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn save_rejects_missing_required_fields() {
        let store = InMemoryLeadStore::new();
        let err = store.save(NewLead::new("", "Retail")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn find_by_field_is_exact_and_text_only() {
        let store = InMemoryLeadStore::new();
        store
            .save(NewLead {
                email: Some("hola@acme.es".to_string()),
                ..NewLead::new("Acme", "Retail")
            })
            .await
            .unwrap();

        let hit = store.find_by_field(LeadField::Email, "hola@acme.es").await.unwrap();
        assert!(hit.is_some());
        let miss = store.find_by_field(LeadField::Email, "HOLA@acme.es").await.unwrap();
        assert!(miss.is_none());
        assert!(store
            .find_by_field(LeadField::DataQualityScore, "1")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn bulk_operations_report_affected_rows() {
        let store = InMemoryLeadStore::new();
        let a = store.save(NewLead::new("A", "x")).await.unwrap();
        let b = store.save(NewLead::new("B", "y")).await.unwrap();
        let ghost = Uuid::new_v4();

        let changes = LeadChanges {
            category: Some("Solar".to_string()),
            ..Default::default()
        };
        let updated = store.update_many(&[a.id, ghost], &changes).await.unwrap();
        assert_eq!(updated, 1);

        let deleted = store.delete_many(&[a.id, b.id, ghost]).await.unwrap();
        assert_eq!(deleted, 2);
    }
}
