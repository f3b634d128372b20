use crate::dedup::{
    find_duplicates, resolve_duplicates, DedupOptions, DedupOutcome, DedupStrategy,
};
use crate::errors::AppError;
use crate::import_export::{
    export, import_csv, ColumnMapping, ExportFile, ExportFormat, ImportOptions, ImportReport,
    JobStatus,
};
use crate::lead_store::LeadStore;
use crate::models::*;
use crate::quality::{
    self, DailyTrend, FilterOptions, LeadStatistics, QualityAnalysis, StatsPeriod, TopValue,
};
use crate::search::{rank, SearchHit};
use crate::validation::{verify_lead, FieldKind, ValidationCounts};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Leads surfaced next to a lead's detail view.
const RELATED_LEADS_LIMIT: usize = 5;
const HIGH_QUALITY_SCORE: i32 = 4;
const TOP_VALUES_LIMIT: usize = 10;

#[derive(Debug, Serialize)]
pub struct DailyLeads {
    pub daily_leads: Vec<DailyTrend>,
}

#[derive(Debug, Serialize)]
pub struct StatisticsReport {
    pub statistics: LeadStatistics,
    pub top_categories: Vec<TopValue>,
    pub top_states: Vec<TopValue>,
    pub trends: DailyLeads,
}

#[derive(Debug, Serialize)]
pub struct SearchInfo {
    pub query: String,
    pub execution_time_ms: u64,
    pub total_matches: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub search_results: Vec<SearchHit>,
    pub pagination: Pagination,
    pub search_info: SearchInfo,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
    pub oldest_lead: Option<NaiveDate>,
    pub newest_lead: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct FilterOptionsSummary {
    pub total_leads: usize,
    pub total_categories: usize,
    pub total_states: usize,
    pub total_countries: usize,
    pub date_range: DateRange,
}

#[derive(Debug, Serialize)]
pub struct FilterOptionsResponse {
    pub filter_options: FilterOptions,
    pub summary: FilterOptionsSummary,
}

#[derive(Debug, Serialize)]
pub struct ValidationJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: f64,
    pub total_leads: usize,
    pub processed_leads: usize,
    pub validation_types: Vec<FieldKind>,
    pub results: ValidationCounts,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DeduplicationJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub strategy: DedupStrategy,
    #[serde(flatten)]
    pub outcome: DedupOutcome,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Lead operations behind the HTTP layer.
///
/// Holds no state of its own; every call reads from and writes back to the
/// injected [`LeadStore`].
#[derive(Clone)]
pub struct LeadService {
    store: Arc<dyn LeadStore>,
}

impl LeadService {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    /// Filtered, sorted page of leads plus store-wide summary counts.
    pub async fn get_leads(&self, params: &LeadListParams) -> Result<LeadListResponse, AppError> {
        let (page, limit) = normalize_paging(params.page, params.limit);
        let filters = params.filters();
        let query = LeadQuery {
            filters: filters.clone(),
            sort: LeadSort::parse(params.sort_by.as_deref(), params.sort_order.as_deref()),
            offset: page_offset(page, limit),
            limit,
        };

        let leads = self.store.query(&query).await?;
        let total = self.store.count(&filters).await?;

        let high_quality_leads = self
            .store
            .count(&LeadFilters {
                min_quality_score: Some(HIGH_QUALITY_SCORE),
                ..Default::default()
            })
            .await?;
        let contactable_leads = self.count_contactable().await?;

        Ok(LeadListResponse {
            leads,
            pagination: Pagination::new(page, limit, total),
            filters_applied: filters,
            summary: LeadListSummary {
                total_leads: total,
                high_quality_leads,
                contactable_leads,
            },
        })
    }

    /// Leads with a verified email or a verified phone.
    async fn count_contactable(&self) -> Result<i64, AppError> {
        let flags = |email: Option<bool>, phone: Option<bool>| LeadFilters {
            verified_email: email,
            verified_phone: phone,
            ..Default::default()
        };
        let email = self.store.count(&flags(Some(true), None)).await?;
        let phone = self.store.count(&flags(None, Some(true))).await?;
        let both = self.store.count(&flags(Some(true), Some(true))).await?;
        Ok(email + phone - both)
    }

    pub async fn get_lead(&self, id: Uuid) -> Result<LeadDetail, AppError> {
        let lead = self.require(id).await?;

        let related_leads = match lead.category.as_deref() {
            Some(category) => self
                .store
                .find_many_by_field(LeadField::Category, category)
                .await?
                .into_iter()
                .filter(|other| other.id != lead.id)
                .take(RELATED_LEADS_LIMIT)
                .map(|other| RelatedLead {
                    id: other.id,
                    company_name: other.company_name,
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(LeadDetail {
            lead,
            related_leads,
        })
    }

    async fn require(&self, id: Uuid) -> Result<Lead, AppError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
    }

    /// An empty patch returns the lead unchanged.
    pub async fn update_lead(&self, id: Uuid, changes: &LeadChanges) -> Result<Lead, AppError> {
        let lead = self.require(id).await?;
        if changes.is_empty() {
            return Ok(lead);
        }
        self.store.update(&lead, changes).await
    }

    pub async fn delete_lead(&self, id: Uuid) -> Result<(), AppError> {
        if self.store.delete(id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Lead {} not found", id)))
        }
    }

    pub async fn bulk_update(
        &self,
        request: &BulkUpdateRequest,
    ) -> Result<BulkOperationResponse, AppError> {
        if request.lead_ids.is_empty() {
            return Err(AppError::InvalidInput("No lead IDs provided".to_string()));
        }
        let updated = self
            .store
            .update_many(&request.lead_ids, &request.updates)
            .await?;

        tracing::info!("Bulk updated {} of {} leads", updated, request.lead_ids.len());
        Ok(BulkOperationResponse {
            updated_count: Some(updated),
            deleted_count: None,
            message: format!("Successfully updated {} leads", updated),
        })
    }

    pub async fn bulk_delete(
        &self,
        request: &BulkDeleteRequest,
    ) -> Result<BulkOperationResponse, AppError> {
        if request.lead_ids.is_empty() {
            return Err(AppError::InvalidInput("No lead IDs provided".to_string()));
        }
        let deleted = self.store.delete_many(&request.lead_ids).await?;

        tracing::info!("Bulk deleted {} of {} leads", deleted, request.lead_ids.len());
        Ok(BulkOperationResponse {
            updated_count: None,
            deleted_count: Some(deleted),
            message: format!("Successfully deleted {} leads", deleted),
        })
    }

    pub async fn statistics(&self, period: Option<&str>) -> Result<StatisticsReport, AppError> {
        let period: StatsPeriod = period.and_then(|p| p.parse().ok()).unwrap_or_default();
        let leads = self.store.list_all().await?;
        let now = Utc::now();

        Ok(StatisticsReport {
            statistics: quality::lead_statistics(&leads, period, now),
            top_categories: quality::top_values(&leads, LeadField::Category, TOP_VALUES_LIMIT),
            top_states: quality::top_values(&leads, LeadField::State, TOP_VALUES_LIMIT),
            trends: DailyLeads {
                daily_leads: quality::daily_trends(&leads, now, quality::TREND_DAYS),
            },
        })
    }

    pub async fn quality_analysis(
        &self,
        params: &QualityAnalysisParams,
    ) -> Result<QualityAnalysis, AppError> {
        let leads = self.store.list(&params.filters()).await?;
        Ok(quality::analyze(&leads))
    }

    /// Ranks every stored lead against the query, then pages the ranking.
    pub async fn search_leads(&self, params: &SearchParams) -> Result<SearchResponse, AppError> {
        let fields = parse_field_list(params.fields.as_deref().unwrap_or_default())?;
        let (page, limit) = normalize_paging(params.page, params.limit);

        let started = Instant::now();
        let leads = self.store.list_all().await?;
        let hits = rank(&params.q, &fields, &leads)?;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        let total_matches = hits.len();
        let offset = usize::try_from(page_offset(page, limit)).unwrap_or(usize::MAX);
        let search_results = hits
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();

        tracing::info!(
            "Search '{}' matched {} leads in {}ms",
            params.q,
            total_matches,
            execution_time_ms
        );

        Ok(SearchResponse {
            search_results,
            pagination: Pagination::new(page, limit, total_matches as i64),
            search_info: SearchInfo {
                query: params.q.clone(),
                execution_time_ms,
                total_matches,
            },
        })
    }

    pub async fn filter_options(&self) -> Result<FilterOptionsResponse, AppError> {
        let leads = self.store.list_all().await?;
        let filter_options = quality::filter_options(&leads);

        let summary = FilterOptionsSummary {
            total_leads: leads.len(),
            total_categories: filter_options.categories.len(),
            total_states: filter_options.states.len(),
            total_countries: filter_options.countries.len(),
            date_range: DateRange {
                oldest_lead: leads.iter().map(|l| l.created_at).min().map(|t| t.date_naive()),
                newest_lead: leads.iter().map(|l| l.created_at).max().map(|t| t.date_naive()),
            },
        };

        Ok(FilterOptionsResponse {
            filter_options,
            summary,
        })
    }

    pub async fn export_leads(&self, params: &ExportParams) -> Result<ExportFile, AppError> {
        let format = ExportFormat::parse(params.format.as_deref());
        let fields = parse_field_list(params.fields.as_deref().unwrap_or_default())?;
        let leads = self.store.list(&params.filters()).await?;

        let file = export(&leads, format, &fields)?;
        tracing::info!("Exported {} leads as {}", file.total_records, file.file_name);
        Ok(file)
    }

    pub async fn import_leads(
        &self,
        params: &ImportParams,
        body: &[u8],
    ) -> Result<ImportReport, AppError> {
        let mapping: ColumnMapping = serde_json::from_str(&params.mapping)
            .map_err(|e| AppError::InvalidInput(format!("Invalid mapping JSON format: {}", e)))?;

        let defaults = ImportOptions::default();
        let options = ImportOptions {
            skip_duplicates: params.skip_duplicates.unwrap_or(defaults.skip_duplicates),
            validate_emails: params.validate_emails.unwrap_or(defaults.validate_emails),
            validate_phones: params.validate_phones.unwrap_or(defaults.validate_phones),
        };

        import_csv(self.store.as_ref(), body, &mapping, options).await
    }

    /// Runs the requested validators over each lead, optionally persisting the
    /// verified flags. Ids that no longer exist are skipped.
    pub async fn validate_leads(
        &self,
        request: &ValidateLeadsRequest,
    ) -> Result<ValidationJob, AppError> {
        if request.lead_ids.is_empty() {
            return Err(AppError::InvalidInput("No lead IDs provided".to_string()));
        }
        let kinds = request
            .validation_types
            .iter()
            .map(|t| t.parse::<FieldKind>())
            .collect::<Result<Vec<_>, _>>()?;

        let started_at = Utc::now();
        let mut processed_leads = 0;
        let mut results = ValidationCounts::default();

        for id in &request.lead_ids {
            let Some(lead) = self.store.get(*id).await? else {
                tracing::debug!("Lead {} not found, skipping validation", id);
                continue;
            };
            processed_leads += 1;

            let (verdicts, changes) = verify_lead(&lead, &kinds);
            verdicts.iter().for_each(|v| results.record(v));

            if request.update_records && !changes.is_empty() {
                self.store.update(&lead, &changes).await?;
            }
        }

        let job = ValidationJob {
            id: Uuid::new_v4(),
            status: JobStatus::Completed,
            progress: 100.0,
            total_leads: request.lead_ids.len(),
            processed_leads,
            validation_types: kinds,
            results,
            started_at,
            completed_at: Utc::now(),
        };
        tracing::info!(
            "Validation {} processed {} of {} leads",
            job.id,
            job.processed_leads,
            job.total_leads
        );
        Ok(job)
    }

    pub async fn deduplicate_leads(
        &self,
        request: &DeduplicateLeadsRequest,
    ) -> Result<DeduplicationJob, AppError> {
        let strategy = DedupStrategy::from_str(&request.strategy)?;
        let options = DedupOptions {
            auto_merge: request.auto_merge,
            keep_highest_quality: request.keep_highest_quality,
        };

        let started_at = Utc::now();
        let leads = self.store.list_all().await?;
        let groups: Vec<_> = find_duplicates(strategy, &leads).collect();
        let outcome = resolve_duplicates(self.store.as_ref(), &groups, options).await?;

        let job = DeduplicationJob {
            id: Uuid::new_v4(),
            status: JobStatus::Completed,
            strategy,
            outcome,
            started_at,
            completed_at: Utc::now(),
        };
        tracing::info!(
            "Deduplication {} by {}: {} groups, {} merged, {} removed",
            job.id,
            strategy,
            job.outcome.duplicates_found,
            job.outcome.leads_merged,
            job.outcome.leads_removed
        );
        Ok(job)
    }
}
