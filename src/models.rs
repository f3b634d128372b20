use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Database Models ============

/// A prospective business contact.
///
/// `company_name` and `activity` are never empty for a stored lead; imports
/// and manual creation reject rows that fail this.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub email: Option<String>,
    pub verified_email: bool,
    pub phone: Option<String>,
    pub verified_phone: bool,
    pub company_name: String,
    pub company_website: Option<String>,
    pub verified_website: bool,
    pub address: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub activity: String,
    pub description: Option<String>,
    pub category: Option<String>,
    /// 1 (lowest) upward.
    pub data_quality_score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_contacted_at: Option<DateTime<Utc>>,
}

/// Fields accepted when creating a lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewLead {
    pub company_name: String,
    pub activity: String,
    pub email: Option<String>,
    pub verified_email: bool,
    pub phone: Option<String>,
    pub verified_phone: bool,
    pub company_website: Option<String>,
    pub verified_website: bool,
    pub address: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub data_quality_score: Option<i32>,
}

impl NewLead {
    pub fn new(company_name: impl Into<String>, activity: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            activity: activity.into(),
            ..Default::default()
        }
    }

    /// Rejects leads without a company name or activity.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.company_name.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "company_name is required".to_string(),
            ));
        }
        if self.activity.trim().is_empty() {
            return Err(AppError::InvalidInput("activity is required".to_string()));
        }
        Ok(())
    }

    /// Materializes the stored record. Both timestamps are set to `now`.
    pub fn into_lead(self, id: Uuid, now: DateTime<Utc>) -> Lead {
        Lead {
            id,
            email: self.email,
            verified_email: self.verified_email,
            phone: self.phone,
            verified_phone: self.verified_phone,
            company_name: self.company_name,
            company_website: self.company_website,
            verified_website: self.verified_website,
            address: self.address,
            state: self.state,
            country: self.country,
            activity: self.activity,
            description: self.description,
            category: self.category,
            data_quality_score: self.data_quality_score.unwrap_or(1),
            created_at: now,
            updated_at: now,
            last_contacted_at: None,
        }
    }
}

/// Partial update of a lead. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LeadChanges {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub company_website: Option<String>,
    pub address: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub activity: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub verified_email: Option<bool>,
    pub verified_phone: Option<bool>,
    pub verified_website: Option<bool>,
    pub data_quality_score: Option<i32>,
}

impl LeadChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// A patch may not blank out the required fields or push the score below 1.
    pub fn validate(&self) -> Result<(), AppError> {
        if matches!(&self.company_name, Some(name) if name.trim().is_empty()) {
            return Err(AppError::InvalidInput(
                "company_name cannot be empty".to_string(),
            ));
        }
        if matches!(&self.activity, Some(activity) if activity.trim().is_empty()) {
            return Err(AppError::InvalidInput("activity cannot be empty".to_string()));
        }
        if matches!(self.data_quality_score, Some(score) if score < 1) {
            return Err(AppError::InvalidInput(
                "data_quality_score must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies the patch in place and bumps `updated_at`.
    pub fn apply(&self, lead: &mut Lead, now: DateTime<Utc>) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if let Some(v) = value {
                *target = Some(v.clone());
            }
        }

        set_opt(&mut lead.email, &self.email);
        set_opt(&mut lead.phone, &self.phone);
        set(&mut lead.company_name, &self.company_name);
        set_opt(&mut lead.company_website, &self.company_website);
        set_opt(&mut lead.address, &self.address);
        set_opt(&mut lead.state, &self.state);
        set_opt(&mut lead.country, &self.country);
        set(&mut lead.activity, &self.activity);
        set_opt(&mut lead.description, &self.description);
        set_opt(&mut lead.category, &self.category);
        set_opt(&mut lead.last_contacted_at, &self.last_contacted_at);
        set(&mut lead.verified_email, &self.verified_email);
        set(&mut lead.verified_phone, &self.verified_phone);
        set(&mut lead.verified_website, &self.verified_website);
        set(&mut lead.data_quality_score, &self.data_quality_score);
        lead.updated_at = now;
    }
}

/// Column names of the `leads` table.
///
/// Every dynamic field lookup (search fields, sort column, find-by-field) goes
/// through this enum so no caller-provided string ever reaches SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadField {
    Id,
    Email,
    VerifiedEmail,
    Phone,
    VerifiedPhone,
    CompanyName,
    CompanyWebsite,
    VerifiedWebsite,
    Address,
    State,
    Country,
    Activity,
    Description,
    Category,
    DataQualityScore,
    CreatedAt,
    UpdatedAt,
    LastContactedAt,
}

impl LeadField {
    pub const ALL: [LeadField; 18] = [
        LeadField::Id,
        LeadField::Email,
        LeadField::VerifiedEmail,
        LeadField::Phone,
        LeadField::VerifiedPhone,
        LeadField::CompanyName,
        LeadField::CompanyWebsite,
        LeadField::VerifiedWebsite,
        LeadField::Address,
        LeadField::State,
        LeadField::Country,
        LeadField::Activity,
        LeadField::Description,
        LeadField::Category,
        LeadField::DataQualityScore,
        LeadField::CreatedAt,
        LeadField::UpdatedAt,
        LeadField::LastContactedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadField::Id => "id",
            LeadField::Email => "email",
            LeadField::VerifiedEmail => "verified_email",
            LeadField::Phone => "phone",
            LeadField::VerifiedPhone => "verified_phone",
            LeadField::CompanyName => "company_name",
            LeadField::CompanyWebsite => "company_website",
            LeadField::VerifiedWebsite => "verified_website",
            LeadField::Address => "address",
            LeadField::State => "state",
            LeadField::Country => "country",
            LeadField::Activity => "activity",
            LeadField::Description => "description",
            LeadField::Category => "category",
            LeadField::DataQualityScore => "data_quality_score",
            LeadField::CreatedAt => "created_at",
            LeadField::UpdatedAt => "updated_at",
            LeadField::LastContactedAt => "last_contacted_at",
        }
    }

    /// Free-text columns, the only ones that can be searched or matched by value.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            LeadField::Email
                | LeadField::Phone
                | LeadField::CompanyName
                | LeadField::CompanyWebsite
                | LeadField::Address
                | LeadField::State
                | LeadField::Country
                | LeadField::Activity
                | LeadField::Description
                | LeadField::Category
        )
    }

    /// Text value of the column, `None` for absent values and non-text columns.
    pub fn text_value<'a>(&self, lead: &'a Lead) -> Option<&'a str> {
        match self {
            LeadField::Email => lead.email.as_deref(),
            LeadField::Phone => lead.phone.as_deref(),
            LeadField::CompanyName => Some(lead.company_name.as_str()),
            LeadField::CompanyWebsite => lead.company_website.as_deref(),
            LeadField::Address => lead.address.as_deref(),
            LeadField::State => lead.state.as_deref(),
            LeadField::Country => lead.country.as_deref(),
            LeadField::Activity => Some(lead.activity.as_str()),
            LeadField::Description => lead.description.as_deref(),
            LeadField::Category => lead.category.as_deref(),
            _ => None,
        }
    }

    /// Orders two leads by this column; absent values sort first.
    pub fn compare(&self, a: &Lead, b: &Lead) -> Ordering {
        match self {
            LeadField::Id => a.id.cmp(&b.id),
            LeadField::VerifiedEmail => a.verified_email.cmp(&b.verified_email),
            LeadField::VerifiedPhone => a.verified_phone.cmp(&b.verified_phone),
            LeadField::VerifiedWebsite => a.verified_website.cmp(&b.verified_website),
            LeadField::DataQualityScore => a.data_quality_score.cmp(&b.data_quality_score),
            LeadField::CreatedAt => a.created_at.cmp(&b.created_at),
            LeadField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            LeadField::LastContactedAt => a.last_contacted_at.cmp(&b.last_contacted_at),
            text => text.text_value(a).cmp(&text.text_value(b)),
        }
    }
}

impl fmt::Display for LeadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        LeadField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == wanted)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown lead field '{}'", wanted)))
    }
}

/// Parses a comma-separated list of field names, ignoring blanks.
pub fn parse_field_list(raw: &str) -> Result<Vec<LeadField>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(LeadField::from_str)
        .collect()
}

// ============ Query Models ============

/// Filters shared by listing, counting, export and analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeadFilters {
    /// Case-insensitive substring over company name, activity and description.
    pub search: Option<String>,
    pub min_quality_score: Option<i32>,
    pub verified_email: Option<bool>,
    pub verified_phone: Option<bool>,
    pub verified_website: Option<bool>,
    pub categories: Vec<String>,
    pub states: Vec<String>,
    pub countries: Vec<String>,
}

impl LeadFilters {
    pub fn matches(&self, lead: &Lead) -> bool {
        if let Some(min) = self.min_quality_score {
            if lead.data_quality_score < min {
                return false;
            }
        }
        if let Some(term) = self.search.as_deref().filter(|t| !t.is_empty()) {
            let needle = term.to_lowercase();
            let hit = [
                Some(lead.company_name.as_str()),
                Some(lead.activity.as_str()),
                lead.description.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|value| value.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        let flag_ok = |wanted: Option<bool>, actual: bool| wanted.map_or(true, |w| w == actual);
        if !flag_ok(self.verified_email, lead.verified_email)
            || !flag_ok(self.verified_phone, lead.verified_phone)
            || !flag_ok(self.verified_website, lead.verified_website)
        {
            return false;
        }
        let in_set = |set: &[String], value: &Option<String>| {
            set.is_empty() || value.as_ref().is_some_and(|v| set.contains(v))
        };
        in_set(&self.categories, &lead.category)
            && in_set(&self.states, &lead.state)
            && in_set(&self.countries, &lead.country)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSort {
    pub sort_by: LeadField,
    pub descending: bool,
}

impl Default for LeadSort {
    fn default() -> Self {
        Self {
            sort_by: LeadField::CreatedAt,
            descending: true,
        }
    }
}

impl LeadSort {
    /// Unknown columns fall back to newest first.
    pub fn parse(sort_by: Option<&str>, sort_order: Option<&str>) -> Self {
        let field = sort_by.and_then(|s| LeadField::from_str(s).ok());
        match field {
            Some(sort_by) => Self {
                sort_by,
                descending: !matches!(sort_order, Some(o) if o.eq_ignore_ascii_case("asc")),
            },
            None => Self::default(),
        }
    }

    pub fn compare(&self, a: &Lead, b: &Lead) -> Ordering {
        let ord = self.sort_by.compare(a, b);
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// A page of filtered, sorted leads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadQuery {
    pub filters: LeadFilters,
    pub sort: LeadSort,
    pub offset: i64,
    pub limit: i64,
}

// ============ API Request/Response Models ============

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 1 };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

/// Clamps user-supplied paging into `page >= 1`, `1 <= limit <= 100`.
pub fn normalize_paging(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

/// Rows to skip before `page`. Saturates, so an absurd page reads past the end
/// instead of overflowing.
pub fn page_offset(page: i64, limit: i64) -> i64 {
    (page - 1).saturating_mul(limit)
}

/// Query string of `GET /leads`. List values are comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct LeadListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub min_quality_score: Option<i32>,
    pub verified_email: Option<bool>,
    pub verified_phone: Option<bool>,
    pub verified_website: Option<bool>,
    pub categories: Option<String>,
    pub states: Option<String>,
    pub countries: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

pub fn split_csv_param(raw: &Option<String>) -> Vec<String> {
    raw.as_deref()
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl LeadListParams {
    pub fn filters(&self) -> LeadFilters {
        LeadFilters {
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            min_quality_score: Some(self.min_quality_score.unwrap_or(1)),
            verified_email: self.verified_email,
            verified_phone: self.verified_phone,
            verified_website: self.verified_website,
            categories: split_csv_param(&self.categories),
            states: split_csv_param(&self.states),
            countries: split_csv_param(&self.countries),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeadListSummary {
    pub total_leads: i64,
    pub high_quality_leads: i64,
    pub contactable_leads: i64,
}

#[derive(Debug, Serialize)]
pub struct LeadListResponse {
    pub leads: Vec<Lead>,
    pub pagination: Pagination,
    pub filters_applied: LeadFilters,
    pub summary: LeadListSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedLead {
    pub id: Uuid,
    pub company_name: String,
}

#[derive(Debug, Serialize)]
pub struct LeadDetail {
    #[serde(flatten)]
    pub lead: Lead,
    pub related_leads: Vec<RelatedLead>,
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub lead_ids: Vec<Uuid>,
    pub updates: LeadChanges,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub lead_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BulkOperationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_count: Option<u64>,
    pub message: String,
}

fn default_validation_types() -> Vec<String> {
    vec!["email".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_strategy() -> String {
    "email".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ValidateLeadsRequest {
    pub lead_ids: Vec<Uuid>,
    #[serde(default = "default_validation_types")]
    pub validation_types: Vec<String>,
    #[serde(default = "default_true")]
    pub update_records: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeduplicateLeadsRequest {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub auto_merge: bool,
    #[serde(default = "default_true")]
    pub keep_highest_quality: bool,
}

/// Query string of `GET /search`. `fields` is comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(alias = "query")]
    pub q: String,
    pub fields: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatisticsParams {
    pub period: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QualityAnalysisParams {
    pub category: Option<String>,
    pub state: Option<String>,
}

impl QualityAnalysisParams {
    pub fn filters(&self) -> LeadFilters {
        let one = |v: &Option<String>| -> Vec<String> {
            v.iter().filter(|s| !s.is_empty()).cloned().collect()
        };
        LeadFilters {
            categories: one(&self.category),
            states: one(&self.state),
            ..Default::default()
        }
    }
}

/// Query string of `GET /export`: output options plus the list filters.
#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
    pub fields: Option<String>,
    pub search: Option<String>,
    pub min_quality_score: Option<i32>,
    pub verified_email: Option<bool>,
    pub verified_phone: Option<bool>,
    pub verified_website: Option<bool>,
    pub categories: Option<String>,
    pub states: Option<String>,
    pub countries: Option<String>,
}

impl ExportParams {
    pub fn filters(&self) -> LeadFilters {
        LeadFilters {
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            min_quality_score: Some(self.min_quality_score.unwrap_or(1)),
            verified_email: self.verified_email,
            verified_phone: self.verified_phone,
            verified_website: self.verified_website,
            categories: split_csv_param(&self.categories),
            states: split_csv_param(&self.states),
            countries: split_csv_param(&self.countries),
        }
    }
}

/// Query string of `POST /import`; the CSV itself is the request body.
#[derive(Debug, Deserialize)]
pub struct ImportParams {
    /// JSON object of lead field -> CSV column.
    pub mapping: String,
    pub skip_duplicates: Option<bool>,
    pub validate_emails: Option<bool>,
    pub validate_phones: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Lead {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        NewLead {
            email: Some("contacto@solar.es".to_string()),
            category: Some("Energía Renovable".to_string()),
            state: Some("Madrid".to_string()),
            ..NewLead::new("Empresa Solar SA", "Instalación fotovoltaica")
        }
        .into_lead(Uuid::new_v4(), t)
    }

    #[test]
    fn new_lead_requires_company_and_activity() {
        assert!(NewLead::new("Acme", "Retail").validate().is_ok());
        assert!(NewLead::new("", "Retail").validate().is_err());
        assert!(NewLead::new("Acme", "   ").validate().is_err());
    }

    #[test]
    fn new_lead_defaults_quality_to_one() {
        let lead = sample();
        assert_eq!(lead.data_quality_score, 1);
        assert_eq!(lead.created_at, lead.updated_at);
        assert!(!lead.verified_email);
    }

    #[test]
    fn applying_changes_bumps_updated_at() {
        let mut lead = sample();
        let later = lead.created_at + chrono::Duration::hours(1);
        let changes = LeadChanges {
            category: Some("Solar".to_string()),
            verified_email: Some(true),
            ..Default::default()
        };
        changes.apply(&mut lead, later);

        assert_eq!(lead.category.as_deref(), Some("Solar"));
        assert!(lead.verified_email);
        assert_eq!(lead.updated_at, later);
        assert_eq!(lead.company_name, "Empresa Solar SA");
    }

    #[test]
    fn changes_cannot_blank_required_fields() {
        let changes = LeadChanges {
            company_name: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(changes.validate().is_err());
        assert!(LeadChanges::default().is_empty());
    }

    #[test]
    fn field_names_round_trip_through_from_str() {
        for field in LeadField::ALL {
            assert_eq!(field.as_str().parse::<LeadField>().unwrap(), field);
        }
        assert!("password".parse::<LeadField>().is_err());
    }

    #[test]
    fn filters_match_on_all_criteria() {
        let lead = sample();
        let filters = LeadFilters {
            search: Some("SOLAR".to_string()),
            min_quality_score: Some(1),
            categories: vec!["Energía Renovable".to_string()],
            ..Default::default()
        };
        assert!(filters.matches(&lead));

        let wrong_state = LeadFilters {
            states: vec!["Valencia".to_string()],
            ..Default::default()
        };
        assert!(!wrong_state.matches(&lead));

        let needs_verified = LeadFilters {
            verified_email: Some(true),
            ..Default::default()
        };
        assert!(!needs_verified.matches(&lead));
    }

    #[test]
    fn unknown_sort_column_falls_back_to_newest_first() {
        assert_eq!(LeadSort::parse(Some("hacker"), Some("asc")), LeadSort::default());
        let sort = LeadSort::parse(Some("company_name"), Some("ASC"));
        assert_eq!(sort.sort_by, LeadField::CompanyName);
        assert!(!sort.descending);
    }

    #[test]
    fn paging_is_clamped() {
        assert_eq!(normalize_paging(None, None), (1, 25));
        assert_eq!(normalize_paging(Some(0), Some(500)), (1, 100));
        assert_eq!(Pagination::new(2, 25, 51).total_pages, 3);
    }

    #[test]
    fn huge_page_offset_saturates() {
        let (page, limit) = normalize_paging(Some(i64::MAX), Some(100));
        assert_eq!(page_offset(page, limit), i64::MAX);
        assert_eq!(page_offset(1, 25), 0);
        assert_eq!(page_offset(3, 25), 50);
    }
}
