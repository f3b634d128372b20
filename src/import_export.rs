//! CSV import and JSON/CSV export of leads.

use crate::errors::AppError;
use crate::lead_store::LeadStore;
use crate::models::{Lead, LeadField, NewLead};
use crate::validation::{is_valid_email, is_valid_phone};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Lead field -> CSV column header.
pub type ColumnMapping = BTreeMap<LeadField, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub skip_duplicates: bool,
    pub validate_emails: bool,
    pub validate_phones: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            validate_emails: true,
            validate_phones: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub id: Uuid,
    pub status: JobStatus,
    pub total_rows: u64,
    pub processed_rows: u64,
    pub imported_leads: u64,
    pub skipped_duplicates: u64,
    pub validation_errors: u64,
    pub error_details: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Checks that every mapped field can be imported.
fn check_mapping(mapping: &ColumnMapping) -> Result<(), AppError> {
    if mapping.is_empty() {
        return Err(AppError::InvalidInput(
            "Column mapping cannot be empty".to_string(),
        ));
    }
    if let Some(field) = mapping.keys().find(|f| !f.is_text()) {
        return Err(AppError::InvalidInput(format!(
            "Field '{}' cannot be imported",
            field
        )));
    }
    Ok(())
}

fn assign(lead: &mut NewLead, field: LeadField, value: String) {
    match field {
        LeadField::CompanyName => lead.company_name = value,
        LeadField::Activity => lead.activity = value,
        LeadField::Email => lead.email = Some(value),
        LeadField::Phone => lead.phone = Some(value),
        LeadField::CompanyWebsite => lead.company_website = Some(value),
        LeadField::Address => lead.address = Some(value),
        LeadField::State => lead.state = Some(value),
        LeadField::Country => lead.country = Some(value),
        LeadField::Description => lead.description = Some(value),
        LeadField::Category => lead.category = Some(value),
        _ => {}
    }
}

/// Imports CSV rows as leads, one row at a time.
///
/// Structural problems (unreadable header, unmapped column) fail the whole
/// call. Everything else is per row: rows without `company_name` or
/// `activity`, malformed rows, failed duplicate lookups and failed saves are
/// counted as validation errors and the loop moves on.
pub async fn import_csv(
    store: &dyn LeadStore,
    data: &[u8],
    mapping: &ColumnMapping,
    options: ImportOptions,
) -> Result<ImportReport, AppError> {
    check_mapping(mapping)?;
    let started_at = Utc::now();

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);
    let headers = reader.headers()?.clone();

    let mut columns = Vec::with_capacity(mapping.len());
    let mut missing = Vec::new();
    for (field, column) in mapping {
        match headers.iter().position(|h| h == column) {
            Some(idx) => columns.push((*field, idx)),
            None => missing.push(column.as_str()),
        }
    }
    if !missing.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "Missing columns in file: {}",
            missing.join(", ")
        )));
    }

    let mut report = ImportReport {
        id: Uuid::new_v4(),
        status: JobStatus::Completed,
        total_rows: 0,
        processed_rows: 0,
        imported_leads: 0,
        skipped_duplicates: 0,
        validation_errors: 0,
        error_details: Vec::new(),
        started_at,
        completed_at: started_at,
    };

    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        report.total_rows += 1;
        report.processed_rows += 1;

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                report.validation_errors += 1;
                report.error_details.push(format!("row {}: {}", row, e));
                continue;
            }
        };

        let mut lead = NewLead::default();
        for (field, idx) in &columns {
            if let Some(value) = record.get(*idx).filter(|v| !v.is_empty()) {
                assign(&mut lead, *field, value.to_string());
            }
        }

        if let Err(e) = lead.validate() {
            tracing::debug!("Import row {} rejected: {}", row, e);
            report.validation_errors += 1;
            report.error_details.push(format!("row {}: {}", row, e));
            continue;
        }

        if options.skip_duplicates {
            if let Some(email) = lead.email.as_deref() {
                match store.find_by_field(LeadField::Email, email).await {
                    Ok(Some(_)) => {
                        report.skipped_duplicates += 1;
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!("Import row {} duplicate check failed: {}", row, e);
                        report.validation_errors += 1;
                        report.error_details.push(format!("row {}: {}", row, e));
                        continue;
                    }
                }
            }
        }

        if options.validate_emails {
            lead.verified_email = lead.email.as_deref().is_some_and(is_valid_email);
        }
        if options.validate_phones {
            lead.verified_phone = lead.phone.as_deref().is_some_and(is_valid_phone);
        }

        match store.save(lead).await {
            Ok(_) => report.imported_leads += 1,
            Err(e) => {
                tracing::warn!("Import row {} could not be saved: {}", row, e);
                report.validation_errors += 1;
                report.error_details.push(format!("row {}: {}", row, e));
            }
        }
    }

    report.completed_at = Utc::now();
    tracing::info!(
        "Import {} finished: {} rows, {} imported, {} duplicates skipped, {} errors",
        report.id,
        report.processed_rows,
        report.imported_leads,
        report.skipped_duplicates,
        report.validation_errors
    );

    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Anything other than `csv` exports as JSON.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Json,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: String,
    pub format: ExportFormat,
    pub fields: Vec<LeadField>,
    pub total_records: usize,
    pub content: Vec<u8>,
}

/// Renders `leads` restricted to `fields` (all columns when empty).
pub fn export(
    leads: &[Lead],
    format: ExportFormat,
    fields: &[LeadField],
) -> Result<ExportFile, AppError> {
    if leads.is_empty() {
        return Err(AppError::NotFound(
            "No leads found with specified filters".to_string(),
        ));
    }
    let fields = if fields.is_empty() {
        LeadField::ALL.to_vec()
    } else {
        fields.to_vec()
    };

    let rows = leads
        .iter()
        .map(|lead| project(lead, &fields))
        .collect::<Result<Vec<_>, AppError>>()?;

    let content = match format {
        ExportFormat::Json => serde_json::to_vec_pretty(&rows)
            .map_err(|e| AppError::Internal(format!("Failed to encode export: {}", e)))?,
        ExportFormat::Csv => write_csv(&rows, &fields)?,
    };

    Ok(ExportFile {
        file_name: format!(
            "leads_export_{}.{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            format.extension()
        ),
        format,
        fields,
        total_records: rows.len(),
        content,
    })
}

fn project(
    lead: &Lead,
    fields: &[LeadField],
) -> Result<serde_json::Map<String, serde_json::Value>, AppError> {
    let serde_json::Value::Object(mut all) = serde_json::to_value(lead)
        .map_err(|e| AppError::Internal(format!("Failed to encode lead: {}", e)))?
    else {
        return Err(AppError::Internal("Lead did not encode as an object".to_string()));
    };

    Ok(fields
        .iter()
        .map(|f| {
            let value = all.remove(f.as_str()).unwrap_or(serde_json::Value::Null);
            (f.as_str().to_string(), value)
        })
        .collect())
}

fn write_csv(
    rows: &[serde_json::Map<String, serde_json::Value>],
    fields: &[LeadField],
) -> Result<Vec<u8>, AppError> {
    let write_failed = |e: csv::Error| AppError::Internal(format!("Failed to write CSV export: {}", e));
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(fields.iter().map(|f| f.as_str()))
        .map_err(write_failed)?;

    for row in rows {
        writer
            .write_record(fields.iter().map(|f| match row.get(f.as_str()) {
                None | Some(serde_json::Value::Null) => String::new(),
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            }))
            .map_err(write_failed)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV export: {}", e)))
}
