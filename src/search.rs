//! Substring relevance ranking.
//!
//! A lead's score is the fraction of searched fields that contain the query as
//! a contiguous, case-insensitive substring. Multi-word queries are not split.

use crate::errors::AppError;
use crate::models::{Lead, LeadField};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const DEFAULT_SEARCH_FIELDS: [LeadField; 3] = [
    LeadField::CompanyName,
    LeadField::Activity,
    LeadField::Description,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: Uuid,
    pub company_name: String,
    pub activity: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub data_quality_score: i32,
    pub relevance_score: f64,
    pub matching_fields: Vec<LeadField>,
    pub created_at: DateTime<Utc>,
}

/// Resolves the fields to search: the defaults when none are given, otherwise
/// the requested ones, all of which must be free-text columns.
pub fn search_fields(requested: &[LeadField]) -> Result<Vec<LeadField>, AppError> {
    if requested.is_empty() {
        return Ok(DEFAULT_SEARCH_FIELDS.to_vec());
    }
    if let Some(field) = requested.iter().find(|f| !f.is_text()) {
        return Err(AppError::InvalidInput(format!(
            "Field '{}' is not searchable",
            field
        )));
    }
    Ok(requested.to_vec())
}

/// Scores every lead against `query` and returns the matches, best first.
///
/// Leads matching no field are dropped. Equal scores keep retrieval order.
pub fn rank(query: &str, fields: &[LeadField], leads: &[Lead]) -> Result<Vec<SearchHit>, AppError> {
    if query.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Search query cannot be empty".to_string(),
        ));
    }
    let fields = search_fields(fields)?;
    let needle = query.to_lowercase();

    let mut hits: Vec<SearchHit> = leads
        .iter()
        .filter_map(|lead| {
            let matching_fields: Vec<LeadField> = fields
                .iter()
                .copied()
                .filter(|field| {
                    field
                        .text_value(lead)
                        .is_some_and(|value| value.to_lowercase().contains(&needle))
                })
                .collect();

            if matching_fields.is_empty() {
                return None;
            }

            Some(SearchHit {
                id: lead.id,
                company_name: lead.company_name.clone(),
                activity: lead.activity.clone(),
                description: lead.description.clone(),
                category: lead.category.clone(),
                data_quality_score: lead.data_quality_score,
                relevance_score: matching_fields.len() as f64 / fields.len() as f64,
                matching_fields,
                created_at: lead.created_at,
            })
        })
        .collect();

    // sort_by is stable, so ties stay in retrieval order
    hits.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewLead;

    fn lead(company: &str, activity: &str, description: Option<&str>) -> Lead {
        NewLead {
            description: description.map(str::to_string),
            ..NewLead::new(company, activity)
        }
        .into_lead(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn blank_query_is_rejected() {
        let err = rank("   ", &[], &[]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn exact_company_match_scores_one_third() {
        let leads = vec![lead("Helios", "Retail", Some("Tiendas de barrio"))];
        let hits = rank("Helios", &[], &leads).unwrap();

        assert_eq!(hits.len(), 1);
        assert!((hits[0].relevance_score - 1.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(hits[0].matching_fields, vec![LeadField::CompanyName]);
    }

    #[test]
    fn more_matching_fields_rank_higher_and_ties_keep_order() {
        let one = lead("Solar Uno", "Retail", None);
        let two = lead("Solar Dos", "Retail", None);
        let three = lead("Solar Tres", "solar panels", Some("SOLAR"));
        let none = lead("Acme", "Retail", None);
        let leads = vec![one.clone(), two.clone(), three.clone(), none];

        let hits = rank("solar", &[], &leads).unwrap();
        let ids: Vec<Uuid> = hits.iter().map(|h| h.id).collect();

        assert_eq!(ids, vec![three.id, one.id, two.id]);
        assert_eq!(hits[0].relevance_score, 1.0);
    }

    #[test]
    fn multi_word_queries_match_verbatim() {
        let leads = vec![lead("Paneles y Solar", "Retail", None)];
        assert!(rank("solar paneles", &[], &leads).unwrap().is_empty());
        assert_eq!(rank("y solar", &[], &leads).unwrap().len(), 1);
    }

    #[test]
    fn custom_fields_must_be_text() {
        let leads = vec![lead("Acme", "Retail", None)];
        assert!(rank("acme", &[LeadField::DataQualityScore], &leads).is_err());

        let hits = rank("retail", &[LeadField::Activity], &leads).unwrap();
        assert_eq!(hits[0].relevance_score, 1.0);
    }
}
