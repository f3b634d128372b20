//! Duplicate detection and resolution.
//!
//! Grouping is exact (case- and whitespace-sensitive, byte-equal) on the chosen
//! field. Within a group the survivor is the lead with the highest
//! `data_quality_score`, ties broken by the most recent `created_at`.

use crate::errors::AppError;
use crate::lead_store::LeadStore;
use crate::models::{Lead, LeadField};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    Email,
    CompanyName,
    Phone,
}

impl DedupStrategy {
    pub fn field(&self) -> LeadField {
        match self {
            DedupStrategy::Email => LeadField::Email,
            DedupStrategy::CompanyName => LeadField::CompanyName,
            DedupStrategy::Phone => LeadField::Phone,
        }
    }

    /// Matching key of `lead`; empty values never match anything.
    fn key<'a>(&self, lead: &'a Lead) -> Option<&'a str> {
        self.field().text_value(lead).filter(|v| !v.is_empty())
    }
}

impl fmt::Display for DedupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field().as_str())
    }
}

impl FromStr for DedupStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "email" => Ok(DedupStrategy::Email),
            "company_name" => Ok(DedupStrategy::CompanyName),
            "phone" => Ok(DedupStrategy::Phone),
            other => Err(AppError::InvalidInput(format!(
                "Unknown deduplication strategy '{}' (expected email, company_name or phone)",
                other
            ))),
        }
    }
}

/// Leads sharing one exact value. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub match_type: DedupStrategy,
    pub match_value: String,
    pub lead_ids: Vec<Uuid>,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.lead_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lead_ids.is_empty()
    }
}

/// Groups `leads` by the strategy's field and yields every bucket with two or
/// more members, ordered by match value. Ids keep their input order.
pub fn find_duplicates(
    strategy: DedupStrategy,
    leads: &[Lead],
) -> impl Iterator<Item = DuplicateGroup> + '_ {
    let mut buckets: BTreeMap<&str, Vec<Uuid>> = BTreeMap::new();
    for lead in leads {
        if let Some(key) = strategy.key(lead) {
            buckets.entry(key).or_default().push(lead.id);
        }
    }

    buckets
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(move |(value, lead_ids)| DuplicateGroup {
            match_type: strategy,
            match_value: value.to_string(),
            lead_ids,
        })
}

/// Orders candidates best first (quality descending, then newest first) and
/// returns the one to keep.
pub fn pick_survivor(candidates: &mut [Lead]) -> Option<&Lead> {
    candidates.sort_by(|a, b| {
        (b.data_quality_score, b.created_at).cmp(&(a.data_quality_score, a.created_at))
    });
    candidates.first()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DedupOptions {
    #[serde(default)]
    pub auto_merge: bool,
    /// Accepted for compatibility; survivors are always chosen by quality.
    #[serde(default = "default_true")]
    pub keep_highest_quality: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            auto_merge: false,
            keep_highest_quality: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupOutcome {
    pub duplicates_found: u64,
    pub leads_merged: u64,
    pub leads_removed: u64,
    /// Survivor of every merged group.
    pub survivors: Vec<Uuid>,
    pub removed_ids: Vec<Uuid>,
}

/// Keeps the best lead of every group and deletes the rest.
///
/// Members that vanished since grouping are skipped. Deletes go out one at a
/// time and are not rolled back if a later one fails. Without `auto_merge`
/// only the group count is reported.
pub async fn resolve_duplicates(
    store: &dyn LeadStore,
    groups: &[DuplicateGroup],
    options: DedupOptions,
) -> Result<DedupOutcome, AppError> {
    let mut outcome = DedupOutcome {
        duplicates_found: groups.len() as u64,
        ..Default::default()
    };

    if !options.auto_merge {
        return Ok(outcome);
    }

    for group in groups.iter().filter(|g| g.len() > 1) {
        let mut candidates = Vec::with_capacity(group.len());
        for id in &group.lead_ids {
            match store.get(*id).await? {
                Some(lead) => candidates.push(lead),
                None => tracing::debug!(
                    "Lead {} from group '{}' no longer exists, skipping",
                    id,
                    group.match_value
                ),
            }
        }

        pick_survivor(&mut candidates);
        let Some((keep, losers)) = candidates.split_first() else {
            continue;
        };

        let mut removed_any = false;
        for loser in losers {
            if store.delete(loser.id).await? {
                outcome.leads_removed += 1;
                outcome.removed_ids.push(loser.id);
                removed_any = true;
            }
        }

        if removed_any {
            outcome.leads_merged += 1;
            outcome.survivors.push(keep.id);
            tracing::debug!(
                "Kept lead {} for {} '{}', removed {}",
                keep.id,
                group.match_type,
                group.match_value,
                losers.len()
            );
        }
    }

    Ok(outcome)
}
