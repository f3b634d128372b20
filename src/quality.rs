//! Data-quality aggregates over a lead collection.
//!
//! Everything here is a pure function of the leads passed in; filtering by
//! category, state or period happens before.

use crate::models::{Lead, LeadField};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

pub const EMAIL_VERIFICATION_IMPACT: &str = "email_verification_impact";
pub const PHONE_VERIFICATION_IMPACT: &str = "phone_verification_impact";
pub const WEBSITE_VERIFICATION_IMPACT: &str = "website_verification_impact";
pub const COMPLETENESS_SCORE: &str = "completeness_score";

/// Verification rates below this percentage produce a recommendation.
const VERIFICATION_TARGET: f64 = 50.0;
/// Average quality score below this produces a recommendation.
const COMPLETENESS_TARGET: f64 = 3.0;
/// Top of the quality scale, used to express completeness as a percentage.
const MAX_QUALITY_SCORE: f64 = 5.0;

pub const TREND_DAYS: i64 = 30;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityAnalysis {
    pub overall_quality: f64,
    pub quality_factors: BTreeMap<&'static str, f64>,
    pub recommendations: Vec<String>,
}

/// Verification impact per contact channel and the mean quality score.
///
/// `overall_quality` averages the three verification percentages with the
/// completeness score expressed as a percentage of the top score (5).
pub fn analyze(leads: &[Lead]) -> QualityAnalysis {
    if leads.is_empty() {
        return QualityAnalysis {
            overall_quality: 0.0,
            quality_factors: BTreeMap::new(),
            recommendations: Vec::new(),
        };
    }

    let total = leads.len();
    let email = percentage(leads.iter().filter(|l| l.verified_email).count(), total);
    let phone = percentage(leads.iter().filter(|l| l.verified_phone).count(), total);
    let website = percentage(leads.iter().filter(|l| l.verified_website).count(), total);
    let completeness =
        leads.iter().map(|l| f64::from(l.data_quality_score)).sum::<f64>() / total as f64;

    let mut recommendations = Vec::new();
    if email < VERIFICATION_TARGET {
        recommendations.push(format!(
            "Only {:.2}% of emails are verified; run email validation on this segment",
            email
        ));
    }
    if phone < VERIFICATION_TARGET {
        recommendations.push(format!(
            "Only {:.2}% of phone numbers are verified; run phone validation on this segment",
            phone
        ));
    }
    if website < VERIFICATION_TARGET {
        recommendations.push(format!(
            "Only {:.2}% of websites are verified; run website validation on this segment",
            website
        ));
    }
    if completeness < COMPLETENESS_TARGET {
        recommendations.push(format!(
            "Average quality score is {:.2}; fill in descriptions, categories and contact details",
            completeness
        ));
    }

    let overall = (email + phone + website + completeness / MAX_QUALITY_SCORE * 100.0) / 4.0;

    let quality_factors = BTreeMap::from([
        (EMAIL_VERIFICATION_IMPACT, round2(email)),
        (PHONE_VERIFICATION_IMPACT, round2(phone)),
        (WEBSITE_VERIFICATION_IMPACT, round2(website)),
        (COMPLETENESS_SCORE, round2(completeness)),
    ]);

    QualityAnalysis {
        overall_quality: round2(overall),
        quality_factors,
        recommendations,
    }
}

/// Reporting window for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsPeriod {
    #[default]
    All,
    Last30Days,
    Last7Days,
    LastDay,
}

impl StatsPeriod {
    pub fn days(&self) -> Option<i64> {
        match self {
            StatsPeriod::All => None,
            StatsPeriod::Last30Days => Some(30),
            StatsPeriod::Last7Days => Some(7),
            StatsPeriod::LastDay => Some(1),
        }
    }

    pub fn includes(&self, lead: &Lead, now: DateTime<Utc>) -> bool {
        match self.days() {
            Some(days) => lead.created_at >= now - Duration::days(days),
            None => true,
        }
    }
}

impl FromStr for StatsPeriod {
    type Err = std::convert::Infallible;

    /// Unrecognized periods mean "all time".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "30d" => StatsPeriod::Last30Days,
            "7d" => StatsPeriod::Last7Days,
            "1d" => StatsPeriod::LastDay,
            _ => StatsPeriod::All,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationRates {
    pub email_rate: f64,
    pub phone_rate: f64,
    pub website_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadStatistics {
    pub total_leads: u64,
    pub verified_emails: u64,
    pub verified_phones: u64,
    pub verified_websites: u64,
    /// `score_N` -> number of leads with that score.
    pub quality_distribution: BTreeMap<String, u64>,
    pub verification_rates: VerificationRates,
}

pub fn lead_statistics(leads: &[Lead], period: StatsPeriod, now: DateTime<Utc>) -> LeadStatistics {
    let in_period: Vec<&Lead> = leads.iter().filter(|l| period.includes(l, now)).collect();
    let total = in_period.len();
    let verified_emails = in_period.iter().filter(|l| l.verified_email).count();
    let verified_phones = in_period.iter().filter(|l| l.verified_phone).count();
    let verified_websites = in_period.iter().filter(|l| l.verified_website).count();

    let mut quality_distribution = BTreeMap::new();
    for lead in &in_period {
        *quality_distribution
            .entry(format!("score_{}", lead.data_quality_score))
            .or_insert(0) += 1;
    }

    LeadStatistics {
        total_leads: total as u64,
        verified_emails: verified_emails as u64,
        verified_phones: verified_phones as u64,
        verified_websites: verified_websites as u64,
        quality_distribution,
        verification_rates: VerificationRates {
            email_rate: round2(percentage(verified_emails, total)),
            phone_rate: round2(percentage(verified_phones, total)),
            website_rate: round2(percentage(verified_websites, total)),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopValue {
    pub value: String,
    pub count: u64,
    /// Share among leads that have any value for the field.
    pub percentage: f64,
}

/// Most frequent values of a text column, most common first, ties by value.
pub fn top_values(leads: &[Lead], field: LeadField, limit: usize) -> Vec<TopValue> {
    let counts = count_values(leads, field);
    let with_value: u64 = counts.values().sum();

    let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .take(limit)
        .map(|(value, count)| TopValue {
            value: value.to_string(),
            count,
            percentage: round2(percentage(count as usize, with_value as usize)),
        })
        .collect()
}

fn count_values(leads: &[Lead], field: LeadField) -> BTreeMap<&str, u64> {
    let mut counts = BTreeMap::new();
    for value in leads.iter().filter_map(|l| field.text_value(l)) {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub count: u64,
    pub quality_avg: f64,
}

/// Per-day lead counts over the last `days_back` days, newest day first.
pub fn daily_trends(leads: &[Lead], now: DateTime<Utc>, days_back: i64) -> Vec<DailyTrend> {
    let since = now - Duration::days(days_back);
    let mut days: BTreeMap<NaiveDate, (u64, i64)> = BTreeMap::new();
    for lead in leads.iter().filter(|l| l.created_at >= since) {
        let slot = days.entry(lead.created_at.date_naive()).or_insert((0, 0));
        slot.0 += 1;
        slot.1 += i64::from(lead.data_quality_score);
    }

    days.into_iter()
        .rev()
        .map(|(date, (count, score_sum))| DailyTrend {
            date,
            count,
            quality_avg: round2(score_sum as f64 / count as f64),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreShare {
    pub score: i32,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub categories: Vec<FilterOption>,
    pub states: Vec<FilterOption>,
    pub countries: Vec<FilterOption>,
    pub quality_scores: Vec<ScoreShare>,
}

/// Distinct values available for filtering, alphabetical, with counts.
pub fn filter_options(leads: &[Lead]) -> FilterOptions {
    let options = |field: LeadField| -> Vec<FilterOption> {
        count_values(leads, field)
            .into_iter()
            .map(|(value, count)| FilterOption {
                value: value.to_string(),
                label: value.to_string(),
                count,
            })
            .collect()
    };

    let mut scores: BTreeMap<i32, u64> = BTreeMap::new();
    for lead in leads {
        *scores.entry(lead.data_quality_score).or_insert(0) += 1;
    }
    let quality_scores = scores
        .into_iter()
        .map(|(score, count)| ScoreShare {
            score,
            count,
            percentage: round2(percentage(count as usize, leads.len())),
        })
        .collect();

    FilterOptions {
        categories: options(LeadField::Category),
        states: options(LeadField::State),
        countries: options(LeadField::Country),
        quality_scores,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewLead;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn lead(score: i32, email: bool, phone: bool, website: bool) -> Lead {
        NewLead {
            verified_email: email,
            verified_phone: phone,
            verified_website: website,
            data_quality_score: Some(score),
            ..NewLead::new("Acme", "Retail")
        }
        .into_lead(Uuid::new_v4(), now())
    }

    #[test]
    fn empty_collection_yields_zero_analysis() {
        let analysis = analyze(&[]);
        assert_eq!(analysis.overall_quality, 0.0);
        assert!(analysis.quality_factors.is_empty());
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn factors_are_percentages_rounded_to_two_decimals() {
        let leads = vec![
            lead(5, true, true, true),
            lead(4, true, false, true),
            lead(3, false, false, true),
        ];
        let analysis = analyze(&leads);

        assert_eq!(analysis.quality_factors[EMAIL_VERIFICATION_IMPACT], 66.67);
        assert_eq!(analysis.quality_factors[PHONE_VERIFICATION_IMPACT], 33.33);
        assert_eq!(analysis.quality_factors[WEBSITE_VERIFICATION_IMPACT], 100.0);
        assert_eq!(analysis.quality_factors[COMPLETENESS_SCORE], 4.0);
        // (66.67 + 33.33 + 100 + 80) / 4
        assert_eq!(analysis.overall_quality, 70.0);
        assert_eq!(analysis.recommendations.len(), 1);
        assert!(analysis.recommendations[0].contains("phone"));
    }

    #[test]
    fn low_completeness_is_recommended() {
        let analysis = analyze(&[lead(1, true, true, true)]);
        assert_eq!(analysis.recommendations.len(), 1);
        assert!(analysis.recommendations[0].contains("quality score"));
    }

    #[test]
    fn statistics_respect_the_period() {
        let fresh = lead(2, true, false, false);
        let mut old = lead(4, false, false, false);
        old.created_at = now() - Duration::days(10);

        let week = lead_statistics(&[fresh.clone(), old.clone()], StatsPeriod::Last7Days, now());
        assert_eq!(week.total_leads, 1);
        assert_eq!(week.verification_rates.email_rate, 100.0);

        let all = lead_statistics(&[fresh, old], "bogus".parse().unwrap(), now());
        assert_eq!(all.total_leads, 2);
        assert_eq!(all.quality_distribution["score_4"], 1);
    }

    #[test]
    fn top_values_rank_by_count() {
        let mut leads = vec![lead(1, false, false, false); 4];
        leads[0].category = Some("Solar".to_string());
        leads[1].category = Some("Solar".to_string());
        leads[2].category = Some("Agua".to_string());

        let top = top_values(&leads, LeadField::Category, 10);
        assert_eq!(top[0].value, "Solar");
        assert_eq!(top[0].percentage, 66.67);
        assert_eq!(top[1].value, "Agua");
        assert_eq!(top_values(&leads, LeadField::Category, 1).len(), 1);
    }

    #[test]
    fn trends_group_by_day_newest_first() {
        let today = lead(4, false, false, false);
        let mut yesterday = lead(2, false, false, false);
        yesterday.created_at = now() - Duration::days(1);
        let mut ancient = lead(2, false, false, false);
        ancient.created_at = now() - Duration::days(90);

        let trends = daily_trends(&[yesterday, today.clone(), ancient, today], now(), TREND_DAYS);
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].date, now().date_naive());
        assert_eq!(trends[0].count, 2);
        assert_eq!(trends[1].quality_avg, 2.0);
    }

    #[test]
    fn filter_options_list_distinct_values() {
        let mut a = lead(1, false, false, false);
        a.state = Some("Madrid".to_string());
        let mut b = lead(3, false, false, false);
        b.state = Some("Madrid".to_string());
        let options = filter_options(&[a, b]);

        assert_eq!(options.states.len(), 1);
        assert_eq!(options.states[0].count, 2);
        assert!(options.categories.is_empty());
        assert_eq!(options.quality_scores.len(), 2);
        assert_eq!(options.quality_scores[0].percentage, 50.0);
    }
}
