use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::{CompanyId, OpportunityId, OpportunityStatus, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: OpportunityId,
    pub title: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub location_city: Option<String>,
    #[serde(default)]
    pub location_state: Option<String>,
    #[serde(default)]
    pub location_raw: Option<String>,
    #[serde(default)]
    pub salary_min: Option<f64>,
    #[serde(default)]
    pub salary_max: Option<f64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub posted_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Opportunity {
    /// Minimal record, mostly useful for fixtures and placeholders.
    pub fn new(id: OpportunityId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            company_name: None,
            location_city: None,
            location_state: None,
            location_raw: None,
            salary_min: None,
            salary_max: None,
            score: None,
            url: None,
            posted_date: None,
            created_at: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn company_label(&self) -> &str {
        self.company_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Unknown Company")
    }

    pub fn salary_label(&self) -> String {
        let min = self.salary_min.filter(|v| *v != 0.0).map(format_amount);
        let max = self.salary_max.filter(|v| *v != 0.0).map(format_amount);
        match (min, max) {
            (Some(min), Some(max)) => format!("{min} – {max}"),
            (Some(one), None) | (None, Some(one)) => one,
            (None, None) => "Salary not listed".to_string(),
        }
    }

    pub fn location_label(&self) -> String {
        let parts: Vec<&str> = [&self.location_city, &self.location_state]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if !parts.is_empty() {
            return parts.join(", ");
        }
        self.location_raw
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .unwrap_or("Location not specified")
            .to_string()
    }

    pub fn date_label(&self) -> String {
        let Some(raw) = self
            .posted_date
            .as_deref()
            .or(self.created_at.as_deref())
            .filter(|raw| !raw.trim().is_empty())
        else {
            return "Date unknown".to_string();
        };
        match parse_api_date(raw) {
            Some(date) => date.format("%b %-d, %Y").to_string(),
            None => raw.to_string(),
        }
    }

    pub fn score_label(&self) -> Option<String> {
        self.score
            .filter(|score| *score != 0.0)
            .map(|score| format!("Score: {score:.1}"))
    }
}

fn format_amount(amount: f64) -> String {
    if amount >= 1000.0 {
        format!("${}k", (amount / 1000.0).round())
    } else {
        format!("${amount}")
    }
}

fn parse_api_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.date_naive());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.date());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref().filter(|name| !name.trim().is_empty()) {
            Some(name) => name,
            None => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicLinkRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A user's record of one opportunity (saved, ignored, applied, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOpportunity {
    pub opportunity_id: OpportunityId,
    #[serde(default)]
    pub status: OpportunityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opportunity: Option<Opportunity>,
}

impl UserOpportunity {
    pub fn title(&self) -> &str {
        self.opportunity
            .as_ref()
            .map(|opportunity| opportunity.title.as_str())
            .unwrap_or("Untitled opportunity")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OpportunityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl StatusUpdate {
    pub fn new(status: OpportunityStatus) -> Self {
        Self {
            status,
            ignore_reason: None,
            score: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderEntry {
    pub opportunity_id: OpportunityId,
    pub display_order: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<CompanyId>,
}

/// Query for `/opportunities/for-me`; the server already leaves out what
/// the user ignored or applied to.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ForMeQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OpportunityStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserOpportunityQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_filter: Option<OpportunityStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl UserOpportunityQuery {
    pub fn with_status(status: OpportunityStatus, limit: u32) -> Self {
        Self {
            status_filter: Some(status),
            limit: Some(limit),
            offset: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_digest_enabled")]
    pub digest_enabled: bool,
    #[serde(default = "default_digest_threshold")]
    pub digest_threshold: i64,
    /// Fields this client does not edit are sent back untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_digest_enabled() -> bool {
    true
}

fn default_digest_threshold() -> i64 {
    80
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            digest_enabled: default_digest_enabled(),
            digest_threshold: default_digest_threshold(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Job submitted by the user from the add-job form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewOpportunity {
    pub url: String,
    pub title: String,
    pub company_name: String,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOpportunityRequest {
    pub external_id: String,
    pub source: String,
    pub source_company: String,
    pub title: String,
    pub company_name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterStatusCounts {
    #[serde(default)]
    pub passed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub pending: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBucket {
    #[serde(default)]
    pub label: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyCount {
    pub company_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCount {
    pub source: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicStats {
    #[serde(default)]
    pub total_opportunities: Option<u64>,
    #[serde(default)]
    pub active_opportunities: Option<u64>,
    #[serde(default)]
    pub opportunities_added_24h: Option<u64>,
    #[serde(default)]
    pub opportunities_added_7d: Option<u64>,
    #[serde(default)]
    pub total_companies: Option<u64>,
    #[serde(default)]
    pub active_companies: Option<u64>,
    #[serde(default)]
    pub newest_posted_date: Option<String>,
    #[serde(default)]
    pub oldest_active_posted_date: Option<String>,
    #[serde(default)]
    pub remote_percentage: Option<f64>,
    #[serde(default)]
    pub has_salary_percentage: Option<f64>,
    #[serde(default)]
    pub avg_score: Option<f64>,
    #[serde(default)]
    pub median_score: Option<f64>,
    #[serde(default)]
    pub filter_status_counts: Option<FilterStatusCounts>,
    #[serde(default)]
    pub score_distribution: Vec<ScoreBucket>,
    #[serde(default)]
    pub top_companies_by_listings: Vec<CompanyCount>,
    #[serde(default)]
    pub sources_breakdown: Vec<SourceCount>,
}

impl FilterStatusCounts {
    /// Pass/fail/pending shares in percent; `None` when nothing was evaluated.
    pub fn percentages(&self) -> Option<(f64, f64, f64)> {
        let total = self.passed + self.failed + self.pending;
        if total == 0 {
            return None;
        }
        let pct = |count: u64| count as f64 * 100.0 / total as f64;
        Some((pct(self.passed), pct(self.failed), pct(self.pending)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminStats {
    #[serde(default)]
    pub total_users: Option<u64>,
    #[serde(default)]
    pub filter_evaluations_total: Option<u64>,
    #[serde(default)]
    pub ai_analyses_total: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
