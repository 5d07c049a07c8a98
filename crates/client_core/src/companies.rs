//! Per-company counts over the loaded feed and the single-company filter.

use std::{cmp::Ordering, collections::HashMap};

use shared::protocol::Opportunity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanySummary {
    pub company: String,
    pub count: usize,
}

/// Groups by company label, most listings first, ties by name.
pub fn summarize_companies(items: &[Opportunity]) -> Vec<CompanySummary> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for item in items {
        *counts.entry(item.company_label()).or_default() += 1;
    }
    let mut summary: Vec<CompanySummary> = counts
        .into_iter()
        .map(|(company, count)| CompanySummary {
            company: company.to_string(),
            count,
        })
        .collect();
    summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| compare_names(&a.company, &b.company)));
    summary
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// At most one company selected; selecting it again clears the filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyFilter {
    selected: Option<String>,
}

impl CompanyFilter {
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn toggle(&mut self, company: &str) -> Option<&str> {
        let company = company.trim();
        if company.is_empty() || self.selected.as_deref() == Some(company) {
            self.selected = None;
        } else {
            self.selected = Some(company.to_string());
        }
        self.selected()
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    pub fn matches(&self, item: &Opportunity) -> bool {
        self.selected
            .as_deref()
            .map_or(true, |company| item.company_label() == company)
    }
}
