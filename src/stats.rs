//! Aggregated statistics over classified applications

use crate::models::{JobApplication, Status};
use std::collections::HashMap;

/// Companies listed in the statistics file
pub const EXPORT_TOP_COMPANIES: usize = 10;

/// Companies listed in the console summary
pub const CONSOLE_TOP_COMPANIES: usize = 5;

/// Status and company tallies for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationStats {
    total: usize,
    status_counts: [usize; Status::ALL.len()],
    /// Company tallies in first-encountered order
    companies: Vec<(String, usize)>,
}

impl ApplicationStats {
    /// Fold the applications into tallies
    pub fn from_applications(applications: &[JobApplication]) -> Self {
        let mut stats = Self::default();
        let mut company_index: HashMap<&str, usize> = HashMap::new();

        for application in applications {
            stats.total += 1;
            stats.status_counts[application.status as usize] += 1;

            if application.company.is_empty() {
                continue;
            }
            match company_index.get(application.company.as_str()) {
                Some(&idx) => stats.companies[idx].1 += 1,
                None => {
                    company_index.insert(&application.company, stats.companies.len());
                    stats.companies.push((application.company.clone(), 1));
                }
            }
        }

        stats
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn count_for(&self, status: Status) -> usize {
        self.status_counts[status as usize]
    }

    /// Count for every status, zero-filled, in [`Status::ALL`] order
    pub fn status_counts(&self) -> Vec<(Status, usize)> {
        Status::ALL
            .iter()
            .map(|&status| (status, self.count_for(status)))
            .collect()
    }

    /// Number of distinct non-empty company names
    pub fn company_count(&self) -> usize {
        self.companies.len()
    }

    /// Up to `n` companies by descending count, ties in first-encountered order
    pub fn top_companies(&self, n: usize) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .companies
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        // stable: equal counts keep encounter order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}
