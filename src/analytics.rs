use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{present, JobRecord};

pub const TOP_N: usize = 3;
const UNKNOWN_KEY: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsSummary {
    pub total_jobs: usize,
    pub unique_companies: usize,
    pub unique_locations: usize,
    pub valid_link_percentage: u8,
    pub top_companies: Vec<(String, usize)>,
    pub top_locations: Vec<(String, usize)>,
}

/// Frequency count that remembers first-seen order.
#[derive(Default)]
struct Tally {
    index: HashMap<String, usize>,
    entries: Vec<(String, usize)>,
}

impl Tally {
    fn add(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), 1));
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn top(mut self, n: usize) -> Vec<(String, usize)> {
        // sort_by is stable: equal counts stay in first-seen order
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        self.entries.truncate(n);
        self.entries
    }
}

/// Summary statistics over a result set, or `None` when there is nothing to summarize.
pub fn summarize(jobs: &[JobRecord]) -> Option<AnalyticsSummary> {
    if jobs.is_empty() {
        return None;
    }

    let mut companies = Tally::default();
    let mut locations = Tally::default();
    let mut valid_links = 0usize;

    for job in jobs {
        companies.add(present(&job.company).unwrap_or(UNKNOWN_KEY));
        locations.add(present(&job.location).unwrap_or(UNKNOWN_KEY));
        if job.valid_link().is_some() {
            valid_links += 1;
        }
    }

    Some(AnalyticsSummary {
        total_jobs: jobs.len(),
        unique_companies: companies.len(),
        unique_locations: locations.len(),
        valid_link_percentage: rounded_percentage(valid_links, jobs.len()),
        top_companies: companies.top(TOP_N),
        top_locations: locations.top(TOP_N),
    })
}

/// `round(100 * part / whole)`, halves rounding up.
fn rounded_percentage(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    ((part * 200 + whole) / (whole * 2)).min(100) as u8
}

/// Keeps the last summary until a different job list is handed in.
#[derive(Debug, Default)]
pub struct AnalyticsCache {
    entry: Option<(Arc<Vec<JobRecord>>, Option<AnalyticsSummary>)>,
    computed: usize,
}

impl AnalyticsCache {
    pub fn get(&mut self, jobs: &Arc<Vec<JobRecord>>) -> Option<&AnalyticsSummary> {
        let stale = match &self.entry {
            Some((cached, _)) => !Arc::ptr_eq(cached, jobs),
            None => true,
        };
        if stale {
            self.computed += 1;
            log::debug!("Summarizing {} jobs (pass {})", jobs.len(), self.computed);
            self.entry = Some((Arc::clone(jobs), summarize(jobs)));
        }
        self.entry.as_ref().and_then(|(_, summary)| summary.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(company: Option<&str>, location: Option<&str>, link: Option<&str>) -> JobRecord {
        JobRecord {
            title: Some("Engineer".to_string()),
            company: company.map(str::to_string),
            location: location.map(str::to_string),
            link: link.map(str::to_string),
        }
    }

    #[test]
    fn test_empty_input_has_no_summary() {
        assert_eq!(summarize(&[]), None);
    }

    #[test]
    fn test_counts_come_from_the_records() {
        let jobs = vec![
            job(Some("Acme"), Some("Remote"), Some("https://a")),
            job(Some("Acme"), Some("Berlin"), Some("N/A")),
            job(Some("Beta"), Some("Remote"), None),
        ];
        let summary = summarize(&jobs).unwrap();
        assert_eq!(summary.total_jobs, 3);
        assert_eq!(summary.unique_companies, 2);
        assert_eq!(summary.unique_locations, 2);
        assert_eq!(summary.valid_link_percentage, 33);
        assert_eq!(summary.top_companies, vec![("Acme".to_string(), 2), ("Beta".to_string(), 1)]);
        assert!(summary.unique_companies <= summary.total_jobs);
    }

    #[test]
    fn test_missing_values_group_under_unknown() {
        let jobs = vec![
            job(None, None, None),
            job(Some(""), Some(""), None),
            job(Some("Acme"), Some("Remote"), None),
        ];
        let summary = summarize(&jobs).unwrap();
        assert_eq!(summary.top_companies[0], ("Unknown".to_string(), 2));
        assert_eq!(summary.top_locations[0], ("Unknown".to_string(), 2));
    }

    #[test]
    fn test_keys_are_counted_as_sent() {
        let jobs = vec![
            job(Some("Acme"), Some("Remote"), None),
            job(Some("Acme "), Some("Remote"), None),
            job(Some("  "), Some("Remote"), None),
        ];
        let summary = summarize(&jobs).unwrap();
        assert_eq!(summary.unique_companies, 3);
        assert_eq!(summary.top_companies[0], ("Acme".to_string(), 1));
        assert_eq!(summary.top_companies[1], ("Acme ".to_string(), 1));
        assert_eq!(summary.top_companies[2], ("  ".to_string(), 1));
    }

    #[test]
    fn test_valid_link_percentage_bounds() {
        let all = vec![
            job(Some("A"), None, Some("https://a")),
            job(Some("B"), None, Some("https://b")),
        ];
        assert_eq!(summarize(&all).unwrap().valid_link_percentage, 100);

        let none = vec![job(Some("A"), None, Some("N/A")), job(Some("B"), None, None)];
        assert_eq!(summarize(&none).unwrap().valid_link_percentage, 0);

        let half = vec![job(Some("A"), None, Some("https://a")), job(Some("B"), None, Some("N/A"))];
        assert_eq!(summarize(&half).unwrap().valid_link_percentage, 50);
    }

    #[test]
    fn test_rounding_goes_half_up() {
        assert_eq!(rounded_percentage(1, 8), 13); // 12.5
        assert_eq!(rounded_percentage(2, 3), 67);
        assert_eq!(rounded_percentage(1, 3), 33);
    }

    #[test]
    fn test_top_lists_keep_first_seen_order_on_ties() {
        let jobs = vec![
            job(Some("Gamma"), Some("Paris"), None),
            job(Some("Alpha"), Some("Oslo"), None),
            job(Some("Delta"), Some("Rome"), None),
            job(Some("Beta"), Some("Oslo"), None),
            job(Some("Beta"), Some("Lima"), None),
        ];
        let summary = summarize(&jobs).unwrap();
        let names: Vec<&str> = summary.top_companies.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Beta", "Gamma", "Alpha"]);
        assert_eq!(summary.top_locations[0], ("Oslo".to_string(), 2));
        assert_eq!(summary.top_locations[1].0, "Paris");
        assert_eq!(summary.top_locations.len(), TOP_N);
    }

    #[test]
    fn test_cache_recomputes_only_for_a_new_list() {
        let mut cache = AnalyticsCache::default();
        let first = Arc::new(vec![job(Some("Acme"), None, None)]);

        assert_eq!(cache.get(&first).map(|s| s.total_jobs), Some(1));
        assert_eq!(cache.get(&Arc::clone(&first)).map(|s| s.total_jobs), Some(1));
        assert_eq!(cache.computed, 1);

        // Equal contents, different list: still recomputed.
        let second = Arc::new(vec![job(Some("Acme"), None, None)]);
        cache.get(&second);
        assert_eq!(cache.computed, 2);

        let empty = Arc::new(Vec::new());
        assert!(cache.get(&empty).is_none());
        assert_eq!(cache.computed, 3);
    }
}
