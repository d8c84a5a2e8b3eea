use serde::{Deserialize, Serialize};

/// Upstream placeholder for a listing without a URL.
pub const LINK_SENTINEL: &str = "N/A";

pub const NO_TITLE: &str = "No Title";
pub const UNKNOWN_COMPANY: &str = "Unknown Company";
pub const NO_LOCATION: &str = "Location Not Specified";

/// One scraped listing as the backend sends it. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "Company", default)]
    pub company: Option<String>,
    #[serde(rename = "Location", default)]
    pub location: Option<String>,
    #[serde(rename = "Link", default)]
    pub link: Option<String>,
}

/// A listing with every field filled in for display and export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRecord {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Link", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>, // None renders no hyperlink
}

impl JobRecord {
    #[cfg(test)]
    pub fn new(title: &str, company: &str, location: &str, link: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            company: Some(company.to_string()),
            location: Some(location.to_string()),
            link: Some(link.to_string()),
        }
    }

    /// The link if it points somewhere, i.e. present and not the sentinel.
    pub fn valid_link(&self) -> Option<&str> {
        present(&self.link).filter(|l| *l != LINK_SENTINEL)
    }

    pub fn normalize(&self) -> DisplayRecord {
        DisplayRecord {
            title: present(&self.title).unwrap_or(NO_TITLE).to_string(),
            company: present(&self.company).unwrap_or(UNKNOWN_COMPANY).to_string(),
            location: present(&self.location).unwrap_or(NO_LOCATION).to_string(),
            link: self.valid_link().map(str::to_string),
        }
    }
}

/// Empty strings count as missing. Whitespace is kept as sent.
pub(crate) fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub job_title: String,
    pub location: String,
    pub pages: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub success: bool,
    #[serde(default)]
    pub jobs: Vec<JobRecord>,
    #[serde(default)]
    pub total_jobs: usize,
    #[serde(default)]
    pub pages_scraped: usize,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub message: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// What the backend reports about the result set it is holding for export.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerStats {
    pub current_jobs_count: usize,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub analytics: Option<ServerAnalytics>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerAnalytics {
    pub unique_companies: usize,
    pub unique_locations: usize,
    #[serde(default)]
    pub top_companies: Vec<(String, usize)>,
    #[serde(default)]
    pub top_locations: Vec<(String, usize)>,
}
