use reqwest::Response;
use std::time::Duration;

use crate::config::Config;
use crate::error::{ClientError, FieldError};
use crate::export::ExportFormat;
use crate::models::{HealthStatus, ScrapeRequest, ScrapeResult, ServerStats};

pub const DEFAULT_LOCATION: &str = "Remote";
pub const MIN_PAGES: i64 = 1;
pub const MAX_PAGES: i64 = 10;

/// Checks the scrape form and builds the request body. Nothing is sent on failure.
pub fn validate_query(job_title: &str, location: &str, pages: i64) -> Result<ScrapeRequest, ClientError> {
    let mut errors = Vec::new();

    let job_title = job_title.trim();
    if job_title.is_empty() {
        errors.push(FieldError::new("job_title", "Job title is required"));
    }

    if !(MIN_PAGES..=MAX_PAGES).contains(&pages) {
        errors.push(FieldError::new(
            "pages",
            format!("Pages must be between {} and {} (got {})", MIN_PAGES, MAX_PAGES, pages),
        ));
    }

    if !errors.is_empty() {
        return Err(ClientError::Validation(errors));
    }

    let location = match location.trim() {
        "" => DEFAULT_LOCATION,
        loc => loc,
    };

    Ok(ScrapeRequest {
        job_title: job_title.to_string(),
        location: location.to_string(),
        pages: pages as u32,
    })
}

/// Raw export payload; the body is opaque whatever the declared type.
#[derive(Debug, Clone)]
pub struct ExportBlob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    scrape_timeout: Duration,
    health_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("jobtable/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            http,
            scrape_timeout: config.scrape_timeout,
            health_timeout: config.health_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResult, ClientError> {
        log::info!(
            "POST /scrape job_title='{}' location='{}' pages={}",
            request.job_title,
            request.location,
            request.pages
        );

        let response = self
            .http
            .post(self.url("/scrape"))
            .timeout(self.scrape_timeout)
            .json(request)
            .send()
            .await
            .map_err(classify)?;
        let response = check_status(response).await?;
        let result: ScrapeResult = response.json().await.map_err(classify)?;

        if !result.success {
            let detail = result
                .message
                .unwrap_or_else(|| "scrape reported failure".to_string());
            log::warn!("Scrape unsuccessful: {}", detail);
            return Err(ClientError::Server { status: 200, detail });
        }

        if result.total_jobs != result.jobs.len() {
            log::warn!(
                "Server reported {} jobs but sent {}",
                result.total_jobs,
                result.jobs.len()
            );
        }
        log::info!(
            "Scrape returned {} jobs from {} pages",
            result.jobs.len(),
            result.pages_scraped
        );
        Ok(result)
    }

    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let response = self
            .http
            .get(self.url("/"))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(classify)?;
        let response = check_status(response).await?;
        response.json().await.map_err(classify)
    }

    pub async fn stats(&self) -> Result<ServerStats, ClientError> {
        let response = self
            .http
            .get(self.url("/stats"))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(classify)?;
        let response = check_status(response).await?;
        response.json().await.map_err(classify)
    }

    pub async fn fetch_export(&self, format: ExportFormat) -> Result<ExportBlob, ClientError> {
        log::info!("GET /download/{}", format);

        let response = self
            .http
            .get(self.url(&format!("/download/{}", format)))
            .timeout(self.scrape_timeout)
            .send()
            .await
            .map_err(classify)?;
        let response = check_status(response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(classify)?;

        Ok(ExportBlob {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

fn classify(err: reqwest::Error) -> ClientError {
    let err = ClientError::from(err);
    log::debug!("Transport failure: {:?}", err);
    err
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = extract_detail(&body)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| "unknown error".to_string());
    log::warn!("Server responded {}: {}", status, detail);

    Err(ClientError::Server {
        status: status.as_u16(),
        detail,
    })
}

/// Pulls the message out of a FastAPI-style error body:
/// `{"detail": "..."}` or `{"detail": {"message": "..."}}`.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let detail = value.get("detail").unwrap_or(&value);
    match detail {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
        _ => None,
    }
}
