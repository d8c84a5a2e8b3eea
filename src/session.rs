use std::sync::Arc;

use crate::analytics::{AnalyticsCache, AnalyticsSummary};
use crate::client::{validate_query, ApiClient};
use crate::error::{ClientError, FieldError};
use crate::models::{JobRecord, ScrapeRequest, ScrapeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Submitting,
    Displaying,
    ErrorDisplayed,
}

/// The one scrape request allowed to be outstanding.
#[derive(Debug)]
pub struct ScrapeTicket {
    id: u64,
    pub request: ScrapeRequest,
}

/// State of one scrape-and-display cycle.
#[derive(Debug)]
pub struct Session {
    phase: Phase,
    jobs: Arc<Vec<JobRecord>>,
    pages_scraped: usize,
    message: Option<String>,
    field_errors: Vec<FieldError>,
    error: Option<String>,
    analytics: AnalyticsCache,
    next_ticket: u64,
    in_flight: Option<u64>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            jobs: Arc::new(Vec::new()),
            pages_scraped: 0,
            message: None,
            field_errors: Vec::new(),
            error: None,
            analytics: AnalyticsCache::default(),
            next_ticket: 0,
            in_flight: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn jobs(&self) -> &Arc<Vec<JobRecord>> {
        &self.jobs
    }

    pub fn pages_scraped(&self) -> usize {
        self.pages_scraped
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn analytics(&mut self) -> Option<&AnalyticsSummary> {
        self.analytics.get(&self.jobs)
    }

    /// Validates the form and claims the request slot.
    ///
    /// Invalid input returns the session to `Idle` with the field errors kept
    /// for display. A second call while a request is outstanding is refused.
    pub fn begin(&mut self, job_title: &str, location: &str, pages: i64) -> Result<ScrapeTicket, ClientError> {
        if self.is_submitting() {
            return Err(ClientError::AlreadyInFlight("scrape".to_string()));
        }

        self.phase = Phase::Validating;
        self.field_errors.clear();
        self.error = None;

        let request = match validate_query(job_title, location, pages) {
            Ok(request) => request,
            Err(err) => {
                self.field_errors = err.field_errors().to_vec();
                self.phase = Phase::Idle;
                return Err(err);
            }
        };

        let id = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight = Some(id);
        self.phase = Phase::Submitting;
        Ok(ScrapeTicket { id, request })
    }

    /// Records the outcome of `ticket`'s request and releases the slot.
    pub fn finish(&mut self, ticket: ScrapeTicket, outcome: Result<ScrapeResult, ClientError>) -> Result<(), ClientError> {
        if self.in_flight != Some(ticket.id) {
            log::warn!("Ignoring result of stale scrape request #{}", ticket.id);
            return Ok(());
        }
        self.in_flight = None;

        match outcome {
            Ok(result) => {
                self.jobs = Arc::new(result.jobs);
                self.pages_scraped = result.pages_scraped;
                self.message = result.message;
                self.phase = Phase::Displaying;
                Ok(())
            }
            Err(err) => {
                self.jobs = Arc::new(Vec::new());
                self.pages_scraped = 0;
                self.message = None;
                self.error = Some(err.user_message());
                self.phase = Phase::ErrorDisplayed;
                Err(err)
            }
        }
    }

    /// Validate, send and record in one step.
    pub async fn submit(
        &mut self,
        client: &ApiClient,
        job_title: &str,
        location: &str,
        pages: i64,
    ) -> Result<(), ClientError> {
        let ticket = self.begin(job_title, location, pages)?;
        let outcome = client.scrape(&ticket.request).await;
        self.finish(ticket, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(titles: &[&str]) -> ScrapeResult {
        ScrapeResult {
            success: true,
            jobs: titles
                .iter()
                .map(|t| JobRecord::new(t, "Acme", "Remote", "N/A"))
                .collect(),
            total_jobs: titles.len(),
            pages_scraped: 1,
            message: Some("done".to_string()),
        }
    }

    #[test]
    fn test_invalid_form_returns_to_idle_with_field_errors() {
        let mut session = Session::new();
        let err = session.begin("Engineer", "", 15).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.field_errors()[0].field, "pages");
        assert!(!session.is_submitting());
    }

    #[test]
    fn test_success_moves_to_displaying() {
        let mut session = Session::new();
        let ticket = session.begin("Engineer", "Remote", 1).unwrap();
        assert_eq!(session.phase(), Phase::Submitting);

        session.finish(ticket, Ok(result_with(&["a", "b"]))).unwrap();
        assert_eq!(session.phase(), Phase::Displaying);
        assert_eq!(session.jobs().len(), 2);
        assert_eq!(session.message(), Some("done"));
        assert_eq!(session.analytics().map(|s| s.total_jobs), Some(2));
    }

    #[test]
    fn test_failure_moves_to_error_displayed() {
        let mut session = Session::new();
        let ticket = session.begin("Engineer", "Remote", 1).unwrap();
        let err = ClientError::Server {
            status: 500,
            detail: "Scraping failed".to_string(),
        };

        assert!(session.finish(ticket, Err(err)).is_err());
        assert_eq!(session.phase(), Phase::ErrorDisplayed);
        assert_eq!(session.error(), Some("Server error (500): Scraping failed"));
        assert!(session.jobs().is_empty());
        assert!(session.analytics().is_none());
        assert!(!session.is_submitting());
    }

    #[test]
    fn test_second_submission_while_in_flight_is_refused() {
        let mut session = Session::new();
        let ticket = session.begin("Engineer", "Remote", 1).unwrap();

        let err = session.begin("Analyst", "Remote", 1).unwrap_err();
        assert!(matches!(err, ClientError::AlreadyInFlight(_)));
        assert_eq!(session.phase(), Phase::Submitting);

        session.finish(ticket, Ok(result_with(&["a"]))).unwrap();
        assert!(session.begin("Analyst", "Remote", 1).is_ok());
    }

    #[test]
    fn test_resubmit_after_error_restarts_cycle() {
        let mut session = Session::new();
        let ticket = session.begin("Engineer", "", 1).unwrap();
        let _ = session.finish(
            ticket,
            Err(ClientError::Server {
                status: 502,
                detail: "Bad Gateway".to_string(),
            }),
        );

        let ticket = session.begin("Engineer", "", 1).unwrap();
        assert_eq!(session.error(), None);
        session.finish(ticket, Ok(result_with(&["a"]))).unwrap();
        assert_eq!(session.phase(), Phase::Displaying);
    }

    #[test]
    fn test_new_scrape_replaces_analytics() {
        let mut session = Session::new();
        let ticket = session.begin("Engineer", "", 1).unwrap();
        session.finish(ticket, Ok(result_with(&["a"]))).unwrap();
        assert_eq!(session.analytics().map(|s| s.total_jobs), Some(1));

        let ticket = session.begin("Engineer", "", 1).unwrap();
        session.finish(ticket, Ok(result_with(&["a", "b", "c"]))).unwrap();
        assert_eq!(session.analytics().map(|s| s.total_jobs), Some(3));
    }

    #[test]
    fn test_counts_come_from_jobs_not_reported_total() {
        let mut session = Session::new();
        let ticket = session.begin("Engineer", "", 1).unwrap();
        let result = ScrapeResult {
            total_jobs: 99,
            ..result_with(&["a", "b"])
        };
        session.finish(ticket, Ok(result)).unwrap();

        assert_eq!(session.jobs().len(), 2);
        assert_eq!(session.analytics().map(|s| s.total_jobs), Some(2));
    }

    #[tokio::test]
    async fn test_submit_never_sends_an_invalid_request() {
        let config = crate::config::Config {
            api_url: "http://127.0.0.1:9".to_string(),
            ..crate::config::Config::default()
        };
        let client = ApiClient::new(&config).unwrap();
        let mut session = Session::new();

        let err = session.submit(&client, "Engineer", "", 15).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(err.user_message().contains("between 1 and 10"));
    }
}
