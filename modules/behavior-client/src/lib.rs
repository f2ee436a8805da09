pub mod error;
pub mod types;

pub use error::{CollectorError, Result};
pub use types::{EventType, IssuedVisitor, LogRecord, TriggerCondition, VisitorRecord};

use reqwest::{Method, RequestBuilder, Response, Url};
use types::EmailSubmission;

/// Header carrying the normalized page origin + path for backend-side scoping.
pub const DOMAIN_HEADER: &str = "X-Domain";

/// Client for the collection backend's `/api` surface.
///
/// No timeout is configured; requests inherit the network stack's defaults.
#[derive(Debug, Clone)]
pub struct CollectorClient {
    client: reqwest::Client,
    base_url: Url,
    domain: Option<String>,
}

impl CollectorClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let trimmed = base_url.trim_end_matches('/');
        let base_url =
            Url::parse(trimmed).map_err(|e| CollectorError::InvalidUrl(format!("{trimmed}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CollectorError::InvalidUrl(trimmed.to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            domain: None,
        })
    }

    /// Attach the `X-Domain` header to every request.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issue a new visitor identity for the project.
    pub async fn issue_visitor(&self, project_key: &str) -> Result<IssuedVisitor> {
        let mut url = self.endpoint(&["api", "visitors"])?;
        url.query_pairs_mut().append_pair("projectId", project_key);

        let resp = self.request(Method::POST, url).send().await?;
        let resp = ensure_success(resp).await?;

        let issued: IssuedVisitor = resp.json().await?;
        tracing::debug!(visitor_id = %issued.id, "Visitor issued");
        Ok(issued)
    }

    /// Fetch the trigger conditions authored for the project.
    pub async fn conditions(&self, project_key: &str) -> Result<Vec<TriggerCondition>> {
        let url = self.endpoint(&["api", "conditions", project_key])?;

        let resp = self
            .request(Method::GET, url)
            .header("Content-Type", "application/json")
            .send()
            .await?;
        let resp = ensure_success(resp).await?;

        let conditions: Vec<TriggerCondition> = resp.json().await?;
        tracing::debug!(count = conditions.len(), "Fetched trigger conditions");
        Ok(conditions)
    }

    /// Send one matched event. The response body is never read.
    pub async fn send_log(&self, log: &LogRecord) -> Result<()> {
        let mut url = self.endpoint(&["api", "logs"])?;
        url.query_pairs_mut()
            .append_pair("projectId", &log.project_id)
            .append_pair("visitorId", &log.visitor_id);

        let resp = self.request(Method::POST, url).json(log).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }

    /// Look up a visitor record (used to check whether an email is known).
    pub async fn visitor(&self, visitor_id: &str) -> Result<VisitorRecord> {
        let url = self.endpoint(&["api", "visitors", visitor_id])?;

        let resp = self.request(Method::GET, url).send().await?;
        let resp = ensure_success(resp).await?;

        Ok(resp.json().await?)
    }

    /// Associate an email address with a visitor.
    pub async fn submit_email(&self, visitor_id: &str, email: &str) -> Result<()> {
        let url = self.endpoint(&["api", "visitors", visitor_id, "email"])?;

        let resp = self
            .request(Method::POST, url)
            .json(&EmailSubmission { email })
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CollectorError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match self.domain {
            Some(ref domain) => builder.header(DOMAIN_HEADER, domain),
            None => builder,
        }
    }
}

async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(CollectorError::Api {
        status: status.as_u16(),
        message,
    })
}
