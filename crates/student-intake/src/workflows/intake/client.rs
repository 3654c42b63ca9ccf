use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::catalog::{CatalogError, HousingCatalog};
use super::domain::{ApplicationReference, HousingOption};
use super::submission::{ApplicationPayload, ApplicationSubmitter, SubmissionError};

#[derive(Debug, Deserialize)]
struct PropertiesPage {
    #[serde(default)]
    properties: Vec<HousingOption>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    reference_id: String,
}

fn trim_base(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Property catalog reached over the listing API (`GET /api/properties`).
#[derive(Debug, Clone)]
pub struct HttpHousingCatalog {
    http: Client,
    base_url: String,
    page_size: u32,
}

impl HttpHousingCatalog {
    pub fn new(base_url: &str, page_size: u32) -> Self {
        Self::with_client(Client::new(), base_url, page_size)
    }

    pub fn with_client(http: Client, base_url: &str, page_size: u32) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
            page_size: page_size.max(1),
        }
    }
}

#[async_trait]
impl HousingCatalog for HttpHousingCatalog {
    async fn list_housing_options(&self) -> Result<Vec<HousingOption>, CatalogError> {
        let response = self
            .http
            .get(format!("{}/api/properties", self.base_url))
            .query(&[("per_page", self.page_size)])
            .send()
            .await
            .map_err(|err| CatalogError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
            });
        }

        let page: PropertiesPage = response
            .json()
            .await
            .map_err(|err| CatalogError::Decode(err.to_string()))?;
        Ok(page.properties)
    }
}

/// Submission backend reached over HTTP (`POST /api/applications`).
#[derive(Debug, Clone)]
pub struct HttpApplicationSubmitter {
    http: Client,
    base_url: String,
}

impl HttpApplicationSubmitter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: trim_base(base_url),
        }
    }
}

fn classify_status(status: StatusCode, body: String) -> SubmissionError {
    let message = if body.trim().is_empty() {
        format!("backend responded with {status}")
    } else {
        format!("backend responded with {status}: {}", body.trim())
    };

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            SubmissionError::validation(message)
        }
        status if status.is_server_error() => SubmissionError::server(message),
        _ => SubmissionError::unknown(message),
    }
}

#[async_trait]
impl ApplicationSubmitter for HttpApplicationSubmitter {
    async fn submit_application(
        &self,
        payload: &ApplicationPayload,
    ) -> Result<ApplicationReference, SubmissionError> {
        let response = self
            .http
            .post(format!("{}/api/applications", self.base_url))
            .json(payload)
            .send()
            .await
            .map_err(|err| SubmissionError::network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|err| SubmissionError::unknown(format!("unreadable reference: {err}")))?;
        Ok(ApplicationReference(body.reference_id))
    }
}
