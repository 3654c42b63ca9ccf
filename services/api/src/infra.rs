use async_trait::async_trait;
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use student_intake::config::IntakeConfig;
use student_intake::error::AppError;
use student_intake::workflows::intake::{
    ApplicationPayload, ApplicationReference, ApplicationSubmitter, CatalogError, HousingCatalog,
    HousingOption, HousingOptionId, HttpApplicationSubmitter, HttpHousingCatalog, StaticCatalog,
    SubmissionError,
};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_reference() -> ApplicationReference {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationReference(format!("APP-{}-{id:06}", Utc::now().format("%Y%m%d")))
}

/// Keeps accepted payloads in memory; used when no submission backend is configured.
#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationSubmitter {
    accepted: Arc<Mutex<Vec<(ApplicationReference, ApplicationPayload)>>>,
    failures_remaining: Arc<AtomicU32>,
}

impl InMemoryApplicationSubmitter {
    /// Reject the next `failures` submissions with a network error.
    pub(crate) fn failing_first(failures: u32) -> Self {
        let submitter = Self::default();
        submitter
            .failures_remaining
            .store(failures, Ordering::Relaxed);
        submitter
    }

    pub(crate) fn accepted(&self) -> Vec<(ApplicationReference, ApplicationPayload)> {
        self.accepted
            .lock()
            .expect("submission mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl ApplicationSubmitter for InMemoryApplicationSubmitter {
    async fn submit_application(
        &self,
        payload: &ApplicationPayload,
    ) -> Result<ApplicationReference, SubmissionError> {
        let simulated_outage = self
            .failures_remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if simulated_outage {
            return Err(SubmissionError::network(
                "submission backend unreachable (simulated)",
            ));
        }

        let reference = next_reference();
        self.accepted
            .lock()
            .expect("submission mutex poisoned")
            .push((reference.clone(), payload.clone()));
        Ok(reference)
    }
}

/// Catalog chosen at startup: the listing API when configured, otherwise the
/// bundled residences.
pub(crate) enum CatalogBackend {
    Remote(HttpHousingCatalog),
    Bundled(StaticCatalog),
}

impl CatalogBackend {
    pub(crate) fn from_config(config: &IntakeConfig) -> Self {
        match config.catalog_url.as_deref() {
            Some(url) => {
                info!(%url, page_size = config.catalog_page_size, "using remote housing catalog");
                Self::Remote(HttpHousingCatalog::new(url, config.catalog_page_size))
            }
            None => Self::Bundled(StaticCatalog::new(demo_housing_options())),
        }
    }
}

#[async_trait]
impl HousingCatalog for CatalogBackend {
    async fn list_housing_options(&self) -> Result<Vec<HousingOption>, CatalogError> {
        match self {
            Self::Remote(catalog) => catalog.list_housing_options().await,
            Self::Bundled(catalog) => catalog.list_housing_options().await,
        }
    }
}

pub(crate) enum SubmitterBackend {
    Remote(HttpApplicationSubmitter),
    InMemory(InMemoryApplicationSubmitter),
}

impl SubmitterBackend {
    pub(crate) fn from_config(config: &IntakeConfig) -> Result<Self, AppError> {
        match config.submit_url.as_deref() {
            Some(url) => {
                info!(
                    %url,
                    timeout_secs = config.submit_timeout.as_secs(),
                    "using remote submission backend"
                );
                let submitter = HttpApplicationSubmitter::new(url, config.submit_timeout)?;
                Ok(Self::Remote(submitter))
            }
            None => Ok(Self::InMemory(InMemoryApplicationSubmitter::default())),
        }
    }
}

#[async_trait]
impl ApplicationSubmitter for SubmitterBackend {
    async fn submit_application(
        &self,
        payload: &ApplicationPayload,
    ) -> Result<ApplicationReference, SubmissionError> {
        match self {
            Self::Remote(submitter) => submitter.submit_application(payload).await,
            Self::InMemory(submitter) => submitter.submit_application(payload).await,
        }
    }
}

pub(crate) fn demo_housing_options() -> Vec<HousingOption> {
    [
        (1, "Braamfontein Heights", "12 Jorissen St, Braamfontein", 3800, 5200, true),
        (2, "Auckland Park Lofts", "5 Kingsway Ave, Auckland Park", 4500, 6400, false),
        (3, "Hatfield Square", "1115 Burnett St, Hatfield", 5400, 7900, true),
        (4, "Rondebosch Commons", "22 Main Rd, Rondebosch", 6100, 8300, true),
        (5, "Stellenbosch Central", "9 Bird St, Stellenbosch", 5000, 7200, false),
    ]
    .into_iter()
    .map(
        |(id, name, address, price_min, price_max, nsfas_accredited)| HousingOption {
            id: HousingOptionId(id),
            name: name.to_string(),
            address: address.to_string(),
            price_min: Some(price_min),
            price_max: Some(price_max),
            nsfas_accredited,
        },
    )
    .collect()
}
