use async_trait::async_trait;
use tracing::warn;

use super::domain::HousingOption;

/// Read-only source of residences an applicant can choose from.
#[async_trait]
pub trait HousingCatalog: Send + Sync {
    async fn list_housing_options(&self) -> Result<Vec<HousingOption>, CatalogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unreachable: {0}")]
    Unavailable(String),
    #[error("catalog responded with status {status}")]
    Status { status: u16 },
    #[error("catalog payload could not be decoded: {0}")]
    Decode(String),
}

/// Fetch the selectable residences, degrading any failure to an empty list so
/// the housing stage still renders.
pub async fn load_housing_options<C>(catalog: &C) -> Vec<HousingOption>
where
    C: HousingCatalog + ?Sized,
{
    match catalog.list_housing_options().await {
        Ok(options) => options,
        Err(error) => {
            warn!(%error, "housing catalog unavailable; continuing with no options");
            Vec::new()
        }
    }
}

/// Fixed catalog used by demos, tests, and deployments without a catalog URL.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    options: Vec<HousingOption>,
}

impl StaticCatalog {
    pub fn new(options: Vec<HousingOption>) -> Self {
        Self { options }
    }
}

#[async_trait]
impl HousingCatalog for StaticCatalog {
    async fn list_housing_options(&self) -> Result<Vec<HousingOption>, CatalogError> {
        Ok(self.options.clone())
    }
}
