use anyhow::{Context, Result};
use tracing::debug;

use mealprep_core::models::{LookupCandidate, NutritionDetails};
use mealprep_core::openfoodfacts::{SearchResponse, product_to_candidate, product_to_details};
use mealprep_core::service::NutritionLookup;

const SEARCH_URL: &str = "https://world.openfoodfacts.org/cgi/search.pl";

pub struct OpenFoodFactsClient {
    client: reqwest::Client,
    rt: tokio::runtime::Handle,
}

impl OpenFoodFactsClient {
    pub fn new(rt: tokio::runtime::Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "mealprep-cli/{} (meal planner)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, rt })
    }

    async fn search_products(&self, text: &str, page_size: u32) -> Result<SearchResponse> {
        debug!(text, page_size, "searching OpenFoodFacts");
        let page_size = page_size.to_string();
        let resp = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("search_terms", text),
                ("search_simple", "1"),
                ("json", "1"),
                ("page_size", page_size.as_str()),
                ("fields", "product_name,brands,nutriments"),
            ])
            .send()
            .await
            .context("Failed to reach OpenFoodFacts API")?
            .error_for_status()
            .context("OpenFoodFacts API returned an error")?;

        let data: SearchResponse = resp
            .json()
            .await
            .context("Failed to parse OpenFoodFacts search response")?;
        debug!(products = data.products.len(), "OpenFoodFacts search finished");
        Ok(data)
    }

    pub async fn search_async(&self, text: &str) -> Result<Vec<LookupCandidate>> {
        let data = self.search_products(text, 10).await?;
        Ok(data
            .products
            .iter()
            .filter_map(product_to_candidate)
            .collect())
    }

    /// Per-100 g macros of the best match that carries nutrition data.
    pub async fn fetch_details_async(&self, text: &str) -> Result<Option<NutritionDetails>> {
        let data = self.search_products(text, 5).await?;
        Ok(data.products.iter().find_map(product_to_details))
    }
}

impl NutritionLookup for OpenFoodFactsClient {
    fn search_by_name(&self, text: &str) -> Result<Vec<LookupCandidate>> {
        self.rt.block_on(self.search_async(text))
    }

    fn fetch_details_by_name(&self, text: &str) -> Result<Option<NutritionDetails>> {
        self.rt.block_on(self.fetch_details_async(text))
    }
}
