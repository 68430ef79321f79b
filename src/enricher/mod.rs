// Per-container detail enrichment with bounded, order-preserving fan-out

mod inspect;

use crate::config::Features;
use crate::fetcher::{FetchError, InventoryFetcher, with_timeout};
use crate::models::Container;
use futures_util::StreamExt;
use futures_util::stream;
use std::time::Duration;

/// Result of enriching one container; on failure the un-enriched record comes back with the error.
pub type EnrichOutcome = Result<Container, (Container, FetchError)>;

pub struct DetailEnricher<'a> {
    fetcher: &'a dyn InventoryFetcher,
    features: Features,
    timeout: Duration,
    concurrency: usize,
}

impl<'a> DetailEnricher<'a> {
    pub fn new(
        fetcher: &'a dyn InventoryFetcher,
        features: Features,
        timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            features,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// One detail fetch, then merge of the derived fields.
    pub async fn enrich(&self, mut container: Container) -> EnrichOutcome {
        let detail = with_timeout(
            self.timeout,
            self.fetcher
                .container_detail(container.endpoint_id, &container.id),
        )
        .await;
        match detail {
            Ok(detail) => {
                inspect::apply_detail(&mut container, &detail, self.features);
                Ok(container)
            }
            Err(e) => Err((container, e)),
        }
    }

    /// Enriches every container, at most `concurrency` fetches in flight. Outcomes
    /// come back in input order and one failure never affects the others.
    pub async fn enrich_all(&self, containers: Vec<Container>) -> Vec<EnrichOutcome> {
        stream::iter(containers)
            .map(|c| self.enrich(c))
            .buffered(self.concurrency)
            .collect()
            .await
    }
}
