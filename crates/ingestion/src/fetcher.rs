//! Fetching raw observation documents through cached clients.

use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use tracing::instrument;

use hydro_common::{HydroResult, ProtocolVersion};

use crate::cache::ClientCache;

/// A fetched observation document, tagged with the protocol version the
/// endpoint negotiated so the decoder can be selected without inspecting
/// the payload.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub data: Bytes,
    pub version: ProtocolVersion,
}

/// Fetches observation documents, resolving endpoints through the shared
/// client cache.
pub struct ObservationFetcher {
    clients: Arc<ClientCache>,
}

impl ObservationFetcher {
    pub fn new(clients: Arc<ClientCache>) -> Self {
        Self { clients }
    }

    /// Fetch the raw document for one site/variable over a date range.
    #[instrument(skip(self))]
    pub async fn fetch_raw_document(
        &self,
        endpoint: &str,
        site_code: &str,
        variable_code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> HydroResult<RawDocument> {
        let client = self.clients.get_client(endpoint).await?;
        let data = client
            .get_values(site_code, variable_code, start_date, end_date)
            .await?;

        Ok(RawDocument {
            data,
            version: client.version(),
        })
    }
}
