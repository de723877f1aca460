//! Cache of protocol clients keyed by service endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::debug;

use hydro_common::HydroResult;

use crate::client::WaterOneFlowClient;

type ClientCell = Arc<OnceCell<Arc<WaterOneFlowClient>>>;

/// Lookup-or-insert-once cache of endpoint clients.
///
/// The mutex guards only the map; per-endpoint construction (which probes
/// the remote service for its version) runs inside a `OnceCell`, so one
/// construction is in flight per endpoint and the lock is never held
/// across a network call. A failed construction leaves the cell empty so
/// a later request can retry; the cache never holds two live clients for
/// one endpoint.
pub struct ClientCache {
    http: reqwest::Client,
    clients: Mutex<HashMap<String, ClientCell>>,
}

impl ClientCache {
    pub fn new(request_timeout: Duration) -> HydroResult<Self> {
        Ok(Self {
            http: WaterOneFlowClient::build_http(request_timeout)?,
            clients: Mutex::new(HashMap::new()),
        })
    }

    /// Return the cached client for the endpoint, constructing it on
    /// first use. Concurrent callers for the same new endpoint share one
    /// construction and receive the same instance.
    pub async fn get_client(&self, endpoint: &str) -> HydroResult<Arc<WaterOneFlowClient>> {
        let cell = {
            let mut clients = self.clients.lock().unwrap();
            clients.entry(endpoint.to_string()).or_default().clone()
        };

        let client = cell
            .get_or_try_init(|| async {
                debug!(endpoint = %endpoint, "Constructing service client");
                WaterOneFlowClient::connect(self.http.clone(), endpoint)
                    .await
                    .map(Arc::new)
            })
            .await?;

        Ok(client.clone())
    }

    /// Number of endpoints with a live cached client.
    pub fn len(&self) -> usize {
        self.clients
            .lock()
            .unwrap()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
