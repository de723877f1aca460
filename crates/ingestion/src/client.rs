//! HTTP client for one observation exchange endpoint.

use std::time::Duration;

use bytes::Bytes;
use chrono::NaiveDate;
use reqwest::Client;
use tracing::{debug, instrument};

use hydro_common::{HydroError, HydroResult, ProtocolVersion};

/// Client bound to a single service endpoint.
///
/// Construction negotiates the protocol version once; every document
/// fetched through this client is decoded with that version.
pub struct WaterOneFlowClient {
    http: Client,
    endpoint: String,
    version: ProtocolVersion,
}

impl WaterOneFlowClient {
    /// Build the shared HTTP client. The timeout is a caller-supplied
    /// configuration value; no request runs unbounded.
    pub fn build_http(request_timeout: Duration) -> HydroResult<Client> {
        Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| HydroError::fetch("failed to create HTTP client", e))
    }

    /// Connect to an endpoint, probing the service for its protocol
    /// version. Transport failures wrap into [`HydroError::Fetch`]; a
    /// version outside the supported family is
    /// [`HydroError::UnsupportedVersion`].
    #[instrument(skip(http))]
    pub async fn connect(http: Client, endpoint: &str) -> HydroResult<Self> {
        let response = http
            .get(endpoint)
            .query(&[("request", "GetVersion")])
            .send()
            .await
            .map_err(|e| HydroError::fetch(format!("version probe for {}", endpoint), e))?;

        if !response.status().is_success() {
            return Err(HydroError::fetch(
                format!("version probe for {}", endpoint),
                anyhow::anyhow!("HTTP status {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| HydroError::fetch(format!("version probe for {}", endpoint), e))?;
        let version = ProtocolVersion::parse(&body)?;

        debug!(endpoint = %endpoint, version = %version, "Negotiated service version");

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            version,
        })
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Fetch the raw observation document for one site/variable/range.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn get_values(
        &self,
        site_code: &str,
        variable_code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> HydroResult<Bytes> {
        let context = format!(
            "GetValues {}:{} from {}",
            site_code, variable_code, self.endpoint
        );

        let start = start_date.format("%Y-%m-%d").to_string();
        let end = end_date.format("%Y-%m-%d").to_string();

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("request", "GetValues"),
                ("site", site_code),
                ("variable", variable_code),
                ("startDate", start.as_str()),
                ("endDate", end.as_str()),
            ])
            .send()
            .await
            .map_err(|e| HydroError::fetch(context.clone(), e))?;

        if !response.status().is_success() {
            return Err(HydroError::fetch(
                context,
                anyhow::anyhow!("HTTP status {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HydroError::fetch(context, e))?;

        debug!(size = bytes.len(), site = %site_code, variable = %variable_code, "Fetched document");
        Ok(bytes)
    }
}
