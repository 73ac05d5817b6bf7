//! HTTP client for the remote compliance oracle.
//!
//! Every bid is POSTed to the oracle as a JSON [`ComplianceRequest`]. A 2xx response must carry a
//! [`ComplianceVerdict`]. Anything else (connection failures, error statuses, unreadable bodies) becomes an
//! [`OracleError`], which the engine treats as a refusal.
use std::{sync::Arc, time::Duration};

use fae_common::Secret;
use freight_auction_engine::{ComplianceOracle, ComplianceRequest, ComplianceVerdict, OracleError};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION},
    Client,
};

use crate::errors::ServerError;

#[derive(Clone)]
pub struct HttpComplianceOracle {
    client: Arc<Client>,
    url: String,
}

impl HttpComplianceOracle {
    /// `timeout` bounds the whole request. The engine applies its own deadline on top of this.
    pub fn new(url: &str, api_key: Option<&Secret<String>>, timeout: Duration) -> Result<Self, ServerError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let mut val = HeaderValue::from_str(&format!("Bearer {}", key.reveal()))
                .map_err(|e| ServerError::ConfigurationError(format!("Invalid compliance API key. {e}")))?;
            val.set_sensitive(true);
            headers.insert(AUTHORIZATION, val);
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::InitializeError(format!("Could not create the compliance client. {e}")))?;
        Ok(Self { client: Arc::new(client), url: url.to_string() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ComplianceOracle for HttpComplianceOracle {
    async fn validate_bid(&self, request: &ComplianceRequest) -> Result<ComplianceVerdict, OracleError> {
        trace!("🛂️ Asking {} about {} on {:?}", self.url, request.carrier_id, request.order_ref);
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| OracleError::Unreachable(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            let verdict =
                response.json::<ComplianceVerdict>().await.map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
            debug!("🛂️ Compliance verdict for {}: allowed={}", request.carrier_id, verdict.allowed);
            Ok(verdict)
        } else {
            let code = status.as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!("🛂️ The compliance oracle answered {code} for {}. {message}", request.carrier_id);
            Err(OracleError::ServiceError(format!("{code}: {message}")))
        }
    }
}
