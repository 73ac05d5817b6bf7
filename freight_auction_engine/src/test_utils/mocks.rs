use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        RwLock,
    },
    time::Duration,
};

use fae_common::Money;

use crate::{
    db_types::{Bid, CargoCategory, CarrierId},
    fae_api::{
        errors::AuctionError,
        oracles::{
            ComplianceOracle,
            ComplianceRequest,
            ComplianceVerdict,
            MarketAssessment,
            MarketPriceOracle,
            OracleError,
            HIGH_RISK_THRESHOLD_PERCENT,
        },
    },
};

#[derive(Debug, Clone)]
enum MockResponse {
    Verdict(ComplianceVerdict),
    Fail(OracleError),
}

/// A compliance oracle with canned answers. Carriers without a configured answer get the default verdict.
#[derive(Debug, Clone)]
pub struct MockComplianceOracle {
    default: ComplianceVerdict,
    responses: Arc<RwLock<HashMap<CarrierId, MockResponse>>>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockComplianceOracle {
    fn default() -> Self {
        Self::new(ComplianceVerdict::allow(80.0))
    }
}

impl MockComplianceOracle {
    pub fn new(default: ComplianceVerdict) -> Self {
        Self { default, responses: Arc::new(RwLock::new(HashMap::new())), delay: None, calls: Arc::new(AtomicUsize::new(0)) }
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_verdict<C: Into<CarrierId>>(&self, carrier: C, verdict: ComplianceVerdict) {
        self.responses.write().unwrap().insert(carrier.into(), MockResponse::Verdict(verdict));
    }

    pub fn fail_for<C: Into<CarrierId>>(&self, carrier: C, error: OracleError) {
        self.responses.write().unwrap().insert(carrier.into(), MockResponse::Fail(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ComplianceOracle for MockComplianceOracle {
    async fn validate_bid(&self, request: &ComplianceRequest) -> Result<ComplianceVerdict, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let response = self.responses.read().unwrap().get(&request.carrier_id).cloned();
        match response {
            Some(MockResponse::Verdict(v)) => Ok(v),
            Some(MockResponse::Fail(e)) => Err(e),
            None => Ok(self.default.clone()),
        }
    }
}

/// A market oracle that compares every bid to a fixed median price.
#[derive(Debug, Clone, Copy)]
pub struct FixedMarketPrice(pub Money);

impl MarketPriceOracle for FixedMarketPrice {
    async fn assess(&self, bid: &Bid, _category: CargoCategory) -> Result<Option<MarketAssessment>, AuctionError> {
        Ok(Some(MarketAssessment::new(bid.amount, self.0, HIGH_RISK_THRESHOLD_PERCENT)))
    }
}
