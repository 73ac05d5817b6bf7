//! External judges consulted while admitting and scoring bids.
//!
//! The [`ComplianceOracle`] decides whether a carrier may bid at all. Its verdict is authoritative: anything other
//! than `allowed` blocks the bid, and so does any failure to get a verdict. The [`MarketPriceOracle`] flags bids that
//! are suspiciously cheap compared to the market; the engine ships [`MedianPriceOracle`], which uses the bids it has
//! already seen as the market.
use fae_common::Money;
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db::traits::BidManagement,
    db_types::{Bid, CargoCategory, CarrierId, ComplianceStatus, GeoPoint, OrderRef, SecurityLevel},
    fae_api::errors::AuctionError,
    helpers::median,
};

pub const HIGH_RISK_THRESHOLD_PERCENT: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceRequest {
    pub carrier_id: CarrierId,
    pub order_ref: OrderRef,
    pub cargo_category: CargoCategory,
    pub amount: Money,
    pub pickup_latitude: Option<f64>,
    pub pickup_longitude: Option<f64>,
}

impl ComplianceRequest {
    pub fn new(
        carrier_id: CarrierId,
        order_ref: OrderRef,
        cargo_category: CargoCategory,
        amount: Money,
        pickup: Option<GeoPoint>,
    ) -> Self {
        Self {
            carrier_id,
            order_ref,
            cargo_category,
            amount,
            pickup_latitude: pickup.map(|p| p.latitude),
            pickup_longitude: pickup.map(|p| p.longitude),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceVerdict {
    pub allowed: bool,
    #[serde(default)]
    pub reason: Option<String>,
    /// The carrier's trust rating in `[0, 100]`.
    #[serde(default, alias = "riskScore")]
    pub trust_score: f64,
    #[serde(default)]
    pub compliance_status: ComplianceStatus,
    #[serde(default)]
    pub security_level: SecurityLevel,
    #[serde(default)]
    pub violations: Vec<String>,
    #[serde(default)]
    pub trust_token: Option<String>,
}

impl ComplianceVerdict {
    pub fn allow(trust_score: f64) -> Self {
        Self {
            allowed: true,
            reason: None,
            trust_score,
            compliance_status: ComplianceStatus::Compliant,
            security_level: SecurityLevel::None,
            violations: Vec::new(),
            trust_token: None,
        }
    }

    pub fn deny<S: Into<String>>(reason: S) -> Self {
        let reason = reason.into();
        Self {
            allowed: false,
            violations: vec![reason.clone()],
            reason: Some(reason),
            trust_score: 0.0,
            compliance_status: ComplianceStatus::NonCompliant,
            security_level: SecurityLevel::None,
            trust_token: None,
        }
    }

    pub fn with_security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    pub fn with_compliance_status(mut self, status: ComplianceStatus) -> Self {
        self.compliance_status = status;
        self
    }

    pub fn with_trust_token<S: Into<String>>(mut self, token: S) -> Self {
        self.trust_token = Some(token.into());
        self
    }

    /// A one-line explanation of a refusal.
    pub fn refusal_reason(&self) -> String {
        match (&self.reason, self.violations.is_empty()) {
            (Some(reason), _) => reason.clone(),
            (None, false) => self.violations.join("; "),
            (None, true) => "Compliance check failed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("Could not reach the compliance oracle: {0}")]
    Unreachable(String),
    #[error("The compliance oracle returned an error: {0}")]
    ServiceError(String),
    #[error("Could not understand the compliance oracle's response: {0}")]
    InvalidResponse(String),
}

impl From<OracleError> for AuctionError {
    fn from(e: OracleError) -> Self {
        AuctionError::ExternalServiceError(e.to_string())
    }
}

/// Decides whether a carrier may place a bid. Callers bound every call with a timeout.
#[allow(async_fn_in_trait)]
pub trait ComplianceOracle: Clone + Send + Sync + 'static {
    async fn validate_bid(&self, request: &ComplianceRequest) -> Result<ComplianceVerdict, OracleError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketAssessment {
    pub median_price: Money,
    /// Signed difference between the bid and the median, in percent of the median.
    pub price_difference_percent: f64,
    pub is_high_risk: bool,
}

impl MarketAssessment {
    pub fn new(amount: Money, median_price: Money, threshold_percent: f64) -> Self {
        let ratio = (amount - median_price).ratio_of(median_price);
        let price_difference_percent = decimal_to_f64(ratio) * 100.0;
        // Only cheap outliers are a default risk. Expensive bids are handled by the price score itself.
        let is_high_risk = price_difference_percent < -threshold_percent;
        Self { median_price, price_difference_percent, is_high_risk }
    }
}

/// Judges a bid's price against the market.
#[allow(async_fn_in_trait)]
pub trait MarketPriceOracle: Clone + Send + Sync + 'static {
    /// Returns `None` when there is no market data to compare against.
    async fn assess(&self, bid: &Bid, category: CargoCategory) -> Result<Option<MarketAssessment>, AuctionError>;
}

/// Uses the median of the other bids on comparable orders as the market price.
#[derive(Clone)]
pub struct MedianPriceOracle<B> {
    db: B,
    threshold_percent: f64,
}

impl<B> MedianPriceOracle<B> {
    pub fn new(db: B) -> Self {
        Self { db, threshold_percent: HIGH_RISK_THRESHOLD_PERCENT }
    }

    pub fn with_threshold(mut self, threshold_percent: f64) -> Self {
        self.threshold_percent = threshold_percent;
        self
    }
}

impl<B> MarketPriceOracle for MedianPriceOracle<B>
where
    B: BidManagement,
    AuctionError: From<B::Error>,
{
    async fn assess(&self, bid: &Bid, category: CargoCategory) -> Result<Option<MarketAssessment>, AuctionError> {
        let amounts = self.db.fetch_comparable_bid_amounts(bid.order_ref.kind(), category, bid.id).await?;
        let Some(median_price) = median(&amounts) else {
            trace!("⚖️ No market data for {category} bids. Skipping the market check for {}", bid.id);
            return Ok(None);
        };
        let assessment = MarketAssessment::new(bid.amount, median_price, self.threshold_percent);
        if assessment.is_high_risk {
            debug!(
                "⚖️ {} at {} is {:.1}% below the market median of {median_price}",
                bid.id, bid.amount, -assessment.price_difference_percent
            );
        }
        Ok(Some(assessment))
    }
}

/// A market oracle with no data. Every bid passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMarketData;

impl MarketPriceOracle for NoMarketData {
    async fn assess(&self, _bid: &Bid, _category: CargoCategory) -> Result<Option<MarketAssessment>, AuctionError> {
        Ok(None)
    }
}

pub(crate) fn decimal_to_f64(value: fae_common::Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cheap_bids_are_high_risk() {
        let a = MarketAssessment::new(Money::from(800), Money::from(1000), HIGH_RISK_THRESHOLD_PERCENT);
        assert!(a.is_high_risk);
        assert!((a.price_difference_percent + 20.0).abs() < 1e-9);
        let a = MarketAssessment::new(Money::from(1300), Money::from(1000), HIGH_RISK_THRESHOLD_PERCENT);
        assert!(!a.is_high_risk);
        let a = MarketAssessment::new(Money::from(900), Money::from(1000), HIGH_RISK_THRESHOLD_PERCENT);
        assert!(!a.is_high_risk);
    }

    #[test]
    fn verdict_parses_oracle_json() {
        let json = r#"{
            "allowed": false,
            "reason": "Sanctioned entity",
            "riskScore": 12.5,
            "complianceStatus": "NON_COMPLIANT",
            "securityLevel": "CONFIDENTIAL",
            "violations": ["OFAC match"]
        }"#;
        let verdict: ComplianceVerdict = serde_json::from_str(json).unwrap();
        assert!(!verdict.allowed);
        assert_eq!(verdict.trust_score, 12.5);
        assert_eq!(verdict.security_level, SecurityLevel::Confidential);
        assert_eq!(verdict.refusal_reason(), "Sanctioned entity");
        assert!(verdict.trust_token.is_none());

        let minimal: ComplianceVerdict = serde_json::from_str(r#"{"allowed": true}"#).unwrap();
        assert!(minimal.allowed);
        assert_eq!(minimal.compliance_status, ComplianceStatus::Compliant);
    }

    #[test]
    fn refusal_reason_falls_back_to_violations() {
        let mut verdict = ComplianceVerdict::deny("x");
        verdict.reason = None;
        verdict.violations = vec!["a".into(), "b".into()];
        assert_eq!(verdict.refusal_reason(), "a; b");
    }
}
