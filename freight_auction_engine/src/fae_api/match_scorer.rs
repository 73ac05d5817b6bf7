//! Ranks bids for the shipper.
//!
//! A bid's match score is a weighted sum of four sub-scores, each clamped to `[0, 100]`:
//!
//! | Component | Weight | Source |
//! |-----------|--------|--------|
//! | Price     | 40%    | Deviation from the market median (or the order's maximum bid), less any market-risk penalty |
//! | Trust     | 30%    | The compliance oracle's trust score, discounted for compliance and clearance problems |
//! | Delivery  | 20%    | The carrier's completed / total orders |
//! | Geography | 10%    | Great-circle distance from the carrier's last known position to the pickup point |
//!
//! Scoring is a pure function of stored data, so scoring a bid again without new data writes the same breakdown.
use fae_common::Money;
use log::*;

use crate::{
    config::ScoringWeights,
    db::traits::{BidManagement, CarrierManagement, OrderManagement},
    db_types::{Bid, BidId, CarrierProfile, ComplianceSnapshot, ComplianceStatus, GeoPoint, ScoreBreakdown, SecurityLevel},
    fae_api::{
        errors::AuctionError,
        oracles::{decimal_to_f64, MarketAssessment, MarketPriceOracle},
    },
    helpers::{haversine_km, median},
};

pub const FULL_PRICE_SCORE_DEVIATION: f64 = 10.0;
pub const MAX_PRICE_PENALTY: f64 = 50.0;
pub const MAX_MARKET_RISK_PENALTY: f64 = 60.0;
pub const FULL_GEO_SCORE_KM: f64 = 50.0;
pub const MAX_GEO_PENALTY: f64 = 50.0;
pub const MIN_ORDERS_FOR_HISTORY: i64 = 5;
pub const NEUTRAL_SCORE: f64 = 50.0;

fn clamp(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceScore {
    pub score: f64,
    pub deviation_percent: f64,
    pub market_risk_penalty: f64,
}

/// Full marks within 10% of the reference price, then two points off per percent, down to 50. A market oracle
/// flagging the bid as a default risk takes up to 60 more points off.
pub fn price_score(amount: Money, reference: Money, market: Option<&MarketAssessment>) -> PriceScore {
    let deviation_percent = decimal_to_f64((amount - reference).abs().ratio_of(reference)) * 100.0;
    let mut score = if deviation_percent <= FULL_PRICE_SCORE_DEVIATION {
        100.0
    } else {
        100.0 - ((deviation_percent - FULL_PRICE_SCORE_DEVIATION) * 2.0).min(MAX_PRICE_PENALTY)
    };
    let mut market_risk_penalty = 0.0;
    if let Some(m) = market.filter(|m| m.is_high_risk && m.price_difference_percent < 0.0) {
        market_risk_penalty = (m.price_difference_percent.abs() * 2.0).min(MAX_MARKET_RISK_PENALTY);
        score -= market_risk_penalty;
    }
    PriceScore { score: clamp(score), deviation_percent, market_risk_penalty }
}

pub fn trust_score(snapshot: Option<&ComplianceSnapshot>) -> f64 {
    let Some(snapshot) = snapshot else {
        return 0.0;
    };
    let mut score = snapshot.trust_score;
    match snapshot.compliance_status {
        ComplianceStatus::NonCompliant => score *= 0.5,
        ComplianceStatus::Expired => score *= 0.7,
        _ => {},
    }
    match snapshot.security_level {
        SecurityLevel::None => score *= 0.8,
        SecurityLevel::Confidential => score *= 0.9,
        _ => {},
    }
    clamp(score)
}

pub fn delivery_score(profile: Option<&CarrierProfile>) -> f64 {
    match profile {
        Some(p) if p.total_orders >= MIN_ORDERS_FOR_HISTORY => {
            let rate = p.completed_orders as f64 / p.total_orders as f64 * 100.0;
            let bonus = if rate >= 95.0 { 10.0 } else { 0.0 };
            clamp(rate + bonus)
        },
        _ => NEUTRAL_SCORE,
    }
}

/// Returns the score and the distance it was based on, if both positions are known.
pub fn geo_score(pickup: Option<GeoPoint>, carrier: Option<GeoPoint>) -> (f64, Option<f64>) {
    let (Some(pickup), Some(carrier)) = (pickup, carrier) else {
        return (NEUTRAL_SCORE, None);
    };
    let distance = haversine_km(pickup, carrier);
    let score = if distance <= FULL_GEO_SCORE_KM {
        100.0
    } else {
        100.0 - ((distance - FULL_GEO_SCORE_KM) * 0.5).min(MAX_GEO_PENALTY)
    };
    (clamp(score), Some(distance))
}

/// Everything the score of one bid depends on.
#[derive(Debug, Clone)]
pub struct ScoringInputs {
    pub amount: Money,
    pub reference_price: Money,
    pub market: Option<MarketAssessment>,
    pub compliance: Option<ComplianceSnapshot>,
    pub profile: Option<CarrierProfile>,
    pub pickup: Option<GeoPoint>,
}

pub fn score(inputs: &ScoringInputs, weights: &ScoringWeights) -> ScoreBreakdown {
    let price = price_score(inputs.amount, inputs.reference_price, inputs.market.as_ref());
    let trust = trust_score(inputs.compliance.as_ref());
    let delivery = delivery_score(inputs.profile.as_ref());
    let (geo, distance_km) = geo_score(inputs.pickup, inputs.profile.as_ref().and_then(|p| p.last_position()));
    let total_score =
        price.score * weights.price + trust * weights.trust + delivery * weights.delivery + geo * weights.geo;
    ScoreBreakdown {
        price_score: price.score,
        trust_score: trust,
        delivery_score: delivery,
        geo_score: geo,
        total_score,
        reference_price: inputs.reference_price,
        price_deviation_percent: price.deviation_percent,
        market_risk_penalty: price.market_risk_penalty,
        distance_km,
    }
}

/// Loads the data a bid's score depends on, scores it and stores the result.
#[derive(Clone)]
pub struct MatchScorer<B, M> {
    db: B,
    market: M,
    weights: ScoringWeights,
}

impl<B, M> MatchScorer<B, M> {
    pub fn new(db: B, market: M, weights: ScoringWeights) -> Self {
        Self { db, market, weights }
    }
}

impl<B, M> MatchScorer<B, M>
where
    B: OrderManagement + BidManagement + CarrierManagement,
    M: MarketPriceOracle,
    AuctionError: From<B::Error>,
{
    pub async fn score_bid(&self, bid_id: BidId) -> Result<ScoreBreakdown, AuctionError> {
        let bid = self.db.fetch_bid(bid_id).await?.ok_or_else(|| AuctionError::NotFound(bid_id.to_string()))?;
        let inputs = self.gather_inputs(&bid).await?;
        Ok(score(&inputs, &self.weights))
    }

    /// Scores the bid and overwrites its stored score.
    pub async fn score_and_save(&self, bid_id: BidId) -> Result<ScoreBreakdown, AuctionError> {
        let breakdown = self.score_bid(bid_id).await?;
        self.db.save_score(bid_id, &breakdown).await?;
        debug!(
            "⚖️ {bid_id} scored {:.2} (price {:.1}, trust {:.1}, delivery {:.1}, geo {:.1})",
            breakdown.total_score,
            breakdown.price_score,
            breakdown.trust_score,
            breakdown.delivery_score,
            breakdown.geo_score
        );
        Ok(breakdown)
    }

    async fn gather_inputs(&self, bid: &Bid) -> Result<ScoringInputs, AuctionError> {
        let order = self
            .db
            .fetch_biddable_order(bid.order_ref)
            .await?
            .ok_or_else(|| AuctionError::NotFound(bid.order_ref.to_string()))?;
        let category = order.cargo_category();
        let comparable = self.db.fetch_comparable_bid_amounts(bid.order_ref.kind(), category, bid.id).await?;
        let reference_price = median(&comparable).unwrap_or_else(|| order.max_bid_amount());
        let market = match self.market.assess(bid, category).await {
            Ok(m) => m,
            Err(e) => {
                warn!("⚖️ Market price check for {} failed: {e}. Scoring without it.", bid.id);
                None
            },
        };
        let compliance = self.db.fetch_compliance_snapshot(bid.id).await?;
        let profile = self.db.fetch_carrier_profile(&bid.carrier_id).await?;
        Ok(ScoringInputs {
            amount: bid.amount,
            reference_price,
            market,
            compliance,
            profile,
            pickup: order.pickup_location(),
        })
    }
}
