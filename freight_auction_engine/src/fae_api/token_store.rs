//! Trust tokens: short-lived credentials asserting that a carrier passed the compliance check for a bid.
//!
//! A token's lifetime scales with the carrier's trust score. Expired and revoked tokens are dropped by
//! [`TrustTokenStore::expire_sweep`], which the lifecycle sweep calls on every tick.
use std::{collections::HashMap, sync::Arc};

use blake2::{Blake2b512, Digest};
use chrono::{DateTime, Duration, Utc};
use log::*;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::db_types::{BidId, CarrierId, ComplianceStatus, OrderRef, SecurityLevel};

pub const TOKEN_PREFIX: &str = "TRUST_";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrustToken {
    pub token: String,
    pub carrier_id: CarrierId,
    pub order_ref: OrderRef,
    pub bid_id: BidId,
    pub compliance_status: ComplianceStatus,
    pub security_level: SecurityLevel,
    pub trust_score: f64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl TrustToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenValidity {
    Valid(TrustToken),
    Expired,
    /// Unknown or revoked.
    Invalid,
}

/// The details a token is issued for.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub carrier_id: CarrierId,
    pub order_ref: OrderRef,
    pub bid_id: BidId,
    pub compliance_status: ComplianceStatus,
    pub security_level: SecurityLevel,
    pub trust_score: f64,
}

#[derive(Clone)]
pub struct TrustTokenStore {
    tokens: Arc<RwLock<HashMap<String, TrustToken>>>,
    base_lifetime: Duration,
}

impl TrustTokenStore {
    pub fn new(base_lifetime: Duration) -> Self {
        Self { tokens: Arc::new(RwLock::new(HashMap::new())), base_lifetime }
    }

    /// High-trust carriers get 1.5x the base lifetime, low-trust carriers half of it.
    pub fn lifetime_for(&self, trust_score: f64) -> Duration {
        let base = self.base_lifetime.num_seconds();
        let seconds = if trust_score >= 70.0 {
            base * 3 / 2
        } else if trust_score >= 30.0 {
            base
        } else {
            base / 2
        };
        Duration::seconds(seconds)
    }

    /// Issues a fresh token for the grant.
    pub async fn issue(&self, grant: TokenGrant) -> TrustToken {
        let now = Utc::now();
        let expires_at = now + self.lifetime_for(grant.trust_score);
        let token = generate_token(&grant.carrier_id, expires_at);
        self.store(token, grant, now, expires_at).await
    }

    /// Registers a token that was issued elsewhere, such as by the compliance oracle.
    pub async fn adopt(&self, token: String, grant: TokenGrant) -> TrustToken {
        let now = Utc::now();
        let expires_at = now + self.lifetime_for(grant.trust_score);
        self.store(token, grant, now, expires_at).await
    }

    async fn store(&self, token: String, grant: TokenGrant, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> TrustToken {
        let record = TrustToken {
            token: token.clone(),
            carrier_id: grant.carrier_id,
            order_ref: grant.order_ref,
            bid_id: grant.bid_id,
            compliance_status: grant.compliance_status,
            security_level: grant.security_level,
            trust_score: grant.trust_score,
            issued_at: now,
            expires_at,
            revoked: false,
        };
        trace!("🔑️ Trust token for {} on {} valid until {expires_at}", record.carrier_id, record.order_ref);
        self.tokens.write().await.insert(token, record.clone());
        record
    }

    pub async fn validate(&self, token: &str) -> TokenValidity {
        let tokens = self.tokens.read().await;
        match tokens.get(token) {
            Some(t) if t.revoked => TokenValidity::Invalid,
            Some(t) if t.is_expired(Utc::now()) => TokenValidity::Expired,
            Some(t) => TokenValidity::Valid(t.clone()),
            None => TokenValidity::Invalid,
        }
    }

    /// Returns false if the token is unknown.
    pub async fn revoke(&self, token: &str) -> bool {
        match self.tokens.write().await.get_mut(token) {
            Some(t) => {
                t.revoked = true;
                debug!("🔑️ Revoked trust token for {}", t.carrier_id);
                true
            },
            None => false,
        }
    }

    pub async fn revoke_all_for_carrier(&self, carrier_id: &CarrierId) -> usize {
        let mut tokens = self.tokens.write().await;
        let mut count = 0;
        for t in tokens.values_mut().filter(|t| &t.carrier_id == carrier_id && !t.revoked) {
            t.revoked = true;
            count += 1;
        }
        if count > 0 {
            info!("🔑️ Revoked {count} trust tokens for {carrier_id}");
        }
        count
    }

    pub async fn active_tokens_for_carrier(&self, carrier_id: &CarrierId) -> Vec<TrustToken> {
        let now = Utc::now();
        self.tokens
            .read()
            .await
            .values()
            .filter(|t| &t.carrier_id == carrier_id && !t.revoked && !t.is_expired(now))
            .cloned()
            .collect()
    }

    /// Drops expired and revoked tokens. Returns the number removed.
    pub async fn expire_sweep(&self, now: DateTime<Utc>) -> usize {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| !t.revoked && !t.is_expired(now));
        let removed = before - tokens.len();
        if removed > 0 {
            debug!("🔑️ Dropped {removed} expired or revoked trust tokens");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }
}

impl Default for TrustTokenStore {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}

fn generate_token(carrier_id: &CarrierId, expires_at: DateTime<Utc>) -> String {
    let nonce: [u8; 32] = rand::random();
    let mut hasher = Blake2b512::new();
    hasher.update(nonce);
    hasher.update(carrier_id.as_str().as_bytes());
    hasher.update(expires_at.timestamp_millis().to_le_bytes());
    let digest = hasher.finalize();
    let hex = digest[..32].iter().map(|b| format!("{b:02x}")).collect::<String>();
    format!("{TOKEN_PREFIX}{hex}")
}
