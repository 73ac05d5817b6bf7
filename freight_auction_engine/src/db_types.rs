use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use fae_common::{Fraction, Money, Percentage, Volume, Weight};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// Declares a string-valued enum whose labels are shared by `Display`, `FromStr`, serde and the database encoding.
macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $label)]
                #[sqlx(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    s => Err(ConversionError::new(stringify!($name), s)),
                }
            }
        }
    };
}

//--------------------------------------     Identifiers     ---------------------------------------------------------
macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Type)]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", $prefix, self.0)
            }
        }
    };
}

numeric_id!(FreightOrderId, "freight");
numeric_id!(MasterOrderId, "master");
numeric_id!(PartialOrderId, "lot");
numeric_id!(BidId, "bid");

/// The identity of a carrier, as issued by the identity subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct CarrierId(pub String);

impl Display for CarrierId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for CarrierId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl CarrierId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ShipperId(pub String);

impl Display for ShipperId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for ShipperId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

//--------------------------------------     Enumerations     --------------------------------------------------------
labelled_enum!(CargoCategory {
    General => "GENERAL",
    Perishable => "PERISHABLE",
    Dangerous => "DANGEROUS",
    Refrigerated => "REFRIGERATED",
    Bulk => "BULK",
    Container => "CONTAINER",
    Oversized => "OVERSIZED",
});

labelled_enum!(MasterOrderStatus {
    /// No lot has been bid on or awarded yet.
    Open => "OPEN",
    PartiallyFilled => "PARTIALLY_FILLED",
    /// Every lot is awarded and together they cover the whole load.
    Filled => "FILLED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

impl MasterOrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

labelled_enum!(PartialOrderStatus {
    Available => "AVAILABLE",
    /// At least one pending bid is held against the lot.
    Bidding => "BIDDING",
    Awarded => "AWARDED",
    InProgress => "IN_PROGRESS",
    Delivered => "DELIVERED",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

impl PartialOrderStatus {
    /// Awarded or any later delivery state.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Awarded | Self::InProgress | Self::Delivered | Self::Completed)
    }

    /// True for the states that count towards the 100% allocation ceiling of the master order.
    pub fn is_allocated(&self) -> bool {
        *self == Self::Bidding || self.is_committed()
    }

    pub fn is_open_for_bids(&self) -> bool {
        matches!(self, Self::Available | Self::Bidding)
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered | Self::Completed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Completed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: PartialOrderStatus) -> bool {
        use PartialOrderStatus::*;
        matches!(
            (self, next),
            (Available, Bidding | Awarded | Cancelled) |
                (Bidding, Available | Awarded | Cancelled) |
                (Awarded, InProgress | Cancelled) |
                (InProgress, Delivered) |
                (Delivered, Completed)
        )
    }
}

labelled_enum!(FreightOrderStatus {
    Open => "OPEN",
    AuctionActive => "AUCTION_ACTIVE",
    Awarded => "AWARDED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

impl FreightOrderStatus {
    pub fn is_open_for_bids(&self) -> bool {
        matches!(self, Self::Open | Self::AuctionActive)
    }
}

labelled_enum!(BidStatus {
    Pending => "PENDING",
    Accepted => "ACCEPTED",
    Rejected => "REJECTED",
    Committed => "COMMITTED",
    InProgress => "IN_PROGRESS",
    Delivered => "DELIVERED",
});

impl BidStatus {
    /// Statuses whose weight counts as the carrier's active load.
    pub const ACTIVE: [BidStatus; 3] = [BidStatus::Accepted, BidStatus::Committed, BidStatus::InProgress];

    pub fn is_active_load(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// True if the bid occupies quota, either as pending or active load.
    pub fn holds_quota(&self) -> bool {
        *self == Self::Pending || self.is_active_load()
    }

    pub fn can_transition_to(&self, next: BidStatus) -> bool {
        use BidStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted | Rejected | Committed | InProgress) |
                (Accepted, Committed | InProgress) |
                (Committed, InProgress) |
                (InProgress, Delivered)
        )
    }
}

labelled_enum!(ComplianceStatus {
    Compliant => "COMPLIANT",
    NonCompliant => "NON_COMPLIANT",
    Pending => "PENDING",
    Expired => "EXPIRED",
});

impl Default for ComplianceStatus {
    fn default() -> Self {
        Self::Compliant
    }
}

labelled_enum!(SecurityLevel {
    None => "NONE",
    Confidential => "CONFIDENTIAL",
    Secret => "SECRET",
    TopSecret => "TOP_SECRET",
    Restricted => "RESTRICTED",
});

impl Default for SecurityLevel {
    fn default() -> Self {
        Self::None
    }
}

//--------------------------------------       GeoPoint       --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub(crate) fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self { latitude, longitude }),
            _ => None,
        }
    }
}

//--------------------------------------      MasterOrder      -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct MasterOrder {
    pub id: MasterOrderId,
    pub shipper_id: ShipperId,
    pub total_weight: Weight,
    pub total_volume: Volume,
    pub remaining_weight: Weight,
    pub remaining_volume: Volume,
    /// Doubles as the auction close marker. Anti-sniping extensions push it forward.
    pub required_delivery_date: DateTime<Utc>,
    pub max_bid_amount: Money,
    pub cargo_category: CargoCategory,
    pub ltl_enabled: bool,
    pub min_load_fraction: Fraction,
    pub pickup_latitude: Option<f64>,
    pub pickup_longitude: Option<f64>,
    pub extension_count: i64,
    pub status: MasterOrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MasterOrder {
    pub fn pickup_location(&self) -> Option<GeoPoint> {
        GeoPoint::from_parts(self.pickup_latitude, self.pickup_longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMasterOrder {
    pub shipper_id: ShipperId,
    pub total_weight: Weight,
    pub total_volume: Volume,
    pub required_delivery_date: DateTime<Utc>,
    pub max_bid_amount: Money,
    pub cargo_category: CargoCategory,
    pub ltl_enabled: bool,
    pub min_load_fraction: Fraction,
    pub pickup: Option<GeoPoint>,
    /// Overrides the configured lot size used when the order is split at creation time.
    pub partial_order_size: Option<Weight>,
}

impl NewMasterOrder {
    pub fn new(
        shipper_id: ShipperId,
        total_weight: Weight,
        total_volume: Volume,
        required_delivery_date: DateTime<Utc>,
        max_bid_amount: Money,
    ) -> Self {
        Self {
            shipper_id,
            total_weight,
            total_volume,
            required_delivery_date,
            max_bid_amount,
            cargo_category: CargoCategory::General,
            ltl_enabled: false,
            min_load_fraction: Fraction::new(rust_decimal::Decimal::new(8, 1)),
            pickup: None,
            partial_order_size: None,
        }
    }

    pub fn with_ltl(mut self, partial_order_size: Option<Weight>) -> Self {
        self.ltl_enabled = true;
        self.partial_order_size = partial_order_size;
        self
    }

    pub fn with_category(mut self, category: CargoCategory) -> Self {
        self.cargo_category = category;
        self
    }

    pub fn with_min_load_fraction(mut self, fraction: Fraction) -> Self {
        self.min_load_fraction = fraction;
        self
    }

    pub fn with_pickup(mut self, pickup: GeoPoint) -> Self {
        self.pickup = Some(pickup);
        self
    }
}

//--------------------------------------     PartialOrder      -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct PartialOrder {
    pub id: PartialOrderId,
    pub master_order_id: MasterOrderId,
    pub weight: Weight,
    pub volume: Volume,
    /// Share of the master order's original total weight.
    pub percentage: Percentage,
    pub assigned_carrier_id: Option<CarrierId>,
    pub assigned_bid_id: Option<BidId>,
    pub status: PartialOrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A request to carve a new lot out of a master order's remaining capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPartialOrder {
    pub weight: Weight,
    pub volume: Volume,
    pub percentage: Percentage,
    pub carrier_id: Option<CarrierId>,
}

impl NewPartialOrder {
    pub fn new(weight: Weight, volume: Volume, percentage: Percentage) -> Self {
        Self { weight, volume, percentage, carrier_id: None }
    }

    pub fn for_carrier(mut self, carrier_id: CarrierId) -> Self {
        self.carrier_id = Some(carrier_id);
        self
    }
}

//--------------------------------------     FreightOrder      -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct FreightOrder {
    pub id: FreightOrderId,
    pub shipper_id: ShipperId,
    pub weight: Weight,
    pub volume: Volume,
    pub required_delivery_date: DateTime<Utc>,
    pub max_bid_amount: Money,
    pub cargo_category: CargoCategory,
    pub pickup_latitude: Option<f64>,
    pub pickup_longitude: Option<f64>,
    pub extension_count: i64,
    pub awarded_bid_id: Option<BidId>,
    pub status: FreightOrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FreightOrder {
    pub fn pickup_location(&self) -> Option<GeoPoint> {
        GeoPoint::from_parts(self.pickup_latitude, self.pickup_longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFreightOrder {
    pub shipper_id: ShipperId,
    pub weight: Weight,
    pub volume: Volume,
    pub required_delivery_date: DateTime<Utc>,
    pub max_bid_amount: Money,
    pub cargo_category: CargoCategory,
    pub pickup: Option<GeoPoint>,
}

impl NewFreightOrder {
    pub fn new(
        shipper_id: ShipperId,
        weight: Weight,
        volume: Volume,
        required_delivery_date: DateTime<Utc>,
        max_bid_amount: Money,
    ) -> Self {
        Self {
            shipper_id,
            weight,
            volume,
            required_delivery_date,
            max_bid_amount,
            cargo_category: CargoCategory::General,
            pickup: None,
        }
    }

    pub fn with_category(mut self, category: CargoCategory) -> Self {
        self.cargo_category = category;
        self
    }

    pub fn with_pickup(mut self, pickup: GeoPoint) -> Self {
        self.pickup = Some(pickup);
        self
    }
}

//--------------------------------------       OrderRef        -------------------------------------------------------
/// The order a bid is placed against. Exactly one kind of order is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OrderRef {
    FreightOrder(FreightOrderId),
    MasterOrder(MasterOrderId),
    PartialOrder(PartialOrderId),
}

impl OrderRef {
    pub fn kind(&self) -> OrderKind {
        match self {
            OrderRef::FreightOrder(_) => OrderKind::Freight,
            OrderRef::MasterOrder(_) => OrderKind::Master,
            OrderRef::PartialOrder(_) => OrderKind::Partial,
        }
    }

    pub fn freight_order_id(&self) -> Option<FreightOrderId> {
        match self {
            OrderRef::FreightOrder(id) => Some(*id),
            _ => None,
        }
    }

    pub fn master_order_id(&self) -> Option<MasterOrderId> {
        match self {
            OrderRef::MasterOrder(id) => Some(*id),
            _ => None,
        }
    }

    pub fn partial_order_id(&self) -> Option<PartialOrderId> {
        match self {
            OrderRef::PartialOrder(id) => Some(*id),
            _ => None,
        }
    }

    /// Rebuilds a reference from three nullable columns. Returns `None` unless exactly one is set.
    pub fn from_columns(
        freight: Option<FreightOrderId>,
        master: Option<MasterOrderId>,
        partial: Option<PartialOrderId>,
    ) -> Option<Self> {
        match (freight, master, partial) {
            (Some(id), None, None) => Some(Self::FreightOrder(id)),
            (None, Some(id), None) => Some(Self::MasterOrder(id)),
            (None, None, Some(id)) => Some(Self::PartialOrder(id)),
            _ => None,
        }
    }
}

impl Display for OrderRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderRef::FreightOrder(id) => write!(f, "{id}"),
            OrderRef::MasterOrder(id) => write!(f, "{id}"),
            OrderRef::PartialOrder(id) => write!(f, "{id}"),
        }
    }
}

impl From<FreightOrderId> for OrderRef {
    fn from(id: FreightOrderId) -> Self {
        Self::FreightOrder(id)
    }
}

impl From<MasterOrderId> for OrderRef {
    fn from(id: MasterOrderId) -> Self {
        Self::MasterOrder(id)
    }
}

impl From<PartialOrderId> for OrderRef {
    fn from(id: PartialOrderId) -> Self {
        Self::PartialOrder(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Freight,
    Master,
    Partial,
}

/// A loaded order that can receive bids. A lot carries its master order, because the auction clock and the pricing
/// terms belong to the master.
#[derive(Debug, Clone, PartialEq)]
pub enum BiddableOrder {
    Freight(FreightOrder),
    Master(MasterOrder),
    Partial { lot: PartialOrder, master: MasterOrder },
}

impl BiddableOrder {
    pub fn order_ref(&self) -> OrderRef {
        match self {
            BiddableOrder::Freight(o) => OrderRef::FreightOrder(o.id),
            BiddableOrder::Master(o) => OrderRef::MasterOrder(o.id),
            BiddableOrder::Partial { lot, .. } => OrderRef::PartialOrder(lot.id),
        }
    }

    pub fn max_bid_amount(&self) -> Money {
        match self {
            BiddableOrder::Freight(o) => o.max_bid_amount,
            BiddableOrder::Master(o) => o.max_bid_amount,
            BiddableOrder::Partial { master, .. } => master.max_bid_amount,
        }
    }

    /// The auction close marker.
    pub fn required_delivery_date(&self) -> DateTime<Utc> {
        match self {
            BiddableOrder::Freight(o) => o.required_delivery_date,
            BiddableOrder::Master(o) => o.required_delivery_date,
            BiddableOrder::Partial { master, .. } => master.required_delivery_date,
        }
    }

    pub fn cargo_category(&self) -> CargoCategory {
        match self {
            BiddableOrder::Freight(o) => o.cargo_category,
            BiddableOrder::Master(o) => o.cargo_category,
            BiddableOrder::Partial { master, .. } => master.cargo_category,
        }
    }

    pub fn pickup_location(&self) -> Option<GeoPoint> {
        match self {
            BiddableOrder::Freight(o) => o.pickup_location(),
            BiddableOrder::Master(o) => o.pickup_location(),
            BiddableOrder::Partial { master, .. } => master.pickup_location(),
        }
    }

    /// The weight a winning bid would add to the carrier's load.
    pub fn load_weight(&self) -> Weight {
        match self {
            BiddableOrder::Freight(o) => o.weight,
            BiddableOrder::Master(o) => o.total_weight,
            BiddableOrder::Partial { lot, .. } => lot.weight,
        }
    }

    pub fn master_order_id(&self) -> Option<MasterOrderId> {
        match self {
            BiddableOrder::Freight(_) => None,
            BiddableOrder::Master(o) => Some(o.id),
            BiddableOrder::Partial { master, .. } => Some(master.id),
        }
    }

    pub fn extension_count(&self) -> i64 {
        match self {
            BiddableOrder::Freight(o) => o.extension_count,
            BiddableOrder::Master(o) => o.extension_count,
            BiddableOrder::Partial { master, .. } => master.extension_count,
        }
    }
}

//--------------------------------------          Bid          -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bid {
    pub id: BidId,
    pub carrier_id: CarrierId,
    pub order_ref: OrderRef,
    pub amount: Money,
    /// The load weight the bid represents, recorded at admission.
    pub weight: Weight,
    pub proposed_delivery_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: BidStatus,
    pub match_score: Option<f64>,
    pub score_breakdown: Option<ScoreBreakdown>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBid {
    pub carrier_id: CarrierId,
    pub order_ref: OrderRef,
    pub amount: Money,
    pub proposed_delivery_date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl NewBid {
    pub fn new(carrier_id: CarrierId, order_ref: OrderRef, amount: Money, proposed_delivery_date: DateTime<Utc>) -> Self {
        Self { carrier_id, order_ref, amount, proposed_delivery_date, notes: None }
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

//--------------------------------------    ScoreBreakdown     -------------------------------------------------------
/// The four weighted sub-scores behind a bid's match score. Each sub-score lies in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub price_score: f64,
    pub trust_score: f64,
    pub delivery_score: f64,
    pub geo_score: f64,
    pub total_score: f64,
    /// The price the bid was compared against: the market median or, failing that, the order's maximum bid.
    pub reference_price: Money,
    pub price_deviation_percent: f64,
    pub market_risk_penalty: f64,
    pub distance_km: Option<f64>,
}

//--------------------------------------  ComplianceSnapshot   -------------------------------------------------------
/// The compliance oracle's verdict for a bid, recorded at admission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSnapshot {
    pub bid_id: BidId,
    pub carrier_id: CarrierId,
    pub compliance_status: ComplianceStatus,
    pub security_level: SecurityLevel,
    pub trust_score: f64,
    pub violations: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

//--------------------------------------    CarrierProfile     -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CarrierProfile {
    pub carrier_id: CarrierId,
    pub total_orders: i64,
    pub completed_orders: i64,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl CarrierProfile {
    pub fn new(carrier_id: CarrierId) -> Self {
        Self {
            carrier_id,
            total_orders: 0,
            completed_orders: 0,
            last_latitude: None,
            last_longitude: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_history(mut self, total_orders: i64, completed_orders: i64) -> Self {
        self.total_orders = total_orders;
        self.completed_orders = completed_orders;
        self
    }

    pub fn with_position(mut self, position: GeoPoint) -> Self {
        self.last_latitude = Some(position.latitude);
        self.last_longitude = Some(position.longitude);
        self
    }

    pub fn last_position(&self) -> Option<GeoPoint> {
        GeoPoint::from_parts(self.last_latitude, self.last_longitude)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn labels_round_trip_through_display() {
        for status in [MasterOrderStatus::Open, MasterOrderStatus::PartiallyFilled, MasterOrderStatus::Cancelled] {
            assert_eq!(status.to_string().parse::<MasterOrderStatus>().unwrap(), status);
        }
        assert_eq!(PartialOrderStatus::InProgress.as_str(), "IN_PROGRESS");
        assert!("SHIPPED".parse::<BidStatus>().is_err());
    }

    #[test]
    fn bid_transitions() {
        assert!(BidStatus::Pending.can_transition_to(BidStatus::Accepted));
        assert!(BidStatus::Pending.can_transition_to(BidStatus::InProgress));
        assert!(BidStatus::Committed.can_transition_to(BidStatus::InProgress));
        assert!(!BidStatus::Rejected.can_transition_to(BidStatus::Accepted));
        assert!(!BidStatus::Delivered.can_transition_to(BidStatus::Pending));
    }

    #[test]
    fn lot_status_classes() {
        assert!(PartialOrderStatus::Bidding.is_allocated());
        assert!(!PartialOrderStatus::Bidding.is_committed());
        assert!(PartialOrderStatus::Completed.is_committed());
        assert!(!PartialOrderStatus::Available.is_allocated());
        assert!(!PartialOrderStatus::Cancelled.is_allocated());
        assert!(PartialOrderStatus::Awarded.can_transition_to(PartialOrderStatus::Cancelled));
        assert!(!PartialOrderStatus::InProgress.can_transition_to(PartialOrderStatus::Cancelled));
        assert!(!PartialOrderStatus::Completed.can_transition_to(PartialOrderStatus::Delivered));
    }

    #[test]
    fn order_ref_from_columns() {
        assert_eq!(
            OrderRef::from_columns(None, Some(MasterOrderId(3)), None),
            Some(OrderRef::MasterOrder(MasterOrderId(3)))
        );
        assert_eq!(OrderRef::from_columns(Some(FreightOrderId(1)), Some(MasterOrderId(3)), None), None);
        assert_eq!(OrderRef::from_columns(None, None, None), None);
        let json = serde_json::to_string(&OrderRef::PartialOrder(PartialOrderId(7))).unwrap();
        assert_eq!(json, r#"{"kind":"partial_order","id":7}"#);
    }
}
